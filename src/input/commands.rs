/// 应用命令枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // ===== 退出 =====
    Quit,

    // ===== 导航 =====
    /// 选择上一个任务
    TaskUp,
    /// 选择下一个任务
    TaskDown,
    /// 跳到第一个任务
    FirstTask,
    /// 跳到最后一个任务
    LastTask,
    /// 切换 Active / Completed / All
    CycleFilter,

    // ===== 任务操作 =====
    /// 创建新任务
    NewTask,
    /// 编辑当前任务
    EditTask,
    /// 切换完成状态
    ToggleTask,
    /// 删除当前任务（需确认）
    DeleteTask,
    /// 复制任务和剩余时间到剪贴板
    CopyTask,

    // ===== 其他 =====
    /// 立即与远端同步
    Sync,
    /// 切换亮/暗主题
    ToggleTheme,
    /// 显示帮助
    ShowHelp,
}
