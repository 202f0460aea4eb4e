use ratatui::style::Color;

use crate::config::Theme;

/// 界面配色，由配置中的主题解析而来，渲染时只读
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub surface: Color,
    pub fg: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub selected_bg: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
}

impl Palette {
    /// Nord "polar night".
    pub const fn dark() -> Self {
        Self {
            bg: Color::Rgb(46, 52, 64),
            surface: Color::Rgb(59, 66, 82),
            fg: Color::Rgb(236, 239, 244),
            muted: Color::Rgb(129, 161, 193),
            border: Color::Rgb(76, 86, 106),
            accent: Color::Rgb(136, 192, 208),
            selected_bg: Color::Rgb(67, 76, 94),
            success: Color::Rgb(163, 190, 140),
            warning: Color::Rgb(235, 203, 139),
            danger: Color::Rgb(191, 97, 106),
        }
    }

    /// Nord "snow storm".
    pub const fn light() -> Self {
        Self {
            bg: Color::Rgb(236, 239, 244),
            surface: Color::Rgb(229, 233, 240),
            fg: Color::Rgb(46, 52, 64),
            muted: Color::Rgb(76, 86, 106),
            border: Color::Rgb(216, 222, 233),
            accent: Color::Rgb(94, 129, 172),
            selected_bg: Color::Rgb(216, 222, 233),
            success: Color::Rgb(111, 140, 86),
            warning: Color::Rgb(176, 132, 38),
            danger: Color::Rgb(191, 97, 106),
        }
    }

    pub fn for_theme(theme: Theme) -> Self {
        match theme.resolve() {
            Theme::Light => Self::light(),
            _ => Self::dark(),
        }
    }
}
