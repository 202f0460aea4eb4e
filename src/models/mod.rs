pub mod device;
pub mod outbox;
pub mod task;

pub use device::{Device, DeviceType};
pub use outbox::PendingOp;
pub use task::{Task, TaskDraft, TaskId, TaskPatch};
