//! Cross-thread plumbing between the control thread and the mix thread

mod cell;
mod task;

pub use cell::{current_thread, mark_current_thread, AudioThread, CellValue, SharedValue};
pub use task::{task_queue, AudioTask, TaskReceiver, TaskSender};
