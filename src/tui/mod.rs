//! Terminal chat screen (ratatui)

mod app;
mod backend;
mod compose;
pub mod log_capture;
mod messages;
mod sidebar;
mod ui;

pub use app::{run, Exit};
pub use log_capture::LogBuffer;
