//! Data models for chat backend entities

mod content;
mod conversation;
mod message;
mod user;

pub use content::*;
pub use conversation::*;
pub use message::*;
pub use user::*;
