mod api;
mod conversation;
mod messages;

pub use api::*;
pub use conversation::*;
pub use messages::*;
