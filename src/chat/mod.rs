pub mod events;
pub mod hub;
pub mod service;
pub mod socket;

pub use events::{ClientEvent, ServerEvent};
pub use hub::{ChatHub, ChatUser, ConnectionId};
pub use service::ChatService;
