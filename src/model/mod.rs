pub mod chat;
pub mod common;
pub mod contact;
pub mod content;
pub mod pricing;
pub mod resource;
pub mod showcase;
pub mod user;

pub use chat::*;
pub use common::*;
pub use contact::*;
pub use content::*;
pub use pricing::*;
pub use resource::*;
pub use showcase::*;
pub use user::*;
