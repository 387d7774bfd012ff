pub mod analytics;
pub mod chats;
pub mod clients;
pub mod crud;
pub mod extract;
pub mod overview;
pub mod pricing;
pub mod projects;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod solutions;
pub mod state;
pub mod uploads;
pub mod users;

pub use routes::create_router;
pub use state::AppState;
