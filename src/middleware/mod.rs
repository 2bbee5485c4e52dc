pub mod auth;
pub mod logger;

pub use auth::{AuthService, Claims, auth_middleware};
pub use logger::logger;
