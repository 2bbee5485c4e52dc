// Sub-modules organized by functional domain
pub mod api;
pub mod auth;
pub mod invitation;
pub mod page;

pub use api::*;
pub use auth::*;
pub use invitation::*;
pub use page::Page;
