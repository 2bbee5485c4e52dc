pub mod auth;
pub mod invitations;

pub use auth::AuthRepo;
pub use invitations::InvitationsRepo;
