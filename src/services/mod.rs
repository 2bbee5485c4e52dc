pub mod auth_service;
pub mod invitations_service;
pub mod registration;
pub mod signals;

pub use auth_service::AuthService;
pub use invitations_service::{BulkSendReport, GateDecision, InvitationsService, SenderNote};
pub use registration::{RegistrationBackend, RegistrationBackendKind, RegistrationOutcome, RegistrationService};
pub use signals::InvitationSignals;
