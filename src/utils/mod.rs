pub mod site_url;
pub mod token;

pub use site_url::SiteUrlHelper;
pub use token::generate_invitation_key;
