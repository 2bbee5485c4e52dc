use serde::Serialize;
use serde_json::{Value, json};

use crate::db::models::invitation::Recipient;

pub const INVITED_TEMPLATE: &str = "invitation/invited";
pub const WRONG_KEY_TEMPLATE: &str = "invitation/wrong_invitation_key";
pub const INVITATION_FORM_TEMPLATE: &str = "invitation/invitation_form";
pub const BULK_FORM_TEMPLATE: &str = "invitation/invitation_form_bulk";

/// A page for the front end to render: template name plus its context.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page {
    pub template: String,
    pub context: Value,
}

impl Page {
    pub fn new(template: impl Into<String>, context: Value) -> Self {
        Self {
            template: template.into(),
            context,
        }
    }

    pub fn invited(invitation_key: &str, recipient: Option<&Recipient>) -> Self {
        Self::new(
            INVITED_TEMPLATE,
            json!({
                "invitation_key": invitation_key,
                "invitation_recipient": recipient,
            }),
        )
    }

    /// `invitation_key` is whatever the visitor supplied, echoed back so the
    /// form can be re-filled.
    pub fn wrong_invitation_key(invitation_key: Option<&str>) -> Self {
        let no_key = invitation_key.is_none();
        Self::new(
            WRONG_KEY_TEMPLATE,
            json!({
                "invitation_key": invitation_key,
                "no_key": no_key,
                "invalid_key": !no_key,
            }),
        )
    }

    pub fn invitation_form(remaining_invitations: i64, email_preview: &str) -> Self {
        Self::new(
            INVITATION_FORM_TEMPLATE,
            json!({
                "remaining_invitations": remaining_invitations,
                "email_preview": email_preview,
            }),
        )
    }

    pub fn bulk_invitation_form(html_preview: &str, text_preview: &str) -> Self {
        Self::new(
            BULK_FORM_TEMPLATE,
            json!({
                "title": "Send Bulk Invitations",
                "html_preview": html_preview,
                "text_preview": text_preview,
            }),
        )
    }

    pub fn registration_form(
        template: &str,
        invitation_key: Option<&str>,
        recipient: Option<&Recipient>,
    ) -> Self {
        Self::new(
            template,
            json!({
                "invitation_key": invitation_key,
                "initial": {
                    "email": recipient.map(|r| r.email.as_str()),
                    "first_name": recipient.and_then(|r| r.first_name.as_deref()),
                    "last_name": recipient.and_then(|r| r.last_name.as_deref()),
                },
            }),
        )
    }
}
