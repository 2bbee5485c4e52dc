//! Invitation email bodies (`invitation_email.html` / `invitation_email.txt`).

use serde::Serialize;

use crate::db::models::invitation::Recipient;

/// Placeholder shown in previews where the sender's note will go.
pub const NOTE_PLACEHOLDER: &str = "--your note will be inserted here--";

#[derive(Debug, Clone, Serialize)]
pub struct EmailContext {
    pub site_name: String,
    pub registration_url: String,
    pub recipient: Option<Recipient>,
    pub sender_note: Option<String>,
    pub expiration_days: i64,
    /// Staff notes go into the HTML body as-is; everyone else's are escaped.
    #[serde(skip)]
    pub trusted_note: bool,
}

pub struct InvitationEmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl InvitationEmailContent {
    pub fn render(ctx: &EmailContext) -> Self {
        Self {
            subject: format!("You have been invited to join {}", ctx.site_name),
            text: Self::text_template(ctx),
            html: Self::html_template(ctx),
        }
    }

    fn greeting(ctx: &EmailContext) -> Option<String> {
        ctx.recipient
            .as_ref()
            .and_then(|r| r.first_name.clone().or_else(|| r.full_name()))
    }

    fn text_template(ctx: &EmailContext) -> String {
        let greeting = match Self::greeting(ctx) {
            Some(name) => format!("Hello {},", name),
            None => "Hello,".to_string(),
        };
        let note = ctx
            .sender_note
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("\n{}\n", n.trim()))
            .unwrap_or_default();

        format!(
            r#"{greeting}

You have been invited to join {site}.
{note}
To accept the invitation, create your account here:

{url}

This invitation expires in {days} days.

--
{site}"#,
            greeting = greeting,
            site = ctx.site_name,
            note = note,
            url = ctx.registration_url,
            days = ctx.expiration_days,
        )
    }

    fn html_template(ctx: &EmailContext) -> String {
        let greeting = match Self::greeting(ctx) {
            Some(name) => format!("Hello {},", escape_html(&name)),
            None => "Hello,".to_string(),
        };
        let note = ctx
            .sender_note
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| {
                let body = if ctx.trusted_note {
                    n.to_string()
                } else {
                    escape_html(n).replace('\n', "<br>")
                };
                format!(r#"<blockquote class="note">{}</blockquote>"#, body)
            })
            .unwrap_or_default();
        let site = escape_html(&ctx.site_name);
        let url = escape_html(&ctx.registration_url);

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background: #f5f5f5; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 40px 20px; }}
        .card {{ background: white; border-radius: 8px; padding: 40px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        .note {{ border-left: 3px solid #2563eb; margin: 24px 0; padding: 8px 16px; color: #555; }}
        .button {{ display: inline-block; padding: 12px 24px; background: #2563eb; color: white; border-radius: 6px; text-decoration: none; }}
        .expires {{ color: #666; font-size: 14px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
            <p>{greeting}</p>
            <p>You have been invited to join <strong>{site}</strong>.</p>
            {note}
            <p><a class="button" href="{url}">Accept invitation</a></p>
            <p class="expires">This invitation expires in {days} days. If the button does not work, open {url}</p>
        </div>
    </div>
</body>
</html>"#,
            greeting = greeting,
            site = site,
            note = note,
            url = url,
            days = ctx.expiration_days,
        )
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
