use url::Url;

/// Builds absolute links back into the site, e.g. for invitation emails.
#[derive(Clone, Debug)]
pub struct SiteUrlHelper {
    base: Url,
}

impl SiteUrlHelper {
    /// `base` may carry a path prefix; a trailing slash is added so that
    /// joined paths land underneath it instead of replacing its last segment.
    pub fn new(base: &Url) -> Self {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);
        Self { base }
    }

    /// Joins `path` (leading slashes ignored) onto the site root.
    pub fn build_url(&self, path: &str) -> String {
        let clean_path = path.trim_start_matches('/');
        match self.base.join(clean_path) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base, clean_path),
        }
    }

    /// The link an invitee follows to reach the registration gate.
    pub fn registration_url(&self, invitation_key: &str) -> String {
        self.build_url(&format!("invited/{}", invitation_key))
    }
}
