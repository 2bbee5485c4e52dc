pub const MAX_KEY_LENGTH: usize = 64;

/// Tokens outside `[0-9A-Za-z]{1,64}` can never name a stored key.
pub fn is_well_formed_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LENGTH && key.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape() {
        assert!(is_well_formed_key("abc123"));
        assert!(is_well_formed_key(&"a".repeat(64)));
        assert!(!is_well_formed_key(""));
        assert!(!is_well_formed_key(&"a".repeat(65)));
        assert!(!is_well_formed_key("abc-123"));
        assert!(!is_well_formed_key("abc/../x"));
    }
}
