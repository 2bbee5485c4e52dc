use rand_core::{OsRng, RngCore};

/// 160 bits, rendered as 40 lowercase hex characters.
pub const INVITATION_KEY_BYTES: usize = 20;

pub fn generate_invitation_key() -> String {
    let mut bytes = [0u8; INVITATION_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_40_hex_chars() {
        let key = generate_invitation_key();
        assert_eq!(key.len(), INVITATION_KEY_BYTES * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn keys_do_not_repeat() {
        let keys: HashSet<String> = (0..1000).map(|_| generate_invitation_key()).collect();
        assert_eq!(keys.len(), 1000);
    }
}
