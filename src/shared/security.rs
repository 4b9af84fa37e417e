//! Usage: Token masking for log lines and error snippets.

const MASK_PREFIX_LEN: usize = 6;
const MASK_SUFFIX_LEN: usize = 4;

pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Counted in chars, not bytes: tokens come from percent-decoded URL text and may
    // contain multibyte characters.
    let char_count = trimmed.chars().count();
    if char_count <= MASK_PREFIX_LEN + MASK_SUFFIX_LEN {
        return "*".repeat(char_count.min(8));
    }

    let prefix: String = trimmed.chars().take(MASK_PREFIX_LEN).collect();
    let suffix: String = trimmed
        .chars()
        .skip(char_count - MASK_SUFFIX_LEN)
        .collect();
    format!("{prefix}...{suffix}")
}

#[cfg(test)]
mod tests {
    use super::mask_token;

    #[test]
    fn mask_token_keeps_prefix_and_suffix() {
        assert_eq!(mask_token("abcdef1234567890"), "abcdef...7890");
    }

    #[test]
    fn mask_token_redacts_short_values_fully() {
        assert_eq!(mask_token("abcd"), "****");
        assert_eq!(mask_token(""), "");
    }

    #[test]
    fn mask_token_handles_multibyte_characters() {
        // Decoded form of access_token=aaaaa%C3%A9xxxxxx: the 6th char is multibyte.
        assert_eq!(mask_token("aaaaa\u{e9}xxxxxx"), "aaaaa\u{e9}...xxxx");
        assert_eq!(mask_token("\u{e9}\u{e9}\u{e9}\u{e9}"), "****");
    }
}
