//! Usage: Removes credential material from redirect URLs before they reach logs.

const SENSITIVE_KEYS: [&str; 8] = [
    "access_token",
    "accessToken",
    "token",
    "refresh_token",
    "id_token",
    "expires_in",
    "token_type",
    "scope",
];

// Keys may arrive percent-encoded (`acc%65ss_token=`); compare the decoded spelling the
// parser would see.
fn segment_key(segment: &str) -> Option<String> {
    let wrapped = reqwest::Url::parse(&format!("http://localhost/?{segment}")).ok()?;
    wrapped
        .query_pairs()
        .next()
        .map(|(key, _)| key.into_owned())
}

fn scrub_section(section: &str) -> Option<String> {
    // Segment-level filtering on the raw text: values are never decoded or re-encoded, so
    // scrubbing an already-scrubbed URL is a no-op.
    let kept: Vec<&str> = section
        .split('&')
        .filter(|segment| {
            !segment_key(segment).is_some_and(|key| SENSITIVE_KEYS.contains(&key.as_str()))
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}

/// Returns a copy of `url` with sensitive query/fragment parameters removed. Unparseable
/// input is returned unchanged so callers can still log something.
pub fn scrub_url(url: &str) -> String {
    let mut parsed = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    if let Some(query) = parsed.query().map(str::to_string) {
        parsed.set_query(scrub_section(&query).as_deref());
    }
    if let Some(fragment) = parsed.fragment().map(str::to_string) {
        parsed.set_fragment(scrub_section(&fragment).as_deref());
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::scrub_url;

    #[test]
    fn removes_tokens_from_fragment() {
        let scrubbed = scrub_url("https://x.example/cb#access_token=SECRET&state=abc");
        assert!(!scrubbed.contains("SECRET"));
        assert!(scrubbed.contains("state=abc"));
    }

    #[test]
    fn removes_tokens_from_query() {
        let scrubbed = scrub_url("saviau://oauth?token=SECRET&next=home");
        assert!(!scrubbed.contains("SECRET"));
        assert!(scrubbed.contains("next=home"));
    }

    #[test]
    fn drops_fully_sensitive_sections() {
        let scrubbed = scrub_url("https://x.example/cb#access_token=S&refresh_token=R");
        assert!(!scrubbed.contains('#'));
    }

    #[test]
    fn keeps_provider_error_params() {
        let scrubbed = scrub_url("https://x.example/cb?error=access_denied&error_description=no");
        assert!(scrubbed.contains("error=access_denied"));
    }

    #[test]
    fn removes_percent_encoded_key_spellings() {
        let scrubbed = scrub_url("https://x.example/cb?acc%65ss_token=SECRET&state=abc");
        assert!(!scrubbed.contains("SECRET"));
        assert!(scrubbed.contains("state=abc"));
    }

    #[test]
    fn idempotent_on_already_scrubbed_urls() {
        let once = scrub_url("https://x.example/cb?state=a%20b&access_token=S#scope=email");
        let twice = scrub_url(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(scrub_url("not a url"), "not a url");
    }
}
