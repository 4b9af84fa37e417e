//! Usage: Pure parsing of OAuth redirect URLs into credentials or provider errors.

/// Keys accepted for the access token, checked in order. Providers and backend versions have
/// disagreed on the spelling, so all three remain recognized.
const ACCESS_TOKEN_KEYS: [&str; 3] = ["access_token", "accessToken", "token"];
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const ERROR_KEY: &str = "error";
const ERROR_DESCRIPTION_KEY: &str = "error_description";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Credential(RedirectCredential),
    ProviderError {
        error: String,
        description: Option<String>,
    },
    NotFound,
}

#[derive(Default)]
struct SectionParams {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_params(section: &str) -> SectionParams {
    let mut params = SectionParams::default();
    // Sections are not themselves URLs; wrapping one as a query gives us percent-decoding
    // and pair splitting without a hand-rolled parser.
    let wrapped = match reqwest::Url::parse(&format!("http://localhost/?{section}")) {
        Ok(url) => url,
        Err(_) => return params,
    };

    for (key, value) in wrapped.query_pairs() {
        if value.is_empty() {
            continue;
        }
        let value = value.into_owned();
        match key.as_ref() {
            k if params.access_token.is_none() && ACCESS_TOKEN_KEYS.contains(&k) => {
                params.access_token = Some(value);
            }
            REFRESH_TOKEN_KEY if params.refresh_token.is_none() => {
                params.refresh_token = Some(value);
            }
            ERROR_KEY if params.error.is_none() => {
                params.error = Some(value);
            }
            ERROR_DESCRIPTION_KEY if params.error_description.is_none() => {
                params.error_description = Some(value);
            }
            _ => {}
        }
    }

    params
}

fn outcome_from(params: SectionParams) -> Option<RedirectOutcome> {
    if let Some(access_token) = params.access_token {
        return Some(RedirectOutcome::Credential(RedirectCredential {
            access_token,
            refresh_token: params.refresh_token,
        }));
    }
    if let Some(error) = params.error {
        return Some(RedirectOutcome::ProviderError {
            error,
            description: params.error_description,
        });
    }
    None
}

/// Parses a redirect URL. The fragment section wins over the query section, and within a
/// section a credential wins over a provider error.
pub fn parse_redirect_url(url: &str) -> RedirectOutcome {
    let parsed = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return RedirectOutcome::NotFound,
    };

    if let Some(fragment) = parsed.fragment() {
        if let Some(outcome) = outcome_from(parse_params(fragment)) {
            return outcome;
        }
    }

    if let Some(query) = parsed.query() {
        if let Some(outcome) = outcome_from(parse_params(query)) {
            return outcome;
        }
    }

    RedirectOutcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(url: &str) -> RedirectCredential {
        match parse_redirect_url(url) {
            RedirectOutcome::Credential(cred) => cred,
            other => panic!("expected credential, got {other:?}"),
        }
    }

    #[test]
    fn parses_fragment_access_token() {
        let cred = credential("https://app.example/cb#access_token=AT&refresh_token=RT");
        assert_eq!(cred.access_token, "AT");
        assert_eq!(cred.refresh_token.as_deref(), Some("RT"));
    }

    #[test]
    fn parses_query_access_token() {
        let cred = credential("saviau://oauth?access_token=AT");
        assert_eq!(cred.access_token, "AT");
        assert_eq!(cred.refresh_token, None);
    }

    #[test]
    fn accepts_alternate_token_spellings() {
        assert_eq!(credential("https://x.example/#accessToken=A1").access_token, "A1");
        assert_eq!(credential("https://x.example/#token=A2").access_token, "A2");
    }

    #[test]
    fn fragment_wins_over_query() {
        let cred = credential("https://x.example/?access_token=QUERY#access_token=FRAG");
        assert_eq!(cred.access_token, "FRAG");
    }

    #[test]
    fn credential_wins_over_error_within_section() {
        let cred = credential("https://x.example/#error=access_denied&access_token=AT");
        assert_eq!(cred.access_token, "AT");
    }

    #[test]
    fn fragment_error_wins_over_query_credential() {
        let outcome = parse_redirect_url("https://x.example/?access_token=AT#error=access_denied");
        assert_eq!(
            outcome,
            RedirectOutcome::ProviderError {
                error: "access_denied".to_string(),
                description: None,
            }
        );
    }

    #[test]
    fn parses_provider_error_with_description() {
        let outcome =
            parse_redirect_url("saviau://oauth?error=access_denied&error_description=User%20denied");
        assert_eq!(
            outcome,
            RedirectOutcome::ProviderError {
                error: "access_denied".to_string(),
                description: Some("User denied".to_string()),
            }
        );
    }

    #[test]
    fn empty_values_are_ignored() {
        assert_eq!(
            parse_redirect_url("https://x.example/#access_token=&error="),
            RedirectOutcome::NotFound
        );
    }

    #[test]
    fn ignorable_params_do_not_produce_a_credential() {
        assert_eq!(
            parse_redirect_url("https://x.example/#expires_in=3600&token_type=bearer&scope=email"),
            RedirectOutcome::NotFound
        );
    }

    #[test]
    fn first_access_token_key_wins() {
        let cred = credential("https://x.example/#access_token=FIRST&token=SECOND");
        assert_eq!(cred.access_token, "FIRST");
    }

    #[test]
    fn unparseable_url_is_not_found() {
        assert_eq!(parse_redirect_url("not a url"), RedirectOutcome::NotFound);
    }

    #[test]
    fn percent_decodes_values() {
        let cred = credential("https://x.example/#access_token=a%2Bb%3D");
        assert_eq!(cred.access_token, "a+b=");
    }
}
