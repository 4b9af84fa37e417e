//! Usage: Decides whether a freshly signed-in user still needs onboarding.

use crate::handoff::exchange::SessionUser;
use crate::handoff::source::BoxFuture;
use crate::shared::security::mask_token;
use serde::Deserialize;

/// Where an onboarding signal came from. Precedence follows declaration order: the inline
/// response wins, then the local flag, then the remote probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalSource {
    InlineResponse,
    LocalFlag,
    RemoteProbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardingSignal {
    pub source: SignalSource,
    pub is_onboarded: bool,
}

/// Resolves collected signals to a single verdict. No signal at all means the user has not
/// onboarded, which routes them into onboarding rather than locking them out.
pub fn resolve_onboarding(signals: &[OnboardingSignal]) -> bool {
    for source in [
        SignalSource::InlineResponse,
        SignalSource::LocalFlag,
        SignalSource::RemoteProbe,
    ] {
        if let Some(signal) = signals.iter().find(|s| s.source == source) {
            return signal.is_onboarded;
        }
    }
    false
}

/// Reads the onboarding hint carried inline in the exchange response. A populated full name
/// counts as onboarded even when the explicit flag is absent.
pub fn inline_onboarding_hint(user: &SessionUser) -> Option<bool> {
    if user.onboarded == Some(true) {
        return Some(true);
    }
    if user
        .full_name
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty())
    {
        return Some(true);
    }
    if user.onboarded == Some(false) {
        return Some(false);
    }
    None
}

pub trait OnboardingProbe: Send + Sync {
    /// Asks the backend whether the account has completed its profile. `None` means the
    /// probe could not decide and must not override other signals.
    fn probe<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Option<bool>>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileStatusResponse {
    exists: Option<bool>,
    complete: Option<bool>,
    is_new_user: Option<bool>,
}

pub struct ProfileStatusClient {
    client: reqwest::Client,
    probe_url: String,
}

impl ProfileStatusClient {
    pub fn new(client: reqwest::Client, probe_url: String) -> Self {
        Self { client, probe_url }
    }
}

impl OnboardingProbe for ProfileStatusClient {
    fn probe<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, Option<bool>> {
        Box::pin(async move {
            let mut url = match reqwest::Url::parse(self.probe_url.trim()) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!("profile status url invalid: {err}");
                    return None;
                }
            };
            url.query_pairs_mut().append_pair("accessToken", access_token);

            let response = match self.client.get(url).send().await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(
                        access_token = %mask_token(access_token),
                        "profile status request failed: {err}"
                    );
                    return None;
                }
            };

            let status = response.status();
            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "profile status returned error");
                return None;
            }

            match response.json::<ProfileStatusResponse>().await {
                Ok(parsed) => map_probe_response(&parsed),
                Err(err) => {
                    tracing::warn!("profile status response invalid: {err}");
                    None
                }
            }
        })
    }
}

fn map_probe_response(parsed: &ProfileStatusResponse) -> Option<bool> {
    if parsed.complete == Some(true) {
        return Some(true);
    }
    if parsed.is_new_user == Some(true) || parsed.exists == Some(false) {
        return Some(false);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(onboarded: Option<bool>, full_name: Option<&str>) -> SessionUser {
        SessionUser {
            onboarded,
            full_name: full_name.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn inline_hint_prefers_explicit_true() {
        assert_eq!(inline_onboarding_hint(&user(Some(true), None)), Some(true));
    }

    #[test]
    fn inline_hint_counts_full_name_as_onboarded() {
        assert_eq!(inline_onboarding_hint(&user(None, Some("Ana"))), Some(true));
        assert_eq!(
            inline_onboarding_hint(&user(Some(false), Some("Ana"))),
            Some(true)
        );
    }

    #[test]
    fn inline_hint_blank_full_name_does_not_count() {
        assert_eq!(inline_onboarding_hint(&user(None, Some("   "))), None);
        assert_eq!(
            inline_onboarding_hint(&user(Some(false), Some(" "))),
            Some(false)
        );
    }

    #[test]
    fn inline_hint_undecided_without_data() {
        assert_eq!(inline_onboarding_hint(&user(None, None)), None);
    }

    #[test]
    fn resolve_prefers_inline_over_flag_and_probe() {
        let signals = [
            OnboardingSignal {
                source: SignalSource::RemoteProbe,
                is_onboarded: true,
            },
            OnboardingSignal {
                source: SignalSource::InlineResponse,
                is_onboarded: false,
            },
            OnboardingSignal {
                source: SignalSource::LocalFlag,
                is_onboarded: true,
            },
        ];
        assert!(!resolve_onboarding(&signals));
    }

    #[test]
    fn resolve_falls_through_to_probe() {
        let signals = [OnboardingSignal {
            source: SignalSource::RemoteProbe,
            is_onboarded: true,
        }];
        assert!(resolve_onboarding(&signals));
    }

    #[test]
    fn resolve_defaults_to_not_onboarded() {
        assert!(!resolve_onboarding(&[]));
    }

    #[test]
    fn map_probe_response_handles_the_three_verdicts() {
        let complete = ProfileStatusResponse {
            complete: Some(true),
            ..Default::default()
        };
        assert_eq!(map_probe_response(&complete), Some(true));

        let new_user = ProfileStatusResponse {
            is_new_user: Some(true),
            ..Default::default()
        };
        assert_eq!(map_probe_response(&new_user), Some(false));

        let missing = ProfileStatusResponse {
            exists: Some(false),
            ..Default::default()
        };
        assert_eq!(map_probe_response(&missing), Some(false));

        assert_eq!(map_probe_response(&ProfileStatusResponse::default()), None);
    }
}
