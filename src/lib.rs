//! Usage: Library entry point; re-exports the public handoff surface.

pub mod handoff;
pub mod infra;
pub mod logging;
pub mod shared;
pub mod test_support;

pub use handoff::deep_link::DeepLinkSource;
pub use handoff::exchange::{SessionExchange, SessionExchangeClient, SessionUser};
pub use handoff::loopback::LoopbackRedirectSource;
pub use handoff::onboarding::{OnboardingProbe, ProfileStatusClient};
pub use handoff::orchestrator::{
    CompletionHandle, CompletionOrchestrator, CompletionOutcome, CompletionState, CompletionTiming,
    FailureCode, PostLoginRoute,
};
pub use handoff::parser::{parse_redirect_url, RedirectCredential, RedirectOutcome};
pub use handoff::scrub::scrub_url;
pub use handoff::source::{RedirectSource, RedirectSubscription};
pub use infra::onboard_flag::OnboardFlagStore;
pub use infra::settings::HandoffSettings;
pub use shared::error::{AppError, AppResult};
