//! Usage: Drives a redirect completion attempt from discovery to navigation.
//!
//! One orchestrator run owns the whole attempt: watch the source for a credential, exchange
//! it for a session exactly once, resolve onboarding, then emit the post-login route after
//! the configured delay. Callers observe progress through the returned handle.

use crate::handoff::exchange::{SessionExchange, SessionUser};
use crate::handoff::onboarding::{
    inline_onboarding_hint, resolve_onboarding, OnboardingProbe, OnboardingSignal, SignalSource,
};
use crate::handoff::parser::{parse_redirect_url, RedirectCredential, RedirectOutcome};
use crate::handoff::pending::PendingCredentialCache;
use crate::handoff::source::RedirectSource;
use crate::infra::onboard_flag::OnboardFlagStore;
use crate::infra::settings::HandoffSettings;
use crate::shared::error::{AppError, AppResult};
use crate::shared::security::mask_token;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    NoCredentialFound,
    ExchangeFailed,
    ProviderRejected,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::NoCredentialFound => "NO_CREDENTIAL_FOUND",
            FailureCode::ExchangeFailed => "EXCHANGE_FAILED",
            FailureCode::ProviderRejected => "PROVIDER_REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostLoginRoute {
    Onboarding,
    MainApp,
    BackToLogin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub user: SessionUser,
    pub onboarded: bool,
    pub route: PostLoginRoute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    Working,
    Succeeded(CompletionOutcome),
    Failed { code: FailureCode, message: String },
}

impl CompletionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CompletionState::Working)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionTiming {
    pub poll_interval: Duration,
    pub discovery_deadline: Duration,
    pub success_redirect_delay: Duration,
    pub failure_redirect_delay: Duration,
}

impl Default for CompletionTiming {
    fn default() -> Self {
        Self::from(&HandoffSettings::default())
    }
}

impl From<&HandoffSettings> for CompletionTiming {
    fn from(settings: &HandoffSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            discovery_deadline: Duration::from_millis(settings.discovery_deadline_ms),
            success_redirect_delay: Duration::from_millis(settings.success_redirect_delay_ms),
            failure_redirect_delay: Duration::from_millis(settings.failure_redirect_delay_ms),
        }
    }
}

/// Wraps the state channel so terminal states are sticky: once `Succeeded` or `Failed` has
/// been published, no further transition is accepted.
struct StateCell {
    sender: watch::Sender<CompletionState>,
}

impl StateCell {
    fn transition(&self, next: CompletionState) -> bool {
        self.sender.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = next;
            true
        })
    }
}

pub struct CompletionOrchestrator {
    source: Arc<dyn RedirectSource>,
    exchange: Arc<dyn SessionExchange>,
    probe: Arc<dyn OnboardingProbe>,
    flags: OnboardFlagStore,
    timing: CompletionTiming,
}

impl CompletionOrchestrator {
    pub fn new(
        source: Arc<dyn RedirectSource>,
        exchange: Arc<dyn SessionExchange>,
        probe: Arc<dyn OnboardingProbe>,
        flags: OnboardFlagStore,
        timing: CompletionTiming,
    ) -> Self {
        Self {
            source,
            exchange,
            probe,
            flags,
            timing,
        }
    }

    /// Spawns the completion attempt. Dropping the handle aborts it.
    pub fn start(self) -> CompletionHandle {
        let (state_tx, state_rx) = watch::channel(CompletionState::Working);
        let (nav_tx, nav_rx) = oneshot::channel();
        let state = StateCell { sender: state_tx };
        let task = tokio::spawn(run(self, state, nav_tx));
        CompletionHandle {
            state: state_rx,
            navigation: Some(nav_rx),
            task,
        }
    }
}

pub struct CompletionHandle {
    state: watch::Receiver<CompletionState>,
    navigation: Option<oneshot::Receiver<PostLoginRoute>>,
    task: JoinHandle<()>,
}

impl CompletionHandle {
    pub fn state(&self) -> CompletionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CompletionState> {
        self.state.clone()
    }

    /// Resolves once the attempt reaches a terminal state.
    pub async fn wait(&mut self) -> CompletionState {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }

    /// Resolves with the post-login route once the redirect delay has elapsed. Returns
    /// `None` on the second call or if the attempt was aborted first.
    pub async fn navigation(&mut self) -> Option<PostLoginRoute> {
        let receiver = self.navigation.take()?;
        receiver.await.ok()
    }

    pub fn dispose(&self) {
        self.task.abort();
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    orch: CompletionOrchestrator,
    state: StateCell,
    nav_tx: oneshot::Sender<PostLoginRoute>,
) {
    let credential = match discover(&orch).await {
        Ok(credential) => credential,
        Err(err) => {
            finish_failure(&orch, &state, nav_tx, failure_for_discovery(&err), err).await;
            return;
        }
    };

    // The exchange call needs the credential; the probe only needs the access token.
    let access_token = credential.access_token.clone();
    tracing::info!(
        access_token = %mask_token(&access_token),
        "redirect credential discovered, starting exchange"
    );

    let user = match orch.exchange.exchange(&credential).await {
        Ok(user) => user,
        Err(err) => {
            finish_failure(&orch, &state, nav_tx, FailureCode::ExchangeFailed, err).await;
            return;
        }
    };

    let onboarded = decide_onboarding(&orch, &user, &access_token).await;
    if onboarded {
        if let Err(err) = orch.flags.mark_onboarded() {
            tracing::warn!("failed to persist onboard flag: {}", err.message());
        }
    }

    let route = if onboarded {
        PostLoginRoute::MainApp
    } else {
        PostLoginRoute::Onboarding
    };
    let outcome = CompletionOutcome {
        user,
        onboarded,
        route,
    };
    if !state.transition(CompletionState::Succeeded(outcome)) {
        return;
    }
    tracing::info!(onboarded, ?route, "session handoff complete");

    tokio::time::sleep(orch.timing.success_redirect_delay).await;
    let _ = nav_tx.send(route);
}

async fn finish_failure(
    orch: &CompletionOrchestrator,
    state: &StateCell,
    nav_tx: oneshot::Sender<PostLoginRoute>,
    code: FailureCode,
    err: AppError,
) {
    tracing::warn!(code = code.as_str(), "handoff failed: {}", err.message());
    if !state.transition(CompletionState::Failed {
        code,
        message: err.message().to_string(),
    }) {
        return;
    }
    tokio::time::sleep(orch.timing.failure_redirect_delay).await;
    let _ = nav_tx.send(PostLoginRoute::BackToLogin);
}

fn failure_for_discovery(err: &AppError) -> FailureCode {
    if err.code() == "PROVIDER_REJECTED" {
        FailureCode::ProviderRejected
    } else {
        FailureCode::NoCredentialFound
    }
}

fn provider_error(error: &str, description: Option<&str>) -> AppError {
    match description {
        Some(description) => format!("PROVIDER_REJECTED: {error}: {description}").into(),
        None => format!("PROVIDER_REJECTED: {error}").into(),
    }
}

/// Onboarding signals in precedence order. The remote probe is only consulted when neither
/// the inline response nor the local flag can decide.
async fn decide_onboarding(
    orch: &CompletionOrchestrator,
    user: &SessionUser,
    access_token: &str,
) -> bool {
    let mut signals: Vec<OnboardingSignal> = Vec::new();

    if let Some(is_onboarded) = inline_onboarding_hint(user) {
        signals.push(OnboardingSignal {
            source: SignalSource::InlineResponse,
            is_onboarded,
        });
    }
    // The local flag is only ever written after a completed onboarding, so an absent or
    // false flag is "no signal", not a veto.
    if orch.flags.read() == Some(true) {
        signals.push(OnboardingSignal {
            source: SignalSource::LocalFlag,
            is_onboarded: true,
        });
    }
    if signals.is_empty() {
        if let Some(is_onboarded) = orch.probe.probe(access_token).await {
            signals.push(OnboardingSignal {
                source: SignalSource::RemoteProbe,
                is_onboarded,
            });
        }
    }

    resolve_onboarding(&signals)
}

async fn discover(orch: &CompletionOrchestrator) -> AppResult<RedirectCredential> {
    let pending = PendingCredentialCache::new();
    let mut subscription = orch.source.subscribe();
    let mut events_open = true;

    // The redirect may have landed before this attempt started; check the current URL
    // before waiting on anything.
    if let Some(url) = orch.source.initial_url().await? {
        tracing::debug!(url = %orch.source.scrub(&url), "inspecting initial redirect url");
        match parse_redirect_url(&url) {
            RedirectOutcome::Credential(credential) => pending.put(credential),
            RedirectOutcome::ProviderError { error, description } => {
                return Err(provider_error(&error, description.as_deref()))
            }
            RedirectOutcome::NotFound => {}
        }
    }
    if let Some(credential) = pending.take() {
        return Ok(credential);
    }

    let deadline = tokio::time::sleep(orch.timing.discovery_deadline);
    tokio::pin!(deadline);
    let mut poll = tokio::time::interval(orch.timing.poll_interval);
    // interval's first tick completes immediately; the initial check above already covered it
    poll.tick().await;

    loop {
        tokio::select! {
            _ = &mut deadline => {
                return Err("NO_CREDENTIAL_FOUND: no credential arrived before the deadline".into());
            }
            event = subscription.recv(), if events_open => {
                match event {
                    Some(url) => {
                        tracing::debug!(url = %orch.source.scrub(&url), "redirect event received");
                        match parse_redirect_url(&url) {
                            RedirectOutcome::Credential(credential) => return Ok(credential),
                            RedirectOutcome::ProviderError { error, description } => {
                                return Err(provider_error(&error, description.as_deref()))
                            }
                            RedirectOutcome::NotFound => {}
                        }
                    }
                    None => events_open = false,
                }
            }
            _ = poll.tick() => {
                if let Ok(Some(url)) = orch.source.initial_url().await {
                    match parse_redirect_url(&url) {
                        RedirectOutcome::Credential(credential) => pending.put(credential),
                        RedirectOutcome::ProviderError { error, description } => {
                            return Err(provider_error(&error, description.as_deref()))
                        }
                        RedirectOutcome::NotFound => {}
                    }
                }
                if let Some(credential) = pending.take() {
                    return Ok(credential);
                }
            }
        }
    }
}
