//! Usage: Shared fakes for unit and integration tests.

use crate::handoff::exchange::{SessionExchange, SessionUser};
use crate::handoff::onboarding::OnboardingProbe;
use crate::handoff::parser::RedirectCredential;
use crate::handoff::source::BoxFuture;
use crate::shared::error::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Session exchange fake that counts calls and records every access token it sees.
pub struct CountingExchange {
    calls: AtomicUsize,
    seen_tokens: Mutex<Vec<String>>,
    result: Mutex<Result<SessionUser, String>>,
}

impl CountingExchange {
    pub fn succeeding(user: SessionUser) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen_tokens: Mutex::new(Vec::new()),
            result: Mutex::new(Ok(user)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen_tokens: Mutex::new(Vec::new()),
            result: Mutex::new(Err(message.to_string())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SessionExchange for CountingExchange {
    fn exchange<'a>(
        &'a self,
        credential: &'a RedirectCredential,
    ) -> BoxFuture<'a, AppResult<SessionUser>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_tokens
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(credential.access_token.clone());
            let result = self
                .result
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            result.map_err(AppError::from)
        })
    }
}

/// Probe fake returning a fixed verdict, counting how often it was consulted.
pub struct StaticProbe {
    verdict: Option<bool>,
    calls: AtomicUsize,
}

impl StaticProbe {
    pub fn new(verdict: Option<bool>) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OnboardingProbe for StaticProbe {
    fn probe<'a>(&'a self, _access_token: &'a str) -> BoxFuture<'a, Option<bool>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        })
    }
}
