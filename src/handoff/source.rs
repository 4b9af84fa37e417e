//! Usage: Platform abstraction over where redirect URLs arrive from.

use crate::handoff::scrub::scrub_url;
use crate::shared::error::AppResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::mpsc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A place redirect URLs show up: a deep link registration, a loopback listener, or a
/// scripted source in tests. Implementations must be cheap to poll.
pub trait RedirectSource: Send + Sync {
    /// The URL the surface currently shows, if any. Polled repeatedly during discovery, so
    /// the same URL may be returned more than once.
    fn initial_url(&self) -> BoxFuture<'_, AppResult<Option<String>>>;

    /// Registers for URLs that arrive after the call. Dropping the subscription
    /// unregisters it.
    fn subscribe(&self) -> RedirectSubscription;

    /// Log-safe rendering of a URL from this source.
    fn scrub(&self, url: &str) -> String {
        scrub_url(url)
    }
}

pub struct RedirectSubscription {
    receiver: mpsc::UnboundedReceiver<String>,
}

impl RedirectSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<String>) -> Self {
        Self { receiver }
    }

    /// Resolves with the next pushed URL, or `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Fan-out helper shared by source implementations. Senders whose subscriptions have been
/// dropped are pruned on the next publish.
#[derive(Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<mpsc::UnboundedSender<String>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> RedirectSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        senders.push(sender);
        RedirectSubscription::new(receiver)
    }

    pub(crate) fn publish(&self, url: &str) {
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        senders.retain(|sender| sender.send(url.to_string()).is_ok());
    }
}
