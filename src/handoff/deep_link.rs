//! Usage: Redirect source fed by OS deep link activations (`saviau://oauth...`).

use crate::handoff::source::{BoxFuture, RedirectSource, RedirectSubscription, Subscribers};
use crate::shared::error::AppResult;
use std::sync::Mutex;

/// Holds the launch URL (if the process was started by a deep link) and fans out links that
/// arrive while the process is already running. The platform shell calls `feed_link` from
/// its activation handler.
#[derive(Default)]
pub struct DeepLinkSource {
    latest: Mutex<Option<String>>,
    subscribers: Subscribers,
}

impl DeepLinkSource {
    pub fn new(launch_url: Option<String>) -> Self {
        Self {
            latest: Mutex::new(launch_url),
            subscribers: Subscribers::default(),
        }
    }

    pub fn feed_link(&self, url: &str) {
        {
            let mut latest = self
                .latest
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *latest = Some(url.to_string());
        }
        self.subscribers.publish(url);
    }
}

impl RedirectSource for DeepLinkSource {
    fn initial_url(&self) -> BoxFuture<'_, AppResult<Option<String>>> {
        Box::pin(async move {
            let latest = self
                .latest
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Ok(latest.clone())
        })
    }

    fn subscribe(&self) -> RedirectSubscription {
        self.subscribers.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_url_is_visible_immediately() {
        let source = DeepLinkSource::new(Some("saviau://oauth#access_token=AT".to_string()));
        let url = source.initial_url().await.unwrap();
        assert_eq!(url.as_deref(), Some("saviau://oauth#access_token=AT"));
    }

    #[tokio::test]
    async fn feed_link_updates_latest_and_notifies() {
        let source = DeepLinkSource::new(None);
        let mut sub = source.subscribe();
        source.feed_link("saviau://oauth?token=T1");
        assert_eq!(sub.recv().await.as_deref(), Some("saviau://oauth?token=T1"));
        let url = source.initial_url().await.unwrap();
        assert_eq!(url.as_deref(), Some("saviau://oauth?token=T1"));
    }

    #[test]
    fn scrub_uses_default_redaction() {
        let source = DeepLinkSource::new(None);
        let scrubbed = source.scrub("saviau://oauth?access_token=SECRET&state=s");
        assert!(!scrubbed.contains("SECRET"));
    }
}
