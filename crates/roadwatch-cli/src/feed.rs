//! Blocking HTTP adapter for the upstream feed.

use std::time::Duration;

use roadwatch_core::FeedEvent;
use roadwatch_core::feed::{FeedError, FeedSource, parse_feed};
use tracing::debug;

pub struct HttpFeed {
    agent: ureq::Agent,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("roadwatch/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            url: url.into(),
        }
    }
}

impl FeedSource for HttpFeed {
    fn fetch_events(&self) -> Result<Vec<FeedEvent>, FeedError> {
        let response = self
            .agent
            .get(&self.url)
            .set("Accept", "application/json")
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => FeedError::Status { status },
                ureq::Error::Transport(transport) => FeedError::Unreachable(transport.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|err| FeedError::Unreachable(format!("read body: {err}")))?;
        debug!(url = %self.url, bytes = body.len(), "feed fetched");
        parse_feed(&body)
    }
}
