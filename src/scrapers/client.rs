use crate::scrapers::onthehouse::{SearchPage, SearchQuery, API_URL, BASE_URL, SITE_HOST};
use crate::scrapers::traits::{DirectFetcher, Renderer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Errors on the search fetch path
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connect failure, timeout or non-success status on the direct path
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("direct transport failed and no fallback session is available")]
    NoFallback,

    #[error("fallback session error: {0}")]
    Session(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Which path the client currently uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Direct,
    /// Sticky: once entered, the client never returns to `Direct`
    Fallback,
}

/// Search client that tries the direct API first and, after a transport
/// failure, routes every later request through a rendered session.
///
/// State is per instance; concurrent areas need their own clients.
pub struct AreaFetchClient {
    direct: Arc<dyn DirectFetcher>,
    fallback: Option<Arc<dyn Renderer>>,
    state: TransportState,
    session_settle: Duration,
}

impl AreaFetchClient {
    pub fn new(direct: Arc<dyn DirectFetcher>) -> Self {
        Self {
            direct,
            fallback: None,
            state: TransportState::Direct,
            session_settle: Duration::from_secs(1),
        }
    }

    pub fn with_fallback(mut self, session: Arc<dyn Renderer>) -> Self {
        self.fallback = Some(session);
        self
    }

    /// Pause after the fallback session navigates onto the site
    pub fn with_session_settle(mut self, settle: Duration) -> Self {
        self.session_settle = settle;
        self
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub async fn fetch(&mut self, query: &SearchQuery) -> Result<SearchPage, FetchError> {
        if self.state == TransportState::Direct {
            match self.direct.fetch(query).await {
                Ok(page) => return Ok(page),
                Err(FetchError::Transport(reason)) if self.fallback.is_some() => {
                    warn!("Direct request failed ({}), falling back to browser session", reason);
                    self.state = TransportState::Fallback;
                }
                Err(e) => return Err(e),
            }
        }

        let session = self.fallback.as_ref().ok_or(FetchError::NoFallback)?;
        fetch_in_session(session.as_ref(), query, self.session_settle).await
    }
}

/// Issue the search request from inside a rendered session.
async fn fetch_in_session(
    session: &dyn Renderer,
    query: &SearchQuery,
    settle: Duration,
) -> Result<SearchPage, FetchError> {
    let current = session
        .current_url()
        .await
        .map_err(|e| FetchError::Session(e.to_string()))?;

    if !current.contains(SITE_HOST) {
        let landing = query.referer();
        info!("Opening {} to establish a session", landing);
        session
            .goto(&landing)
            .await
            .map_err(|e| FetchError::Session(format!("navigation to {} failed: {}", BASE_URL, e)))?;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
    }

    debug!("In-session POST {} page {}", API_URL, query.page);
    let body = session
        .post_json(API_URL, &query.payload())
        .await
        .map_err(|e| FetchError::Session(e.to_string()))?;
    SearchPage::from_json(body)
}
