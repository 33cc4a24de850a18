//! External collaborators
//!
//! The engine depends on three things it does not own: the session (who we
//! are), a navigator for route changes, and a peer directory for searches.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hangouts_core::{FeatureRoute, FetchError, Hangout, Identity, ServerConfig};
use serde::Deserialize;
use tracing::debug;

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Current identity and the token used against the HTTP endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub token: Option<String>,
}

impl Session {
    pub fn new<T: Into<Identity>>(identity: T) -> Self {
        Self {
            identity: identity.into(),
            token: None,
        }
    }

    pub fn with_token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = Some(token.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Navigation
// ----------------------------------------------------------------------------

/// Receives route changes for the focused peer
pub trait Navigator: Send + Sync {
    fn navigate(&self, peer: &Identity, route: FeatureRoute);
}

/// Ignores every route change
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, peer: &Identity, route: FeatureRoute) {
        debug!(%peer, route = route.path(), "navigation ignored");
    }
}

/// Keeps every route change; cloned handles share the history
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    history: Arc<Mutex<Vec<(Identity, FeatureRoute)>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<(Identity, FeatureRoute)> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, peer: &Identity, route: FeatureRoute) {
        if let Ok(mut history) = self.history.lock() {
            history.push((peer.clone(), route));
        }
    }
}

// ----------------------------------------------------------------------------
// Peer Directory
// ----------------------------------------------------------------------------

/// Remote lookup of peers by name
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn find(&self, query: &str, session: &Session) -> Result<Vec<Hangout>, FetchError>;
}

/// Accepted shapes of the search response
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<Hangout>),
    Many { hangouts: Vec<Hangout> },
    One { hangout: Option<Hangout> },
}

impl From<SearchResponse> for Vec<Hangout> {
    fn from(response: SearchResponse) -> Self {
        match response {
            SearchResponse::List(hangouts) | SearchResponse::Many { hangouts } => hangouts,
            SearchResponse::One { hangout } => hangout.into_iter().collect(),
        }
    }
}

/// `GET /hangouts/find?search=<query>&username=<identity>` with a bearer token
pub struct HttpPeerDirectory {
    client: reqwest::Client,
    server: ServerConfig,
}

impl HttpPeerDirectory {
    pub fn new(server: ServerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            server,
        }
    }
}

#[async_trait]
impl PeerDirectory for HttpPeerDirectory {
    async fn find(&self, query: &str, session: &Session) -> Result<Vec<Hangout>, FetchError> {
        let url = self
            .server
            .search_url(query, &session.identity)
            .map_err(|e| FetchError::RequestFailed {
                reason: e.to_string(),
            })?;

        let mut request = self.client.get(url);
        if let Some(token) = &session.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::RequestFailed {
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| FetchError::Decode {
            reason: e.to_string(),
        })?;
        Ok(body.into())
    }
}

/// Directory used when no search endpoint is configured
#[derive(Debug, Default)]
pub struct OfflineDirectory;

#[async_trait]
impl PeerDirectory for OfflineDirectory {
    async fn find(&self, _query: &str, _session: &Session) -> Result<Vec<Hangout>, FetchError> {
        Err(FetchError::RequestFailed {
            reason: "no peer directory configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_shapes() {
        let list: SearchResponse =
            serde_json::from_str(r#"[{"username":"bob","state":"INVITER","timestamp":1}]"#)
                .unwrap();
        assert_eq!(Vec::<Hangout>::from(list).len(), 1);

        let many: SearchResponse = serde_json::from_str(r#"{"hangouts":[]}"#).unwrap();
        assert!(Vec::<Hangout>::from(many).is_empty());

        let one: SearchResponse = serde_json::from_str(
            r#"{"hangout":{"username":"bob","state":"INVITER","timestamp":1}}"#,
        )
        .unwrap();
        assert_eq!(Vec::<Hangout>::from(one)[0].peer, "bob");
    }

    #[test]
    fn test_recording_navigator_shares_history() {
        let navigator = RecordingNavigator::new();
        let handle = navigator.clone();
        navigator.navigate(&"dave".into(), FeatureRoute::Declined);
        assert_eq!(handle.history(), vec![("dave".into(), FeatureRoute::Declined)]);
    }
}
