//! Reading-progress persistence API client

use std::time::Duration;

use serde::Deserialize;

use crate::session::{ProgressTotals, ProgressUpdate};

/// Bound on every persistence request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors talking to the persistence API
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// Credential rejected; the embedding UI should redirect to sign-in
    /// with `return_path` carried along.
    #[error("unauthorized, sign in and return to {return_path}")]
    Unauthorized { return_path: String },

    #[error("progress API: {0}")]
    Http(#[from] reqwest::Error),

    #[error("progress API returned status {status}")]
    Status { status: u16 },
}

/// Persistence surface the session tracker flushes through
pub trait ProgressStore {
    /// Last-known progress for a book, `None` when the server has none
    fn fetch(&self, book_id: &str) -> Result<Option<ProgressTotals>, ProgressError>;

    fn push(&mut self, book_id: &str, update: &ProgressUpdate) -> Result<(), ProgressError>;
}

#[derive(Debug, Default, Deserialize)]
struct ProgressEnvelope {
    #[serde(default)]
    progress: Option<ProgressTotals>,
}

/// HTTP client for the reading-progress API
pub struct HttpProgressClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl HttpProgressClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ProgressError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn book_url(&self, book_id: &str, leaf: &str) -> String {
        format!("{}/books/{book_id}/{leaf}", self.base_url)
    }

    fn unauthorized(book_id: &str) -> ProgressError {
        ProgressError::Unauthorized {
            return_path: format!("/books/{book_id}"),
        }
    }

    /// Fetch the raw document bytes for a book
    pub fn fetch_document(&self, book_id: &str) -> Result<Vec<u8>, ProgressError> {
        let response = self
            .http
            .get(self.book_url(book_id, "pdf"))
            .bearer_auth(&self.token)
            .send()?;

        match response.status().as_u16() {
            401 => Err(Self::unauthorized(book_id)),
            status if !response.status().is_success() => Err(ProgressError::Status { status }),
            _ => Ok(response.bytes()?.to_vec()),
        }
    }
}

impl ProgressStore for HttpProgressClient {
    fn fetch(&self, book_id: &str) -> Result<Option<ProgressTotals>, ProgressError> {
        let response = self
            .http
            .get(self.book_url(book_id, "progress"))
            .bearer_auth(&self.token)
            .send()?;

        match response.status().as_u16() {
            401 => Err(Self::unauthorized(book_id)),
            status if !response.status().is_success() => Err(ProgressError::Status { status }),
            _ => {
                let envelope: ProgressEnvelope = response.json()?;
                Ok(envelope.progress)
            }
        }
    }

    fn push(&mut self, book_id: &str, update: &ProgressUpdate) -> Result<(), ProgressError> {
        let response = self
            .http
            .post(self.book_url(book_id, "progress"))
            .bearer_auth(&self.token)
            .json(update)
            .send()?;

        match response.status().as_u16() {
            401 => Err(Self::unauthorized(book_id)),
            status if !response.status().is_success() => Err(ProgressError::Status { status }),
            _ => Ok(()),
        }
    }
}

/// In-memory store for tests: records every push, serves a seeded fetch.
/// Clones share the push log, so a test can keep a handle after the store
/// moves into the viewer.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default, Clone)]
pub struct MemoryProgressStore {
    seeded: Option<ProgressTotals>,
    pushes: std::sync::Arc<std::sync::Mutex<Vec<(String, ProgressUpdate)>>>,
    fail_pushes: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seeded(totals: ProgressTotals) -> Self {
        Self {
            seeded: Some(totals),
            ..Self::default()
        }
    }

    /// Make every push fail with a synthetic status error
    pub fn fail_pushes(&self, fail: bool) {
        self.fail_pushes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn pushes(&self) -> Vec<(String, ProgressUpdate)> {
        self.pushes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ProgressStore for MemoryProgressStore {
    fn fetch(&self, _book_id: &str) -> Result<Option<ProgressTotals>, ProgressError> {
        Ok(self.seeded)
    }

    fn push(&mut self, book_id: &str, update: &ProgressUpdate) -> Result<(), ProgressError> {
        if self.fail_pushes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ProgressError::Status { status: 503 });
        }
        self.pushes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((book_id.to_string(), *update));
        Ok(())
    }
}
