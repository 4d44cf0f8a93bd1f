//! HTTP(S) asset accessor built on blocking reqwest.
//!
//! Each request runs on its own fetch thread; the bound continuation fires
//! on that thread when the response (or transport failure) lands. The tile
//! load state machine tolerates continuations firing from anywhere, so no
//! marshalling back to the main thread is needed here.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::warn;

use crate::externals::{AssetAccessor, AssetContinuation, AssetRequest, AssetResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues one fetch thread per asset request.
pub struct HttpAssetAccessor {
    timeout: Duration,
}

impl HttpAssetAccessor {
    pub fn new() -> Self {
        HttpAssetAccessor {
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        HttpAssetAccessor { timeout }
    }
}

impl Default for HttpAssetAccessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetAccessor for HttpAssetAccessor {
    fn request_asset(&self, url: &str) -> Arc<dyn AssetRequest> {
        let request = Arc::new(HttpAssetRequest::new(url));
        let fetch = Arc::clone(&request);
        let timeout = self.timeout;
        let spawned = thread::Builder::new()
            .name("tile-fetch".to_string())
            .spawn(move || {
                let response = fetch_blocking(fetch.url(), timeout);
                fetch.complete(response);
            });
        if let Err(e) = spawned {
            warn!("failed to spawn fetch thread: {}", e);
            request.complete(None);
        }
        request
    }
}

fn fetch_blocking(url: &str, timeout: Duration) -> Option<HttpAssetResponse> {
    let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("building HTTP client failed: {}", e);
            return None;
        }
    };
    match client.get(url).send() {
        Ok(response) => {
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            match response.bytes() {
                Ok(bytes) => Some(HttpAssetResponse {
                    status,
                    content_type,
                    data: bytes.to_vec(),
                }),
                Err(e) => {
                    warn!("reading response body for {} failed: {}", url, e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("request for {} failed: {}", url, e);
            None
        }
    }
}

struct HttpAssetResponse {
    status: u16,
    content_type: String,
    data: Vec<u8>,
}

impl AssetResponse for HttpAssetResponse {
    fn status_code(&self) -> u16 {
        self.status
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Default)]
struct RequestState {
    completed: bool,
    response: Option<Arc<dyn AssetResponse>>,
    continuation: Option<AssetContinuation>,
}

/// An in-flight (or completed) HTTP request.
pub struct HttpAssetRequest {
    url: String,
    state: Mutex<RequestState>,
}

impl HttpAssetRequest {
    fn new(url: &str) -> Self {
        HttpAssetRequest {
            url: url.to_string(),
            state: Mutex::new(RequestState::default()),
        }
    }

    /// Record the outcome and fire the continuation, if one is bound.
    /// `None` means a transport failure that produced no response.
    fn complete(&self, response: Option<HttpAssetResponse>) {
        let continuation = {
            let mut state = self.state.lock().unwrap();
            state.completed = true;
            state.response = response.map(|r| Arc::new(r) as Arc<dyn AssetResponse>);
            state.continuation.take()
        };
        if let Some(continuation) = continuation {
            continuation(self);
        }
    }
}

impl AssetRequest for HttpAssetRequest {
    fn url(&self) -> &str {
        &self.url
    }

    fn response(&self) -> Option<Arc<dyn AssetResponse>> {
        self.state.lock().unwrap().response.clone()
    }

    fn bind(&self, continuation: AssetContinuation) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.completed {
                state.continuation = Some(continuation);
                return;
            }
        }
        continuation(self);
    }

    /// Advisory only: the fetch thread is not interrupted and the
    /// continuation still fires; the caller's state machine absorbs the
    /// race.
    fn cancel(&self) {}
}
