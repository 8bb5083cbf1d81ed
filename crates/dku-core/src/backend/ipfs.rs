//! IPFS HTTP API shim (`/api/v0/add`, `/api/v0/cat`).
//!
//! Content ids are the CIDs IPFS assigns to the uploaded envelope.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use super::{Backend, BackendError, ContentId};

/// Default local daemon API address.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

pub struct IpfsBackend {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "Message")]
    message: String,
}

impl IpfsBackend {
    /// `timeout` bounds every request; elapsed requests surface as `Unavailable`.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.api_url, command)
    }
}

fn transport_err(e: reqwest::Error) -> BackendError {
    BackendError::Unavailable(e.to_string())
}

/// Maps a non-success API response to a backend error.
fn classify_error(status: StatusCode, body: &str) -> BackendError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let lowered = message.to_lowercase();
    if lowered.contains("not found") || lowered.contains("invalid cid") || lowered.contains("invalid path") {
        BackendError::NotFound
    } else if status.is_server_error() && lowered.contains("context deadline exceeded") {
        BackendError::Unavailable(message)
    } else {
        BackendError::Rejected(format!("{}: {}", status, message))
    }
}

#[async_trait::async_trait]
impl Backend for IpfsBackend {
    fn name(&self) -> &str {
        "ipfs"
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId, BackendError> {
        let size = bytes.len();
        let form = Form::new().part("file", Part::bytes(bytes).file_name("aku.json"));
        let resp = self
            .client
            .post(self.endpoint("add"))
            .query(&[("pin", "true"), ("quiet", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        let added: AddResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Rejected(format!("unexpected add response: {}", e)))?;
        tracing::debug!(
            target: "dku::backend",
            backend = "ipfs",
            cid = %added.hash,
            bytes = size,
            "added envelope"
        );
        Ok(added.hash)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, BackendError> {
        let resp = self
            .client
            .post(self.endpoint("cat"))
            .query(&[("arg", id)])
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }
        let bytes = resp.bytes().await.map_err(transport_err)?;
        Ok(bytes.to_vec())
    }
}
