//! Outbound HTTP to effector services.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use gatehouse_core::change::DispatchPayload;
use gatehouse_core::ports::Result;

#[derive(Debug, Clone)]
pub struct EffectorResponse {
    pub code: u16,
    pub body: String,
}

/// Transport seam between the dispatch engine and the effector fleet.
/// `Ok` carries whatever status the effector returned; `Err` means no
/// response was obtained at all (connect failure, client timeout).
#[async_trait]
pub trait EffectorClient: Send + Sync {
    async fn dispatch(&self, endpoint: &str, payload: &DispatchPayload)
        -> Result<EffectorResponse>;
}

pub struct HttpEffectorClient {
    client: reqwest::Client,
}

impl HttpEffectorClient {
    /// The client-side timeout bounds how long a single dispatch can hold
    /// the pipeline; a hung effector becomes a transport-failure attempt
    /// instead of a wedged process.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!(e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EffectorClient for HttpEffectorClient {
    async fn dispatch(
        &self,
        endpoint: &str,
        payload: &DispatchPayload,
    ) -> Result<EffectorResponse> {
        let resp = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!(e))?;

        let code = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(EffectorResponse { code, body })
    }
}
