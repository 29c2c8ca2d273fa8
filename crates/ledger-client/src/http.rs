//! HTTP key-value gateway client.

use crate::error::LedgerError;
use crate::types::*;
use crate::Ledger;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Client for a ledger exposed through the REST key-value gateway.
#[derive(Clone, Debug)]
pub struct HttpLedger {
    client: Client,
    base_url: String,
}

impl HttpLedger {
    /// Create a new gateway client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    fn data_url(&self, key: &str) -> String {
        format!("{}/v1/data/{}", self.base_url, urlencoding::encode(key))
    }

    fn decode_value(key: &str, encoded: &str) -> Result<Vec<u8>, LedgerError> {
        STANDARD.decode(encoded).map_err(|e| LedgerError::Encoding {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Handle HTTP response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        response: reqwest::Response,
    ) -> Result<T, LedgerError> {
        if response.status().is_success() {
            let body = response.bytes().await?;
            serde_json::from_slice(&body).map_err(LedgerError::from)
        } else {
            Err(self.extract_error(key, response).await)
        }
    }

    /// Extract error information from failed response.
    async fn extract_error(&self, key: &str, response: reqwest::Response) -> LedgerError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!(key = %key, "Ledger write declined");
                LedgerError::Declined
            }
            StatusCode::FORBIDDEN => LedgerError::Unauthorized(key.to_string()),
            StatusCode::SERVICE_UNAVAILABLE => LedgerError::Unavailable(message),
            _ => {
                warn!("Ledger request failed: {} - {}", status, message);
                LedgerError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn is_available(&self) -> bool {
        let response = match self
            .client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!("Ledger health check failed: {}", e);
                return false;
            }
        };

        match self.handle_response::<HealthResponse>("", response).await {
            Ok(health) => health.available,
            Err(e) => {
                debug!("Ledger health check failed: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_data(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        let response = self.client.get(self.data_url(key)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let result: GetDataResponse = self.handle_response(key, response).await?;
        match result.value {
            Some(encoded) => Self::decode_value(key, &encoded),
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self, value), fields(len = value.len()))]
    async fn set_data(&self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        let request = SetDataRequest {
            value: STANDARD.encode(value),
        };

        let response = self
            .client
            .put(self.data_url(key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.extract_error(key, response).await);
        }

        debug!("Wrote {} bytes", value.len());
        Ok(())
    }

    #[instrument(skip(self, expected, value), fields(len = value.len()))]
    async fn compare_and_set(
        &self,
        key: &str,
        expected: &[u8],
        value: &[u8],
    ) -> Result<bool, LedgerError> {
        let request = CompareAndSetRequest {
            expected: STANDARD.encode(expected),
            value: STANDARD.encode(value),
        };

        let response = self
            .client
            .post(format!("{}/cas", self.data_url(key)))
            .json(&request)
            .send()
            .await?;

        let result: CompareAndSetResponse = self.handle_response(key, response).await?;
        Ok(result.swapped)
    }

    #[instrument(skip(self))]
    async fn get_own_address(&self) -> Result<String, LedgerError> {
        let response = self
            .client
            .get(format!("{}/v1/address", self.base_url))
            .send()
            .await?;

        let result: AddressResponse = self.handle_response("", response).await?;
        Ok(result.address)
    }
}
