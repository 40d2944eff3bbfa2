//! # REST API Client
//!
//! Sends JSON requests to the call-center platform (Basic auth with an API
//! key id and secret) and to the CRM / marketing platform (Bearer token).

use super::{ApiClient, ApiError, ApiResponse, Operation, Service};
use crate::config::AppConfig;
use anyhow::Context;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::time::Duration;

/// How requests to one service are authenticated.
#[derive(Clone)]
pub enum Credentials {
    Basic { key_id: String, secret: String },
    Bearer { token: String },
}

impl Credentials {
    /// Value of the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        match self {
            Credentials::Basic { key_id, secret } => {
                format!("Basic {}", STANDARD.encode(format!("{key_id}:{secret}")))
            }
            Credentials::Bearer { token } => format!("Bearer {token}"),
        }
    }
}

#[derive(Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub credentials: Credentials,
}

impl ServiceEndpoint {
    fn url(&self, operation: &Operation) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), operation.path())
    }
}

/// reqwest backed [`ApiClient`]
#[derive(Clone)]
pub struct HttpApiClient {
    /// HTTP client for making API requests
    client: reqwest::Client,
    call_center: ServiceEndpoint,
    crm: ServiceEndpoint,
    /// Per request timeout, also reported back in [`ApiError::Timeout`]
    timeout: Duration,
}

impl HttpApiClient {
    pub fn new(
        call_center: ServiceEndpoint,
        crm: ServiceEndpoint,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            call_center,
            crm,
            timeout,
        })
    }

    pub fn from_config(app_config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            ServiceEndpoint {
                base_url: app_config.call_center_base_url.clone(),
                credentials: Credentials::Basic {
                    key_id: app_config.call_center_api_id.clone(),
                    secret: app_config.call_center_api_token.clone(),
                },
            },
            ServiceEndpoint {
                base_url: app_config.crm_base_url.clone(),
                credentials: Credentials::Bearer {
                    token: app_config.crm_api_token.clone(),
                },
            },
            app_config.outbound_timeout(),
        )
    }

    fn endpoint(&self, service: Service) -> &ServiceEndpoint {
        match service {
            Service::CallCenter => &self.call_center,
            Service::Crm => &self.crm,
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            return ApiError::Timeout(self.timeout);
        }
        ApiError::Transport(err.to_string())
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn call(
        &self,
        service: Service,
        operation: Operation,
        params: serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        let endpoint = self.endpoint(service);
        let url = endpoint.url(&operation);

        tracing::debug!("{service} {operation} -> POST {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", endpoint.credentials.authorization_header())
            .header("accept", "application/json")
            .json(&params)
            .send()
            .await
            .map_err(|err| self.map_transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());

            return Err(ApiError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.map_transport_error(err))?;

        // 204 and friends come back without a body
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))?
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}
