//! Clients for the two external REST services events are forwarded to.
//!
//! The dispatcher only sees the [`ApiClient`] trait. It must not assume the
//! client retries: a failed call is reported once and left alone.

pub mod client;

use async_trait::async_trait;
use derive_more::{Display, Error};
use std::{sync::Arc, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Service {
    /// Call-center platform, Basic auth
    #[display("call-center")]
    CallCenter,
    /// CRM / marketing platform, Bearer auth
    #[display("crm")]
    Crm,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Operation {
    #[display("create-call-comment")]
    CreateCallComment { call_id: String },
    #[display("trigger-campaign")]
    TriggerCampaign { campaign_id: String },
    #[display("upsert-contact")]
    UpsertContact,
}

impl Operation {
    /// Path relative to the service base url.
    pub fn path(&self) -> String {
        match self {
            Operation::CreateCallComment { call_id } => format!("/v1/calls/{call_id}/comments"),
            Operation::TriggerCampaign { campaign_id } => {
                format!("/v1/campaigns/{campaign_id}/triggers")
            }
            Operation::UpsertContact => "/v1/contacts".to_string(),
        }
    }
}

/// Decoded body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Id of the resource the call created, if the body exposes one.
    ///
    /// Accepts `{"id": ..}`, `{"data": {"id": ..}}` and `{"<resource>": {"id": ..}}`.
    pub fn reference(&self) -> Option<String> {
        fn id_of(value: &serde_json::Value) -> Option<String> {
            match value.get("id")? {
                serde_json::Value::String(id) => Some(id.clone()),
                serde_json::Value::Number(id) => Some(id.to_string()),
                _ => None,
            }
        }

        id_of(&self.body)
            .or_else(|| self.body.get("data").and_then(id_of))
            .or_else(|| {
                self.body
                    .as_object()?
                    .values()
                    .filter(|value| value.is_object())
                    .find_map(id_of)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ApiError {
    #[display("request timed out after {}s", _0.as_secs_f32())]
    Timeout(#[error(not(source))] Duration),
    #[display("transport error: {_0}")]
    Transport(#[error(not(source))] String),
    #[display("{service} returned status {status}: {body}")]
    Status {
        service: Service,
        status: u16,
        body: String,
    },
    #[display("failed to decode response: {_0}")]
    Decode(#[error(not(source))] String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Issues one authenticated request; `params` is the JSON body.
    async fn call(
        &self,
        service: Service,
        operation: Operation,
        params: serde_json::Value,
    ) -> Result<ApiResponse, ApiError>;
}

pub type ImplApiClient = Arc<dyn ApiClient>;
