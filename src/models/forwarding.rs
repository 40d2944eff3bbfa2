use derive_more::Display;
use serde::{Deserialize, Serialize};

/// One discrete downstream side effect an event can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ActionName {
    /// Comment on the call in the call-center platform
    #[display("note")]
    Note,
    /// Missed-call campaign in the CRM
    #[display("campaign-trigger")]
    CampaignTrigger,
    /// Contact upsert in the CRM
    #[display("contact-sync")]
    ContactSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    #[display("success")]
    Success,
    #[display("failed")]
    Failed,
    #[display("skipped-duplicate")]
    SkippedDuplicate,
}

/// Outcome of one action, owned by the dispatch call that produced it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ForwardingResult {
    pub name: ActionName,
    pub status: ActionStatus,
    /// Downstream reference on success, error text on failure
    pub detail: Option<String>,
}

impl ForwardingResult {
    pub fn success(name: ActionName, reference: Option<String>) -> Self {
        Self {
            name,
            status: ActionStatus::Success,
            detail: reference,
        }
    }

    pub fn failed(name: ActionName, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: ActionStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped_duplicate(name: ActionName) -> Self {
        Self {
            name,
            status: ActionStatus::SkippedDuplicate,
            detail: Some("already delivered within the deduplication window".into()),
        }
    }
}

/// Body returned to the webhook caller, including under partial failure.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSummary {
    pub event_id: String,
    pub validation_warnings: Vec<String>,
    pub actions: Vec<ForwardingResult>,
}
