use crate::dedup::DedupKey;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of inbound delivery, taken from the `/webhooks/{event_type}` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    #[display("call-started")]
    CallStarted,
    #[display("call-answered")]
    CallAnswered,
    #[display("call-ended")]
    CallEnded,
    #[display("contact-created")]
    ContactCreated,
}

impl EventType {
    /// Payload field holding the provider's own identifier for this event.
    pub fn natural_id_field(&self) -> &'static str {
        match self {
            EventType::CallStarted | EventType::CallAnswered | EventType::CallEnded => {
                crate::consts::FIELD_CALL_ID
            }
            EventType::ContactCreated => crate::consts::FIELD_CONTACT_ID,
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "call-started" => Ok(EventType::CallStarted),
            "call-answered" => Ok(EventType::CallAnswered),
            "call-ended" => Ok(EventType::CallEnded),
            "contact-created" => Ok(EventType::ContactCreated),
            other => Err(other.to_string()),
        }
    }
}

/// Where the event id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    Natural,
    Synthesized,
}

/// Fields shared by every call lifecycle event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallFields {
    pub call_id: Option<String>,
    pub phone_number: Option<String>,
    pub agent: Option<String>,
    pub direction: Option<String>,
    /// Seconds the caller spent talking to an agent
    pub talking_time: Option<u64>,
    /// Seconds the caller spent waiting before the call was picked up or dropped
    pub waiting_time: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactFields {
    pub contact_id: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Typed view of the payload, one variant per event type.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetails {
    CallStarted(CallFields),
    CallAnswered(CallFields),
    CallEnded(CallFields),
    ContactCreated(ContactFields),
}

/// One normalized inbound webhook delivery. Never mutated after the receiver builds it.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id: String,
    pub event_type: EventType,
    pub id_source: IdSource,
    pub details: EventDetails,
    /// Field object the details were read from, kept as delivered
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::for_event(self.event_type, &self.event_id)
    }

    pub fn has_natural_id(&self) -> bool {
        self.id_source == IdSource::Natural
    }
}
