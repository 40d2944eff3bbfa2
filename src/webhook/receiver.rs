//! # Webhook Receiver
//!
//! Turns a raw delivery body into a normalized [`Event`].
//!
//! Providers drop fields freely, so only a body that is not a JSON object is
//! rejected. Every other gap becomes a validation warning, and a missing
//! natural identifier is replaced with a synthesized one that stays stable for
//! redeliveries of the same content within one arrival bucket.

use crate::{
    consts,
    models::event::{CallFields, ContactFields, Event, EventDetails, EventType, IdSource},
};
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// The body cannot be turned into an event at all.
#[derive(Debug, Display, Error, PartialEq)]
pub enum MalformedPayload {
    #[display("body is not valid JSON: {_0}")]
    InvalidJson(#[error(not(source))] String),
    #[display("body must be a JSON object, got {_0}")]
    NotAnObject(#[error(not(source))] &'static str),
}

/// A normalized event and the non-fatal problems found while building it.
#[derive(Debug)]
pub struct Normalized {
    pub event: Event,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct WebhookReceiver {
    /// Width of the arrival bucket mixed into synthesized ids
    bucket: Duration,
}

impl WebhookReceiver {
    pub fn new(bucket: Duration) -> Self {
        Self {
            bucket: bucket.max(Duration::from_secs(1)),
        }
    }

    pub fn normalize(
        &self,
        event_type: EventType,
        body: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Normalized, MalformedPayload> {
        let root: Value = serde_json::from_slice(body)
            .map_err(|err| MalformedPayload::InvalidJson(err.to_string()))?;

        let fields = match root {
            Value::Object(mut object) => match object.remove(consts::ENVELOPE_DATA_FIELD) {
                Some(Value::Object(data)) => data,
                Some(other) => {
                    object.insert(consts::ENVELOPE_DATA_FIELD.to_string(), other);
                    object
                }
                None => object,
            },
            other => return Err(MalformedPayload::NotAnObject(json_kind(&other))),
        };

        let mut reader = FieldReader {
            fields: &fields,
            warnings: Vec::new(),
        };

        let details = match event_type {
            EventType::CallStarted => EventDetails::CallStarted(reader.call_fields()),
            EventType::CallAnswered => EventDetails::CallAnswered(reader.call_fields()),
            EventType::CallEnded => {
                let call = reader.call_fields();
                // an invalid value already produced its own warning
                if call.talking_time.is_none() && !reader.has(consts::FIELD_TALKING_TIME) {
                    reader.missing(consts::FIELD_TALKING_TIME, "call classified as missed");
                }
                if call.phone_number.is_none() {
                    reader.missing(
                        consts::FIELD_PHONE_NUMBER,
                        "campaign-trigger cannot reach the caller",
                    );
                }
                EventDetails::CallEnded(call)
            }
            EventType::ContactCreated => {
                let contact = reader.contact_fields();
                if contact.email.is_none() && contact.phone_number.is_none() {
                    reader.warnings.push(format!(
                        "missing fields `{}` and `{}`; contact-sync has nothing to match on",
                        consts::FIELD_EMAIL,
                        consts::FIELD_PHONE_NUMBER
                    ));
                }
                EventDetails::ContactCreated(contact)
            }
        };

        let natural_id_field = event_type.natural_id_field();
        let (event_id, id_source) = match reader.text(natural_id_field) {
            Some(natural_id) => (natural_id, IdSource::Natural),
            None => {
                let synthesized = self.synthesize_id(event_type, &fields, received_at);
                reader.missing(
                    natural_id_field,
                    &format!("synthesized event id {synthesized}"),
                );
                (synthesized, IdSource::Synthesized)
            }
        };

        let warnings = reader.warnings;
        for warning in &warnings {
            logfire::warn!(
                "{event_type} {event_id}: {warning}",
                event_type = event_type.to_string(),
                event_id = event_id.clone(),
                warning = warning.clone()
            );
        }

        Ok(Normalized {
            event: Event {
                event_id,
                event_type,
                id_source,
                details,
                payload: fields,
                received_at,
            },
            warnings,
        })
    }

    /// Content hash of the fields plus the arrival bucket.
    ///
    /// Fields are hashed in key order, so equal field sets hash the same
    /// regardless of delivery order.
    fn synthesize_id(
        &self,
        event_type: EventType,
        fields: &Map<String, Value>,
        received_at: DateTime<Utc>,
    ) -> String {
        let bucket_secs = self.bucket.as_secs() as i64;
        let bucket = received_at.timestamp().div_euclid(bucket_secs);

        let mut hasher = Sha256::new();
        hasher.update(event_type.to_string().as_bytes());
        hasher.update(b"\n");
        let mut canonical = String::new();
        write_canonical(&Value::Object(fields.clone()), &mut canonical);
        hasher.update(canonical.as_bytes());
        hasher.update(b"\n");
        hasher.update(bucket.to_string().as_bytes());

        let digest = hex::encode(hasher.finalize());
        format!(
            "{}{}",
            consts::SYNTHETIC_ID_PREFIX,
            &digest[..consts::SYNTHETIC_ID_HEX_LEN]
        )
    }
}

/// Compact JSON with object keys sorted at every depth.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Lenient accessors over the delivered field object, collecting warnings.
struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    warnings: Vec<String>,
}

impl FieldReader<'_> {
    fn missing(&mut self, field: &str, consequence: &str) {
        self.warnings
            .push(format!("missing field `{field}`; {consequence}"));
    }

    /// Present with a non-null value, valid or not.
    fn has(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|value| !value.is_null())
    }

    /// Strings and numbers are both accepted; blank strings count as missing.
    fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Whole seconds from an integer, a float or a numeric string.
    ///
    /// Fractions round up so a positive duration never reads as zero.
    fn seconds(&mut self, field: &str) -> Option<u64> {
        let value = self.fields.get(field)?;
        let parsed = match value {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v.ceil() as u64)),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.ceil() as u64),
            Value::Null => return None,
            _ => None,
        };

        if parsed.is_none() {
            self.warnings
                .push(format!("field `{field}` is not a non-negative number; ignored"));
        }
        parsed
    }

    fn call_fields(&mut self) -> CallFields {
        CallFields {
            call_id: self.text(consts::FIELD_CALL_ID),
            phone_number: self.text(consts::FIELD_PHONE_NUMBER),
            agent: self.text(consts::FIELD_AGENT),
            direction: self.text(consts::FIELD_DIRECTION),
            talking_time: self.seconds(consts::FIELD_TALKING_TIME),
            waiting_time: self.seconds(consts::FIELD_WAITING_TIME),
        }
    }

    fn contact_fields(&mut self) -> ContactFields {
        ContactFields {
            contact_id: self.text(consts::FIELD_CONTACT_ID),
            email: self.text(consts::FIELD_EMAIL),
            phone_number: self.text(consts::FIELD_PHONE_NUMBER),
            first_name: self.text(consts::FIELD_FIRST_NAME),
            last_name: self.text(consts::FIELD_LAST_NAME),
        }
    }
}
