//! Which downstream actions an event fires, and the request each one sends.

use crate::{
    models::{
        event::{CallFields, ContactFields, Event, EventDetails},
        forwarding::ActionName,
    },
    services::{Operation, Service},
};
use derive_more::Display;
use serde_json::json;

/// Classification of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CallOutcome {
    #[display("answered")]
    Answered,
    #[display("missed")]
    Missed,
}

impl CallOutcome {
    /// Answered when the caller talked for more than zero seconds.
    pub fn classify(call: &CallFields) -> Self {
        match call.talking_time {
            Some(talking_time) if talking_time > 0 => CallOutcome::Answered,
            _ => CallOutcome::Missed,
        }
    }

    /// Actions fired for this outcome, in dispatch order.
    pub fn actions(&self) -> &'static [ActionName] {
        match self {
            CallOutcome::Answered => &[ActionName::Note],
            CallOutcome::Missed => &[ActionName::Note, ActionName::CampaignTrigger],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub service: Service,
    pub operation: Operation,
    pub params: serde_json::Value,
}

/// One selected action. `request` is `Err` when the event lacks what the
/// action needs; such an action resolves as failed without touching the
/// dedup store.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub name: ActionName,
    pub request: Result<ApiRequest, String>,
}

pub fn plan_actions(event: &Event, missed_call_campaign_id: &str) -> Vec<PlannedAction> {
    match &event.details {
        EventDetails::CallEnded(call) => {
            let outcome = CallOutcome::classify(call);
            outcome
                .actions()
                .iter()
                .map(|name| PlannedAction {
                    name: *name,
                    request: match name {
                        ActionName::CampaignTrigger => {
                            campaign_request(event, call, missed_call_campaign_id)
                        }
                        _ => note_request(call, outcome),
                    },
                })
                .collect()
        }
        EventDetails::ContactCreated(contact) => vec![PlannedAction {
            name: ActionName::ContactSync,
            request: contact_request(contact),
        }],
        EventDetails::CallStarted(_) | EventDetails::CallAnswered(_) => Vec::new(),
    }
}

fn note_request(call: &CallFields, outcome: CallOutcome) -> Result<ApiRequest, String> {
    // a synthesized id does not exist on the call-center side
    let call_id = call
        .call_id
        .clone()
        .ok_or("note needs the provider call id, none was delivered")?;

    let waiting_time = call.waiting_time.unwrap_or_default();
    let content = match outcome {
        CallOutcome::Answered => {
            let talking_time = call.talking_time.unwrap_or_default();
            match &call.agent {
                Some(agent) => format!(
                    "Answered call: {agent} talked {talking_time}s after a {waiting_time}s wait."
                ),
                None => format!("Answered call: talked {talking_time}s after a {waiting_time}s wait."),
            }
        }
        CallOutcome::Missed => match &call.phone_number {
            Some(phone_number) => {
                format!("Missed call from {phone_number}: caller waited {waiting_time}s.")
            }
            None => format!("Missed call: caller waited {waiting_time}s."),
        },
    };

    Ok(ApiRequest {
        service: Service::CallCenter,
        operation: Operation::CreateCallComment { call_id },
        params: json!({ "content": content }),
    })
}

fn campaign_request(
    event: &Event,
    call: &CallFields,
    campaign_id: &str,
) -> Result<ApiRequest, String> {
    let phone_number = call
        .phone_number
        .clone()
        .ok_or("campaign-trigger needs the caller phone number, none was delivered")?;

    Ok(ApiRequest {
        service: Service::Crm,
        operation: Operation::TriggerCampaign {
            campaign_id: campaign_id.to_string(),
        },
        params: json!({
            "phone_number": phone_number,
            "call_reference": event.event_id,
            "waiting_time": call.waiting_time.unwrap_or_default(),
            "occurred_at": event.received_at.to_rfc3339(),
        }),
    })
}

fn contact_request(contact: &ContactFields) -> Result<ApiRequest, String> {
    if contact.email.is_none() && contact.phone_number.is_none() {
        return Err("contact-sync needs an email or a phone number".to_string());
    }

    Ok(ApiRequest {
        service: Service::Crm,
        operation: Operation::UpsertContact,
        params: json!({
            "external_id": contact.contact_id,
            "email": contact.email,
            "phone_number": contact.phone_number,
            "first_name": contact.first_name,
            "last_name": contact.last_name,
        }),
    })
}
