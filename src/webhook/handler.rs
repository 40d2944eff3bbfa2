//! # Webhook Handler
//!
//! Runs one delivery through the whole pipeline:
//! signature → event type → receiver → dispatcher → summary.

use super::{AppState, errors::WebhookError, security};
use crate::{
    metric,
    models::{event::EventType, forwarding::WebhookSummary},
};
use chrono::{DateTime, Utc};

/// Processes one delivery of `event_type`.
///
/// Returns an error only when no event can be built. Once an event exists the
/// caller always gets a summary, whatever happened downstream.
pub async fn process_delivery(
    app_state: &AppState,
    event_type: &str,
    signature_header: Option<&str>,
    body: &[u8],
    received_at: DateTime<Utc>,
) -> Result<WebhookSummary, WebhookError> {
    let result = build_summary(app_state, event_type, signature_header, body, received_at).await;

    if let Err(err) = &result {
        logfire::warn!(
            "rejected {event_type} delivery: {error}",
            event_type = event_type.to_string(),
            error = err.to_string()
        );
        metric::incr_webhook_rejected_statds(err.reason());
    }

    result
}

async fn build_summary(
    app_state: &AppState,
    event_type: &str,
    signature_header: Option<&str>,
    body: &[u8],
    received_at: DateTime<Utc>,
) -> Result<WebhookSummary, WebhookError> {
    if let Some(secret) = &app_state.signing_secret {
        security::verify_signature(signature_header, body, secret)
            .map_err(WebhookError::InvalidSignature)?;
    }

    let event_type = event_type
        .parse::<EventType>()
        .map_err(WebhookError::UnsupportedEventType)?;

    let normalized = app_state
        .receiver
        .normalize(event_type, body, received_at)
        .map_err(WebhookError::MalformedPayload)?;
    metric::incr_webhook_received_statds(&event_type.to_string());

    if !normalized.event.has_natural_id() {
        logfire::warn!(
            "synthesized id {event_id} from {field_count} payload fields",
            event_id = normalized.event.event_id.clone(),
            field_count = normalized.event.payload.len() as i64
        );
    }

    let actions = app_state.dispatcher.dispatch(&normalized.event).await;

    logfire::info!(
        "{event_type} {event_id} handled with {count} actions",
        event_type = event_type.to_string(),
        event_id = normalized.event.event_id.clone(),
        count = actions.len() as i64
    );

    Ok(WebhookSummary {
        event_id: normalized.event.event_id,
        validation_warnings: normalized.warnings,
        actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dedup::memory::MemoryDedupStore,
        dispatch::Dispatcher,
        models::forwarding::{ActionName, ActionStatus},
        services::{ApiError, ApiResponse, MockApiClient, Service},
        webhook::{receiver::WebhookReceiver, security::sign},
    };
    use mockall::predicate::*;
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    fn app_state(client: MockApiClient, signing_secret: Option<&str>) -> AppState {
        AppState {
            receiver: WebhookReceiver::new(Duration::from_secs(60)),
            dispatcher: Dispatcher::new(
                Arc::new(MemoryDedupStore::new(Duration::from_secs(600)).unwrap()),
                Arc::new(client),
                Duration::from_secs(5),
                "missed-calls".into(),
            ),
            signing_secret: signing_secret.map(str::to_string),
        }
    }

    fn accepting_client(times: usize) -> MockApiClient {
        let mut client = MockApiClient::new();
        client.expect_call().times(times).returning(|_, _, _| {
            Ok(ApiResponse {
                status: 201,
                body: json!({ "id": 1 }),
            })
        });
        client
    }

    fn names_and_statuses(summary: &WebhookSummary) -> Vec<(ActionName, ActionStatus)> {
        summary.actions.iter().map(|a| (a.name, a.status)).collect()
    }

    const MISSED_CALL: &[u8] =
        br#"{"talking_time": 0, "waiting_time": 15, "call_id": "X", "phone_number": "+15550100"}"#;

    #[ntex::test]
    async fn test_missed_call_reports_note_and_campaign() {
        let state = app_state(accepting_client(2), None);

        let summary = process_delivery(&state, "call-ended", None, MISSED_CALL, Utc::now())
            .await
            .unwrap();

        assert_eq!(summary.event_id, "X");
        assert!(summary.validation_warnings.is_empty());
        assert_eq!(
            names_and_statuses(&summary),
            vec![
                (ActionName::Note, ActionStatus::Success),
                (ActionName::CampaignTrigger, ActionStatus::Success),
            ]
        );
    }

    #[ntex::test]
    async fn test_same_payload_twice_reports_skipped_duplicate() {
        let state = app_state(accepting_client(2), None);

        process_delivery(&state, "call-ended", None, MISSED_CALL, Utc::now())
            .await
            .unwrap();
        let second = process_delivery(&state, "call-ended", None, MISSED_CALL, Utc::now())
            .await
            .unwrap();

        assert_eq!(second.event_id, "X");
        assert_eq!(
            names_and_statuses(&second),
            vec![
                (ActionName::Note, ActionStatus::SkippedDuplicate),
                (ActionName::CampaignTrigger, ActionStatus::SkippedDuplicate),
            ]
        );
    }

    #[ntex::test]
    async fn test_missing_call_id_still_produces_summary() {
        // only the campaign can be delivered without a provider call id
        let state = app_state(accepting_client(1), None);

        let summary = process_delivery(
            &state,
            "call-ended",
            None,
            br#"{"talking_time": 0, "waiting_time": 15, "phone_number": "+15550100"}"#,
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(summary.event_id.starts_with("syn-"));
        assert!(summary
            .validation_warnings
            .iter()
            .any(|warning| warning.contains("call_id")));
        assert_eq!(
            names_and_statuses(&summary),
            vec![
                (ActionName::Note, ActionStatus::Failed),
                (ActionName::CampaignTrigger, ActionStatus::Success),
            ]
        );
    }

    #[ntex::test]
    async fn test_downstream_failure_is_reported_not_raised() {
        let mut client = MockApiClient::new();
        client
            .expect_call()
            .with(eq(Service::CallCenter), always(), always())
            .returning(|_, _, _| Err(ApiError::Transport("connection reset".into())));
        client
            .expect_call()
            .with(eq(Service::Crm), always(), always())
            .returning(|service, _, _| {
                Err(ApiError::Status {
                    service,
                    status: 503,
                    body: "maintenance".into(),
                })
            });
        let state = app_state(client, None);

        let summary = process_delivery(&state, "call-ended", None, MISSED_CALL, Utc::now())
            .await
            .unwrap();

        assert_eq!(
            names_and_statuses(&summary),
            vec![
                (ActionName::Note, ActionStatus::Failed),
                (ActionName::CampaignTrigger, ActionStatus::Failed),
            ]
        );
    }

    #[ntex::test]
    async fn test_call_started_is_acknowledged_without_actions() {
        let state = app_state(accepting_client(0), None);

        let summary = process_delivery(
            &state,
            "call-started",
            None,
            br#"{"call_id": "X"}"#,
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(summary.actions.is_empty());
    }

    #[ntex::test]
    async fn test_rejections() {
        let state = app_state(accepting_client(0), None);

        assert!(matches!(
            process_delivery(&state, "call-parked", None, MISSED_CALL, Utc::now()).await,
            Err(WebhookError::UnsupportedEventType(event_type)) if event_type == "call-parked"
        ));
        assert!(matches!(
            process_delivery(&state, "call-ended", None, b"not json", Utc::now()).await,
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[ntex::test]
    async fn test_signature_is_enforced_when_configured() {
        let state = app_state(accepting_client(2), Some("s3cret"));

        assert!(matches!(
            process_delivery(&state, "call-ended", None, MISSED_CALL, Utc::now()).await,
            Err(WebhookError::InvalidSignature(_))
        ));

        let forged = sign(MISSED_CALL, "guess");
        assert!(matches!(
            process_delivery(&state, "call-ended", Some(&forged), MISSED_CALL, Utc::now()).await,
            Err(WebhookError::InvalidSignature(_))
        ));

        let signature = sign(MISSED_CALL, "s3cret");
        let summary =
            process_delivery(&state, "call-ended", Some(&signature), MISSED_CALL, Utc::now())
                .await
                .unwrap();
        assert_eq!(summary.actions.len(), 2);
    }
}
