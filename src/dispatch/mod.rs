//! # Forwarding Dispatcher
//!
//! Fans a normalized event out to its downstream actions.
//!
//! Every action is checked against the dedup store under its own action key
//! before its request is sent. A key that is already live means some other
//! delivery (or code path) fired that side effect, so the action is reported
//! as `skipped-duplicate` and never retried.
//!
//! Failures stay inside the action that produced them: the dispatcher always
//! returns one [`ForwardingResult`] per selected action.

pub mod plan;

use crate::{
    dedup::{DedupKey, ImplDedupStore},
    metric,
    models::{
        event::{Event, EventDetails},
        forwarding::{ActionStatus, ForwardingResult},
    },
    services::{ApiError, ImplApiClient},
};
use derive_more::Display;
use plan::{CallOutcome, PlannedAction};
use std::time::Duration;

/// Steps a `call-ended` event goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CallEndedPhase {
    #[display("received")]
    Received,
    #[display("classified ({_0})")]
    Classified(CallOutcome),
    #[display("dispatched ({_0} actions)")]
    Dispatched(usize),
    #[display("complete")]
    Complete,
}

#[derive(Clone)]
pub struct Dispatcher {
    dedup_store: ImplDedupStore,
    api_client: ImplApiClient,
    /// Upper bound for each outbound call
    action_timeout: Duration,
    missed_call_campaign_id: String,
}

impl Dispatcher {
    pub fn new(
        dedup_store: ImplDedupStore,
        api_client: ImplApiClient,
        action_timeout: Duration,
        missed_call_campaign_id: String,
    ) -> Self {
        Self {
            dedup_store,
            api_client,
            action_timeout,
            missed_call_campaign_id,
        }
    }

    /// Runs every action selected for `event` and returns their results in plan order.
    pub async fn dispatch(&self, event: &Event) -> Vec<ForwardingResult> {
        self.dispatch_traced(event).await.0
    }

    /// Same as [`Dispatcher::dispatch`], also returning the phases a
    /// `call-ended` event went through.
    pub async fn dispatch_traced(
        &self,
        event: &Event,
    ) -> (Vec<ForwardingResult>, Vec<CallEndedPhase>) {
        let _span = logfire::span!(
            "dispatch {event_type} {event_id}",
            event_type = event.event_type.to_string(),
            event_id = event.event_id.clone()
        )
        .entered();

        let mut phases = Vec::new();
        let mut advance = |phase: CallEndedPhase| {
            logfire::info!(
                "{event_id}: {phase}",
                event_id = event.event_id.clone(),
                phase = phase.to_string()
            );
            phases.push(phase);
        };

        let is_call_ended = matches!(event.details, EventDetails::CallEnded(_));
        if let EventDetails::CallEnded(call) = &event.details {
            advance(CallEndedPhase::Received);
            advance(CallEndedPhase::Classified(CallOutcome::classify(call)));
        }

        let planned = plan::plan_actions(event, &self.missed_call_campaign_id);
        if is_call_ended {
            advance(CallEndedPhase::Dispatched(planned.len()));
        }

        let event_key = event.dedup_key();
        let results = futures::future::join_all(
            planned
                .into_iter()
                .map(|action| self.run_action(&event_key, action)),
        )
        .await;

        if is_call_ended {
            advance(CallEndedPhase::Complete);
        }

        (results, phases)
    }

    async fn run_action(&self, event_key: &DedupKey, action: PlannedAction) -> ForwardingResult {
        let name = action.name;

        let result = match action.request {
            Err(detail) => ForwardingResult::failed(name, detail),
            Ok(request) => {
                let action_key = event_key.for_action(name);
                match self.dedup_store.check_and_mark(&action_key).await {
                    Err(err) => {
                        logfire::error!(
                            "dedup store failed for {key}: {error}",
                            key = action_key.to_string(),
                            error = err.to_string()
                        );
                        ForwardingResult::failed(name, format!("dedup store unavailable: {err}"))
                    }
                    Ok(outcome) if !outcome.is_new => ForwardingResult::skipped_duplicate(name),
                    Ok(_) => {
                        let call = self.api_client.call(
                            request.service,
                            request.operation,
                            request.params,
                        );
                        match tokio::time::timeout(self.action_timeout, call).await {
                            Ok(Ok(response)) => ForwardingResult::success(name, response.reference()),
                            Ok(Err(err)) => ForwardingResult::failed(name, err.to_string()),
                            Err(_) => ForwardingResult::failed(
                                name,
                                ApiError::Timeout(self.action_timeout).to_string(),
                            ),
                        }
                    }
                }
            }
        };

        if result.status == ActionStatus::Failed {
            logfire::warn!(
                "{action} failed for {key}: {detail}",
                action = name.to_string(),
                key = event_key.to_string(),
                detail = result.detail.clone().unwrap_or_default()
            );
        }
        metric::incr_action_status_statds(&name.to_string(), &result.status.to_string());

        result
    }
}
