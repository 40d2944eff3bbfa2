use super::{AppState, handler};
use crate::consts;
use chrono::Utc;
use ntex::{util::Bytes, web};

/// Registers the webhook and health endpoints.
///
/// # Routes
/// - `POST /webhooks/{event_type}` - delivery receiver
/// - `GET /health` - liveness probe
pub fn webhooks(cfg: &mut web::ServiceConfig) {
    cfg.service((receive, health));
}

/// Webhook receiver endpoint (POST)
///
/// # Returns
/// - 200 with the delivery summary, also under partial downstream failure
/// - 400 if the body is not a JSON object
/// - 401 if a signing secret is configured and the signature is wrong
/// - 404 if the event type is unknown
#[web::post("/webhooks/{event_type}")]
pub async fn receive(
    req: web::HttpRequest,
    path: web::types::Path<String>,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let received_at = Utc::now();
    let signature_header = req
        .headers()
        .get(consts::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let summary = handler::process_delivery(
        &app_state,
        path.as_str(),
        signature_header,
        &body,
        received_at,
    )
    .await?;

    Ok(web::HttpResponse::Ok().json(&summary))
}

#[web::get("/health")]
pub async fn health() -> impl web::Responder {
    web::HttpResponse::Ok().json(&serde_json::json!({
        "status": "ok"
    }))
}
