//! # Call Relay
//!
//! Receives call-center webhooks, normalizes them and forwards each derived
//! side effect (call notes, campaign triggers, contact syncs) exactly once per
//! deduplication window to the call-center and CRM REST APIs.

#![recursion_limit = "256"]

pub mod config;
pub mod consts;
pub mod dedup;
pub mod dispatch;
pub mod metric;
pub mod models;
pub mod services;
pub mod utils;
pub mod webhook;

use anyhow::Context;
use logfire::config::{MetricsOptions, SendToLogfire};
use ntex::web;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use std::sync::Arc;

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    config::init_config()?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    // Initialize logging and metrics, only shipped when a token is configured
    let mut logfire_config = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(SendToLogfire::IfTokenPresent);
    if let Some(token) = &app_config.logfire_token {
        logfire_config = logfire_config.with_token(token);
    }
    let shutdown_handler = logfire_config.finish()?;

    // One dedup store shared by every worker
    let dedup_store = utils::build_dedup_store(app_config).await?;
    ntex::rt::spawn(utils::sweep_expired_keys(
        dedup_store.clone(),
        app_config.dedup_sweep_interval(),
    ));

    let api_client = services::client::HttpApiClient::from_config(app_config)?;

    let app_state = webhook::AppState {
        receiver: webhook::receiver::WebhookReceiver::new(app_config.synthetic_id_bucket()),
        dispatcher: dispatch::Dispatcher::new(
            dedup_store,
            Arc::new(api_client),
            app_config.outbound_timeout(),
            app_config.crm_missed_call_campaign_id.clone(),
        ),
        signing_secret: app_config.webhook_signing_secret.clone(),
    };

    if app_state.signing_secret.is_none() {
        logfire::warn!("WEBHOOK_SIGNING_SECRET is not set, deliveries are not authenticated");
    }

    configure_and_run_server(app_config, app_state).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Configures SSL acceptor for production environments
fn setup_ssl_acceptor(app_config: &config::AppConfig) -> anyhow::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut ssl_acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls_server())
        .map_err(|e| anyhow::anyhow!("Failed to create SSL acceptor: {}", e))?;

    ssl_acceptor
        .set_private_key_file(&app_config.private_key_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load private key from {}: {}",
                app_config.private_key_path,
                e
            )
        })?;

    ssl_acceptor
        .set_certificate_file(&app_config.certificate_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load certificate from {}: {}",
                app_config.certificate_path,
                e
            )
        })?;

    Ok(ssl_acceptor)
}

/// Configures and starts the web server with appropriate SSL settings
async fn configure_and_run_server(
    app_config: &config::AppConfig,
    app_state: webhook::AppState,
) -> anyhow::Result<()> {
    let server_addr = (app_config.server_host.as_str(), app_config.server_port);

    let server = web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(app_state.clone())
            .configure(webhook::routes::webhooks)
            .default_service(web::route().to(|| async {
                web::HttpResponse::NotFound().json(&serde_json::json!({
                    "error": "not found"
                }))
            }))
    });

    let bound_server = if app_config.is_prod() {
        let ssl_acceptor = setup_ssl_acceptor(app_config)?;
        server.bind_openssl(server_addr, ssl_acceptor)?
    } else {
        server.bind(server_addr)?
    };

    bound_server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
