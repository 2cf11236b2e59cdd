//! # Referral Ledger Backend Service
//!
//! Entry point for the `ledger-backend` binary. Wires configuration, the
//! database pool, the services and the background recharge sweeper, then
//! serves the REST and WebSocket APIs.
//!
//! ## Quick Start
//!
//! 1. Set up PostgreSQL and create the database
//! 2. Copy `.env.example` to `.env` and configure
//! 3. Start the server: `cargo run --bin ledger-backend`
//!
//! The schema is applied at startup.
//!
//! ## Environment Variables
//!
//! See `.env.example` for all required configuration.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use referral_ledger_backend::config::AppConfig;
use referral_ledger_backend::db::Database;
use referral_ledger_backend::websocket::{self, WsRegistry};
use referral_ledger_backend::{api, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Load Environment
    // =========================================
    dotenvy::dotenv().ok();

    // =========================================
    // STEP 2: Initialize Logging
    // =========================================
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("🚀 Starting Referral Ledger Backend Service");

    // =========================================
    // STEP 3: Load Configuration
    // =========================================
    let config = AppConfig::from_env().expect("Failed to load configuration");

    info!("📋 Configuration loaded");
    info!("   Business offset: {}", config.business_offset);
    info!("   Minimum withdrawal: {}", config.min_withdrawal_amount);

    // =========================================
    // STEP 4: Initialize Database
    // =========================================
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    info!("🗄️  Database connected");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    info!("📦 Database migrations complete");

    // =========================================
    // STEP 5: Initialize Services
    // =========================================
    let ws_registry = WsRegistry::new();
    let app_state = Arc::new(AppState::new(db, config.clone(), ws_registry));

    info!("🔧 Services initialized");

    // =========================================
    // STEP 6: Start Background Services
    // =========================================
    let sweeper = app_state.recharges.clone();
    tokio::spawn(async move {
        sweeper.start_sweep_loop().await;
    });

    info!("🔁 Recharge sweeper started");

    // =========================================
    // STEP 7: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .configure(api::configure_routes)
            .configure(websocket::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
