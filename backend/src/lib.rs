//! Pharmacy Shift Coordination System - Bot Servers
//!
//! Two LINE bot servers built from one library: the store bot relays
//! shift requests from pharmacy locations, the pharmacist bot collects
//! registrations and applications. Both share a Google Sheet as the
//! system of record and Redis for runtime state.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::{BotRole, Config};

use services::line::LineClient;
use services::notification::{PharmacistNotifier, StoreNotifier};
use services::schedule::ShiftRequestService;
use services::session::{self, RequestStore, SessionStore};
use services::sheets::{SheetsClient, SheetsService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub role: BotRole,
    /// LINE client for this process's own channel (replies + signature)
    pub line: LineClient,
    pub sheets: SheetsService,
    pub requests: RequestStore,
    pub sessions: SessionStore,
    pub schedule: ShiftRequestService,
}

impl AppState {
    /// Construct the full service graph for one bot role.
    ///
    /// The process's own channel credential and both notifier credentials
    /// are bound here, once, from the role-keyed config lookup.
    pub async fn initialize(role: BotRole, config: Config) -> anyhow::Result<Self> {
        let line = LineClient::new(role, config.channel(role));

        let sheets = SheetsService::new(SheetsClient::new(
            &config.google_sheets_credentials_file,
            &config.spreadsheet_id,
        ));
        if !sheets.is_configured() {
            tracing::warn!("Google Sheets is not configured; sheet operations will fail");
        }

        tracing::info!("Connecting to Redis...");
        let redis = session::connect(&config.redis_url).await?;
        let requests = RequestStore::new(redis.clone());
        let sessions = SessionStore::new(redis);
        tracing::info!("Redis connection established");

        let pharmacist_notifier = PharmacistNotifier::new(&config);
        let store_notifier = StoreNotifier::new(&config);
        let schedule = ShiftRequestService::new(
            sheets.clone(),
            requests.clone(),
            pharmacist_notifier,
            store_notifier,
        );

        Ok(Self {
            config: Arc::new(config),
            role,
            line,
            sheets,
            requests,
            sessions,
            schedule,
        })
    }
}

/// Create the application router for the state's role
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = match state.role {
        BotRole::Store => routes::store_routes().route("/", get(store_root)),
        BotRole::Pharmacist => routes::pharmacist_routes().route("/", get(pharmacist_root)),
    };

    routes
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn store_root() -> &'static str {
    "Pharmacy Shift Coordination - Store Bot v1.0"
}

async fn pharmacist_root() -> &'static str {
    "Pharmacy Shift Coordination - Pharmacist Bot v1.0"
}
