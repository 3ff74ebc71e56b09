//! # bookings: room availability search and double-booking-safe reservations
//!
//! `bookings` is the backend of a small bed and breakfast site. Guests browse rooms, search a
//! date range for free rooms, enter their details and receive a confirmation mail. The part that
//! matters is the consistency engine underneath: no two reservations for the same room ever
//! cover the same night, however many guests confirm at once.
//!
//! ## Overview
//!
//! A stay is a half-open range of calendar dates `[start, end)`: the departure day is free for
//! the next guest. Every reservation writes a *room restriction* for its stay, and owner blocks
//! are restrictions without a reservation. A room is free for a stay when none of its
//! restrictions overlap it.
//!
//! ### Request Flow
//!
//! A booking spans several requests. The guest's progress is a typed
//! [`BookingState`](booking::workflow::BookingState) kept in a server-side session:
//!
//! 1. `POST /search-availability` lists free rooms and remembers the stay.
//! 2. `GET /choose-room/{id}` (or `GET /book-room` from a room page) picks the room.
//! 3. `POST /make-reservation` validates the guest details and commits. The commit re-checks
//!    the room inside its write unit, so a room taken since the search sends the guest back to
//!    search instead of double-booking it.
//! 4. `GET /reservation-summary` shows the confirmation once.
//!
//! Confirmation mail goes through a bounded queue drained by a background worker, so a slow or
//! failing mail server never holds up a request.
//!
//! ### Core Components
//!
//! The **store layer** ([`store`]) is the only code that touches storage. [`IntervalStore`] has
//! a PostgreSQL adapter built on the repositories in [`db`] and an in-memory adapter for tests
//! and local development.
//!
//! The **booking core** ([`booking`]) holds the availability checker, the reservation
//! committer and the workflow state machine. It is constructed once at startup around one shared
//! store handle and reaches handlers through [`AppState`].
//!
//! The **API layer** ([`api`]) maps routes onto the workflow and renders JSON views.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use bookings::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = bookings::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     bookings::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! With `database.type: postgres` migrations run on startup and the room catalogue is seeded
//! from `seed_rooms` when it is empty. The schema needs the `btree_gist` extension for the
//! exclusion constraint that backs the no-overlap rule.
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! bookings::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod booking;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod forms;
pub mod mail_queue;
mod openapi;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod test;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::PgPool;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers::{availability, pages, reservations, rooms},
    booking::{AvailabilityChecker, BookingWorkflow, ReservationCommitter},
    config::DatabaseConfig,
    db::handlers::Rooms,
    email::{EmailService, MailSender},
    mail_queue::{MailQueue, spawn_mail_worker},
    openapi::ApiDoc,
    session::{MemorySessionStore, SessionStore, session_middleware},
    store::{InMemoryStore, PostgresStore},
};

pub use config::Config;
pub use store::IntervalStore;
pub use types::{ReservationId, RestrictionId, RoomId};

/// Shared state handed to every handler.
///
/// - `config`: the loaded configuration
/// - `store`: the one interval store handle for the process
/// - `workflow`: the booking core, built around `store`
/// - `sessions`: server-side session data keyed by the session cookie
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .workflow(workflow)
///     .sessions(sessions)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn IntervalStore>,
    pub workflow: BookingWorkflow,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    /// Wire the booking core around `store`. Confirmation mail is handed to `mail`.
    pub fn assemble(config: Config, store: Arc<dyn IntervalStore>, mail: MailQueue) -> Self {
        let workflow = BookingWorkflow::new(
            AvailabilityChecker::new(Arc::clone(&store)),
            ReservationCommitter::new(Arc::clone(&store)),
            mail,
            config.email.clone(),
        );
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::from_config(&config.session));

        AppState::builder()
            .config(config)
            .store(store)
            .workflow(workflow)
            .sessions(sessions)
            .build()
    }
}

/// Get the bookings database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Insert the configured rooms when the catalogue is empty. An existing catalogue is never
/// touched, so rooms renamed or added by hand survive restarts.
#[instrument(skip_all)]
pub async fn seed_database(room_names: &[String], db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;

    // Serialise concurrent starts so only one of them seeds
    sqlx::query("LOCK TABLE rooms IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let mut repo = Rooms::new(&mut tx);
    let existing = repo.count().await?;
    if existing > 0 {
        debug!(existing, "Room catalogue already present, skipping seed");
        tx.commit().await?;
        return Ok(());
    }

    for name in room_names {
        let room = repo.create(name).await?;
        info!(room_id = room.id, room_name = %room.room_name, "Seeded room");
    }

    tx.commit().await?;
    Ok(())
}

/// Build the configured store. For PostgreSQL this connects, migrates and seeds.
#[instrument(skip_all)]
pub async fn setup_store(config: &Config) -> anyhow::Result<Arc<dyn IntervalStore>> {
    match &config.database {
        DatabaseConfig::Postgres {
            url,
            pool,
            operation_timeout,
        } => {
            let store = PostgresStore::connect(url, pool, *operation_timeout).await?;
            migrator()
                .run(store.pool())
                .await
                .context("failed to run database migrations")?;
            seed_database(&config.seed_rooms, store.pool()).await?;
            info!("Using PostgreSQL interval store");
            Ok(Arc::new(store))
        }
        DatabaseConfig::Memory { operation_timeout } => {
            info!("Using in-memory interval store; reservations are lost on restart");
            Ok(Arc::new(InMemoryStore::with_rooms(*operation_timeout, &config.seed_rooms)))
        }
    }
}

/// Build the router with all routes and middleware.
///
/// Page routes sit behind [`session_middleware`]; `/healthz`, the OpenAPI document and the
/// optional Prometheus endpoint do not start sessions.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let pages = Router::new()
        .route("/", get(pages::home))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{id}", get(rooms::get_room))
        .route(
            "/search-availability",
            get(availability::search_page).post(availability::search_availability),
        )
        .route("/search-availability-json", post(availability::availability_json))
        .route("/choose-room/{id}", get(reservations::choose_room))
        .route("/book-room", get(reservations::book_room))
        .route(
            "/make-reservation",
            get(reservations::reservation_form).post(reservations::submit_reservation),
        )
        .route("/reservation-summary", get(reservations::reservation_summary))
        .layer(from_fn_with_state(state.clone(), session_middleware));

    let mut router = pages
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Tasks that run alongside the HTTP server: currently the mail worker.
///
/// Dropping this without calling [`shutdown`](BackgroundServices::shutdown) still cancels the
/// token through `drop_guard`, so the worker drains and exits.
pub struct BackgroundServices {
    background_tasks: Vec<JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    fn start(config: &Config) -> anyhow::Result<(Self, MailQueue)> {
        let shutdown_token = CancellationToken::new();
        let (mail, receiver) = MailQueue::new(&config.mail);
        let mailer: Arc<dyn MailSender> = Arc::new(EmailService::new(&config.email)?);
        let mail_worker = spawn_mail_worker(receiver, mailer, shutdown_token.clone());

        Ok((
            Self {
                background_tasks: vec![mail_worker],
                drop_guard: Some(shutdown_token.clone().drop_guard()),
                shutdown_token,
            },
            mail,
        ))
    }

    /// Stop all background tasks and wait for them, letting the mail worker drain its queue
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();
        if let Some(guard) = self.drop_guard.take() {
            guard.disarm();
        }

        for handle in self.background_tasks {
            if let Err(e) = handle.await {
                tracing::error!("Background task failed during shutdown: {}", e);
            }
        }
    }
}

/// The assembled service.
///
/// 1. **Create**: [`Application::new`] builds the store (migrating and seeding PostgreSQL),
///    starts the mail worker and builds the router
/// 2. **Serve**: [`Application::serve`] binds the listener and handles requests
/// 3. **Shutdown**: once the shutdown future resolves, in-flight requests finish, the mail queue
///    drains and the store closes
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting bookings with configuration: {:#?}", config);

        let store = setup_store(&config).await?;
        Self::with_store(config, store)
    }

    /// Assemble around an existing store
    pub fn with_store(config: Config, store: Arc<dyn IntervalStore>) -> anyhow::Result<Self> {
        let (bg_services, mail) = BackgroundServices::start(&config)?;
        let app_state = AppState::assemble(config.clone(), store, mail);
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
            bg_services,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Bookings listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Draining mail queue...");
        self.bg_services.shutdown().await;

        info!("Closing store...");
        self.app_state.store.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
