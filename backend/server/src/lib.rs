//! HTTP boundary of the recipe discovery backend.
//!
//!
//!
//! # Routes
//! - `GET /categories/groups`
//! - `GET /categories/options?type=cuisine`, unknown types answer `[]`
//! - `GET /cook-count?userId=&recipeId=`
//! - `GET /cook-counts?userId=`
//! - `GET /recipes/{id}`, `GET /recipes/random`
//! - `GET /profiles/{id}`, `GET /profiles/me` (reads `x-user-id`)
//! - `GET /search?kw=&cat=&sort=&cursor=`
//! - `GET /users/{id}/favorites`
//! - `POST /cook-logs` with `{"userId": .., "recipeId": ..}`
//! - `GET /prefetch/search?..` returns a cache snapshot for the client to hydrate from
//!
//! Failures always answer `{"error": string}`, see [`error`].
//!
//!
//!
//! # Caching
//! Category groups, options, searches, favorites, recipes and profiles go
//! through one shared [`kitchen::ResultCache`]. Cook counts are recomputed
//! from the logs on every call. Recording a cook marks cached searches and
//! favorite lists stale. Idle entries are swept every `CACHE_SWEEP_SECS`.
//!
//!
//!
//! # Environment
//! - `RUST_PORT` (1111)
//! - `BANK_PATH` (`../bank.bin`), or `BANK_URL` to fetch the bank instead
//! - `CACHE_STALE_SECS` (60), `CACHE_IDLE_SECS` (300), `CACHE_SWEEP_SECS` (60)
//! - `PAGE_SIZE` (20)
//! - `CORS_MAX_AGE_SECS` (3600)
//! - `RUST_LOG` for the log filter
//!
//!
//!
//! # Setup
//!
//! Build the bank from a seed, then start the server.
//! ```sh
//! cargo run -p process -- seed.json --output bank.bin
//! BANK_PATH=bank.bin RUST_LOG=info cargo run -p recipes
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Error};
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal, time::interval};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    category_groups_handler, category_options_handler, cook_count_handler, cook_log_handler, favorites_handler,
    my_profile_handler, prefetch_search_handler, profile_handler, random_recipe_handler, recipe_handler,
    search_handler, user_cook_counts_handler,
};
use state::State;
use utils::USER_HEADER;

pub async fn start_server() -> Result<(), Error> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new(Config::load()?).await?;

    info!("Starting server...");
    spawn_sweeper(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(USER_HEADER)])
        .max_age(Duration::from_secs(state.config.cors_max_age_secs));

    Router::new()
        .route("/categories/groups", get(category_groups_handler))
        .route("/categories/options", get(category_options_handler))
        .route("/cook-count", get(cook_count_handler))
        .route("/cook-counts", get(user_cook_counts_handler))
        .route("/cook-logs", post(cook_log_handler))
        .route("/recipes/random", get(random_recipe_handler))
        .route("/recipes/{id}", get(recipe_handler))
        .route("/profiles/me", get(my_profile_handler))
        .route("/profiles/{id}", get(profile_handler))
        .route("/search", get(search_handler))
        .route("/users/{id}/favorites", get(favorites_handler))
        .route("/prefetch/search", get(prefetch_search_handler))
        .layer(cors)
        .with_state(state)
}

fn spawn_sweeper(state: Arc<State>) {
    tokio::spawn(async move {
        let mut ticks = interval(state.config.sweep_interval());

        loop {
            ticks.tick().await;

            let evicted = state.cache.sweep().await;
            if evicted > 0 {
                debug!("Swept {evicted} idle cache entries");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
