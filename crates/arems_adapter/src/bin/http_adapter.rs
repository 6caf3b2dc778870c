#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use arems_adapter::{
    AdapterCommand, AdapterCommandResponse, AdapterError, AdapterHealthResponse, AdapterRuntime,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

const LOCK_POISONED: &str = "adapter runtime lock poisoned";

#[derive(Debug, serde::Deserialize)]
struct ActorQuery {
    actor_user_id: String,
    #[serde(default)]
    include_archived: bool,
}

#[derive(Debug, Serialize)]
struct ReadErrorResponse {
    status: String,
    outcome: String,
    reason: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = env::var("AREMS_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime: SharedRuntime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()?));
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/commands", post(run_command))
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/orientees", get(roster))
        .route(
            "/v1/orientees/:orientee_id/evaluations",
            get(orientee_evaluations),
        )
        .route("/v1/evaluations", get(evaluations))
        .route("/v1/ftos", get(training_officers))
        .route("/v1/fto-feedback", get(fto_feedback))
        .route("/v1/tasks", get(tasks))
        .route("/v1/training", get(training))
        .route("/v1/conversations", get(conversations))
        .route("/v1/conversations/:conversation_id/messages", get(messages))
        .with_state(runtime);

    info!(%addr, "arems_adapter_http listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
    info!("shutdown requested");
}

async fn healthz(State(runtime): State<SharedRuntime>) -> (StatusCode, Json<AdapterHealthResponse>) {
    match runtime.lock() {
        Ok(runtime) => (StatusCode::OK, Json(runtime.health_report())),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                outcome: "UNHEALTHY".to_string(),
                reason: Some(LOCK_POISONED.to_string()),
                journal_entries: 0,
                notifications_enabled: false,
            }),
        ),
    }
}

async fn run_command(
    State(runtime): State<SharedRuntime>,
    Json(command): Json<AdapterCommand>,
) -> (StatusCode, Json<AdapterCommandResponse>) {
    let result = match runtime.lock() {
        Ok(mut runtime) => runtime.run_command(command),
        Err(_) => Err(AdapterError::Journal(LOCK_POISONED.to_string())),
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => return (status_of(&err), Json(AdapterCommandResponse::from_error(&err))),
    };
    if outcome.pending.is_none() {
        return (StatusCode::OK, Json(outcome.finish()));
    }

    // Mail goes out with the lock released, off the async workers.
    let mut fallback = outcome.response.clone();
    match tokio::task::spawn_blocking(move || outcome.finish()).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(err) => {
            error!(error = %err, "notice delivery task failed");
            fallback.notification = Some("failed".to_string());
            (StatusCode::OK, Json(fallback))
        }
    }
}

async fn dashboard(State(runtime): State<SharedRuntime>, Query(q): Query<ActorQuery>) -> Response {
    read(&runtime, |rt| rt.dashboard(&q.actor_user_id))
}

async fn roster(State(runtime): State<SharedRuntime>, Query(q): Query<ActorQuery>) -> Response {
    read(&runtime, |rt| rt.roster(&q.actor_user_id, q.include_archived))
}

async fn evaluations(
    State(runtime): State<SharedRuntime>,
    Query(q): Query<ActorQuery>,
) -> Response {
    read(&runtime, |rt| rt.evaluations(&q.actor_user_id))
}

async fn orientee_evaluations(
    State(runtime): State<SharedRuntime>,
    Path(orientee_id): Path<u64>,
    Query(q): Query<ActorQuery>,
) -> Response {
    read(&runtime, |rt| rt.evaluations_for_orientee(&q.actor_user_id, orientee_id))
}

async fn training_officers(
    State(runtime): State<SharedRuntime>,
    Query(q): Query<ActorQuery>,
) -> Response {
    read(&runtime, |rt| rt.training_officers(&q.actor_user_id))
}

async fn fto_feedback(
    State(runtime): State<SharedRuntime>,
    Query(q): Query<ActorQuery>,
) -> Response {
    read(&runtime, |rt| rt.fto_feedback(&q.actor_user_id))
}

async fn tasks(State(runtime): State<SharedRuntime>, Query(q): Query<ActorQuery>) -> Response {
    read(&runtime, |rt| rt.tasks(&q.actor_user_id))
}

async fn training(State(runtime): State<SharedRuntime>, Query(q): Query<ActorQuery>) -> Response {
    read(&runtime, |rt| rt.training_materials(&q.actor_user_id))
}

async fn conversations(
    State(runtime): State<SharedRuntime>,
    Query(q): Query<ActorQuery>,
) -> Response {
    read(&runtime, |rt| rt.conversations(&q.actor_user_id))
}

async fn messages(
    State(runtime): State<SharedRuntime>,
    Path(conversation_id): Path<u64>,
    Query(q): Query<ActorQuery>,
) -> Response {
    read(&runtime, |rt| rt.messages(&q.actor_user_id, conversation_id))
}

fn read<T, F>(runtime: &SharedRuntime, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(&AdapterRuntime) -> Result<T, AdapterError>,
{
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReadErrorResponse {
                    status: "error".to_string(),
                    outcome: "UNAVAILABLE".to_string(),
                    reason: LOCK_POISONED.to_string(),
                }),
            )
                .into_response()
        }
    };
    match f(&runtime) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => (
            status_of(&err),
            Json(ReadErrorResponse {
                status: "error".to_string(),
                outcome: err.outcome().to_string(),
                reason: err.to_string(),
            }),
        )
            .into_response(),
    }
}

fn status_of(err: &AdapterError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
