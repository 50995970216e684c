//! REST endpoint handlers for the simulation API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page (when no static dir is served) |
//! | `POST` | `/start` | Start a new session, returns the time-0 state |
//! | `POST` | `/step` | Advance the active session by one step |
//! | `GET` | `/status` | Summary of the active session |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{Html, IntoResponse};
use serde::Serialize;
use viral_core::session::SimulationSession;
use viral_types::{SessionStatus, StateSnapshot};

use crate::error::ApiError;
use crate::request::{StartRequest, StepRequest};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the session and the API routes.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.session.lock().await.status();

    let body = status.map_or_else(
        || String::from(r#"<p>Status: <span class="idle">IDLE</span></p>"#),
        |s| {
            format!(
                r#"<p>Status: <span class="status">RUNNING</span> ({id})</p>
    <div>
        <div class="metric"><div class="label">Grid</div><div class="value">{layers}x{layers}</div></div>
        <div class="metric"><div class="label">Time</div><div class="value">{time} / {end_time}</div></div>
        <div class="metric"><div class="label">Steps</div><div class="value">{steps}</div></div>
        <div class="metric"><div class="label">H / E / I / F / D</div><div class="value">{h} / {e} / {i} / {f} / {d}</div></div>
    </div>"#,
                id = s.session_id,
                layers = s.params.layers,
                time = s.time,
                end_time = s.end_time,
                steps = s.steps,
                h = s.counts.h,
                e = s.counts.e,
                i = s.counts.i,
                f = s.counts.f,
                d = s.counts.d,
            )
        },
    );

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Viral ABM Engine</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.3rem; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        .idle {{ color: #d29922; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>Viral ABM Engine</h1>
    {body}
    <ul>
        <li>POST /start</li>
        <li>POST /step</li>
        <li>GET <a href="/status">/status</a></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// POST /start
// ---------------------------------------------------------------------------

/// Start a new session, replacing any running one.
///
/// The new session is fully built before the lock is taken, so a rejected
/// body never disturbs the running simulation.
pub async fn start(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<StateSnapshot>, ApiError> {
    let Json(request) = payload?;
    let params = request.into_params(&state.defaults)?;
    let session = SimulationSession::start(params, &state.defaults, &state.rules)?;

    let snapshot = state.session.lock().await.install(session);
    Ok(Json(snapshot))
}

// ---------------------------------------------------------------------------
// POST /step
// ---------------------------------------------------------------------------

/// Apply the rules once to the active session.
pub async fn step(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StepRequest>, JsonRejection>,
) -> Result<Json<StateSnapshot>, ApiError> {
    let Json(request) = payload?;
    let snapshot = state
        .session
        .lock()
        .await
        .step(request.requested_time())?;
    Ok(Json(snapshot))
}

// ---------------------------------------------------------------------------
// GET /status
// ---------------------------------------------------------------------------

/// Response body for `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether a session has been started.
    pub active: bool,
    /// Session summary, flattened into the top level when present.
    #[serde(flatten)]
    pub session: Option<SessionStatus>,
}

/// Report the active session, or `{"active": false}`.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let session = state.session.lock().await.status();
    Json(StatusResponse {
        active: session.is_some(),
        session,
    })
}
