use axum::extract::State;
use axum::Json;
use funcagent_core::agent::CommandInfo;
use funcagent_core::types::{CommandResult, ProgressEvent, RecordingProgress};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Deadline;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RouteBody {
    pub prompt: String,
    /// Continue an earlier conversation; a new one is started when absent.
    #[serde(default)]
    pub session: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RouteResponse {
    pub session: Uuid,
    pub result: Option<CommandResult>,
    pub progress: Vec<ProgressEvent>,
}

/// POST /api/route: route one chat turn and return what the handler produced.
pub async fn route_intent(
    State(app): State<AppState>,
    Json(body): Json<RouteBody>,
) -> Result<Json<RouteResponse>, AppError> {
    let id = body.session.unwrap_or_else(Uuid::new_v4);
    let mut session = app.take_session(id);
    let progress = RecordingProgress::new();
    let deadline = Deadline::start(app.request_timeout);

    let result = app
        .agent
        .respond(&mut session, &body.prompt, &progress, deadline.token())
        .await;
    app.store_session(id, session);
    let result = result?;

    tracing::info!(
        session = %id,
        chain = ?result.as_ref().map(|r| &r.handler_chain),
        "routed chat turn"
    );
    Ok(Json(RouteResponse {
        session: id,
        result,
        progress: progress.into_events(),
    }))
}

/// GET /api/commands: every command, nested ones as `/functions /name`.
pub async fn list_commands(State(app): State<AppState>) -> Json<Vec<CommandInfo>> {
    Json(app.agent.commands().to_vec())
}
