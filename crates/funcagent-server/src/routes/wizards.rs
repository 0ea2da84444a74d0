use axum::extract::{Path, State};
use axum::Json;
use funcagent_core::connections::{run_wizard, ConnectionOutcome, WizardInfo, WIZARDS};
use funcagent_core::paths;
use funcagent_core::types::{ProgressEvent, RecordingProgress};
use funcagent_core::wizard::{Answers, ScriptedElicitor, WizardState};
use funcagent_core::AgentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Deadline;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/wizards
pub async fn list_wizards() -> Json<Vec<WizardInfo>> {
    Json(WIZARDS.to_vec())
}

#[derive(Deserialize)]
pub struct RunWizardBody {
    /// Answers keyed by prompt id; a list answers a prompt that is asked again.
    #[serde(default)]
    pub answers: BTreeMap<String, Answers>,
    /// Project whose `local.settings.json` receives the connection settings,
    /// relative to the server root.
    #[serde(default)]
    pub project_path: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct RunWizardResponse {
    #[serde(flatten)]
    pub outcome: ConnectionOutcome,
    pub progress: Vec<ProgressEvent>,
}

/// POST /api/wizards/{id}/run: run a connection wizard non-interactively.
///
/// A wizard that fails or runs out of answers still returns 200; the outcome's
/// `state` and `error` say what happened. Hitting the request deadline is 408.
pub async fn run(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RunWizardBody>,
) -> Result<Json<RunWizardResponse>, AppError> {
    let project = body.project_path.map(|p| paths::resolve(&app.root, &p));
    let elicitor = ScriptedElicitor::new(body.answers);
    let progress = RecordingProgress::new();
    let deadline = Deadline::start(app.request_timeout);

    let outcome = run_wizard(
        &id,
        app.connection_target(project),
        &elicitor,
        &progress,
        deadline.token(),
    )
    .await?;
    if outcome.outcome.state == WizardState::Cancelled && deadline.token().is_cancelled() {
        return Err(AgentError::Cancelled.into());
    }

    tracing::info!(wizard = %outcome.wizard_id, state = ?outcome.outcome.state, "wizard run finished");
    Ok(Json(RunWizardResponse {
        outcome,
        progress: progress.into_events(),
    }))
}
