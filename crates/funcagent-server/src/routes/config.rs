use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config: the effective configuration plus validation warnings.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let warnings = app.config.validate(&app.root);
    let config = serde_json::to_value(&*app.config)?;
    Ok(Json(serde_json::json!({
        "config": config,
        "warnings": warnings,
    })))
}
