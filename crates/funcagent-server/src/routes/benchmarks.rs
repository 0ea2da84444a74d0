use axum::extract::State;
use axum::Json;
use funcagent_core::benchmark::{Benchmark, BenchmarkRunStats, BenchmarkSummary};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/benchmarks
pub async fn list_benchmarks(State(app): State<AppState>) -> Json<Vec<Benchmark>> {
    Json(app.benchmarks.benchmarks().to_vec())
}

#[derive(Deserialize)]
pub struct RunBenchmarksBody {
    /// Run only this benchmark; all of them when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub times: Option<usize>,
}

#[derive(Serialize)]
pub struct BenchmarkRuns {
    pub name: String,
    pub runs: Vec<BenchmarkRunStats>,
    pub summary: BenchmarkSummary,
}

/// POST /api/benchmarks/run: replay benchmarks and append the runs to history.
pub async fn run_benchmarks(
    State(app): State<AppState>,
    Json(body): Json<RunBenchmarksBody>,
) -> Result<Json<Vec<BenchmarkRuns>>, AppError> {
    let times = body.times.unwrap_or(1);
    if times == 0 {
        return Err(AppError::bad_request("times must be at least 1"));
    }

    let cancel = CancellationToken::new();
    let mut history = app.history.lock().await;
    let results = match &body.name {
        Some(name) => {
            let runs = app.benchmarks.run(name, times, &mut history, &cancel).await?;
            vec![(name.clone(), runs)]
        }
        None => app.benchmarks.run_all(times, &mut history, &cancel).await?,
    };
    history.save(&app.history_path())?;

    let out = results
        .into_iter()
        .map(|(name, runs)| BenchmarkRuns {
            summary: history.summary(&name),
            name,
            runs,
        })
        .collect();
    Ok(Json(out))
}

/// GET /api/benchmarks/summary: pass rates derived from the stored history.
pub async fn summary(State(app): State<AppState>) -> Json<Vec<BenchmarkSummary>> {
    let history = app.history.lock().await;
    Json(history.summaries())
}
