//! API handlers for board queries, re-import and the monthly report

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use dockboard::{BoardError, ImportError, ImportSummary, Task};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Current board snapshot
pub async fn board(State(state): State<Arc<AppState>>) -> Response {
    state.service.roll_over().await;
    let snapshot = state.service.snapshot();
    Json(&*snapshot).into_response()
}

/// Tasks scheduled for the day before the board's day
pub async fn yesterday(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    state.service.roll_over().await;
    Json(state.service.yesterday())
}

/// Tasks scheduled for the day after the board's day
pub async fn tomorrow(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    state.service.roll_over().await;
    Json(state.service.tomorrow())
}

/// Re-read the schedule and merge it into the board
pub async fn reimport(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ImportSummary>, (StatusCode, String)> {
    state
        .service
        .reimport()
        .await
        .map(Json)
        .map_err(|e| (status_for(&e), e.to_string()))
}

/// Report generation response
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub message: String,
    pub path: String,
}

/// Build and write the monthly report
pub async fn report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReportResponse>, (StatusCode, String)> {
    let path = tokio::task::spawn_blocking(move || state.service.generate_report())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (status_for(&e), e.to_string()))?;

    Ok(Json(ReportResponse {
        message: "Report generated".to_string(),
        path: path.display().to_string(),
    }))
}

fn status_for(error: &BoardError) -> StatusCode {
    match error {
        BoardError::Import(ImportError::Missing { .. }) => StatusCode::NOT_FOUND,
        BoardError::Import(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BoardError::Transition(_) => StatusCode::CONFLICT,
        BoardError::StaleSnapshot { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockboard::TransitionRejected;
    use std::path::PathBuf;

    #[test]
    fn missing_schedule_is_not_found() {
        let error = BoardError::Import(ImportError::Missing {
            path: PathBuf::from("schedule.json"),
        });
        assert_eq!(status_for(&error), StatusCode::NOT_FOUND);
    }

    #[test]
    fn refused_changes_are_conflicts() {
        let error = BoardError::Transition(TransitionRejected::MissingClient);
        assert_eq!(status_for(&error), StatusCode::CONFLICT);
        let error = BoardError::StaleSnapshot {
            submitted: 1,
            current: 2,
        };
        assert_eq!(status_for(&error), StatusCode::CONFLICT);
    }
}
