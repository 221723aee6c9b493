// HTTP request handlers
use crate::application::process_supervisor::StopOutcome;
use crate::application::simulation_service::{SimulationError, SimulationStatus};
use crate::domain::dataset::DatasetError;
use crate::infrastructure::chunked_json::stream_response;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SimulationStatus>,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub outcome: StopOutcome,
    pub status: SimulationStatus,
}

#[derive(Deserialize)]
pub struct CleanRequest {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn simulation_status(State(state): State<Arc<AppState>>) -> Json<SimulationStatus> {
    Json(state.simulation_service.status().await)
}

/// Launch the simulator. The response carries the new control state.
pub async fn start_simulation(State(state): State<Arc<AppState>>) -> Response {
    let service = &state.simulation_service;
    match service.start().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            let code = match e {
                SimulationError::AlreadyRunning => StatusCode::CONFLICT,
                SimulationError::Start(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let body = ErrorBody {
                error: e.to_string(),
                status: Some(service.status().await),
            };
            (code, Json(body)).into_response()
        }
    }
}

pub async fn stop_simulation(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    let outcome = state.simulation_service.stop().await;
    Json(StopResponse {
        outcome,
        status: state.simulation_service.status().await,
    })
}

/// Current charts of the session
pub async fn charts_snapshot(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let snapshot = state.simulation_service.snapshot().await;
    match json_response(StatusCode::OK, &snapshot, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Stream chart updates (snapshot first, then live deltas)
pub async fn stream_charts(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let stream = state.simulation_service.subscribe().await;
    stream_response(stream, compress).await
}

/// Clean a recorded CSV and return its charts
pub async fn clean_dataset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CleanRequest>,
) -> Response {
    let result = state
        .dataset_service
        .clean(&request.input_path, request.output_path.as_deref())
        .await;

    match result {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::warn!("Error cleaning {}: {}", request.input_path.display(), e);
            let code = match &e {
                DatasetError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    StatusCode::NOT_FOUND
                }
                DatasetError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            let body = ErrorBody {
                error: e.to_string(),
                status: None,
            };
            (code, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dataset_service::DatasetService;
    use crate::application::simulation_service::SimulationService;
    use crate::domain::telemetry::MissingFieldPolicy;
    use crate::infrastructure::child_process::ChildProcessSupervisor;
    use std::time::Duration;

    fn state_with_missing_simulator() -> Arc<AppState> {
        let supervisor = ChildProcessSupervisor::new(
            PathBuf::from("/nonexistent/simulate"),
            Vec::new(),
            Duration::from_secs(1),
            true,
        );
        Arc::new(AppState {
            simulation_service: SimulationService::new(
                Arc::new(supervisor),
                MissingFieldPolicy::Zero,
                16,
            ),
            dataset_service: DatasetService::new(
                PathBuf::from("/nonexistent/data"),
                PathBuf::from("/nonexistent/output"),
            ),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_failed_start_reports_pre_start_controls() {
        let response = start_simulation(State(state_with_missing_simulator())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["status"]["controls"]["start_enabled"], true);
        assert_eq!(body["status"]["controls"]["stop_enabled"], false);
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let Json(response) = stop_simulation(State(state_with_missing_simulator())).await;

        assert_eq!(response.outcome, StopOutcome::NotRunning);
        assert!(!response.status.running);
    }

    #[tokio::test]
    async fn test_charts_snapshot_lists_three_charts() {
        let response = charts_snapshot(HeaderMap::new(), State(state_with_missing_simulator()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let charts = body["charts"].as_array().unwrap();
        assert_eq!(charts.len(), 3);
        assert_eq!(charts[2]["y_label"], "Resistance (Ω)");
        assert_eq!(charts[0]["axes"]["x"]["max"], 1.0);
    }

    #[tokio::test]
    async fn test_clean_missing_file_is_not_found() {
        let request = CleanRequest {
            input_path: PathBuf::from("raw.csv"),
            output_path: None,
        };
        let response = clean_dataset(State(state_with_missing_simulator()), Json(request)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clean_refuses_paths_outside_data_dirs() {
        let request = CleanRequest {
            input_path: PathBuf::from("raw.csv"),
            output_path: Some(PathBuf::from("/tmp/../etc/x")),
        };
        let response = clean_dataset(State(state_with_missing_simulator()), Json(request)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("/tmp/../etc/x"));
    }
}
