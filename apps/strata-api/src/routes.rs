use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use strata_service::{Error, RetrieveRequest, TieredRetrievalResult, UsageStats};

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &str, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.to_string(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::Storage { message } => {
				tracing::error!(%message, "Retrieval failed on storage.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
			},
			Error::Encoding { message } => {
				tracing::error!(%message, "Retrieval failed while encoding context.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/context/retrieve", post(retrieve))
		.route("/v1/context/usage_stats", get(usage_stats))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn retrieve(
	State(state): State<AppState>,
	Json(payload): Json<RetrieveRequest>,
) -> Result<Json<TieredRetrievalResult>, ApiError> {
	let response = state.service.retrieve(payload).await?;

	Ok(Json(response))
}

async fn usage_stats(State(state): State<AppState>) -> Json<UsageStats> {
	Json(state.service.usage.stats())
}
