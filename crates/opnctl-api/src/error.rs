use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: msg.into() }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::UNPROCESSABLE_ENTITY, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: msg.into() }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::CONFLICT, message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: msg.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<opnctl_domain::DomainError> for ApiError {
    fn from(e: opnctl_domain::DomainError) -> Self {
        ApiError::unprocessable(e.to_string())
    }
}

impl From<opnctl_store::StoreError> for ApiError {
    fn from(e: opnctl_store::StoreError) -> Self {
        match e {
            opnctl_store::StoreError::DeploymentNotFound(_) | opnctl_store::StoreError::PlanNotFound(_) => {
                ApiError::not_found(e.to_string())
            }
            opnctl_store::StoreError::StaleWrite { .. } | opnctl_store::StoreError::LeaseConflict { .. } => {
                ApiError::conflict(e.to_string())
            }
            _ => ApiError::internal(e.to_string()),
        }
    }
}

impl From<opnctl_planner::PlannerError> for ApiError {
    fn from(e: opnctl_planner::PlannerError) -> Self {
        match e {
            opnctl_planner::PlannerError::CriticalDelete { .. } => ApiError::unprocessable(e.to_string()),
            opnctl_planner::PlannerError::Validation(_) => ApiError::unprocessable(e.to_string()),
            opnctl_planner::PlannerError::Graph(_) => ApiError::unprocessable(e.to_string()),
            opnctl_planner::PlannerError::Store(inner) => ApiError::from(inner),
        }
    }
}

impl From<opnctl_engine::EngineError> for ApiError {
    fn from(e: opnctl_engine::EngineError) -> Self {
        match e {
            opnctl_engine::EngineError::StalePlan { .. } => ApiError::conflict(e.to_string()),
            opnctl_engine::EngineError::RiskGated { .. } => ApiError::unprocessable(e.to_string()),
            opnctl_engine::EngineError::Store(inner) => ApiError::from(inner),
            opnctl_engine::EngineError::Effector(_) => ApiError::internal(e.to_string()),
        }
    }
}
