//! HTTP API over the annotation service

mod params;

pub use params::{CoOccurrenceParams, Period, PopularParams, UnknownPeriod, DEFAULT_COOCCURRENCE_LIMIT};

use crate::annotation::{Annotation, AnnotationError, AnnotationService};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    service: AnnotationService,
}

/// Build the router for the annotation API
pub fn router(service: AnnotationService) -> Router {
    Router::new()
        .route(
            "/content/:uuid/keyphrase/annotations",
            get(get_annotations).put(put_annotations).delete(delete_annotations),
        )
        .route("/content/keyphrase/annotations/__count", get(count_annotations))
        .route("/content/keyphrase/annotations/__popular", get(popular_keyphrases))
        .route("/keyphrase/:uuid/cooccurrences", get(cooccurrences))
        .route("/__gtg", get(good_to_go))
        .route("/__ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

#[derive(Debug)]
enum ApiError {
    Annotation(AnnotationError),
    BadRequest(String),
    NotFound(String),
}

impl From<AnnotationError> for ApiError {
    fn from(err: AnnotationError) -> Self {
        ApiError::Annotation(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("error parsing annotation request: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Annotation(err) => {
                let status = match &err {
                    e if e.is_client_error() => StatusCode::BAD_REQUEST,
                    AnnotationError::TypeResolution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::SERVICE_UNAVAILABLE,
                };
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                } else {
                    warn!(error = %err, "request rejected");
                }
                (status, err.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

fn not_found(uuid: &str) -> ApiError {
    ApiError::NotFound(format!("No annotations found for content with uuid {}.", uuid))
}

async fn put_annotations(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    body: Result<Json<Annotation>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(annotation) = body?;
    state.service.write(&uuid, &annotation).await?;
    info!(content_uuid = %uuid, "annotations created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Annotations for content {} created", uuid) })),
    ))
}

async fn get_annotations(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<Annotation>, ApiError> {
    state
        .service
        .read(&uuid)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&uuid))
}

async fn delete_annotations(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service.delete(&uuid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&uuid))
    }
}

async fn count_annotations(State(state): State<AppState>) -> Result<Json<i64>, ApiError> {
    Ok(Json(state.service.count().await?))
}

async fn popular_keyphrases(
    State(state): State<AppState>,
    params: Result<Query<PopularParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    let period = params.period().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(state.service.get_popular(period.seconds()).await?))
}

async fn cooccurrences(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    params: Result<Query<CoOccurrenceParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params?;
    state
        .service
        .get_co_occurrence(&uuid, params.limit())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No co-occurrences found for keyphrase with uuid {}.", uuid)))
}

async fn good_to_go(State(state): State<AppState>) -> StatusCode {
    match state.service.check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn ping() -> &'static str {
    "pong"
}
