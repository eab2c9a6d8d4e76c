use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::info;

use crate::attachments::AttachmentStager;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::ApiError;
use crate::types::{
    parse_body, HealthResponse, MmsBody, SendMmsRequest, SendSmsRequest, SmsBody, SERVER_NAME,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub stager: AttachmentStager,
}

pub async fn send_sms(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = SendSmsRequest::try_from(parse_body::<SmsBody>(&body?))?;

    let result = state
        .dispatcher
        .send_text(&req.phone_number, &req.message)
        .await?;
    info!("SMS {} sent to {}", result.id, req.phone_number);

    Ok((StatusCode::OK, Json(result)))
}

pub async fn send_mms(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = SendMmsRequest::try_from(parse_body::<MmsBody>(&body?))?;

    // Dropping the scope deletes whatever was staged, on every return path.
    let mut scope = state.stager.scope();
    for (index, data) in req.attachments.iter().enumerate() {
        scope.stage(data, index).await?;
    }

    let result = state
        .dispatcher
        .send_media(&req.phone_number, &req.message, &scope.paths())
        .await;
    scope.release_all();

    let result = result?;
    info!("MMS {} sent to {}", result.id, req.phone_number);
    Ok((StatusCode::OK, Json(result)))
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server: SERVER_NAME,
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
