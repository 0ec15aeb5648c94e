//! HTTP routes over the gateway.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqsgate::{consume::ConsumeMode, Gateway, QueueError};
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct QueueNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUrlRequest {
    pub queue_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub queue_url: String,
    pub content: String,
}

/// Create the application router
pub fn create_router(gateway: Gateway) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sqs", get(list_queues))
        .route("/sqs/getQueueByName", post(get_queue_by_name))
        .route("/sqs/createSimpleQueue", post(create_simple_queue))
        .route("/sqs/createDeadLetterQueue", post(create_dead_letter_queue))
        .route("/sqs/createLongPollingQueue", post(create_long_polling_queue))
        .route("/sqs/sendMessage", post(send_message))
        .route(
            "/sqs/receiveMessagesWithoutDelete",
            post(receive_messages_without_delete),
        )
        .route(
            "/sqs/receiveMessagesWithDelete",
            post(receive_messages_with_delete),
        )
        .route(
            "/sqs/receiveMessagesWithoutDeleteLimitedVisibilityTimeout",
            post(receive_messages_with_visibility_hold),
        )
        .route(
            "/sqs/receiveMessagesWithLongPolling",
            post(receive_messages_with_long_polling),
        )
        .route("/sqs/deleteQueue", post(delete_queue))
        .with_state(gateway)
}

pub async fn serve(gateway: Gateway, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(gateway)).await?;
    Ok(())
}

/// A [`QueueError`] rendered as `{"error": "...", "message": "..."}`.
#[derive(Debug)]
pub struct ApiError(QueueError);

impl From<QueueError> for ApiError {
    fn from(error: QueueError) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            QueueError::QueueDoesNotExist(_) => StatusCode::NOT_FOUND,
            QueueError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QueueError::StaleReceiptHandle(_) => StatusCode::CONFLICT,
            QueueError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self.0);
        } else {
            log::warn!("{}", self.0);
        }

        let body = serde_json::json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "running" }))
}

async fn list_queues(State(gateway): State<Gateway>) -> ApiResult<Json<Vec<String>>> {
    log::info!("listing queues with prefix {}", gateway.prefix());
    Ok(Json(gateway.list().await?))
}

async fn get_queue_by_name(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueNameRequest>,
) -> ApiResult<String> {
    log::info!("looking up queue {}", request.name);
    Ok(gateway.queue_url(&request.name).await?)
}

async fn create_simple_queue(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueNameRequest>,
) -> ApiResult<String> {
    Ok(gateway.create_queue(&request.name).await?)
}

async fn create_dead_letter_queue(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueUrlRequest>,
) -> ApiResult<StatusCode> {
    gateway.create_dead_letter_queue(&request.queue_url).await?;
    Ok(StatusCode::OK)
}

async fn create_long_polling_queue(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueNameRequest>,
) -> ApiResult<StatusCode> {
    gateway.create_long_polling_queue(&request.name).await?;
    Ok(StatusCode::OK)
}

async fn send_message(
    State(gateway): State<Gateway>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<StatusCode> {
    let id = gateway
        .send_message(&request.queue_url, &request.content)
        .await?;
    log::info!("sent message {:?} to {}", id, request.queue_url);
    Ok(StatusCode::OK)
}

async fn receive_messages_without_delete(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueUrlRequest>,
) -> ApiResult<Json<Vec<String>>> {
    receive(&gateway, &request.queue_url, ConsumeMode::FetchOnly).await
}

async fn receive_messages_with_delete(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueUrlRequest>,
) -> ApiResult<Json<Vec<String>>> {
    receive(&gateway, &request.queue_url, ConsumeMode::FetchAndDelete).await
}

async fn receive_messages_with_visibility_hold(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueUrlRequest>,
) -> ApiResult<Json<Vec<String>>> {
    receive(
        &gateway,
        &request.queue_url,
        ConsumeMode::FetchWithVisibilityHold,
    )
    .await
}

async fn receive_messages_with_long_polling(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueUrlRequest>,
) -> ApiResult<Json<Vec<String>>> {
    receive(
        &gateway,
        &request.queue_url,
        ConsumeMode::FetchWithLongPollAndDelete,
    )
    .await
}

// Post-action failures are already logged by the coordinator; the response
// only carries the bodies.
async fn receive(
    gateway: &Gateway,
    queue_url: &str,
    mode: ConsumeMode,
) -> ApiResult<Json<Vec<String>>> {
    let consumed = gateway.consume(queue_url, mode).await?;
    log::info!(
        "{:?} on {}: {} messages, {} failed post actions",
        mode,
        queue_url,
        consumed.bodies.len(),
        consumed.failures.len()
    );
    Ok(Json(consumed.bodies))
}

async fn delete_queue(
    State(gateway): State<Gateway>,
    Json(request): Json<QueueUrlRequest>,
) -> ApiResult<StatusCode> {
    gateway.delete_queue(&request.queue_url).await?;
    Ok(StatusCode::OK)
}
