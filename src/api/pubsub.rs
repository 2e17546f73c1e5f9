use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::ApiJson;
use crate::errors::{CacheError, CacheResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub channel: String,
    pub message: String,
    #[serde(rename = "publisherId")]
    pub publisher_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub recipients: usize,
}

/// POST /cache/publish
pub async fn publish(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PublishRequest>,
) -> CacheResult<Json<PublishResponse>> {
    if req.channel.trim().is_empty() {
        return Err(CacheError::invalid("channel must not be empty"));
    }
    let recipients = state
        .broker
        .publish(&req.channel, &req.message, req.publisher_id);
    Ok(Json(PublishResponse { recipients }))
}

#[derive(Debug, Deserialize)]
pub struct ChannelsQuery {
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<String>,
}

/// GET /cache/pubsub/channels
pub async fn channels(
    State(state): State<AppState>,
    Query(query): Query<ChannelsQuery>,
) -> Json<ChannelsResponse> {
    Json(ChannelsResponse {
        channels: state.broker.channels(query.pattern.as_deref()),
    })
}

#[derive(Debug, Deserialize)]
pub struct NumSubRequest {
    pub channels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelCount {
    pub channel: String,
    pub subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct NumSubResponse {
    pub counts: Vec<ChannelCount>,
}

/// POST /cache/pubsub/numsub
pub async fn num_sub(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NumSubRequest>,
) -> Json<NumSubResponse> {
    let counts = state
        .broker
        .num_sub(&req.channels)
        .into_iter()
        .map(|(channel, subscribers)| ChannelCount {
            channel,
            subscribers,
        })
        .collect();
    Json(NumSubResponse { counts })
}

#[derive(Debug, Serialize)]
pub struct NumPatResponse {
    pub patterns: usize,
}

/// GET /cache/pubsub/numpat
pub async fn num_pat(State(state): State<AppState>) -> Json<NumPatResponse> {
    Json(NumPatResponse {
        patterns: state.broker.num_pat(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Comma-separated exact channels.
    pub channels: Option<String>,
    /// Comma-separated glob patterns.
    pub patterns: Option<String>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// GET /cache/subscribe — WebSocket upgrade delivering broker messages as
/// JSON frames.
pub async fn subscribe(
    ws: WebSocketUpgrade,
    Query(query): Query<SubscribeQuery>,
    State(state): State<AppState>,
) -> Result<Response, CacheError> {
    let channels = split_list(query.channels.as_deref());
    let patterns = split_list(query.patterns.as_deref());
    if channels.is_empty() && patterns.is_empty() {
        return Err(CacheError::invalid(
            "at least one channel or pattern is required",
        ));
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, channels, patterns)))
}

/// Handle one subscriber connection: register with the broker, forward its
/// sink to the socket, unsubscribe on close.
async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    channels: Vec<String>,
    patterns: Vec<String>,
) {
    let (id, mut rx) = state.broker.subscribe(channels, patterns);
    info!("pub/sub subscriber {} connected", id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Forward broker messages to the socket.
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                let Ok(json) = serde_json::to_string(&msg) else { continue };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            // Drain client frames; only close and ping matter.
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("pub/sub subscriber {} socket error: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    state.broker.unsubscribe(id);
    info!("pub/sub subscriber {} disconnected", id);
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/publish", post(publish))
        .route("/cache/pubsub/channels", get(channels))
        .route("/cache/pubsub/numsub", post(num_sub))
        .route("/cache/pubsub/numpat", get(num_pat))
        .route("/cache/subscribe", get(subscribe))
}
