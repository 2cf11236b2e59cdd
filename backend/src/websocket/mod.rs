//! # WebSocket Module
//!
//! Pushes ledger events to connected clients.
//!
//! ## Connection Flow
//!
//! ```text
//! 1. Client connects to /ws/{user_id}
//!              ↓
//! 2. Server registers a channel for that user
//!              ↓
//! 3. Events are pushed after the ledger transaction commits:
//!    - wallet_update
//!    - commission_credited
//!    - task_completed
//!    - withdrawal_processed
//!    - recharge_completed
//! ```
//!
//! Delivery is best-effort. A client that is not connected simply misses
//! the event; balances are always read back from the API.
//!
//! ## Message Format
//!
//! ```json
//! {
//!     "event": "commission_credited",
//!     "data": { "tier": "A", "amount": "100.00", "newCommissionBalance": "250.00" },
//!     "timestamp": "2024-01-15T12:00:00Z"
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use chrono::Utc;
use futures::StreamExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::AppState;

/// WebSocket event types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsEventType {
    /// Sent once after the handshake.
    Connected,
    /// A wallet balance changed.
    WalletUpdate,
    /// A referral commission landed in the commission wallet.
    CommissionCredited,
    /// A task reward was credited.
    TaskCompleted,
    /// An admin approved or rejected a withdrawal.
    WithdrawalProcessed,
    /// A recharge was completed by the sweeper.
    RechargeCompleted,
    /// Reply to client text frames.
    Ping,
}

/// WebSocket message wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsMessage<T> {
    pub event: WsEventType,
    pub data: T,
    pub timestamp: chrono::DateTime<Utc>,
}

impl<T: Serialize> WsMessage<T> {
    pub fn new(event: WsEventType, data: T) -> Self {
        Self {
            event,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Wallet update event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUpdateData {
    pub wallet: String,
    pub currency: String,
    pub balance: Decimal,
    pub reason: String,
}

/// Commission credited event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionCreditedData {
    pub from_user_id: Uuid,
    pub tier: String,
    pub amount: Decimal,
    pub new_commission_balance: Decimal,
}

/// Withdrawal processed event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalProcessedData {
    pub withdrawal_id: Uuid,
    pub status: String,
    pub amount: Decimal,
    pub admin_remark: Option<String>,
}

/// WebSocket connection registry.
///
/// Each user can have several connections (tabs, devices); each gets its
/// own broadcast sender.
#[derive(Clone)]
pub struct WsRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Vec<broadcast::Sender<String>>>>>,
}

impl WsRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a connection and return the receiver it should forward.
    pub async fn register(&self, user_id: Uuid) -> broadcast::Receiver<String> {
        let mut sessions = self.sessions.lock().await;
        let (tx, rx) = broadcast::channel(100);

        let senders = sessions.entry(user_id).or_default();
        senders.push(tx);

        info!(
            "Registered WebSocket for user: {} (connections: {})",
            user_id,
            senders.len()
        );
        rx
    }

    /// Drop senders whose receivers are gone.
    pub async fn unregister(&self, user_id: Uuid) {
        let mut sessions = self.sessions.lock().await;

        if let Some(senders) = sessions.get_mut(&user_id) {
            senders.retain(|tx| tx.receiver_count() > 0);

            if senders.is_empty() {
                sessions.remove(&user_id);
                info!("Unregistered all WebSocket connections for user: {}", user_id);
            } else {
                debug!(
                    "Unregistered one WebSocket connection for user: {} (remaining: {})",
                    user_id,
                    senders.len()
                );
            }
        }
    }

    /// Send an event to every connection of one user.
    ///
    /// A user without connections is not an error. Only serialization can
    /// fail.
    pub async fn send_to_user<T: Serialize>(
        &self,
        user_id: Uuid,
        event: WsEventType,
        data: T,
    ) -> Result<(), String> {
        let json = WsMessage::new(event, data)
            .to_json()
            .map_err(|e| format!("Failed to serialize message: {}", e))?;

        let mut sessions = self.sessions.lock().await;

        let Some(senders) = sessions.get_mut(&user_id) else {
            debug!("No active WebSocket connections for user: {}", user_id);
            return Ok(());
        };

        senders.retain(|sender| sender.receiver_count() > 0 && sender.send(json.clone()).is_ok());
        let delivered = senders.len();

        if senders.is_empty() {
            sessions.remove(&user_id);
        }

        if delivered > 0 {
            debug!("Sent {:?} to user {} ({} connections)", event, user_id, delivered);
        }
        Ok(())
    }

    /// Total open connections across all users.
    pub async fn total_connections(&self) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.values().map(|v| v.len()).sum()
    }
}

impl Default for WsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Push every message from `rx` through `send` until the channel closes
/// or `send` reports the socket is gone.
async fn forward_events<F, Fut>(mut rx: broadcast::Receiver<String>, mut send: F)
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    loop {
        match rx.recv().await {
            Ok(msg) => {
                if !send(msg).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("WebSocket subscriber lagged, {} events dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Configure WebSocket routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws/{user_id}", web::get().to(websocket_handler));
}

/// WebSocket connection handler.
///
/// ## Endpoint
///
/// `GET /ws/{user_id}`
///
/// The path id is trusted as is, like the `X-User-Id` header on the REST
/// routes. An upstream gateway must make sure a client only opens its
/// own stream.
///
/// ## Example (JavaScript)
///
/// ```javascript
/// const ws = new WebSocket('ws://localhost:8080/ws/3f0c...');
/// ws.onmessage = (event) => console.log(JSON.parse(event.data).event);
/// ```
pub async fn websocket_handler(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Payload,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = Uuid::parse_str(&path.into_inner())
        .map_err(|_| actix_web::error::ErrorBadRequest("Invalid user id"))?;
    info!("WebSocket connection request for user: {}", user_id);

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let registry = state.ws_registry.clone();
    let mut rx = registry.register(user_id).await;

    actix_rt::spawn(async move {
        let welcome = WsMessage::new(
            WsEventType::Connected,
            serde_json::json!({
                "status": "connected",
                "userId": user_id,
            }),
        );
        if let Ok(json) = welcome.to_json() {
            if let Err(e) = session.text(json).await {
                error!("Failed to send welcome message: {}", e);
            }
        }

        // Forward registry events to the socket
        let forward_session = session.clone();
        let forward = actix_rt::spawn(forward_events(rx, move |msg| {
            let mut session = forward_session.clone();
            async move {
                match session.text(msg).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("WebSocket session closed for {}: {}", user_id, e);
                        false
                    }
                }
            }
        }));

        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Ping(bytes) => {
                    let _ = session.pong(&bytes).await;
                }
                Message::Text(text) => {
                    debug!("Received text from {}: {}", user_id, text);
                    let reply = WsMessage::new(WsEventType::Ping, serde_json::json!({ "received": text.to_string() }));
                    if let Ok(json) = reply.to_json() {
                        let _ = session.text(json).await;
                    }
                }
                Message::Binary(_) => {
                    warn!("Received unexpected binary message from {}", user_id);
                }
                Message::Close(reason) => {
                    info!("WebSocket closed for {}: {:?}", user_id, reason);
                    break;
                }
                _ => {}
            }
        }

        // The forwarder may be parked in recv(); stop it so its receiver
        // is dropped before the registry prunes.
        forward.abort();
        let _ = forward.await;

        let _ = session.close(None).await;
        registry.unregister(user_id).await;
        info!("WebSocket disconnected for user: {}", user_id);
    });

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_every_connection_of_user() {
        let registry = WsRegistry::new();
        let user = Uuid::new_v4();
        let mut first = registry.register(user).await;
        let mut second = registry.register(user).await;
        assert_eq!(registry.total_connections().await, 2);

        registry
            .send_to_user(user, WsEventType::TaskCompleted, serde_json::json!({ "reward": "10" }))
            .await
            .unwrap();

        for rx in [&mut first, &mut second] {
            let raw = rx.recv().await.unwrap();
            let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(json["event"], "task_completed");
            assert_eq!(json["data"]["reward"], "10");
        }
    }

    #[tokio::test]
    async fn test_dropped_receivers_are_pruned() {
        let registry = WsRegistry::new();
        let user = Uuid::new_v4();
        let rx = registry.register(user).await;
        drop(rx);

        registry
            .send_to_user(user, WsEventType::WalletUpdate, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(registry.total_connections().await, 0);
    }

    #[tokio::test]
    async fn test_forwarder_delivers_until_socket_fails() {
        let registry = WsRegistry::new();
        let user = Uuid::new_v4();
        let rx = registry.register(user).await;
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();

        let forward = tokio::spawn(forward_events(rx, move |msg| {
            let out_tx = out_tx.clone();
            async move {
                let _ = out_tx.send(msg);
                false
            }
        }));

        registry
            .send_to_user(user, WsEventType::WalletUpdate, serde_json::json!({}))
            .await
            .unwrap();
        forward.await.unwrap();

        let raw = out_rx.recv().await.unwrap();
        assert!(raw.contains("wallet_update"));
        registry.unregister(user).await;
        assert_eq!(registry.total_connections().await, 0);
    }

    #[tokio::test]
    async fn test_aborted_forwarder_releases_registration() {
        let registry = WsRegistry::new();
        let user = Uuid::new_v4();
        let rx = registry.register(user).await;

        let forward = tokio::spawn(forward_events(rx, |_msg| async { true }));
        tokio::task::yield_now().await;
        assert_eq!(registry.total_connections().await, 1);

        forward.abort();
        assert!(forward.await.unwrap_err().is_cancelled());
        registry.unregister(user).await;
        assert_eq!(registry.total_connections().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_an_error() {
        let registry = WsRegistry::new();
        assert!(registry
            .send_to_user(Uuid::new_v4(), WsEventType::Ping, serde_json::json!({}))
            .await
            .is_ok());
    }
}
