//! WhatsApp transport
//!
//! Connects to a WhatsApp Web bridge over a WebSocket. The bridge owns the
//! session (pairing, QR login, protocol encoding); this side only consumes
//! its JSON notifications and issues send commands.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use chat_relay_core::bus::OutboundMessage;
use chat_relay_core::config::WhatsAppConfig;

use crate::base::{
    sender_allowed, ChannelError, MessageEvent, Result, Transport, TransportEvent,
};

/// Server part appended to bare user ids when addressing replies
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";

/// Delay between reconnection attempts
const RECONNECT_DELAY_SECS: u64 = 5;

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

/// Notifications received from the bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum BridgeMessage {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        sender: String,
        #[serde(default)]
        pn: String,
        #[serde(default, alias = "pushName")]
        push_name: Option<String>,
        #[serde(default)]
        content: String,
    },
    #[serde(rename = "status")]
    Status { status: String },
    #[serde(rename = "qr")]
    Qr { qr: String },
    #[serde(rename = "error")]
    Error { error: String },
    #[serde(rename = "sent")]
    Sent { to: String },
}

/// Send command to the bridge
#[derive(Debug, Clone, Serialize)]
struct SendCommand {
    #[serde(rename = "type")]
    msg_type: String,
    to: String,
    text: String,
}

impl SendCommand {
    fn new(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            msg_type: "send".to_string(),
            to: to.into(),
            text: text.into(),
        }
    }
}

/// Address a bare user id at the default user server; full JIDs pass through
pub fn to_jid(recipient: &str) -> String {
    if recipient.contains('@') {
        recipient.to_string()
    } else {
        format!("{}@{}", recipient, DEFAULT_USER_SERVER)
    }
}

/// State shared between the transport handle and its connection task
#[derive(Clone)]
struct BridgeContext {
    name: String,
    allow_from: Vec<String>,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    connected: Arc<RwLock<bool>>,
}

impl BridgeContext {
    async fn emit(&self, event: TransportEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.send(event).await {
                error!("Failed to deliver transport event: {}", e);
            }
        }
    }

    /// Translate one raw bridge frame into a transport event
    async fn handle_bridge_message(&self, raw: &str) {
        let data: BridgeMessage = match serde_json::from_str(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    "Invalid JSON from bridge: {} (raw: {})",
                    e,
                    chat_relay_core::utils::truncate(raw, 100)
                );
                return;
            }
        };

        match data {
            BridgeMessage::Message {
                sender,
                pn,
                push_name,
                content,
            } => {
                let user_id = if pn.is_empty() { &sender } else { &pn };
                let sender_id = user_id.split('@').next().unwrap_or(user_id).to_string();

                if !sender_allowed(&self.allow_from, &sender_id) {
                    info!(
                        "Dropping WhatsApp message from non-allowlisted sender: {}",
                        sender_id
                    );
                    return;
                }

                info!("Received message from sender: {}", sender_id);
                let mut message = MessageEvent::new(self.name.clone(), sender_id, content);
                if let Some(name) = push_name.filter(|n| !n.trim().is_empty()) {
                    message = message.with_display_name(name);
                }
                self.emit(TransportEvent::Message(message)).await;
            }
            BridgeMessage::Status { status } => {
                *self.connected.write().await = status == "connected";
                self.emit(TransportEvent::Status(status)).await;
            }
            BridgeMessage::Qr { qr } => {
                self.emit(TransportEvent::Qr(qr)).await;
            }
            BridgeMessage::Error { error } => {
                error!("WhatsApp bridge error: {}", error);
                self.emit(TransportEvent::Error(error)).await;
            }
            BridgeMessage::Sent { to } => {
                self.emit(TransportEvent::Sent { to }).await;
            }
        }
    }
}

/// WhatsApp transport backed by a WebSocket bridge
pub struct WhatsAppTransport {
    name: String,
    bridge_url: String,
    allow_from: Vec<String>,
    running: bool,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    /// WebSocket write half
    ws_tx: Arc<RwLock<Option<WsSink>>>,
    connected: Arc<RwLock<bool>>,
    task_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl WhatsAppTransport {
    /// Create a new WhatsApp transport
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            name: "whatsapp".to_string(),
            bridge_url: config.bridge_url,
            allow_from: config.allow_from,
            running: false,
            event_tx: None,
            ws_tx: Arc::new(RwLock::new(None)),
            connected: Arc::new(RwLock::new(false)),
            task_handle: None,
            shutdown_tx: None,
        }
    }

    /// Whether the bridge connection is currently up
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    fn context(&self) -> BridgeContext {
        BridgeContext {
            name: self.name.clone(),
            allow_from: self.allow_from.clone(),
            event_tx: self.event_tx.clone(),
            connected: self.connected.clone(),
        }
    }

    #[cfg(test)]
    async fn handle_bridge_message(&self, raw: &str) {
        self.context().handle_bridge_message(raw).await;
    }

    /// WebSocket connection loop with reconnection
    async fn connection_loop(
        bridge_url: String,
        ctx: BridgeContext,
        ws_tx: Arc<RwLock<Option<WsSink>>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut running = true;

        while running {
            info!("Connecting to WhatsApp bridge at {}...", bridge_url);

            match connect_async(bridge_url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("Connected to WhatsApp bridge");
                    let (write, mut read) = ws_stream.split();
                    *ws_tx.write().await = Some(write);
                    *ctx.connected.write().await = true;

                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(WsMessage::Text(text))) => {
                                        ctx.handle_bridge_message(&text).await;
                                    }
                                    Some(Ok(WsMessage::Close(_))) | None => {
                                        info!("WebSocket closed by bridge");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        error!("WebSocket error: {}", e);
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("Shutdown signal received");
                                running = false;
                                break;
                            }
                        }
                    }

                    *ctx.connected.write().await = false;
                    *ws_tx.write().await = None;
                }
                Err(e) => {
                    error!("Failed to connect to WhatsApp bridge: {}", e);
                }
            }

            if running {
                info!("Reconnecting in {} seconds...", RECONNECT_DELAY_SECS);
                tokio::select! {
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)) => {}
                    _ = shutdown_rx.recv() => running = false,
                }
            }
        }

        info!("WhatsApp connection loop ended");
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        if self.bridge_url.trim().is_empty() {
            return Err(ChannelError::InvalidConfig(
                "WhatsApp bridge_url is empty".to_string(),
            ));
        }

        info!("Starting WhatsApp transport (bridge: {})", self.bridge_url);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(Self::connection_loop(
            self.bridge_url.clone(),
            self.context(),
            self.ws_tx.clone(),
            shutdown_rx,
        ));

        self.task_handle = Some(handle);
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        info!("Stopping WhatsApp transport...");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }

        if let Some(mut write) = self.ws_tx.write().await.take() {
            let _ = write.close().await;
        }
        *self.connected.write().await = false;

        self.running = false;
        info!("WhatsApp transport stopped");
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        if !*self.connected.read().await {
            return Err(ChannelError::NotRunning(
                "WhatsApp bridge not connected".to_string(),
            ));
        }

        let cmd = SendCommand::new(to_jid(&msg.recipient), &msg.content);
        let payload = serde_json::to_string(&cmd)
            .map_err(|e| ChannelError::SendError(format!("Failed to serialize message: {}", e)))?;

        let mut tx = self.ws_tx.write().await;
        match tx.as_mut() {
            Some(write) => write
                .send(WsMessage::Text(payload))
                .await
                .map_err(|e| ChannelError::SendError(format!("Failed to send: {}", e))),
            None => Err(ChannelError::NotRunning(
                "WebSocket not initialized".to_string(),
            )),
        }
    }

    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>) {
        self.event_tx = Some(tx);
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        sender_allowed(&self.allow_from, sender_id)
    }
}

impl Default for WhatsAppTransport {
    fn default() -> Self {
        Self::new(WhatsAppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    fn config(allow_from: Vec<String>) -> WhatsAppConfig {
        WhatsAppConfig {
            enabled: true,
            bridge_url: "ws://127.0.0.1:9".to_string(),
            allow_from,
        }
    }

    #[test]
    fn test_transport_new() {
        let transport = WhatsAppTransport::new(config(vec![]));
        assert_eq!(transport.name(), "whatsapp");
        assert!(!transport.is_running());
    }

    #[test]
    fn test_to_jid() {
        assert_eq!(to_jid("15550001"), "15550001@s.whatsapp.net");
        assert_eq!(to_jid("15550001@s.whatsapp.net"), "15550001@s.whatsapp.net");
        assert_eq!(to_jid("123-456@g.us"), "123-456@g.us");
    }

    #[test]
    fn test_is_allowed() {
        let transport = WhatsAppTransport::new(config(vec!["1234567890".to_string()]));
        assert!(transport.is_allowed("1234567890"));
        assert!(!transport.is_allowed("9876543210"));
    }

    #[tokio::test]
    async fn test_start_stop() {
        let mut transport = WhatsAppTransport::new(config(vec![]));

        transport.start().await.unwrap();
        assert!(transport.is_running());

        transport.stop().await.unwrap();
        assert!(!transport.is_running());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = WhatsAppTransport::new(config(vec![]));
        let err = transport
            .send(OutboundMessage::new("whatsapp", "15550001", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_message_maps_sender_and_push_name() {
        let mut transport = WhatsAppTransport::new(config(vec![]));
        let (tx, mut rx) = mpsc::channel(1);
        transport.set_event_sender(tx);

        let raw = json!({
            "type": "message",
            "id": "m1",
            "sender": "12345@s.whatsapp.net",
            "pn": "",
            "pushName": "Zabe",
            "content": "hello",
            "timestamp": 1700000000
        })
        .to_string();

        transport.handle_bridge_message(&raw).await;
        match rx.recv().await.unwrap() {
            TransportEvent::Message(msg) => {
                assert_eq!(msg.sender_id, "12345");
                assert_eq!(msg.display_name.as_deref(), Some("Zabe"));
                assert_eq!(msg.text, "hello");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_phone_number_preferred_and_blank_name_dropped() {
        let mut transport = WhatsAppTransport::new(config(vec![]));
        let (tx, mut rx) = mpsc::channel(1);
        transport.set_event_sender(tx);

        let raw = json!({
            "type": "message",
            "sender": "abcdef@lid",
            "pn": "15550001@s.whatsapp.net",
            "pushName": "",
            "content": "yo"
        })
        .to_string();

        transport.handle_bridge_message(&raw).await;
        let TransportEvent::Message(msg) = rx.recv().await.unwrap() else {
            panic!("expected message event");
        };
        assert_eq!(msg.sender_id, "15550001");
        assert!(msg.display_name.is_none());
    }

    #[tokio::test]
    async fn test_allowlist_blocks_sender() {
        let mut transport = WhatsAppTransport::new(config(vec!["allow-me".to_string()]));
        let (tx, mut rx) = mpsc::channel(1);
        transport.set_event_sender(tx);

        let raw = json!({
            "type": "message",
            "sender": "blocked@s.whatsapp.net",
            "content": "blocked content"
        })
        .to_string();

        transport.handle_bridge_message(&raw).await;
        let received = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(received.is_err(), "blocked sender should not be forwarded");
    }

    #[tokio::test]
    async fn test_status_updates_connection_flag() {
        let mut transport = WhatsAppTransport::new(config(vec![]));
        let (tx, mut rx) = mpsc::channel(2);
        transport.set_event_sender(tx);

        transport
            .handle_bridge_message(r#"{"type":"status","status":"connected"}"#)
            .await;
        assert!(transport.is_connected().await);
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::Status("connected".to_string())
        );

        transport
            .handle_bridge_message(r#"{"type":"status","status":"disconnected"}"#)
            .await;
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_invalid_json_is_ignored() {
        let mut transport = WhatsAppTransport::new(config(vec![]));
        let (tx, mut rx) = mpsc::channel(1);
        transport.set_event_sender(tx);

        transport.handle_bridge_message("not json").await;
        transport
            .handle_bridge_message(r#"{"type":"qr","qr":"2@code"}"#)
            .await;
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::Qr("2@code".to_string())
        );
    }
}
