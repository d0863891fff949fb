//! Mock streamer for integration tests.
//!
//! Accepts connections, greets each with a welcome frame, records every text
//! frame received and, on `SubAdd`, confirms the subscription and plays the
//! script assigned to that connection. Connection `n` plays script `n`, the
//! last script repeating for any later connection.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<usize>>,
}

impl MockWsServer {
    /// Start a server that only confirms subscriptions.
    pub async fn start() -> Self {
        Self::with_scripts(vec![Vec::new()]).await
    }

    /// Start a server playing `scripts` after each subscription.
    pub async fn with_scripts(scripts: Vec<Vec<String>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0usize));
        let scripts = Arc::new(scripts);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let index = {
                            let mut count = connections_clone.lock().await;
                            *count += 1;
                            *count - 1
                        };
                        let script = scripts
                            .get(index)
                            .or_else(|| scripts.last())
                            .cloned()
                            .unwrap_or_default();
                        tokio::spawn(handle_connection(stream, messages_clone.clone(), script));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> usize {
        *self.connections.lock().await
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<Vec<String>>>,
    script: Vec<String>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let _ = write.send(Message::Text(welcome())).await;

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                messages.lock().await.push(text.clone());

                let is_sub_add = serde_json::from_str::<serde_json::Value>(&text)
                    .map(|v| v.get("action") == Some(&json!("SubAdd")))
                    .unwrap_or(false);
                if is_sub_add {
                    let _ = write.send(Message::Text(subscribe_complete())).await;
                    for frame in &script {
                        if write.send(Message::Text(frame.clone())).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

pub fn welcome() -> String {
    json!({"TYPE": "20", "MESSAGE": "STREAMERWELCOME"}).to_string()
}

pub fn subscribe_complete() -> String {
    json!({"TYPE": "16", "MESSAGE": "SUBSCRIBECOMPLETE", "SUB": "8~Binance~BTC~USDT"}).to_string()
}

pub fn snapshot(sequence: u64) -> String {
    json!({"TYPE": "9", "M": "Binance", "FSYM": "BTC", "TSYM": "USDT", "CCSEQ": sequence})
        .to_string()
}

pub fn update(sequence: u64, price: &str, quantity: &str) -> String {
    json!({
        "TYPE": "8",
        "M": "Binance",
        "FSYM": "BTC",
        "TSYM": "USDT",
        "SIDE": 0,
        "ACTION": 1,
        "CCSEQ": sequence,
        "P": price,
        "Q": quantity,
        "SEQ": sequence * 10,
        "REPORTEDNS": 1_700_000_000_000_000_000u64,
        "DELAYNS": 2_000_000
    })
    .to_string()
}

pub fn server_error(message: &str) -> String {
    json!({"TYPE": "500", "MESSAGE": message, "INFO": "mock"}).to_string()
}

pub fn unauthorized() -> String {
    json!({"TYPE": "401", "MESSAGE": "UNAUTHORIZED", "INFO": "bad api key"}).to_string()
}
