//! In-process generation backend for integration tests.
//!
//! Binds `127.0.0.1:0`, accepts WebSocket connections one after another and
//! plays one [`Script`] per connection: the first text frame (the request)
//! is captured, the scripted frames are sent, then the connection ends as
//! the script says. Shared by the workspace end-to-end tests.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// How a scripted connection ends after its frames are sent.
#[derive(Debug, Clone)]
pub enum Ending {
    /// Send a close frame with this code and reason.
    Close(u16, &'static str),
    /// Drop the TCP connection without a close frame.
    Drop,
    /// Keep the socket open until the client closes it, echoing its close.
    AwaitClientClose,
    /// Send chunks back to back until the client closes.
    Flood,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub frames: Vec<String>,
    pub ending: Ending,
}

impl Script {
    pub fn new(frames: Vec<Value>, ending: Ending) -> Self {
        Self {
            frames: frames.into_iter().map(|v| v.to_string()).collect(),
            ending,
        }
    }

    /// Frames sent verbatim, for malformed payloads.
    pub fn raw(frames: Vec<&str>, ending: Ending) -> Self {
        Self {
            frames: frames.into_iter().map(str::to_string).collect(),
            ending,
        }
    }
}

pub struct FakeBackend {
    /// WebSocket base URL to hand to `CodegenClient::new`.
    pub url: String,
    /// First frame of every accepted connection, parsed as JSON.
    pub requests: mpsc::UnboundedReceiver<Value>,
}

impl FakeBackend {
    pub async fn spawn(scripts: Vec<Script>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, requests) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for script in scripts {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    continue;
                };

                let first = match ws.next().await {
                    Some(Ok(Message::Text(text))) => text,
                    _ => continue,
                };
                let _ = request_tx.send(serde_json::from_str(&first).unwrap_or(Value::Null));

                for frame in script.frames {
                    if ws.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }

                match script.ending {
                    Ending::Close(code, reason) => {
                        let _ = ws
                            .close(Some(CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            }))
                            .await;
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                    Ending::Drop => drop(ws),
                    Ending::AwaitClientClose => while let Some(Ok(_)) = ws.next().await {},
                    Ending::Flood => {
                        let frame = chunk(0, "x").to_string();
                        let (mut tx, mut rx) = ws.split();
                        loop {
                            tokio::select! {
                                biased;
                                msg = rx.next() => match msg {
                                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                },
                                sent = tx.send(Message::Text(frame.clone())) => {
                                    if sent.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        let _ = tx.close().await;
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            requests,
        }
    }
}

/// A listener that accepts TCP but never answers the WebSocket upgrade.
pub async fn silent_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("ws://{addr}")
}

pub fn chunk(variant_index: usize, value: &str) -> Value {
    serde_json::json!({ "type": "chunk", "value": value, "variantIndex": variant_index })
}

pub fn set_code(variant_index: usize, value: &str) -> Value {
    serde_json::json!({ "type": "setCode", "value": value, "variantIndex": variant_index })
}

pub fn status(variant_index: usize, value: &str) -> Value {
    serde_json::json!({ "type": "status", "value": value, "variantIndex": variant_index })
}

pub fn variant_complete(variant_index: usize) -> Value {
    serde_json::json!({ "type": "variantComplete", "value": "", "variantIndex": variant_index })
}

pub fn variant_error(variant_index: usize, value: &str) -> Value {
    serde_json::json!({ "type": "variantError", "value": value, "variantIndex": variant_index })
}

pub fn variant_count(count: usize) -> Value {
    serde_json::json!({ "type": "variantCount", "value": count.to_string(), "variantIndex": 0 })
}

pub fn credits(balance: i64) -> Value {
    serde_json::json!({ "type": "credits", "value": balance.to_string(), "variantIndex": 0 })
}
