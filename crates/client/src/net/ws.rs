use std::io;

use futures::{SinkExt, StreamExt};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use rally::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, MAX_MESSAGE_SIZE, Transport, TransportError, TransportEvent,
};

enum Command {
    Send(String),
    Close(u16, String),
}

/// WebSocket transport. Socket I/O runs on a private runtime; the frame loop
/// only ever touches the channels.
pub struct WsTransport {
    runtime: Runtime,
    commands: Option<UnboundedSender<Command>>,
    events: Option<UnboundedReceiver<TransportEvent>>,
}

impl WsTransport {
    pub fn new() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("rally-ws")
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            commands: None,
            events: None,
        })
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &str) -> Result<(), TransportError> {
        if self.commands.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(TransportError::AlreadyOpen);
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidEndpoint(url.to_string()));
        }

        // Fresh channels per session so late events from an old socket never leak in.
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.commands = Some(command_tx);
        self.events = Some(event_rx);

        self.runtime
            .spawn(run_session(url.to_string(), command_rx, event_tx));
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        let Some(commands) = &self.commands else {
            return Err(TransportError::NotOpen);
        };
        commands
            .send(Command::Send(text))
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&mut self, code: u16, reason: &str) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Close(code, reason.to_string()));
        }
        self.events = None;
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        if let Some(rx) = &mut self.events {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close(CLOSE_NORMAL, "client shutdown");
    }
}

async fn run_session(
    url: String,
    mut commands: UnboundedReceiver<Command>,
    events: UnboundedSender<TransportEvent>,
) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            log::warn!("WebSocket connect failed: {}", e);
            let _ = events.send(TransportEvent::Closed {
                code: CLOSE_ABNORMAL,
                reason: e.to_string(),
            });
            return;
        }
    };
    let _ = events.send(TransportEvent::Opened);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close(code, reason)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    break;
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > MAX_MESSAGE_SIZE {
                        log::warn!("Dropping oversized frame ({} bytes)", text.len());
                        continue;
                    }
                    let _ = events.send(TransportEvent::Message(text.as_str().to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_string()))
                        .unwrap_or((CLOSE_NORMAL, String::new()));
                    let _ = events.send(TransportEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".to_string(),
                    });
                    break;
                }
            },
        }
    }
}
