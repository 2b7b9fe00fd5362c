//! In-memory transport for tests and offline runs.
//!
//! [`loopback_pair`] returns the client half, which implements [`Transport`],
//! and a [`LoopbackServer`] handle that plays the authoritative side: it
//! accepts or refuses open requests, pushes server messages and reads what
//! the client sent. Both halves share one single-threaded queue.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::protocol::{
    ClientMessage, ServerMessage, decode_client_message, encode_server_message,
};
use super::transport::{CLOSE_ABNORMAL, Transport, TransportError, TransportEvent};

#[derive(Debug, Default)]
struct Shared {
    auto_accept: bool,
    pending_url: Option<String>,
    open: bool,
    open_attempts: usize,
    urls: Vec<String>,
    to_client: VecDeque<TransportEvent>,
    to_server: VecDeque<String>,
    close_codes: Vec<u16>,
}

pub struct LoopbackTransport {
    shared: Rc<RefCell<Shared>>,
}

pub struct LoopbackServer {
    shared: Rc<RefCell<Shared>>,
}

pub fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let shared = Rc::new(RefCell::new(Shared::default()));
    (
        LoopbackTransport {
            shared: Rc::clone(&shared),
        },
        LoopbackServer { shared },
    )
}

impl Transport for LoopbackTransport {
    fn open(&mut self, url: &str) -> Result<(), TransportError> {
        let mut shared = self.shared.borrow_mut();
        if shared.open || shared.pending_url.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        shared.open_attempts += 1;
        shared.urls.push(url.to_string());

        if shared.auto_accept {
            shared.open = true;
            shared.to_client.push_back(TransportEvent::Opened);
        } else {
            shared.pending_url = Some(url.to_string());
        }
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        let mut shared = self.shared.borrow_mut();
        if !shared.open {
            return Err(TransportError::NotOpen);
        }
        shared.to_server.push_back(text);
        Ok(())
    }

    fn close(&mut self, code: u16, _reason: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.open = false;
        shared.pending_url = None;
        shared.close_codes.push(code);
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.shared.borrow_mut().to_client.drain(..).collect()
    }
}

impl LoopbackServer {
    /// Accept every future open request immediately.
    pub fn set_auto_accept(&self, auto_accept: bool) {
        self.shared.borrow_mut().auto_accept = auto_accept;
    }

    /// Completes a pending open request. Returns false if none was pending.
    pub fn accept(&self) -> bool {
        let mut shared = self.shared.borrow_mut();
        if shared.pending_url.take().is_none() {
            return false;
        }
        shared.open = true;
        shared.to_client.push_back(TransportEvent::Opened);
        true
    }

    /// Fails a pending open request the way a refused socket would.
    pub fn refuse(&self, reason: &str) -> bool {
        let mut shared = self.shared.borrow_mut();
        if shared.pending_url.take().is_none() {
            return false;
        }
        shared.to_client.push_back(TransportEvent::Closed {
            code: CLOSE_ABNORMAL,
            reason: reason.to_string(),
        });
        true
    }

    /// Severs an open connection from the server side.
    pub fn drop_connection(&self, code: u16, reason: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.open = false;
        shared.pending_url = None;
        shared.to_client.push_back(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    pub fn push(&self, message: &ServerMessage) {
        match encode_server_message(message) {
            Ok(text) => self.push_raw(text),
            Err(e) => log::error!("Failed to encode loopback message: {}", e),
        }
    }

    pub fn push_raw(&self, text: impl Into<String>) {
        self.shared
            .borrow_mut()
            .to_client
            .push_back(TransportEvent::Message(text.into()));
    }

    pub fn push_error(&self, error: &str) {
        self.shared
            .borrow_mut()
            .to_client
            .push_back(TransportEvent::Error(error.to_string()));
    }

    /// Drains and decodes everything the client sent so far.
    pub fn received(&self) -> Vec<ClientMessage> {
        self.received_raw()
            .iter()
            .filter_map(|text| decode_client_message(text).ok())
            .collect()
    }

    pub fn received_raw(&self) -> Vec<String> {
        self.shared.borrow_mut().to_server.drain(..).collect()
    }

    pub fn is_open(&self) -> bool {
        self.shared.borrow().open
    }

    pub fn has_pending_open(&self) -> bool {
        self.shared.borrow().pending_url.is_some()
    }

    pub fn open_attempts(&self) -> usize {
        self.shared.borrow().open_attempts
    }

    pub fn last_url(&self) -> Option<String> {
        self.shared.borrow().urls.last().cloned()
    }

    pub fn close_codes(&self) -> Vec<u16> {
        self.shared.borrow().close_codes.clone()
    }
}
