//! In-memory transport for driving the connection lifecycle without a network.

use std::collections::VecDeque;
use std::future::{ready, Future};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use connectors_common::ConnectorError;
use futures::{Sink, Stream};
use tokio::sync::mpsc;
use tungstenite::{Error as WsError, Message};

use crate::ws::Connector;

pub struct FakeSocket {
    incoming: mpsc::UnboundedReceiver<Result<Message, WsError>>,
    sent: Arc<Mutex<Vec<Message>>>,
    stall_close: Arc<AtomicBool>,
}

impl Stream for FakeSocket {
    type Item = Result<Message, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_recv(cx)
    }
}

impl Sink<Message> for FakeSocket {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), WsError> {
        self.sent.lock().unwrap().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        if self.stall_close.load(Ordering::SeqCst) {
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }
}

/// The remote end of a [`FakeSocket`].
pub struct FakeServer {
    tx: mpsc::UnboundedSender<Result<Message, WsError>>,
    sent: Arc<Mutex<Vec<Message>>>,
    stall_close: Arc<AtomicBool>,
}

impl FakeServer {
    pub fn pair() -> (FakeServer, FakeSocket) {
        let (tx, incoming) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stall_close = Arc::new(AtomicBool::new(false));
        (
            FakeServer { tx, sent: sent.clone(), stall_close: stall_close.clone() },
            FakeSocket { incoming, sent, stall_close },
        )
    }

    /// Make the client's close handshake hang forever.
    pub fn stall_close(&self) {
        self.stall_close.store(true, Ordering::SeqCst);
    }

    pub fn send(&self, msg: Message) {
        let _ = self.tx.send(Ok(msg));
    }

    pub fn send_text(&self, text: &str) {
        self.send(Message::Text(text.to_string()));
    }

    pub fn fail(&self) {
        let _ = self.tx.send(Err(WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))));
    }

    /// Everything the client wrote so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                Message::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MockConnector {
    queue: Arc<Mutex<VecDeque<Result<FakeSocket, String>>>>,
    attempts: Arc<AtomicU32>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful connection and return its server end.
    pub fn push_socket(&self) -> FakeServer {
        let (server, socket) = FakeServer::pair();
        self.queue.lock().unwrap().push_back(Ok(socket));
        server
    }

    pub fn push_failure(&self, reason: &str) {
        self.queue.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Socket = FakeSocket;

    fn connect(&self, url: &str) -> impl Future<Output = Result<FakeSocket, ConnectorError>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = match self.queue.lock().unwrap().pop_front() {
            Some(Ok(socket)) => Ok(socket),
            Some(Err(reason)) => Err(ConnectorError::Network(reason)),
            None => Err(ConnectorError::Network(format!("{url}: connection refused"))),
        };
        ready(next)
    }
}
