use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use connectors_common::ConnectorError;
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info, warn};
use market_state::{BookSynchronizer, MarketStore};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::{Error as WsError, Message};

use crate::channels::ChannelRegistry;
use crate::config::StreamConfig;
use crate::dispatch::{Dispatch, FeedDispatcher};
use crate::heartbeat::HeartbeatTimer;
use crate::protocol::SubscribeRequest;

/// Opens the transport. Split out so the lifecycle can run over an in-memory socket.
pub trait Connector: Send + Sync {
    type Socket: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Socket, ConnectorError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Socket, ConnectorError>> + Send {
        let url = url.to_string();
        async move {
            let (ws, _) = connect_async(url.as_str())
                .await
                .map_err(|e| ConnectorError::Network(format!("{url}: {e}")))?;
            Ok(ws)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Cloneable view of the connection state for other tasks.
#[derive(Debug, Clone, Default)]
pub struct StreamStatus(Arc<AtomicU8>);

impl StreamStatus {
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn is_online(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// The open transport and its liveness timer. They go away together.
struct Session<S> {
    socket: S,
    heartbeat: HeartbeatTimer,
}

enum Wake {
    Message(Option<Result<Message, WsError>>),
    HeartbeatTimeout,
}

/// Connection manager for the Bitfinex public feed.
///
/// Owns the transport, subscribes every tracked symbol to `ticker` and `book`, feeds inbound
/// frames through a [`FeedDispatcher`] and reconnects on heartbeat timeout, transport error or
/// remote close. Only failing to establish a connection `max_connection_retries` times in a row
/// is fatal.
pub struct BitfinexStream<C: Connector = WsConnector> {
    config: StreamConfig,
    connector: C,
    dispatcher: FeedDispatcher,
    session: Option<Session<C::Socket>>,
    status: StreamStatus,
}

impl BitfinexStream<WsConnector> {
    pub fn new(config: StreamConfig, store: Arc<MarketStore>) -> Result<Self, ConnectorError> {
        Self::with_connector(config, store, WsConnector)
    }
}

impl<C: Connector> BitfinexStream<C> {
    pub fn with_connector(
        config: StreamConfig,
        store: Arc<MarketStore>,
        connector: C,
    ) -> Result<Self, ConnectorError> {
        config.validate()?;
        for symbol in &config.symbols {
            if store.symbols().id(symbol).is_none() {
                return Err(ConnectorError::Config(format!(
                    "symbol {symbol} is not tracked by the market store"
                )));
            }
        }
        Ok(BitfinexStream {
            config,
            connector,
            dispatcher: FeedDispatcher::new(BookSynchronizer::new(store)),
            session: None,
            status: StreamStatus::default(),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn status(&self) -> StreamStatus {
        self.status.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        self.dispatcher.synchronizer().store()
    }

    pub fn channels(&self) -> &ChannelRegistry {
        self.dispatcher.channels()
    }

    /// Establish the transport, retrying with a fixed delay. No-op while already open.
    pub async fn connect(&mut self) -> Result<(), ConnectorError> {
        if self.is_online() {
            warn!("connect called while already open");
            return Ok(());
        }

        let max = self.config.max_connection_retries;
        let mut attempts = 0;
        loop {
            self.dispatcher.reset_channels();
            self.status.set(ConnectionState::Connecting);
            attempts += 1;
            info!("connecting to {} (attempt {}/{})", self.config.url, attempts, max);

            let reason = match self.connector.connect(&self.config.url).await {
                Ok(socket) => match self.on_open(socket).await {
                    Ok(()) => return Ok(()),
                    Err(e) => format!("subscribe failed: {e}"),
                },
                Err(e) => e.to_string(),
            };

            self.status.set(ConnectionState::Disconnected);
            if attempts >= max {
                error!("giving up on {} after {} attempts: {}", self.config.url, attempts, reason);
                return Err(ConnectorError::RetriesExhausted {
                    url: self.config.url.clone(),
                    attempts,
                    reason,
                });
            }
            warn!("connection attempt {} failed: {}; retrying in {:?}", attempts, reason, self.config.retry_delay());
            sleep(self.config.retry_delay()).await;
        }
    }

    async fn on_open(&mut self, mut socket: C::Socket) -> Result<(), ConnectorError> {
        let mut requests = Vec::with_capacity(self.config.required_subscriptions());
        for symbol in &self.config.symbols {
            requests.push(SubscribeRequest::ticker(symbol.as_str()));
            requests.push(SubscribeRequest::book(
                symbol.as_str(),
                self.config.price_precision,
                self.config.price_points,
            ));
        }
        for request in &requests {
            socket
                .send(Message::Text(request.to_json()?))
                .await
                .map_err(|e| ConnectorError::Network(e.to_string()))?;
        }

        let mut heartbeat = HeartbeatTimer::new(self.config.heartbeat_period());
        heartbeat.arm();
        self.session = Some(Session { socket, heartbeat });
        self.status.set(ConnectionState::Open);
        info!("connected, subscribed {} channels", requests.len());
        Ok(())
    }

    /// Tear the connection down. Warns and does nothing unless open.
    pub async fn close(&mut self) {
        if !self.is_online() {
            warn!("close called while {:?}", self.state());
            return;
        }
        if let Some(mut session) = self.session.take() {
            session.heartbeat.cancel();
            match timeout(self.config.retry_delay(), session.socket.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("error closing socket: {}", e),
                Err(_) => warn!(
                    "socket close did not finish within {:?}; dropping it",
                    self.config.retry_delay()
                ),
            }
        }
        self.dispatcher.reset_channels();
        self.status.set(ConnectionState::Disconnected);
        info!("connection closed");
    }

    pub async fn reconnect(&mut self) -> Result<(), ConnectorError> {
        self.close().await;
        self.connect().await
    }

    /// Drive the feed until the retry budget is exhausted. Connects first if needed.
    pub async fn run(&mut self) -> Result<(), ConnectorError> {
        loop {
            let Some(session) = self.session.as_mut() else {
                self.connect().await?;
                continue;
            };

            let wake = tokio::select! {
                msg = session.socket.next() => Wake::Message(msg),
                _ = session.heartbeat.expired() => Wake::HeartbeatTimeout,
            };

            match wake {
                Wake::Message(Some(Ok(msg))) => self.on_message(msg).await?,
                Wake::Message(Some(Err(e))) => {
                    warn!("transport error: {}; reconnecting", e);
                    self.reconnect().await?;
                }
                Wake::Message(None) => {
                    warn!("stream ended; reconnecting");
                    self.reconnect().await?;
                }
                Wake::HeartbeatTimeout => {
                    warn!(
                        "no heartbeat for {:?}; forcing reconnect",
                        self.config.heartbeat_period()
                    );
                    self.reconnect().await?;
                }
            }
        }
    }

    async fn on_message(&mut self, msg: Message) -> Result<(), ConnectorError> {
        match msg {
            Message::Text(text) => self.on_text(&text),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => self.on_text(&text),
                Err(e) => warn!("dropping non utf-8 binary frame: {}", e),
            },
            Message::Ping(payload) => {
                let sent = match self.session.as_mut() {
                    Some(session) => session.socket.send(Message::Pong(payload)).await,
                    None => Ok(()),
                };
                if let Err(e) = sent {
                    warn!("failed to answer ping: {}; reconnecting", e);
                    self.reconnect().await?;
                }
            }
            Message::Close(frame) => {
                info!("server closed the connection: {:?}", frame);
                self.reconnect().await?;
            }
            Message::Pong(_) | Message::Frame(_) => {}
        }
        Ok(())
    }

    fn on_text(&mut self, text: &str) {
        if self.dispatcher.handle_text(text) == Dispatch::Heartbeat {
            if let Some(session) = self.session.as_mut() {
                session.heartbeat.reset();
            }
        }
    }
}
