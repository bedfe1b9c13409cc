//! Bitfinex WebSocket v2 connector.
//!
//! [`BitfinexStream`] keeps a [`market_state::MarketStore`] in sync with the public `book` and
//! `ticker` channels of every configured symbol.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod heartbeat;
pub mod protocol;
pub mod ws;

#[cfg(test)]
mod testing;

pub use channels::{ChannelBinding, ChannelRegistry};
pub use config::{BookLength, PricePrecision, StreamConfig};
pub use dispatch::{Dispatch, FeedDispatcher};
pub use heartbeat::HeartbeatTimer;
pub use protocol::{Channel, ControlEvent, Frame, FrameError, SubscribeRequest};
pub use ws::{BitfinexStream, ConnectionState, Connector, StreamStatus, WsConnector};
