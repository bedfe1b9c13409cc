//! Bitfinex WebSocket v2 frames.
//!
//! Channel traffic arrives as arrays (`[chanId, payload]`, `[chanId, "hb"]`), control traffic as
//! objects tagged by `event`.

use connectors_common::{BookRecord, ConnectorError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{BookLength, PricePrecision};

pub const HEARTBEAT: &str = "hb";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl From<FrameError> for ConnectorError {
    fn from(e: FrameError) -> Self {
        ConnectorError::Parse(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ticker,
    Book,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeRequest {
    event: &'static str,
    pub channel: Channel,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prec: Option<PricePrecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<BookLength>,
}

impl SubscribeRequest {
    pub fn ticker(symbol: impl Into<String>) -> Self {
        SubscribeRequest {
            event: "subscribe",
            channel: Channel::Ticker,
            symbol: symbol.into(),
            prec: None,
            len: None,
        }
    }

    pub fn book(symbol: impl Into<String>, prec: PricePrecision, len: BookLength) -> Self {
        SubscribeRequest {
            event: "subscribe",
            channel: Channel::Book,
            symbol: symbol.into(),
            prec: Some(prec),
            len: Some(len),
        }
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ControlEvent {
    Info {
        #[serde(default)]
        version: Option<u32>,
        #[serde(default)]
        code: Option<u32>,
    },
    Subscribed {
        channel: Channel,
        #[serde(rename = "chanId")]
        chan_id: u64,
        #[serde(default)]
        symbol: Option<String>,
    },
    Unsubscribed {
        #[serde(rename = "chanId")]
        chan_id: u64,
    },
    Error {
        #[serde(default)]
        code: Option<u32>,
        #[serde(default)]
        msg: String,
    },
    #[serde(other)]
    Unhandled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Heartbeat { chan_id: u64 },
    /// Any other string in payload position, e.g. `"cs"` checksums.
    Marker { chan_id: u64, marker: String },
    Data { chan_id: u64, payload: Value },
    Event(ControlEvent),
}

pub fn parse_frame(text: &str) -> Result<Frame, FrameError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(Frame::Event(serde_json::from_value(Value::Object(map))?)),
        Value::Array(mut items) => {
            let chan_id = items
                .first()
                .and_then(Value::as_u64)
                .ok_or_else(|| FrameError::Malformed("missing channel id".into()))?;
            if items.len() < 2 {
                return Err(FrameError::Malformed(format!("no payload on channel {chan_id}")));
            }
            match items.swap_remove(1) {
                Value::String(s) if s == HEARTBEAT => Ok(Frame::Heartbeat { chan_id }),
                Value::String(marker) => Ok(Frame::Marker { chan_id, marker }),
                payload @ Value::Array(_) => Ok(Frame::Data { chan_id, payload }),
                other => Err(FrameError::Malformed(format!(
                    "unexpected payload {other} on channel {chan_id}"
                ))),
            }
        }
        other => Err(FrameError::Malformed(format!("unexpected frame {other}"))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookPayload {
    Snapshot(Vec<BookRecord>),
    Update(BookRecord),
}

/// A list of triples is a snapshot, a single triple an update.
pub fn parse_book_payload(payload: Value) -> Result<BookPayload, FrameError> {
    let nested = match payload.as_array() {
        Some(items) => items.is_empty() || items[0].is_array(),
        None => return Err(FrameError::Malformed(format!("book payload {payload}"))),
    };
    if nested {
        Ok(BookPayload::Snapshot(serde_json::from_value(payload)?))
    } else {
        Ok(BookPayload::Update(serde_json::from_value(payload)?))
    }
}

pub fn parse_ticker_payload(payload: Value) -> Result<[f64; 10], FrameError> {
    Ok(serde_json::from_value(payload)?)
}

/// `btcusd` → `tBTCUSD`. Already-prefixed symbols pass through.
pub fn trading_symbol(pair: &str) -> String {
    let mut chars = pair.chars();
    match (chars.next(), chars.next()) {
        (Some('t'), Some(c)) if c.is_ascii_uppercase() => pair.to_string(),
        _ => format!("t{}", pair.to_ascii_uppercase()),
    }
}
