use chrono::Utc;
use connectors_common::{SymbolId, Ticker};
use log::{debug, error, info, warn};
use market_state::{BookSynchronizer, RecordOutcome};

use crate::channels::{ChannelBinding, ChannelRegistry};
use crate::protocol::{
    parse_book_payload, parse_frame, parse_ticker_payload, BookPayload, Channel, ControlEvent, Frame,
};

/// What one inbound frame turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Heartbeat,
    Ticker(SymbolId),
    BookSnapshot(SymbolId),
    BookUpdate(SymbolId, RecordOutcome),
    Control,
    /// Understood but not acted on.
    Ignored,
    /// Unparseable, or addressed to a channel we do not know.
    Dropped,
}

/// Routes parsed frames to the channel registry and the book synchronizer.
pub struct FeedDispatcher {
    channels: ChannelRegistry,
    sync: BookSynchronizer,
}

impl FeedDispatcher {
    pub fn new(sync: BookSynchronizer) -> Self {
        FeedDispatcher {
            channels: ChannelRegistry::new(),
            sync,
        }
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn synchronizer(&self) -> &BookSynchronizer {
        &self.sync
    }

    pub fn reset_channels(&mut self) {
        if !self.channels.is_empty() {
            debug!("clearing {} channel bindings", self.channels.len());
        }
        self.channels.clear();
    }

    pub fn handle_text(&mut self, text: &str) -> Dispatch {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                error!("dropping frame: {} ({})", e, text);
                return Dispatch::Dropped;
            }
        };

        match frame {
            Frame::Heartbeat { .. } => Dispatch::Heartbeat,
            Frame::Marker { chan_id, marker } => {
                debug!("ignoring {:?} marker on channel {}", marker, chan_id);
                Dispatch::Ignored
            }
            Frame::Event(event) => self.handle_event(event),
            Frame::Data { chan_id, payload } => {
                let Some(binding) = self.channels.resolve(chan_id) else {
                    warn!("data for unbound channel {}", chan_id);
                    return Dispatch::Dropped;
                };
                match binding.channel {
                    Channel::Ticker => match parse_ticker_payload(payload) {
                        Ok(fields) => {
                            self.sync
                                .apply_ticker(binding.symbol, Ticker::from_fields(fields, Utc::now()));
                            Dispatch::Ticker(binding.symbol)
                        }
                        Err(e) => {
                            error!("bad ticker payload on channel {}: {}", chan_id, e);
                            Dispatch::Dropped
                        }
                    },
                    Channel::Book => match parse_book_payload(payload) {
                        Ok(BookPayload::Snapshot(records)) => {
                            self.sync.apply_snapshot(binding.symbol, &records);
                            Dispatch::BookSnapshot(binding.symbol)
                        }
                        Ok(BookPayload::Update(record)) => {
                            let outcome = self.sync.apply_update(binding.symbol, record);
                            Dispatch::BookUpdate(binding.symbol, outcome)
                        }
                        Err(e) => {
                            error!("bad book payload on channel {}: {}", chan_id, e);
                            Dispatch::Dropped
                        }
                    },
                    Channel::Other => Dispatch::Ignored,
                }
            }
        }
    }

    fn handle_event(&mut self, event: ControlEvent) -> Dispatch {
        match event {
            ControlEvent::Info { version, code } => {
                info!("bitfinex info: version {:?} code {:?}", version, code);
                Dispatch::Control
            }
            ControlEvent::Subscribed { channel, chan_id, symbol } => {
                let symbols = self.sync.store().symbols();
                let Some(id) = symbol.as_deref().and_then(|s| symbols.id(s)) else {
                    warn!("subscribed to untracked symbol {:?} on channel {}", symbol, chan_id);
                    return Dispatch::Ignored;
                };
                if channel == Channel::Other {
                    warn!("subscribed to unsupported channel {}", chan_id);
                    return Dispatch::Ignored;
                }
                info!("channel {} bound to {:?} {}", chan_id, channel, symbols.name(id).unwrap_or_default());
                self.channels.bind(chan_id, ChannelBinding { channel, symbol: id });
                Dispatch::Control
            }
            ControlEvent::Unsubscribed { chan_id } => {
                if self.channels.unbind(chan_id).is_none() {
                    debug!("unsubscribed from unknown channel {}", chan_id);
                }
                Dispatch::Control
            }
            ControlEvent::Error { code, msg } => {
                warn!("bitfinex error {:?}: {}", code, msg);
                Dispatch::Control
            }
            ControlEvent::Unhandled => {
                warn!("unhandled control event");
                Dispatch::Ignored
            }
        }
    }
}
