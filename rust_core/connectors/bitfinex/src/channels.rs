use std::collections::HashMap;

use connectors_common::SymbolId;

use crate::protocol::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    pub channel: Channel,
    pub symbol: SymbolId,
}

/// Server-assigned channel ids for the current connection. Cleared whenever the
/// connection goes away.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    bindings: HashMap<u64, ChannelBinding>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the binding this one replaced, if the id was reused.
    pub fn bind(&mut self, chan_id: u64, binding: ChannelBinding) -> Option<ChannelBinding> {
        self.bindings.insert(chan_id, binding)
    }

    pub fn unbind(&mut self, chan_id: u64) -> Option<ChannelBinding> {
        self.bindings.remove(&chan_id)
    }

    pub fn resolve(&self, chan_id: u64) -> Option<ChannelBinding> {
        self.bindings.get(&chan_id).copied()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors_common::SymbolTable;

    #[test]
    fn bind_resolve_unbind() {
        let symbols = SymbolTable::new(["tBTCUSD"]);
        let btc = symbols.id("tBTCUSD").unwrap();
        let mut reg = ChannelRegistry::new();
        assert!(reg.bind(7, ChannelBinding { channel: Channel::Book, symbol: btc }).is_none());
        assert_eq!(reg.resolve(7).map(|b| b.channel), Some(Channel::Book));
        assert!(reg.resolve(8).is_none());

        let old = reg.bind(7, ChannelBinding { channel: Channel::Ticker, symbol: btc });
        assert_eq!(old.map(|b| b.channel), Some(Channel::Book));

        assert!(reg.unbind(7).is_some());
        assert!(reg.unbind(7).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let btc = SymbolTable::new(["tBTCUSD"]).id("tBTCUSD").unwrap();
        let mut reg = ChannelRegistry::new();
        reg.bind(1, ChannelBinding { channel: Channel::Book, symbol: btc });
        reg.bind(2, ChannelBinding { channel: Channel::Ticker, symbol: btc });
        assert_eq!(reg.len(), 2);
        reg.clear();
        assert!(reg.is_empty());
    }
}
