use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Compact handle for a tracked symbol. Indexes per-symbol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(u16);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Symbols interned once at configuration time. Ids are dense, starting at zero.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    ids: HashMap<String, SymbolId>,
}

impl SymbolTable {
    /// Most symbols a table can intern.
    pub const CAPACITY: usize = u16::MAX as usize + 1;

    /// Duplicates collapse onto the first occurrence. Symbols past [`Self::CAPACITY`] are not
    /// interned, so `id` returns `None` for them.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = SymbolTable::default();
        for symbol in symbols {
            let symbol = symbol.into();
            if table.ids.contains_key(&symbol) {
                continue;
            }
            let Ok(raw) = u16::try_from(table.names.len()) else {
                break;
            };
            let id = SymbolId(raw);
            table.ids.insert(symbol.clone(), id);
            table.names.push(symbol);
        }
        table
    }

    pub fn id(&self, symbol: &str) -> Option<SymbolId> {
        self.ids.get(symbol).copied()
    }

    pub fn name(&self, id: SymbolId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| Some((SymbolId(u16::try_from(i).ok()?), name.as_str())))
    }
}
