//! The arena's geography: zones with bidirectional connections and the
//! item troves scattered through them.

use crate::error::LoadError;
use crate::item::Item;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a zone in the map. Zone 0 is always the starting zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub usize);

/// Index of a trove in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TroveId(pub usize);

/// One named region of the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    name: String,
    connections: Vec<ZoneId>,
    flavor: Option<String>,
}

impl Zone {
    pub fn new(name: impl Into<String>, flavor: Option<String>) -> Self {
        Self {
            name: name.into(),
            connections: Vec::new(),
            flavor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connections(&self) -> &[ZoneId] {
        &self.connections
    }

    pub fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One entry in a trove's generation pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PoolEntry {
    /// `=Name`: exactly the named catalog item.
    Exact(String),
    /// A list of tags; any catalog item carrying all of them qualifies.
    Tags(Vec<String>),
}

/// A stash of items somewhere in the arena. The pool describes what *can*
/// generate; `restock` samples `count` concrete items (with replacement)
/// at the start of each game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trove {
    name: String,
    count: u32,
    pool: Vec<PoolEntry>,
    /// Items every game starts with, before the random `count` are drawn.
    has: Vec<String>,
    /// Catalog templates matching the pool, resolved once at load.
    templates: Vec<Item>,
    /// Templates for the guaranteed `has` items, resolved once at load.
    guaranteed: Vec<Item>,
    stock: Vec<Item>,
}

impl Trove {
    pub fn new(name: impl Into<String>, count: u32, pool: Vec<PoolEntry>, has: Vec<String>) -> Self {
        Self {
            name: name.into(),
            count,
            pool,
            has,
            templates: Vec::new(),
            guaranteed: Vec::new(),
            stock: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve the pool and guaranteed names against the item catalog.
    /// Must run once before any game starts.
    pub fn resolve(&mut self, catalog: &[Item]) -> Result<(), LoadError> {
        self.templates.clear();
        for entry in &self.pool {
            match entry {
                PoolEntry::Exact(name) => {
                    let item = catalog.iter().find(|i| i.name() == name.as_str()).ok_or_else(|| {
                        LoadError::BadTrove {
                            trove: self.name.clone(),
                            problem: format!("pool names unknown item `{name}`"),
                        }
                    })?;
                    self.templates.push(item.clone());
                }
                PoolEntry::Tags(tags) => {
                    self.templates
                        .extend(catalog.iter().filter(|i| i.has_all_tags(tags)).cloned());
                }
            }
        }
        if self.count > 0 && self.templates.is_empty() {
            return Err(LoadError::BadTrove {
                trove: self.name.clone(),
                problem: "pool matches no catalog items".to_string(),
            });
        }

        self.guaranteed.clear();
        for name in &self.has {
            let item = catalog.iter().find(|i| i.name() == name.as_str()).ok_or_else(|| {
                LoadError::BadTrove {
                    trove: self.name.clone(),
                    problem: format!("guaranteed list names unknown item `{name}`"),
                }
            })?;
            self.guaranteed.push(item.clone());
        }
        Ok(())
    }

    /// Refill the stock for a new game: the guaranteed items plus `count`
    /// draws from the pool, sampled with replacement.
    pub fn restock(&mut self, rng: &mut dyn RngCore) {
        self.stock.clear();
        self.stock.extend(self.guaranteed.iter().cloned());
        for _ in 0..self.count {
            if let Some(template) = self.templates.choose(rng) {
                self.stock.push(template.clone());
            }
        }
    }

    pub fn has_items(&self) -> bool {
        !self.stock.is_empty()
    }

    pub fn stock(&self) -> &[Item] {
        &self.stock
    }

    /// Pick a random stocked item, skipping the given indices. Returns the
    /// index and a copy; nothing is removed until [`Trove::commit`].
    pub fn peek(&self, skip: &[usize], rng: &mut dyn RngCore) -> Option<(usize, Item)> {
        let candidates: Vec<usize> = (0..self.stock.len()).filter(|i| !skip.contains(i)).collect();
        let idx = *candidates.choose(rng)?;
        Some((idx, self.stock[idx].clone()))
    }

    /// Remove a previously peeked item from stock.
    pub fn commit(&mut self, idx: usize) -> Option<Item> {
        if idx < self.stock.len() {
            Some(self.stock.remove(idx))
        } else {
            None
        }
    }
}

/// The arena map: every zone and every trove.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Map {
    zones: Vec<Zone>,
    troves: Vec<Trove>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_zone(&mut self, zone: Zone) -> ZoneId {
        self.zones.push(zone);
        ZoneId(self.zones.len() - 1)
    }

    /// Connect two zones in both directions.
    pub fn connect(&mut self, a: ZoneId, b: ZoneId) {
        if !self.zones[a.0].connections.contains(&b) {
            self.zones[a.0].connections.push(b);
        }
        if !self.zones[b.0].connections.contains(&a) {
            self.zones[b.0].connections.push(a);
        }
    }

    pub fn zone(&self, id: ZoneId) -> &Zone {
        &self.zones[id.0]
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_by_name(&self, name: &str) -> Option<ZoneId> {
        self.zones.iter().position(|z| z.name == name).map(ZoneId)
    }

    /// Where every game begins.
    pub fn start_zone(&self) -> ZoneId {
        ZoneId(0)
    }

    pub fn add_trove(&mut self, trove: Trove) -> TroveId {
        self.troves.push(trove);
        TroveId(self.troves.len() - 1)
    }

    pub fn trove(&self, id: TroveId) -> &Trove {
        &self.troves[id.0]
    }

    pub fn trove_mut(&mut self, id: TroveId) -> &mut Trove {
        &mut self.troves[id.0]
    }

    pub fn trove_by_name(&self, name: &str) -> Option<TroveId> {
        self.troves.iter().position(|t| t.name == name).map(TroveId)
    }

    /// Resolve every trove's pool against the item catalog.
    pub fn resolve_troves(&mut self, catalog: &[Item]) -> Result<(), LoadError> {
        for trove in &mut self.troves {
            trove.resolve(catalog)?;
        }
        Ok(())
    }

    /// Refill every trove for a new game.
    pub fn restock_troves(&mut self, rng: &mut dyn RngCore) {
        for trove in &mut self.troves {
            trove.restock(rng);
        }
    }
}
