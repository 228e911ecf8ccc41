//! Per-candidate match state: the shorthand bindings a check suite builds
//! up while deciding whether an event fits, plus the deferred side effects
//! that only land if the event actually triggers.

use crate::character::CharId;
use crate::item::Item;
use crate::map::TroveId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A read-only snapshot of an event's trigger counters, taken when the
/// top-level event starts matching, before its own trigger is counted.
/// Sub-event limit checks read this snapshot, so a cascade sees the
/// counts from past rounds only and never observes the parent firing
/// it is part of. Per-character counts are keyed by the top-level main
/// character; `limittotal` is the limiter that applies to any suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    per_char: HashMap<usize, u32>,
    total: u32,
}

impl TriggerSnapshot {
    pub fn new(per_char: &HashMap<CharId, u32>) -> Self {
        Self {
            per_char: per_char.iter().map(|(k, v)| (k.0, *v)).collect(),
            total: per_char.values().sum(),
        }
    }

    pub fn for_char(&self, who: CharId) -> u32 {
        self.per_char.get(&who.0).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Everything bound while matching one event against one candidate cast.
///
/// States are cheap to clone; the matcher evaluates each candidate against
/// its own clone and adopts the clone of whichever candidate it picks, so
/// bindings from failed candidates never leak into the chosen one.
#[derive(Debug, Clone, Default)]
pub struct State {
    chars: Vec<(String, CharId)>,
    items: HashMap<String, Item>,
    /// Trove slots reserved by loot checks, removed only on trigger.
    pending_loot: Vec<(TroveId, usize)>,
    triggers: TriggerSnapshot,
}

impl State {
    pub fn new(triggers: TriggerSnapshot) -> Self {
        Self {
            triggers,
            ..Self::default()
        }
    }

    /// The character the event is happening to: the first one bound.
    pub fn main_char(&self) -> Option<CharId> {
        self.chars.first().map(|(_, id)| *id)
    }

    /// Bind a character shorthand. Bindings are set-once; a rebind attempt
    /// means the same suite ran twice for one candidate, which the event
    /// matcher never does.
    pub fn bind_char(&mut self, short: impl Into<String>, id: CharId) {
        let short = short.into();
        if !self.chars.iter().any(|(s, _)| *s == short) {
            self.chars.push((short, id));
        }
    }

    pub fn is_bound(&self, id: CharId) -> bool {
        self.chars.iter().any(|(_, bound)| *bound == id)
    }

    pub fn char_id(&self, short: &str) -> Option<CharId> {
        self.chars
            .iter()
            .find(|(s, _)| s == short)
            .map(|(_, id)| *id)
    }

    pub fn bound_chars(&self) -> impl Iterator<Item = (&str, CharId)> {
        self.chars.iter().map(|(s, id)| (s.as_str(), *id))
    }

    /// Bind an item shorthand. Later binds overwrite: when a sub-event
    /// re-checks a shorthand it rebinds it to whatever matched now.
    pub fn bind_item(&mut self, short: impl Into<String>, item: Item) {
        self.items.insert(short.into(), item);
    }

    pub fn item(&self, short: &str) -> Option<&Item> {
        self.items.get(short)
    }

    pub fn pending_loot(&self) -> &[(TroveId, usize)] {
        &self.pending_loot
    }

    pub fn reserve_loot(&mut self, trove: TroveId, idx: usize) {
        self.pending_loot.push((trove, idx));
    }

    /// Indices already reserved in the given trove.
    pub fn reserved_in(&self, trove: TroveId) -> Vec<usize> {
        self.pending_loot
            .iter()
            .filter(|(t, _)| *t == trove)
            .map(|(_, i)| *i)
            .collect()
    }

    pub fn take_pending_loot(&mut self) -> Vec<(TroveId, usize)> {
        std::mem::take(&mut self.pending_loot)
    }

    pub fn triggers(&self) -> &TriggerSnapshot {
        &self.triggers
    }
}

/// The result of one triggered event: the rendered narration plus the
/// per-character effect lines, ready for the platform layer to display.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub main: Option<CharId>,
    pub texts: Vec<String>,
    pub effects: Vec<(CharId, Vec<String>)>,
}

impl Outcome {
    pub fn push_effects(&mut self, who: CharId, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        match self.effects.iter_mut().find(|(id, _)| *id == who) {
            Some((_, existing)) => existing.extend(lines),
            None => self.effects.push((who, lines)),
        }
    }
}
