//! Event rule engine for a multi-actor survival game.
//!
//! This crate provides:
//! - A small rule DSL of checks (requirements) and effects (results)
//!   with type-checked arguments and load-time referential validation
//! - Weighted random event selection with nested sub-event cascades
//! - The entity model: characters, items, a zone map, and loot troves
//! - A content catalog that assembles games from selected file subsets
//!
//! # Quick Start
//!
//! ```ignore
//! use arena_core::{Catalog, GameSettings, RoundStart, Turn};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut catalog = Catalog::new();
//!     catalog.add_characters("cast", characters)?;
//!     catalog.add_items("basics", items)?;
//!     catalog.add_map("arena", &map)?;
//!     catalog.add_events("daily", events)?;
//!
//!     let mut game = catalog.load_game(&GameSettings {
//!         characters: vec!["ALL".into()],
//!         items: vec!["ALL".into()],
//!         map: "arena".into(),
//!         events: vec!["ALL".into()],
//!     })?;
//!
//!     game.start();
//!     while game.round() == RoundStart::Started {
//!         while let Turn::Acted(Some(outcome)) = game.next()? {
//!             for line in &outcome.texts {
//!                 println!("{line}");
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod character;
pub mod check;
pub mod effect;
pub mod error;
pub mod event;
pub mod game;
pub mod item;
pub mod map;
pub mod part;
pub mod state;
pub mod text;
pub mod valids;

// Primary public API
pub use catalog::{Catalog, GameSettings, RawCharacter, RawEvent, RawEventEntry, RawMap, RawTrove};
pub use character::{AllianceId, CharId, Character, Pronouns, Roster, Tag};
pub use error::{EngineError, LoadError, PartError};
pub use event::{Event, Rarity};
pub use game::{Game, RoundStart, TriggerByName, Turn};
pub use item::{Item, ItemInstanceId};
pub use map::{Map, Trove, TroveId, Zone, ZoneId};
pub use state::{Outcome, State};
pub use text::{EnglishInflect, Inflect};
