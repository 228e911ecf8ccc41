//! Load-time validation context for one event's rule DSL.
//!
//! A `Valids` accumulates the shorthands an event tree declares and checks
//! every reference a check, effect, or text template makes against the
//! loaded item catalog and map. All validation happens here so the parse
//! tables in `check.rs` and `effect.rs` stay declarative.

use crate::error::PartError;
use crate::item::Item;
use crate::map::{Map, TroveId, ZoneId};
use crate::part::CmpOp;

pub struct Valids<'a> {
    char_shorts: Vec<String>,
    item_shorts: Vec<String>,
    tag_names: Vec<String>,
    items: &'a [Item],
    map: &'a Map,
}

impl<'a> Valids<'a> {
    pub fn new(items: &'a [Item], map: &'a Map) -> Self {
        Self {
            char_shorts: Vec::new(),
            item_shorts: Vec::new(),
            tag_names: Vec::new(),
            items,
            map,
        }
    }

    // ------------------------------------------------------------------
    // Character shorthands
    // ------------------------------------------------------------------

    /// Record a character shorthand. Returns false when it was already
    /// declared; the caller decides whether that is a redeclaration by a
    /// sub-event (fine) or a duplicate within one event (an error).
    pub fn declare_char_short(&mut self, short: &str) -> bool {
        if self.has_char_short(short) {
            return false;
        }
        self.char_shorts.push(short.to_string());
        true
    }

    pub fn has_char_short(&self, short: &str) -> bool {
        self.char_shorts.iter().any(|s| s == short)
    }

    /// The first shorthand declared, i.e. the character the event happens to.
    pub fn main_short(&self) -> Option<&str> {
        self.char_shorts.first().map(String::as_str)
    }

    /// Validate a reference to an already-declared character shorthand.
    pub fn char_short(&self, token: &str) -> Result<String, PartError> {
        if self.has_char_short(token) {
            Ok(token.to_string())
        } else {
            Err(PartError::Invalid {
                expected: "character shorthand",
                token: token.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Item shorthands
    // ------------------------------------------------------------------

    /// Record an item shorthand. Duplicates are always an error: two
    /// binding checks would silently fight over one name.
    pub fn declare_item_short(&mut self, short: &str) -> Result<(), PartError> {
        if self.has_item_short(short) {
            return Err(PartError::DuplicateShort(short.to_string()));
        }
        self.item_shorts.push(short.to_string());
        Ok(())
    }

    pub fn has_item_short(&self, short: &str) -> bool {
        self.item_shorts.iter().any(|s| s == short)
    }

    pub fn item_short(&self, token: &str) -> Result<String, PartError> {
        if self.has_item_short(token) {
            Ok(token.to_string())
        } else {
            Err(PartError::Invalid {
                expected: "item shorthand",
                token: token.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Tags, statuses
    // ------------------------------------------------------------------

    /// Record a tag name introduced by a tag effect or presence check.
    pub fn note_tag_name(&mut self, name: &str) {
        if !self.tag_names.iter().any(|t| t == name) {
            self.tag_names.push(name.to_string());
        }
    }

    /// Validate a tag name a removal references. `running` is built in;
    /// everything else must have been introduced earlier in the event tree.
    pub fn known_tag_name(&self, token: &str) -> Result<String, PartError> {
        if token == "running" || self.tag_names.iter().any(|t| t == token) {
            Ok(token.to_string())
        } else {
            Err(PartError::Invalid {
                expected: "tag name",
                token: token.to_string(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Catalog lookups
    // ------------------------------------------------------------------

    /// Validate an item tag against the catalog. The wildcard tokens
    /// `ANY` and `SECRET` are always valid.
    pub fn item_tag(&self, token: &str) -> Result<String, PartError> {
        if token == "ANY"
            || token == "SECRET"
            || self
                .items
                .iter()
                .any(|i| i.tags().iter().any(|t| t == token))
        {
            Ok(token.to_string())
        } else {
            Err(PartError::Invalid {
                expected: "item tag",
                token: token.to_string(),
            })
        }
    }

    pub fn item_name(&self, token: &str) -> Result<String, PartError> {
        if self.items.iter().any(|i| i.name() == token) {
            Ok(token.to_string())
        } else {
            Err(PartError::Invalid {
                expected: "item name",
                token: token.to_string(),
            })
        }
    }

    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name() == name)
    }

    pub fn items_with_tags(&self, tags: &[String]) -> Vec<Item> {
        self.items
            .iter()
            .filter(|i| i.has_all_tags(tags))
            .cloned()
            .collect()
    }

    pub fn zone(&self, token: &str) -> Result<ZoneId, PartError> {
        self.map.zone_by_name(token).ok_or_else(|| PartError::Invalid {
            expected: "zone name",
            token: token.to_string(),
        })
    }

    pub fn trove(&self, token: &str) -> Result<TroveId, PartError> {
        self.map
            .trove_by_name(token)
            .ok_or_else(|| PartError::Invalid {
                expected: "trove name",
                token: token.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    pub fn number(token: &str) -> Result<u32, PartError> {
        token.parse().map_err(|_| PartError::Invalid {
            expected: "number",
            token: token.to_string(),
        })
    }

    pub fn comparison(token: &str) -> Result<CmpOp, PartError> {
        token.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Zone;

    fn fixtures() -> (Vec<Item>, Map) {
        let items = vec![
            Item::new("knife", vec!["weapon".into(), "sharp".into()]),
            Item::new("bread", vec!["food".into()]),
        ];
        let mut map = Map::new();
        map.add_zone(Zone::new("cornucopia", None));
        map.add_zone(Zone::new("forest", None));
        (items, map)
    }

    #[test]
    fn test_char_shorts_declare_and_reference() {
        let (items, map) = fixtures();
        let mut valids = Valids::new(&items, &map);
        assert!(valids.declare_char_short("mc"));
        assert!(!valids.declare_char_short("mc"));
        assert_eq!(valids.main_short(), Some("mc"));
        assert!(valids.char_short("mc").is_ok());
        assert!(valids.char_short("other").is_err());
    }

    #[test]
    fn test_item_shorts_never_duplicate() {
        let (items, map) = fixtures();
        let mut valids = Valids::new(&items, &map);
        valids.declare_item_short("w").unwrap();
        assert!(matches!(
            valids.declare_item_short("w"),
            Err(PartError::DuplicateShort(s)) if s == "w"
        ));
    }

    #[test]
    fn test_tag_names_and_running_builtin() {
        let (items, map) = fixtures();
        let mut valids = Valids::new(&items, &map);
        assert!(valids.known_tag_name("running").is_ok());
        assert!(valids.known_tag_name("wounded").is_err());
        valids.note_tag_name("wounded");
        assert!(valids.known_tag_name("wounded").is_ok());
    }

    #[test]
    fn test_catalog_lookups() {
        let (items, map) = fixtures();
        let valids = Valids::new(&items, &map);
        assert!(valids.item_tag("weapon").is_ok());
        assert!(valids.item_tag("ANY").is_ok());
        assert!(valids.item_tag("vehicle").is_err());
        assert!(valids.item_name("bread").is_ok());
        assert!(valids.item_name("bazooka").is_err());
        assert_eq!(valids.zone("forest").ok(), Some(ZoneId(1)));
        assert!(valids.zone("tundra").is_err());
        assert_eq!(valids.items_with_tags(&["weapon".into()]).len(), 1);
    }

    #[test]
    fn test_scalar_parsers() {
        assert_eq!(Valids::number("12").ok(), Some(12));
        assert!(Valids::number("twelve").is_err());
        assert!(Valids::comparison("<=").is_ok());
    }
}
