//! Items: immutable catalog templates and the value-like copies characters
//! actually carry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one physical item copy. The catalog's templates all carry
/// [`ItemInstanceId::TEMPLATE`]; a fresh nonzero id is minted whenever a
/// copy enters a character's inventory, so effects can act on the exact
/// instance a check bound rather than "an item with that name".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemInstanceId(pub u64);

impl ItemInstanceId {
    pub const TEMPLATE: ItemInstanceId = ItemInstanceId(0);
}

/// An item: a name plus a set of descriptive tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    name: String,
    tags: Vec<String>,
    instance: ItemInstanceId,
}

impl Item {
    /// Create a catalog template.
    pub fn new(name: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tags,
            instance: ItemInstanceId::TEMPLATE,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn instance(&self) -> ItemInstanceId {
        self.instance
    }

    pub fn is_template(&self) -> bool {
        self.instance == ItemInstanceId::TEMPLATE
    }

    /// Copy this item as a new physical instance with the given id.
    pub fn instantiate(&self, instance: ItemInstanceId) -> Item {
        Item {
            name: self.name.clone(),
            tags: self.tags.clone(),
            instance,
        }
    }

    /// Tag test with the catalog's two special tokens: an item tagged
    /// `SECRET` matches only the literal query `SECRET`, and the query
    /// `ANY` matches every item.
    pub fn has_tag(&self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == "SECRET") {
            return tag == "SECRET";
        }
        if tag == "ANY" {
            return true;
        }
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        if tags.iter().any(|t| t == "ANY") {
            return true;
        }
        tags.iter().all(|t| self.has_tag(t))
    }

    pub fn tags_str(&self) -> String {
        if self.tags.is_empty() {
            return "No tags".to_string();
        }
        self.tags.join(", ")
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
