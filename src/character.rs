//! Tributes and the roster that owns them.
//!
//! Characters are plain mutable records addressed by [`CharId`] arena
//! indices. Alliances live in their own arena on the [`Roster`]: each
//! member stores the alliance's id instead of a shared list, which keeps
//! every member's view consistent and makes `is_ally_of` O(1).

use crate::item::{Item, ItemInstanceId};
use crate::map::ZoneId;
use crate::text::Inflect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a character in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharId(pub usize);

/// Index of an alliance record in the roster's alliance arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllianceId(pub usize);

/// A character's pronoun set, used by text substitution to render
/// `they`/`them`/`their`/`theirs`/`themself` tokens and to conjugate verbs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pronouns {
    pub subject: String,
    pub object: String,
    pub possessive: String,
    pub possessive2: String,
    pub reflexive: String,
    /// Whether the pronouns conjugate like a plural ("they run" vs "she runs").
    pub plural: bool,
}

impl Pronouns {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        possessive: impl Into<String>,
        possessive2: impl Into<String>,
        reflexive: impl Into<String>,
        plural: bool,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            possessive: possessive.into(),
            possessive2: possessive2.into(),
            reflexive: reflexive.into(),
            plural,
        }
    }

    pub fn he() -> Self {
        Self::new("he", "him", "his", "his", "himself", false)
    }

    pub fn she() -> Self {
        Self::new("she", "her", "her", "hers", "herself", false)
    }

    pub fn they() -> Self {
        Self::new("they", "them", "their", "theirs", "themself", true)
    }
}

/// A named tag with a remaining duration, counted down at the start of
/// each round. "Forever" tags never expire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub age: u32,
    pub forever: bool,
}

impl Tag {
    pub fn forever(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age: 0,
            forever: true,
        }
    }

    pub fn lasting(name: impl Into<String>, rounds: u32) -> Self {
        Self {
            name: name.into(),
            age: rounds,
            forever: false,
        }
    }
}

/// One tribute. All game-session state is mutated exclusively through
/// methods; identity (name, pronouns, image) survives `reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    name: String,
    image: Option<String>,
    pronouns: Pronouns,

    alive: bool,
    items: Vec<Item>,
    tags: Vec<Tag>,
    /// Distinguished mutually-exclusive tag slot. Its age counts *up*
    /// (rounds since it was set) so checks can ask how long a status has
    /// been held.
    status: Option<Tag>,
    location: Option<ZoneId>,
    alliance: Option<AllianceId>,
    /// Rounds this character has existed (incremented when popped to act).
    age: u32,
    rounds_survived: u32,
}

impl Character {
    pub fn new(name: impl Into<String>, image: Option<String>, pronouns: Pronouns) -> Self {
        Self {
            name: name.into(),
            image,
            pronouns,
            alive: true,
            items: Vec::new(),
            tags: Vec::new(),
            status: None,
            location: None,
            alliance: None,
            age: 0,
            rounds_survived: 0,
        }
    }

    /// Re-initialize all game-session state without touching identity.
    pub fn reset(&mut self) {
        self.alive = true;
        self.items.clear();
        self.tags.clear();
        self.status = None;
        self.location = None;
        self.alliance = None;
        self.age = 0;
        self.rounds_survived = 0;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn pronouns(&self) -> &Pronouns {
        &self.pronouns
    }

    // ------------------------------------------------------------------
    // Life
    // ------------------------------------------------------------------

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn revive(&mut self) {
        self.alive = true;
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn rounds_survived(&self) -> u32 {
        self.rounds_survived
    }

    pub fn inc_age(&mut self) {
        self.age += 1;
    }

    /// Round bookkeeping for a living character: expire tags whose
    /// duration ran out, age the held status, bump the survival counter.
    pub fn on_round_start(&mut self) {
        self.tags.retain_mut(|tag| {
            if tag.forever {
                return true;
            }
            if tag.age == 0 {
                return false;
            }
            tag.age -= 1;
            true
        });
        if let Some(status) = self.status.as_mut() {
            status.age += 1;
        }
        self.rounds_survived += 1;
    }

    // ------------------------------------------------------------------
    // Tags and status
    // ------------------------------------------------------------------

    pub fn add_tag(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    /// Remove a tag by name. Returns false when the tag wasn't present.
    pub fn remove_tag(&mut self, name: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.name != name);
        self.tags.len() != before
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    pub fn tag_age(&self, name: &str) -> Option<u32> {
        self.tags.iter().find(|t| t.name == name).map(|t| t.age)
    }

    pub fn set_status(&mut self, name: impl Into<String>) {
        self.status = Some(Tag {
            name: name.into(),
            age: 0,
            forever: true,
        });
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn status(&self) -> Option<&Tag> {
        self.status.as_ref()
    }

    pub fn has_status(&self, name: &str) -> bool {
        self.status.as_ref().is_some_and(|s| s.name == name)
    }

    pub fn status_age(&self, name: &str) -> Option<u32> {
        self.status
            .as_ref()
            .filter(|s| s.name == name)
            .map(|s| s.age)
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_by_tags(&self, tags: &[String]) -> Option<&Item> {
        self.items.iter().find(|i| i.has_all_tags(tags))
    }

    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name() == name)
    }

    pub(crate) fn receive_item(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Remove the specific physical copy with the given instance id.
    pub fn take_item(&mut self, instance: ItemInstanceId) -> Option<Item> {
        let pos = self.items.iter().position(|i| i.instance() == instance)?;
        Some(self.items.remove(pos))
    }

    // ------------------------------------------------------------------
    // Location
    // ------------------------------------------------------------------

    pub fn location(&self) -> Option<ZoneId> {
        self.location
    }

    pub fn is_in(&self, zone: ZoneId) -> bool {
        self.location == Some(zone)
    }

    pub fn is_nearby(&self, other: &Character) -> bool {
        self.location.is_some() && self.location == other.location
    }

    /// Move to a zone. Moving ends any `running` the character was doing.
    pub fn move_to(&mut self, zone: ZoneId) {
        self.location = Some(zone);
        if self.has_tag("running") {
            self.remove_tag("running");
        }
    }

    // ------------------------------------------------------------------
    // Alliance (managed by the Roster)
    // ------------------------------------------------------------------

    pub fn alliance(&self) -> Option<AllianceId> {
        self.alliance
    }

    pub fn is_alone(&self) -> bool {
        self.alliance.is_none()
    }

    pub(crate) fn set_alliance(&mut self, alliance: Option<AllianceId>) {
        self.alliance = alliance;
    }

    // ------------------------------------------------------------------
    // Text projection
    // ------------------------------------------------------------------

    /// Render a text-substitution token for this character.
    ///
    /// An empty prefix yields the character's name. Recognized pronoun
    /// prefixes project the pronoun set; any other prefix is treated as a
    /// verb and conjugated for the character's plurality. Output is
    /// capitalized when the prefix starts with an uppercase letter.
    pub fn token(&self, prefix: &str, inflect: &dyn Inflect) -> String {
        if prefix.is_empty() {
            return self.name.clone();
        }
        let p = &self.pronouns;
        let rendered = match prefix.to_lowercase().as_str() {
            "they" => p.subject.clone(),
            "them" => p.object.clone(),
            "their" => p.possessive.clone(),
            "theirs" => p.possessive2.clone(),
            "themself" => p.reflexive.clone(),
            "they're" => {
                if p.plural {
                    format!("{}'re", p.subject)
                } else {
                    format!("{}'s", p.subject)
                }
            }
            _ => {
                // A verb to conjugate: plural subjects keep the base form.
                let verb = prefix.to_lowercase();
                if p.plural {
                    verb
                } else {
                    inflect.third_person(&verb)
                }
            }
        };
        if prefix.starts_with(|c: char| c.is_uppercase()) {
            capitalize(&rendered)
        } else {
            rendered
        }
    }

    // ------------------------------------------------------------------
    // Display helpers for the platform layer
    // ------------------------------------------------------------------

    pub fn alive_str(&self) -> &'static str {
        if self.alive {
            "Alive"
        } else {
            "Dead"
        }
    }

    pub fn items_str(&self) -> String {
        if self.items.is_empty() {
            return "No items".to_string();
        }
        capitalize(
            &self
                .items
                .iter()
                .map(|i| i.name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    pub fn tags_str(&self) -> String {
        if self.tags.is_empty() {
            return "No tags".to_string();
        }
        capitalize(
            &self
                .tags
                .iter()
                .map(|t| t.name.clone())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Capitalize the first letter, leaving the rest alone.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// One alliance: the ids of every member. Members hold the alliance's id;
/// this list is the single source of truth for membership.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alliance {
    members: Vec<CharId>,
}

impl Alliance {
    pub fn members(&self) -> &[CharId] {
        &self.members
    }
}

/// Owns the characters, the alliance arena, and the counter that mints
/// item instance ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    characters: Vec<Character>,
    alliances: Vec<Alliance>,
    next_instance: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, character: Character) -> CharId {
        self.characters.push(character);
        CharId(self.characters.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn get(&self, id: CharId) -> &Character {
        &self.characters[id.0]
    }

    pub fn get_mut(&mut self, id: CharId) -> &mut Character {
        &mut self.characters[id.0]
    }

    pub fn id_by_name(&self, name: &str) -> Option<CharId> {
        self.characters
            .iter()
            .position(|c| c.name() == name)
            .map(CharId)
    }

    pub fn ids(&self) -> impl Iterator<Item = CharId> {
        (0..self.characters.len()).map(CharId)
    }

    pub fn living_ids(&self) -> Vec<CharId> {
        self.ids()
            .filter(|&id| self.get(id).is_alive())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    /// Reset every character's session state and drop all alliances.
    pub fn reset(&mut self) {
        for c in &mut self.characters {
            c.reset();
        }
        self.alliances.clear();
        self.next_instance = 0;
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Copy an item into a character's inventory as a fresh instance.
    pub fn give_item(&mut self, who: CharId, template: &Item) -> ItemInstanceId {
        self.next_instance += 1;
        let instance = ItemInstanceId(self.next_instance);
        self.characters[who.0].receive_item(template.instantiate(instance));
        instance
    }

    // ------------------------------------------------------------------
    // Alliances
    // ------------------------------------------------------------------

    pub fn alliance(&self, id: AllianceId) -> &Alliance {
        &self.alliances[id.0]
    }

    pub fn is_ally_of(&self, a: CharId, b: CharId) -> bool {
        match (self.get(a).alliance(), self.get(b).alliance()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Create a new alliance containing exactly `a` then `b`.
    pub fn form_alliance(&mut self, a: CharId, b: CharId) -> AllianceId {
        self.alliances.push(Alliance {
            members: vec![a, b],
        });
        let id = AllianceId(self.alliances.len() - 1);
        self.characters[a.0].set_alliance(Some(id));
        self.characters[b.0].set_alliance(Some(id));
        id
    }

    /// Move a character into an existing alliance, leaving any current one.
    pub fn join_alliance(&mut self, who: CharId, id: AllianceId) {
        self.leave_alliance(who);
        if !self.alliances[id.0].members.contains(&who) {
            self.alliances[id.0].members.push(who);
        }
        self.characters[who.0].set_alliance(Some(id));
    }

    /// Remove a character from its alliance, if any.
    pub fn leave_alliance(&mut self, who: CharId) {
        if let Some(id) = self.characters[who.0].alliance() {
            self.alliances[id.0].members.retain(|&m| m != who);
            self.characters[who.0].set_alliance(None);
        }
    }

    pub fn alliance_str(&self, who: CharId) -> String {
        match self.get(who).alliance() {
            None => "No alliance".to_string(),
            Some(id) => self
                .alliance(id)
                .members()
                .iter()
                .map(|&m| self.get(m).name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
