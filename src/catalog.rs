//! The content catalog: raw, serde-friendly shapes for characters, items,
//! maps, and events, grouped by the dotted file name they came from, plus
//! the selection logic that assembles a [`Game`] from a chosen subset.
//!
//! Events are only skeleton-checked when added; the full DSL validation
//! needs the selected item catalog and map, so it runs in [`Catalog::load_game`].

use crate::character::{Character, Pronouns, Roster};
use crate::error::LoadError;
use crate::event::Event;
use crate::game::Game;
use crate::item::Item;
use crate::map::{Map, PoolEntry, Trove, Zone};
use crate::text::EnglishInflect;
use crate::valids::Valids;
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};

/// One character entry: a pronoun spec plus an optional portrait.
///
/// The pronoun spec is either a shorthand (`male`, `female`, `nonbinary`)
/// or six space-separated fields: subject, object, possessive, independent
/// possessive, reflexive, and a plurality flag (`False`/`0` for singular).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCharacter {
    pub pronouns: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// One map file: zones with their connection lists, optional per-zone
/// flavor text, plus troves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMap {
    pub zones: IndexMap<String, String>,
    #[serde(default)]
    pub flavor: IndexMap<String, String>,
    #[serde(default)]
    pub troves: IndexMap<String, RawTrove>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTrove {
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub has: Option<String>,
}

/// Event narration: a single template or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTexts {
    One(String),
    Many(Vec<String>),
}

impl Default for RawTexts {
    fn default() -> Self {
        RawTexts::Many(Vec::new())
    }
}

impl RawTexts {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            RawTexts::One(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![text.to_string()]
                }
            }
            RawTexts::Many(texts) => texts.clone(),
        }
    }
}

/// One event as authored: rarity, templates, requirement and result lines
/// keyed by character shorthand, and nested sub-events. Mapping order is
/// significant (the first `req` entry is the main character), hence the
/// `IndexMap`s.
///
/// `using` names an earlier event in the same file; any field left empty
/// here falls back to that event's raw value, field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub using: Option<String>,
    #[serde(default)]
    pub chance: Option<String>,
    #[serde(default)]
    pub text: RawTexts,
    #[serde(default)]
    pub req: IndexMap<String, String>,
    #[serde(default)]
    pub res: IndexMap<String, String>,
    #[serde(default)]
    pub sub: IndexMap<String, RawEvent>,
}

/// An entry in an event file: either an event, or a `_DEFAULT` line naming
/// requirements prepended to every suite in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEventEntry {
    Default(String),
    Event(RawEvent),
}

/// Which content files a game is assembled from. A selector matches every
/// file whose dotted name starts with it; `ALL` matches everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    pub characters: Vec<String>,
    pub items: Vec<String>,
    pub map: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct EventFile {
    default_req: Option<String>,
    events: Vec<(String, RawEvent)>,
}

/// All loaded content, grouped per file.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    characters: IndexMap<String, Vec<Character>>,
    items: IndexMap<String, Vec<Item>>,
    maps: IndexMap<String, Map>,
    events: IndexMap<String, EventFile>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    /// Add a character file. Names must be unique across all files.
    pub fn add_characters(
        &mut self,
        file: &str,
        raw: IndexMap<String, RawCharacter>,
    ) -> Result<(), LoadError> {
        let mut characters = Vec::with_capacity(raw.len());
        for (name, data) in raw {
            if self.character_exists(&name) {
                return Err(LoadError::Duplicate {
                    kind: "character",
                    name,
                }
                .in_file(file));
            }
            let pronouns = parse_pronouns(&name, &data.pronouns).map_err(|e| e.in_file(file))?;
            characters.push(Character::new(name, data.image, pronouns));
        }
        self.characters.insert(file.to_string(), characters);
        Ok(())
    }

    /// Add an item file mapping item names to space-separated tag lists.
    pub fn add_items(
        &mut self,
        file: &str,
        raw: IndexMap<String, String>,
    ) -> Result<(), LoadError> {
        let mut items = Vec::with_capacity(raw.len());
        for (name, tags) in raw {
            if self.item_exists(&name) {
                return Err(LoadError::Duplicate { kind: "item", name }.in_file(file));
            }
            let tags: Vec<String> = tags.split_whitespace().map(str::to_string).collect();
            if tags.is_empty() {
                return Err(LoadError::BadItem {
                    name,
                    problem: "no tag list".to_string(),
                }
                .in_file(file));
            }
            items.push(Item::new(name, tags));
        }
        self.items.insert(file.to_string(), items);
        Ok(())
    }

    /// Add a map file. The first zone listed is the starting zone.
    pub fn add_map(&mut self, file: &str, raw: &RawMap) -> Result<(), LoadError> {
        let mut map = Map::new();
        for name in raw.zones.keys() {
            map.add_zone(Zone::new(name.clone(), raw.flavor.get(name).cloned()));
        }
        for (name, connections) in &raw.zones {
            let here = match map.zone_by_name(name) {
                Some(id) => id,
                None => continue,
            };
            for connection in connections.split(',') {
                let connection = connection.trim();
                if connection.is_empty() {
                    continue;
                }
                let there = map.zone_by_name(connection).ok_or_else(|| {
                    LoadError::BadConnection {
                        zone: name.clone(),
                        connection: connection.to_string(),
                    }
                    .in_file(file)
                })?;
                map.connect(here, there);
            }
        }

        for (name, data) in &raw.troves {
            let trove = parse_trove(name, data).map_err(|e| e.in_file(file))?;
            map.add_trove(trove);
        }
        self.maps.insert(file.to_string(), map);
        Ok(())
    }

    /// Add an event file. A `_DEFAULT` entry anywhere in the file applies
    /// to every event after (and before) it; event names must be unique
    /// across all files.
    pub fn add_events(
        &mut self,
        file: &str,
        raw: IndexMap<String, RawEventEntry>,
    ) -> Result<(), LoadError> {
        let mut parsed = EventFile::default();
        for (name, entry) in raw {
            match entry {
                RawEventEntry::Default(line) => {
                    if !name.starts_with("_DEFAULT") {
                        return Err(LoadError::WrongType {
                            field: "event",
                            got: line,
                        }
                        .in_event(name)
                        .in_file(file));
                    }
                    parsed.default_req = Some(line);
                }
                RawEventEntry::Event(event) => {
                    if name.starts_with("_DEFAULT") {
                        return Err(LoadError::WrongType {
                            field: "_DEFAULT",
                            got: "mapping".to_string(),
                        }
                        .in_file(file));
                    }
                    if self.event_exists(&name) {
                        return Err(LoadError::Duplicate {
                            kind: "event",
                            name,
                        }
                        .in_file(file));
                    }
                    parsed.events.push((name, event));
                }
            }
        }
        self.events.insert(file.to_string(), parsed);
        Ok(())
    }

    fn character_exists(&self, name: &str) -> bool {
        self.characters
            .values()
            .flatten()
            .any(|c| c.name() == name)
    }

    fn item_exists(&self, name: &str) -> bool {
        self.items.values().flatten().any(|i| i.name() == name)
    }

    fn event_exists(&self, name: &str) -> bool {
        self.events
            .values()
            .flat_map(|f| f.events.iter())
            .any(|(n, _)| n == name)
    }

    /// Assemble a game from the selected files, running full DSL
    /// validation for every selected event against the selected items and
    /// map. Each top-level event gets its own validation context.
    pub fn load_game(&self, settings: &GameSettings) -> Result<Game, LoadError> {
        let mut roster = Roster::new();
        for character in self.select(&settings.characters, &self.characters)? {
            roster.add(character);
        }

        let items: Vec<Item> = self.select(&settings.items, &self.items)?;

        let mut map = self
            .maps
            .get(&settings.map)
            .cloned()
            .ok_or_else(|| LoadError::NoSuchFile(settings.map.clone()))?;
        map.resolve_troves(&items)?;

        let mut events: Vec<Event> = Vec::new();
        for (file, contents) in selected_files(&settings.events, &self.events)? {
            let mut processed: IndexMap<&str, &RawEvent> = IndexMap::new();
            for (name, raw) in &contents.events {
                let resolved =
                    resolve_using(name, raw, &processed).map_err(|e| e.in_file(file))?;
                let mut valids = Valids::new(&items, &map);
                let event = Event::from_raw(
                    name,
                    &resolved,
                    &mut valids,
                    contents.default_req.as_deref(),
                    false,
                )
                .map_err(|e| e.in_file(file))?;
                processed.insert(name.as_str(), raw);
                events.push(event);
            }
        }

        info!(
            "loaded game: {} characters, {} items, {} events",
            roster.len(),
            items.len(),
            events.len()
        );
        Ok(Game::new(items, events, roster, map, Box::new(EnglishInflect)))
    }

    /// Flatten the selected files' contents. Overlapping selectors must
    /// not load a file twice, so the file-level dedup in
    /// [`selected_files`] does the matching.
    fn select<T: Clone>(
        &self,
        selectors: &[String],
        files: &IndexMap<String, Vec<T>>,
    ) -> Result<Vec<T>, LoadError> {
        let mut selected = Vec::new();
        for (_, contents) in selected_files(selectors, files)? {
            selected.extend(contents.iter().cloned());
        }
        Ok(selected)
    }
}

fn selected_files<'a, T>(
    selectors: &[String],
    files: &'a IndexMap<String, T>,
) -> Result<Vec<(&'a str, &'a T)>, LoadError> {
    let mut selected = Vec::new();
    for selector in selectors {
        let mut found = false;
        for (name, contents) in files {
            if selector == "ALL" || name.starts_with(selector.as_str()) {
                found = true;
                if !selected.iter().any(|(n, _)| *n == name.as_str()) {
                    selected.push((name.as_str(), contents));
                }
            }
        }
        if !found {
            return Err(LoadError::NoSuchFile(selector.clone()));
        }
    }
    Ok(selected)
}

/// Resolve an event's `using` reference against the file's earlier events,
/// recursively for sub-events. Fallback is field-by-field from the named
/// event's *raw* data; `using` chains are not followed.
fn resolve_using(
    name: &str,
    raw: &RawEvent,
    processed: &IndexMap<&str, &RawEvent>,
) -> Result<RawEvent, LoadError> {
    let mut resolved = raw.clone();
    if let Some(using) = resolved.using.take() {
        let base = *processed
            .get(using.as_str())
            .ok_or_else(|| LoadError::UnknownUsing(using.clone()).in_event(name))?;
        if resolved.chance.is_none() {
            resolved.chance = base.chance.clone();
        }
        if resolved.text.to_vec().is_empty() {
            resolved.text = base.text.clone();
        }
        if resolved.req.is_empty() {
            resolved.req = base.req.clone();
        }
        if resolved.res.is_empty() {
            resolved.res = base.res.clone();
        }
        if resolved.sub.is_empty() {
            resolved.sub = base.sub.clone();
        }
    }
    let subs = std::mem::take(&mut resolved.sub);
    for (sub_name, sub_raw) in subs {
        let sub_resolved = resolve_using(&format!("{name}.{sub_name}"), &sub_raw, processed)?;
        resolved.sub.insert(sub_name, sub_resolved);
    }
    Ok(resolved)
}

fn parse_pronouns(name: &str, spec: &str) -> Result<Pronouns, LoadError> {
    match spec {
        "male" => return Ok(Pronouns::he()),
        "female" => return Ok(Pronouns::she()),
        "nonbinary" => return Ok(Pronouns::they()),
        _ => {}
    }
    let fields: Vec<&str> = spec.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(LoadError::BadPronouns {
            name: name.to_string(),
            got: fields.len(),
            spec: spec.to_string(),
        });
    }
    let plural = !matches!(fields[5], "False" | "false" | "0");
    Ok(Pronouns::new(
        fields[0], fields[1], fields[2], fields[3], fields[4], plural,
    ))
}

fn parse_trove(name: &str, data: &RawTrove) -> Result<Trove, LoadError> {
    let bad = |problem: &str| LoadError::BadTrove {
        trove: name.to_string(),
        problem: problem.to_string(),
    };

    let pool_str = data.pool.as_deref().unwrap_or("");
    if !pool_str.is_empty() && data.count == 0 {
        return Err(bad("`pool` given but no `count`, `count` must be at least 1"));
    }
    if pool_str.is_empty() && data.count > 0 {
        return Err(bad("`count` given but no `pool` to draw from"));
    }
    let has_str = data.has.as_deref().unwrap_or("");
    if pool_str.is_empty() && has_str.is_empty() {
        return Err(bad("needs a `pool` or a `has` list"));
    }

    let mut pool = Vec::new();
    for entry in pool_str.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            if !pool_str.is_empty() {
                return Err(bad("empty `pool` entry"));
            }
            continue;
        }
        match entry.strip_prefix('=') {
            Some(exact) => pool.push(PoolEntry::Exact(exact.to_string())),
            None => pool.push(PoolEntry::Tags(
                entry.split_whitespace().map(str::to_string).collect(),
            )),
        }
    }

    let has = has_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Trove::new(name, data.count, pool, has))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add_characters(
                "cast.main",
                serde_json::from_str(
                    r#"{
                        "Robin": {"pronouns": "female"},
                        "Alex": {"pronouns": "nonbinary", "image": "http://img/alex.png"},
                        "Zephyr": {"pronouns": "ze zir zirs zirs zirself False"}
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        catalog
            .add_items(
                "basics",
                serde_json::from_str(
                    r#"{"knife": "weapon sharp", "bread": "food"}"#,
                )
                .unwrap(),
            )
            .unwrap();
        catalog
            .add_map(
                "simple",
                &serde_json::from_str(
                    r#"{
                        "zones": {"cornucopia": "forest", "forest": "cornucopia"},
                        "flavor": {"forest": "Dense pines swallow all sound."},
                        "troves": {"cache": {"pool": "weapon, =bread", "count": 2}}
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        catalog
            .add_events(
                "daily",
                serde_json::from_str(
                    r#"{
                        "_DEFAULT": "anydistance",
                        "forage": {
                            "chance": "common",
                            "text": "@mc forages for food.",
                            "req": {"mc": ""}
                        },
                        "idle": {
                            "chance": "DEFAULT",
                            "text": ["@mc does nothing."],
                            "req": {"mc": ""}
                        }
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        catalog
    }

    fn settings() -> GameSettings {
        GameSettings {
            characters: vec!["ALL".into()],
            items: vec!["ALL".into()],
            map: "simple".into(),
            events: vec!["ALL".into()],
        }
    }

    #[test]
    fn test_load_game_assembles_everything() {
        let game = catalog().load_game(&settings()).unwrap();
        assert_eq!(game.roster().len(), 3);
        assert_eq!(game.items().len(), 2);
        assert_eq!(game.events().len(), 2);
        assert!(game.event_by_name("forage").is_some());
        assert_eq!(game.map().zones().len(), 2);
        let forest = game.map().zone_by_name("forest").unwrap();
        assert_eq!(
            game.map().zone(forest).flavor(),
            Some("Dense pines swallow all sound.")
        );
    }

    #[test]
    fn test_pronoun_specs() {
        let game = catalog().load_game(&settings()).unwrap();
        let zephyr = game.roster().id_by_name("Zephyr").unwrap();
        let p = game.roster().get(zephyr).pronouns();
        assert_eq!(p.subject, "ze");
        assert_eq!(p.reflexive, "zirself");
        assert!(!p.plural);

        let mut catalog = Catalog::new();
        let err = catalog
            .add_characters(
                "bad",
                serde_json::from_str(r#"{"Pat": {"pronouns": "xe xem"}}"#).unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("6 pronoun fields"));
    }

    #[test]
    fn test_duplicate_names_across_files_are_rejected() {
        let mut catalog = catalog();
        let err = catalog
            .add_characters(
                "cast.extra",
                serde_json::from_str(r#"{"Robin": {"pronouns": "male"}}"#).unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("duplicate character `Robin`"));

        let err = catalog
            .add_events(
                "extra",
                serde_json::from_str(
                    r#"{"forage": {"chance": "common", "text": "x", "req": {"mc": ""}}}"#,
                )
                .unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("duplicate event `forage`"));
    }

    #[test]
    fn test_selector_prefix_matching() {
        let catalog = catalog();
        let mut settings = settings();
        settings.characters = vec!["cast".into()];
        assert!(catalog.load_game(&settings).is_ok());

        settings.characters = vec!["nonsense".into()];
        let err = catalog.load_game(&settings).unwrap_err();
        assert!(matches!(err, LoadError::NoSuchFile(s) if s == "nonsense"));
    }

    #[test]
    fn test_overlapping_selectors_load_each_file_once() {
        use crate::game::Turn;

        let catalog = catalog();
        let mut settings = settings();
        // `ALL` and the `cast` prefix both match `cast.main`; the file
        // must still only be loaded once.
        settings.characters = vec!["ALL".into(), "cast".into()];
        settings.items = vec!["ALL".into(), "basics".into()];
        let mut game = catalog.load_game(&settings).unwrap();
        assert_eq!(game.roster().len(), 3);
        assert_eq!(game.items().len(), 2);

        // A duplicated roster would also act twice per round.
        let mut rng = rand::rngs::StdRng::seed_from_u64(12);
        game.start_with_rng(&mut rng);
        game.round();
        let mut acted = 0;
        while let Turn::Acted(_) = game.next_with_rng(&mut rng).unwrap() {
            acted += 1;
        }
        assert_eq!(acted, 3);
    }

    #[test]
    fn test_default_req_reaches_loaded_events() {
        // `_DEFAULT: anydistance` suppresses the implicit nearby check,
        // which is observable: without it a companion in another zone
        // could never match.
        let mut catalog = catalog();
        catalog
            .add_events(
                "social",
                serde_json::from_str(
                    r#"{
                        "_DEFAULT": "anydistance, round >= 0",
                        "snipe": {
                            "chance": "common",
                            "text": "@mc watches @other from afar.",
                            "req": {"mc": "", "other": ""}
                        }
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        let mut settings = settings();
        settings.events = vec!["social".into()];
        let mut game = catalog.load_game(&settings).unwrap();

        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        game.start_with_rng(&mut rng);
        // Everyone but Robin leaves the start zone; watching still works
        // across zones thanks to the file default.
        let forest = game.map().zone_by_name("forest").unwrap();
        for name in ["Alex", "Zephyr"] {
            let id = game.roster().id_by_name(name).unwrap();
            game.roster_mut().get_mut(id).move_to(forest);
        }
        match game
            .trigger_by_name_with_rng("Robin", "snipe", &mut rng)
            .unwrap()
        {
            crate::game::TriggerByName::Triggered(outcome) => {
                assert_eq!(outcome.texts.len(), 1);
            }
            other => panic!("expected a trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_using_reuses_earlier_event_fields() {
        // `prowl` carries no chance or req of its own; both come from
        // `lurk`. Its own text must win over the inherited one.
        let mut catalog = catalog();
        catalog
            .add_events(
                "stealth",
                serde_json::from_str(
                    r#"{
                        "lurk": {
                            "chance": "common",
                            "text": "@mc lurks in the shadows.",
                            "req": {"mc": ""}
                        },
                        "prowl": {
                            "using": "lurk",
                            "text": "@mc prowls the treeline."
                        }
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        let mut settings = settings();
        settings.events = vec!["stealth".into()];
        let mut game = catalog.load_game(&settings).unwrap();
        assert_eq!(game.events().len(), 2);

        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        game.start_with_rng(&mut rng);
        match game
            .trigger_by_name_with_rng("Robin", "prowl", &mut rng)
            .unwrap()
        {
            crate::game::TriggerByName::Triggered(outcome) => {
                assert_eq!(outcome.texts.len(), 1);
                assert!(outcome.texts[0].contains("prowls the treeline"));
            }
            other => panic!("expected a trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_using_only_sees_earlier_events() {
        let mut catalog = catalog();
        catalog
            .add_events(
                "stealth",
                serde_json::from_str(
                    r#"{
                        "prowl": {"using": "lurk", "text": "@mc prowls."},
                        "lurk": {
                            "chance": "common",
                            "text": "@mc lurks.",
                            "req": {"mc": ""}
                        }
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        let mut settings = settings();
        settings.events = vec!["stealth".into()];
        let err = catalog.load_game(&settings).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("in file stealth"));
        assert!(rendered.contains("in event \"prowl\""));
        assert!(rendered.contains("no earlier event"));
        assert!(rendered.contains("`lurk`"));
    }

    #[test]
    fn test_bad_event_dsl_fails_at_load_game_with_context() {
        let mut catalog = catalog();
        catalog
            .add_events(
                "broken",
                serde_json::from_str(
                    r#"{
                        "oops": {
                            "chance": "common",
                            "text": "@mc trips.",
                            "req": {"mc": "in atlantis"}
                        }
                    }"#,
                )
                .unwrap(),
            )
            .unwrap();
        let err = catalog.load_game(&settings()).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("in file broken"));
        assert!(rendered.contains("in event \"oops\""));
        assert!(rendered.contains("`atlantis`"));
    }

    #[test]
    fn test_trove_validation() {
        let mut catalog = Catalog::new();
        let err = catalog
            .add_map(
                "m",
                &serde_json::from_str(
                    r#"{"zones": {"a": ""}, "troves": {"cache": {"pool": "weapon"}}}"#,
                )
                .unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("`count` must be at least 1"));

        let err = catalog
            .add_map(
                "m",
                &serde_json::from_str(r#"{"zones": {"a": ""}, "troves": {"cache": {}}}"#).unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("needs a `pool` or a `has` list"));
    }

    #[test]
    fn test_bad_zone_connection() {
        let mut catalog = Catalog::new();
        let err = catalog
            .add_map(
                "m",
                &serde_json::from_str(r#"{"zones": {"a": "atlantis"}}"#).unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("unknown zone `atlantis`"));
    }
}
