//! Events: named bundles of check suites, effect suites, narration
//! templates, and nested sub-events, triggered against a cast of matched
//! characters.

use crate::catalog::RawEvent;
use crate::character::{CharId, Roster};
use crate::check::{CheckSuite, SuitePosition};
use crate::effect::EffectSuite;
use crate::error::{EngineError, LoadError};
use crate::map::Map;
use crate::state::{Outcome, State, TriggerSnapshot};
use crate::text::{render_template, validate_template, Inflect};
use crate::valids::Valids;
use rand::distributions::{Distribution, Uniform};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How often an event fires relative to its peers. `Default` events carry
/// no weight; one is picked only when nothing weighted matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Default,
    Common,
    Uncommon,
    Rare,
    Rarer,
    Mythic,
    Secret,
    Shiny,
}

impl Rarity {
    pub fn weight(self) -> u32 {
        match self {
            Rarity::Default => 0,
            Rarity::Common => 30,
            Rarity::Uncommon => 20,
            Rarity::Rare => 14,
            Rarity::Rarer => 10,
            Rarity::Mythic => 5,
            Rarity::Secret => 3,
            Rarity::Shiny => 1,
        }
    }
}

impl FromStr for Rarity {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEFAULT" => Ok(Rarity::Default),
            "common" => Ok(Rarity::Common),
            "uncommon" => Ok(Rarity::Uncommon),
            "rare" => Ok(Rarity::Rare),
            "rarer" => Ok(Rarity::Rarer),
            "mythic" => Ok(Rarity::Mythic),
            "secret" => Ok(Rarity::Secret),
            "shiny" => Ok(Rarity::Shiny),
            _ => Err(LoadError::UnknownRarity(s.to_string())),
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rarity::Default => "DEFAULT",
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Rarer => "rarer",
            Rarity::Mythic => "mythic",
            Rarity::Secret => "secret",
            Rarity::Shiny => "shiny",
        };
        write!(f, "{s}")
    }
}

/// One event. Trigger counters are owned here and persist for the whole
/// game session; they feed the `limit`/`limittotal` checks through the
/// snapshot each [`State`] carries.
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    rarity: Rarity,
    texts: Vec<String>,
    checks: Vec<CheckSuite>,
    effects: Vec<EffectSuite>,
    sub: Vec<Event>,
    counters: HashMap<CharId, u32>,
}

impl Event {
    /// Build an event (and its sub-events, named `parent.child`) from raw
    /// mapping data. `default_req` is the file-wide requirement line
    /// prepended to every suite, descendants included.
    pub fn from_raw(
        name: &str,
        raw: &RawEvent,
        valids: &mut Valids,
        default_req: Option<&str>,
        is_sub: bool,
    ) -> Result<Event, LoadError> {
        Self::build(name, raw, valids, default_req, is_sub)
            .map_err(|err| match err {
                wrapped @ LoadError::InEvent { .. } => wrapped,
                other => other.in_event(name),
            })
    }

    fn build(
        name: &str,
        raw: &RawEvent,
        valids: &mut Valids,
        default_req: Option<&str>,
        is_sub: bool,
    ) -> Result<Event, LoadError> {
        let chance = raw
            .chance
            .as_deref()
            .ok_or(LoadError::MissingField("chance"))?;
        let rarity: Rarity = chance.parse()?;

        let texts = raw.text.to_vec();
        if texts.is_empty() {
            return Err(LoadError::MissingField("text"));
        }

        let mut checks = Vec::with_capacity(raw.req.len());
        for (i, (short, line)) in raw.req.iter().enumerate() {
            if checks.iter().any(|s: &CheckSuite| s.short() == short) {
                return Err(LoadError::Duplicate {
                    kind: "character shorthand",
                    name: short.clone(),
                });
            }
            let position = if is_sub {
                SuitePosition::Sub
            } else if i == 0 {
                SuitePosition::Main
            } else {
                SuitePosition::Companion
            };
            let merged = match default_req {
                Some(default) if line.is_empty() => default.to_string(),
                Some(default) => format!("{default}, {line}"),
                None => line.clone(),
            };
            checks.push(CheckSuite::parse(short, &merged, position, valids)?);
        }
        if !is_sub && checks.is_empty() {
            return Err(LoadError::MissingField("req"));
        }

        let mut effects = Vec::with_capacity(raw.res.len());
        for (short, line) in raw.res.iter() {
            if effects.iter().any(|s: &EffectSuite| s.short() == short) {
                return Err(LoadError::Duplicate {
                    kind: "character shorthand",
                    name: short.clone(),
                });
            }
            effects.push(EffectSuite::parse(short, line, valids)?);
        }

        for text in &texts {
            validate_template(text, valids)?;
        }

        let mut sub = Vec::with_capacity(raw.sub.len());
        for (sub_name, sub_raw) in raw.sub.iter() {
            sub.push(Event::from_raw(
                &format!("{name}.{sub_name}"),
                sub_raw,
                valids,
                default_req,
                true,
            )?);
        }

        Ok(Event {
            name: name.to_string(),
            rarity,
            texts,
            checks,
            effects,
            sub,
            counters: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rarity(&self) -> Rarity {
        self.rarity
    }

    pub fn weight(&self) -> u32 {
        self.rarity.weight()
    }

    pub fn sub_events(&self) -> &[Event] {
        &self.sub
    }

    pub fn sub_events_mut(&mut self) -> &mut [Event] {
        &mut self.sub
    }

    pub fn trigger_count(&self, who: CharId) -> u32 {
        self.counters.get(&who).copied().unwrap_or(0)
    }

    /// Try to assemble a full cast for this event.
    ///
    /// A fresh state (carrying a counter snapshot) is used for top-level
    /// matching; sub-events inherit the parent's post-trigger state. Each
    /// candidate for an open role is evaluated against its own clone of
    /// the state, and the clone of the randomly chosen candidate is
    /// adopted, so bindings made by rejected candidates never leak.
    pub fn prepare(
        &self,
        main: CharId,
        roster: &Roster,
        map: &Map,
        inherited: Option<&State>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<State>, EngineError> {
        let state = match inherited {
            Some(state) => state.clone(),
            None => State::new(TriggerSnapshot::new(&self.counters)),
        };
        if state.is_bound(main) {
            self.prepare_sub(roster, map, state, rng)
        } else {
            self.prepare_base(main, roster, map, state, rng)
        }
    }

    fn prepare_base(
        &self,
        main: CharId,
        roster: &Roster,
        map: &Map,
        mut state: State,
        rng: &mut dyn RngCore,
    ) -> Result<Option<State>, EngineError> {
        let Some(main_suite) = self.checks.first() else {
            return Ok(Some(state));
        };
        if !main_suite.check_all(main, roster, map, &mut state, rng)? {
            return Ok(None);
        }
        for suite in &self.checks[1..] {
            match self.match_character(suite, roster, map, &state, rng)? {
                Some(matched) => state = matched,
                None => return Ok(None),
            }
        }
        Ok(Some(state))
    }

    fn prepare_sub(
        &self,
        roster: &Roster,
        map: &Map,
        mut state: State,
        rng: &mut dyn RngCore,
    ) -> Result<Option<State>, EngineError> {
        for suite in &self.checks {
            match state.char_id(suite.short()) {
                // A character the parent already cast must also pass the
                // sub-event's requirements for it.
                Some(bound) => {
                    if !suite.check_all(bound, roster, map, &mut state, rng)? {
                        return Ok(None);
                    }
                }
                None => match self.match_character(suite, roster, map, &state, rng)? {
                    Some(matched) => state = matched,
                    None => return Ok(None),
                },
            }
        }
        Ok(Some(state))
    }

    /// Find every unbound character passing the suite and pick one at
    /// random. Returns the winning candidate's state clone.
    fn match_character(
        &self,
        suite: &CheckSuite,
        roster: &Roster,
        map: &Map,
        state: &State,
        rng: &mut dyn RngCore,
    ) -> Result<Option<State>, EngineError> {
        let mut matched = Vec::new();
        for id in roster.ids() {
            if state.is_bound(id) {
                continue;
            }
            let mut candidate = state.clone();
            if suite.check_all(id, roster, map, &mut candidate, rng)? {
                matched.push(candidate);
            }
        }
        if matched.is_empty() {
            return Ok(None);
        }
        let pick = Uniform::from(0..matched.len()).sample(rng);
        Ok(Some(matched.swap_remove(pick)))
    }

    /// Fire the event: bump the trigger counter, narrate one template,
    /// commit reserved trove draws, and run every effect suite. Returns
    /// the post-trigger state for the sub-event cascade.
    pub fn trigger(
        &mut self,
        mut state: State,
        roster: &mut Roster,
        map: &mut Map,
        outcome: &mut Outcome,
        inflect: &dyn Inflect,
        rng: &mut dyn RngCore,
    ) -> Result<State, EngineError> {
        let main = state
            .main_char()
            .ok_or_else(|| EngineError::UnboundCharacter("main".to_string()))?;
        *self.counters.entry(main).or_insert(0) += 1;
        if outcome.main.is_none() {
            outcome.main = Some(main);
        }

        let text = self.texts.choose(rng).ok_or(EngineError::NoText)?;
        outcome.texts.push(render_template(text, &state, roster, inflect)?);

        // Highest index first so earlier removals don't shift later ones.
        let mut pending = state.take_pending_loot();
        pending.sort_by(|a, b| b.1.cmp(&a.1));
        for (trove, idx) in pending {
            map.trove_mut(trove).commit(idx);
        }

        for suite in &self.effects {
            let who = state
                .char_id(suite.short())
                .ok_or_else(|| EngineError::UnboundCharacter(suite.short().to_string()))?;
            let texts = suite.perform_all(who, roster, map, &state, rng)?;
            outcome.push_effects(who, texts);
        }
        Ok(state)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.rarity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{Character, Pronouns};
    use crate::item::Item;
    use crate::map::Zone;
    use crate::text::EnglishInflect;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn raw(json: &str) -> RawEvent {
        serde_json::from_str(json).unwrap()
    }

    fn world() -> (Vec<Item>, Map, Roster) {
        let items = vec![
            Item::new("knife", vec!["weapon".into()]),
            Item::new("bread", vec!["food".into()]),
        ];
        let mut map = Map::new();
        let a = map.add_zone(Zone::new("cornucopia", None));
        let b = map.add_zone(Zone::new("forest", None));
        map.connect(a, b);

        let mut roster = Roster::new();
        for (name, p) in [
            ("Robin", Pronouns::she()),
            ("Alex", Pronouns::they()),
            ("Casey", Pronouns::he()),
        ] {
            let id = roster.add(Character::new(name, None, p));
            roster.get_mut(id).move_to(a);
            roster.get_mut(id).inc_age();
        }
        (items, map, roster)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(21)
    }

    #[test]
    fn test_rarity_parse_and_weights() {
        assert_eq!("common".parse::<Rarity>().ok(), Some(Rarity::Common));
        assert_eq!("DEFAULT".parse::<Rarity>().ok(), Some(Rarity::Default));
        assert!(matches!(
            "legendary".parse::<Rarity>(),
            Err(LoadError::UnknownRarity(s)) if s == "legendary"
        ));
        assert_eq!(Rarity::Common.weight(), 30);
        assert_eq!(Rarity::Shiny.weight(), 1);
        assert_eq!(Rarity::Default.weight(), 0);
    }

    #[test]
    fn test_from_raw_requires_chance_and_text() {
        let (items, map, _) = world();
        let mut valids = Valids::new(&items, &map);
        let err = Event::from_raw(
            "bare",
            &raw(r#"{"text": ["x"], "req": {"mc": ""}}"#),
            &mut valids,
            None,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("chance"));
        assert!(err.to_string().contains("in event \"bare\""));

        let mut valids = Valids::new(&items, &map);
        let err = Event::from_raw(
            "mute",
            &raw(r#"{"chance": "common", "req": {"mc": ""}}"#),
            &mut valids,
            None,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn test_from_raw_rejects_undeclared_text_shorthand() {
        let (items, map, _) = world();
        let mut valids = Valids::new(&items, &map);
        let err = Event::from_raw(
            "ghostly",
            &raw(r#"{"chance": "common", "text": ["@ghost appears"], "req": {"mc": ""}}"#),
            &mut valids,
            None,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_prepare_binds_cast_and_trigger_narrates() {
        let (items, mut map, mut roster) = world();
        let mut valids = Valids::new(&items, &map);
        let mut event = Event::from_raw(
            "spar",
            &raw(
                r#"{
                    "chance": "common",
                    "text": ["@mc spars with @other."],
                    "req": {"mc": "", "other": ""},
                    "res": {"mc": "tag tired 1", "other": "tag tired 1"}
                }"#,
            ),
            &mut valids,
            None,
            false,
        )
        .unwrap();

        let robin = roster.id_by_name("Robin").unwrap();
        let mut rng = rng();
        let state = event
            .prepare(robin, &roster, &map, None, &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(state.char_id("mc"), Some(robin));
        let other = state.char_id("other").unwrap();
        assert_ne!(other, robin);

        let mut outcome = Outcome::default();
        event
            .trigger(state, &mut roster, &mut map, &mut outcome, &EnglishInflect, &mut rng)
            .unwrap();
        assert_eq!(outcome.main, Some(robin));
        assert_eq!(outcome.texts.len(), 1);
        assert!(outcome.texts[0].starts_with("Robin spars with "));
        assert!(roster.get(robin).has_tag("tired"));
        assert!(roster.get(other).has_tag("tired"));
        assert_eq!(event.trigger_count(robin), 1);
    }

    #[test]
    fn test_prepare_fails_without_matching_companion() {
        let (items, map, mut roster) = world();
        // Strand everyone else in the forest so nobody is nearby.
        let robin = roster.id_by_name("Robin").unwrap();
        for id in roster.ids().collect::<Vec<_>>() {
            if id != robin {
                roster.get_mut(id).move_to(crate::map::ZoneId(1));
            }
        }

        let mut valids = Valids::new(&items, &map);
        let event = Event::from_raw(
            "spar",
            &raw(
                r#"{
                    "chance": "common",
                    "text": ["@mc spars with @other."],
                    "req": {"mc": "", "other": ""}
                }"#,
            ),
            &mut valids,
            None,
            false,
        )
        .unwrap();

        let mut rng = rng();
        let prepared = event.prepare(robin, &roster, &map, None, &mut rng).unwrap();
        assert!(prepared.is_none());
        assert_eq!(event.trigger_count(robin), 0);
    }

    #[test]
    fn test_dead_main_fails_implicit_alive() {
        let (items, map, mut roster) = world();
        let robin = roster.id_by_name("Robin").unwrap();
        roster.get_mut(robin).kill();

        let mut valids = Valids::new(&items, &map);
        let event = Event::from_raw(
            "forage",
            &raw(r#"{"chance": "common", "text": ["@mc forages."], "req": {"mc": ""}}"#),
            &mut valids,
            None,
            false,
        )
        .unwrap();
        let mut rng = rng();
        assert!(event
            .prepare(robin, &roster, &map, None, &mut rng)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_default_req_applies_to_every_suite() {
        let (items, map, mut roster) = world();
        let robin = roster.id_by_name("Robin").unwrap();

        let mut valids = Valids::new(&items, &map);
        let event = Event::from_raw(
            "raid",
            &raw(r#"{"chance": "common", "text": ["@mc raids."], "req": {"mc": ""}}"#),
            &mut valids,
            Some("in forest"),
            false,
        )
        .unwrap();

        let mut rng = rng();
        // Robin is at the cornucopia, so the file-wide requirement fails.
        assert!(event
            .prepare(robin, &roster, &map, None, &mut rng)
            .unwrap()
            .is_none());
        roster.get_mut(robin).move_to(crate::map::ZoneId(1));
        assert!(event
            .prepare(robin, &roster, &map, None, &mut rng)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_sub_event_recasts_and_rechecks() {
        let (items, mut map, mut roster) = world();
        let robin = roster.id_by_name("Robin").unwrap();

        let mut valids = Valids::new(&items, &map);
        let mut event = Event::from_raw(
            "ambush",
            &raw(
                r#"{
                    "chance": "common",
                    "text": ["@mc ambushes @victim."],
                    "req": {"mc": "", "victim": ""},
                    "sub": {
                        "fatal": {
                            "chance": "common",
                            "text": ["@victim falls."],
                            "req": {"victim": ""},
                            "res": {"victim": "kill"}
                        }
                    }
                }"#,
            ),
            &mut valids,
            None,
            false,
        )
        .unwrap();
        assert_eq!(event.sub_events()[0].name(), "ambush.fatal");

        let mut rng = rng();
        let state = event
            .prepare(robin, &roster, &map, None, &mut rng)
            .unwrap()
            .unwrap();
        let victim = state.char_id("victim").unwrap();

        let mut outcome = Outcome::default();
        let post = event
            .trigger(state, &mut roster, &mut map, &mut outcome, &EnglishInflect, &mut rng)
            .unwrap();

        // The sub-event inherits the cast: `victim` stays bound.
        let sub = &mut event.sub_events_mut()[0];
        let sub_state = sub
            .prepare(robin, &roster, &map, Some(&post), &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(sub_state.char_id("victim"), Some(victim));
        sub.trigger(sub_state, &mut roster, &mut map, &mut outcome, &EnglishInflect, &mut rng)
            .unwrap();
        assert!(!roster.get(victim).is_alive());
        assert_eq!(outcome.texts.len(), 2);
        // Sub-event counters key on the top-level main character.
        assert_eq!(event.sub_events()[0].trigger_count(robin), 1);
    }

    #[test]
    fn test_undeclared_res_shorthand_is_an_error() {
        let (items, map, _) = world();
        let mut valids = Valids::new(&items, &map);
        let err = Event::from_raw(
            "twin",
            &raw(
                r#"{"chance": "common", "text": ["x"],
                    "req": {"mc": ""}, "res": {"mc": "kill", "mc2": "kill"}}"#,
            ),
            &mut valids,
            None,
            false,
        )
        .unwrap_err();
        // `mc2` never declared by a check suite.
        assert!(err.to_string().contains("mc2"));
    }
}
