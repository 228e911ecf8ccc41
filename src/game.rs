//! The game loop: round progression, weighted event selection, and the
//! trigger cascade.

use crate::character::{CharId, Roster};
use crate::error::EngineError;
use crate::event::Event;
use crate::item::Item;
use crate::map::Map;
use crate::state::{Outcome, State};
use crate::text::Inflect;
use log::{debug, info};
use rand::distributions::{Distribution, Uniform};
use rand::RngCore;

/// What `round()` found when asked to begin a new round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStart {
    /// `start()` has not been called.
    NotStarted,
    /// Characters from the current round still have to act.
    StillGoing,
    /// A fresh round began.
    Started,
}

/// What `next()` produced.
#[derive(Debug)]
pub enum Turn {
    /// `start()` has not been called.
    NotStarted,
    /// Nobody is left to act; call `round()`.
    RoundOver,
    /// A character acted. `None` means the character was dead by the time
    /// its turn came up.
    Acted(Option<Outcome>),
}

/// Result of a by-name trigger request. Name misses come from user input
/// and are expected, so they are data rather than errors.
#[derive(Debug)]
pub enum TriggerByName {
    UnknownCharacter(String),
    UnknownEvent(String),
    /// The event's requirements could not be met.
    DidNotMatch,
    Triggered(Outcome),
}

pub struct Game {
    roster: Roster,
    map: Map,
    items: Vec<Item>,
    events: Vec<Event>,
    inflect: Box<dyn Inflect>,
    in_progress: bool,
    to_act: Vec<CharId>,
    acted: Vec<CharId>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("roster", &self.roster)
            .field("map", &self.map)
            .field("items", &self.items)
            .field("events", &self.events)
            .field("inflect", &"<dyn Inflect>")
            .field("in_progress", &self.in_progress)
            .field("to_act", &self.to_act)
            .field("acted", &self.acted)
            .finish()
    }
}

impl Game {
    pub fn new(
        items: Vec<Item>,
        events: Vec<Event>,
        roster: Roster,
        map: Map,
        inflect: Box<dyn Inflect>,
    ) -> Game {
        Game {
            roster,
            map,
            items,
            events,
            inflect,
            in_progress: false,
            to_act: Vec::new(),
            acted: Vec::new(),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event_by_name(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name() == name)
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn round_going(&self) -> bool {
        !self.to_act.is_empty()
    }

    /// Begin a new game: revive and strip every character, gather them at
    /// the starting zone, and refill the troves. Returns false when a
    /// game is already in progress.
    pub fn start(&mut self) -> bool {
        self.start_with_rng(&mut rand::thread_rng())
    }

    pub fn start_with_rng(&mut self, rng: &mut dyn RngCore) -> bool {
        if self.in_progress {
            return false;
        }
        self.in_progress = true;
        self.roster.reset();
        let start = self.map.start_zone();
        for id in self.roster.ids().collect::<Vec<_>>() {
            self.roster.get_mut(id).move_to(start);
        }
        self.map.restock_troves(rng);
        self.to_act.clear();
        self.acted.clear();
        info!("game started with {} characters", self.roster.len());
        true
    }

    /// Begin a new round: age every living character's tags and status
    /// and queue them all up to act.
    pub fn round(&mut self) -> RoundStart {
        if self.round_going() {
            return RoundStart::StillGoing;
        }
        if !self.in_progress {
            return RoundStart::NotStarted;
        }
        self.acted.clear();
        self.to_act = self.roster.living_ids();
        for &id in &self.to_act {
            self.roster.get_mut(id).on_round_start();
        }
        debug!("round started, {} to act", self.to_act.len());
        RoundStart::Started
    }

    /// Advance one turn: pop a random not-yet-acted character, age it,
    /// and run the full choose-and-trigger cascade for it.
    pub fn next(&mut self) -> Result<Turn, EngineError> {
        self.next_with_rng(&mut rand::thread_rng())
    }

    pub fn next_with_rng(&mut self, rng: &mut dyn RngCore) -> Result<Turn, EngineError> {
        if !self.in_progress {
            return Ok(Turn::NotStarted);
        }
        if self.to_act.is_empty() {
            return Ok(Turn::RoundOver);
        }
        let pick = Uniform::from(0..self.to_act.len()).sample(rng);
        let acting = self.to_act.swap_remove(pick);
        self.acted.push(acting);
        self.roster.get_mut(acting).inc_age();

        let chosen = Self::choose_from(&self.events, acting, &self.roster, &self.map, None, rng)?;
        let Some((idx, state)) = chosen else {
            if self.roster.get(acting).is_alive() {
                return Err(EngineError::NoEventMatched(
                    self.roster.get(acting).name().to_string(),
                ));
            }
            return Ok(Turn::Acted(None));
        };
        debug!(
            "{} triggers {}",
            self.roster.get(acting).name(),
            self.events[idx].name()
        );

        let mut outcome = Outcome::default();
        Self::cascade(
            &mut self.events[idx],
            state,
            acting,
            &mut self.roster,
            &mut self.map,
            self.inflect.as_ref(),
            rng,
            &mut outcome,
        )?;
        Ok(Turn::Acted(Some(outcome)))
    }

    /// Force a specific event for a specific character, cascade included.
    pub fn trigger_by_name(
        &mut self,
        char_name: &str,
        event_name: &str,
    ) -> Result<TriggerByName, EngineError> {
        self.trigger_by_name_with_rng(char_name, event_name, &mut rand::thread_rng())
    }

    pub fn trigger_by_name_with_rng(
        &mut self,
        char_name: &str,
        event_name: &str,
        rng: &mut dyn RngCore,
    ) -> Result<TriggerByName, EngineError> {
        let Some(who) = self.roster.id_by_name(char_name) else {
            return Ok(TriggerByName::UnknownCharacter(char_name.to_string()));
        };
        let Some(idx) = self.events.iter().position(|e| e.name() == event_name) else {
            return Ok(TriggerByName::UnknownEvent(event_name.to_string()));
        };
        let Some(state) = self.events[idx].prepare(who, &self.roster, &self.map, None, rng)?
        else {
            return Ok(TriggerByName::DidNotMatch);
        };
        let mut outcome = Outcome::default();
        Self::cascade(
            &mut self.events[idx],
            state,
            who,
            &mut self.roster,
            &mut self.map,
            self.inflect.as_ref(),
            rng,
            &mut outcome,
        )?;
        Ok(TriggerByName::Triggered(outcome))
    }

    /// Prepare every candidate and draw one, weighted by rarity. Weight-0
    /// events are set aside as the fallback default; the last one to
    /// prepare wins. Returns the chosen index with its prepared state.
    fn choose_from(
        events: &[Event],
        who: CharId,
        roster: &Roster,
        map: &Map,
        inherited: Option<&State>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<(usize, State)>, EngineError> {
        let mut weighted: Vec<(usize, u32, State)> = Vec::new();
        let mut total = 0u32;
        let mut default: Option<(usize, State)> = None;

        for (i, event) in events.iter().enumerate() {
            let Some(state) = event.prepare(who, roster, map, inherited, rng)? else {
                continue;
            };
            let weight = event.weight();
            if weight == 0 {
                default = Some((i, state));
            } else {
                total += weight;
                weighted.push((i, weight, state));
            }
        }

        if weighted.is_empty() {
            return Ok(default);
        }
        // The roll is below the summed weights, so the cumulative walk
        // always lands on an entry before running off the end.
        let roll = Uniform::from(0..total).sample(rng);
        let mut count = 0;
        let mut pick = weighted.len() - 1;
        for (idx, (_, weight, _)) in weighted.iter().enumerate() {
            if roll < count + weight {
                pick = idx;
                break;
            }
            count += weight;
        }
        let (i, _, state) = weighted.swap_remove(pick);
        Ok(Some((i, state)))
    }

    /// Trigger an event, then walk down its sub-events until one round of
    /// selection finds no match or a leaf is reached.
    #[allow(clippy::too_many_arguments)]
    fn cascade(
        event: &mut Event,
        state: State,
        who: CharId,
        roster: &mut Roster,
        map: &mut Map,
        inflect: &dyn Inflect,
        rng: &mut dyn RngCore,
        outcome: &mut Outcome,
    ) -> Result<(), EngineError> {
        let post = event.trigger(state, roster, map, outcome, inflect, rng)?;
        if event.sub_events().is_empty() {
            return Ok(());
        }
        let chosen = Self::choose_from(event.sub_events(), who, roster, map, Some(&post), rng)?;
        match chosen {
            Some((i, sub_state)) => Self::cascade(
                &mut event.sub_events_mut()[i],
                sub_state,
                who,
                roster,
                map,
                inflect,
                rng,
                outcome,
            ),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RawEvent;
    use crate::character::{Character, Pronouns};
    use crate::map::Zone;
    use crate::text::EnglishInflect;
    use crate::valids::Valids;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn event(name: &str, json: &str, items: &[Item], map: &Map) -> Event {
        let raw: RawEvent = serde_json::from_str(json).unwrap();
        let mut valids = Valids::new(items, map);
        Event::from_raw(name, &raw, &mut valids, None, false).unwrap()
    }

    fn game() -> Game {
        let items = vec![Item::new("bread", vec!["food".into()])];
        let mut map = Map::new();
        let a = map.add_zone(Zone::new("cornucopia", None));
        let b = map.add_zone(Zone::new("forest", None));
        map.connect(a, b);

        let mut roster = Roster::new();
        roster.add(Character::new("Robin", None, Pronouns::she()));
        roster.add(Character::new("Alex", None, Pronouns::they()));

        let events = vec![
            event(
                "wander",
                r#"{"chance": "common", "text": ["@mc wanders."], "req": {"mc": ""},
                    "res": {"mc": "move"}}"#,
                &items,
                &map,
            ),
            event(
                "idle",
                r#"{"chance": "DEFAULT", "text": ["@mc does nothing."], "req": {"mc": ""}}"#,
                &items,
                &map,
            ),
        ];
        Game::new(items, events, roster, map, Box::new(EnglishInflect))
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(33)
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut game = game();
        let mut rng = rng();
        assert!(game.start_with_rng(&mut rng));
        assert!(!game.start_with_rng(&mut rng));
        assert!(game.in_progress());
        let start = game.map().start_zone();
        assert!(game.roster().iter().all(|c| c.is_in(start)));
    }

    #[test]
    fn test_round_and_next_sentinels() {
        let mut game = game();
        let mut rng = rng();
        assert_eq!(game.round(), RoundStart::NotStarted);
        assert!(matches!(game.next_with_rng(&mut rng), Ok(Turn::NotStarted)));

        game.start_with_rng(&mut rng);
        assert!(matches!(game.next_with_rng(&mut rng), Ok(Turn::RoundOver)));
        assert_eq!(game.round(), RoundStart::Started);
        assert_eq!(game.round(), RoundStart::StillGoing);
    }

    #[test]
    fn test_full_round_acts_every_living_character() {
        let mut game = game();
        let mut rng = rng();
        game.start_with_rng(&mut rng);
        game.round();

        let mut outcomes = 0;
        loop {
            match game.next_with_rng(&mut rng).unwrap() {
                Turn::Acted(Some(_)) => outcomes += 1,
                Turn::Acted(None) => {}
                Turn::RoundOver => break,
                Turn::NotStarted => panic!("game is started"),
            }
        }
        assert_eq!(outcomes, 2);
        assert!(!game.round_going());
        assert_eq!(game.round(), RoundStart::Started);
    }

    #[test]
    fn test_default_event_fires_when_nothing_matches() {
        let items = vec![Item::new("bread", vec!["food".into()])];
        let mut map = Map::new();
        map.add_zone(Zone::new("cornucopia", None));

        let mut roster = Roster::new();
        roster.add(Character::new("Robin", None, Pronouns::she()));

        // The only weighted event requires a second character; with a
        // one-character roster only the default can fire.
        let events = vec![
            event(
                "spar",
                r#"{"chance": "common", "text": ["@mc spars with @other."],
                    "req": {"mc": "", "other": ""}}"#,
                &items,
                &map,
            ),
            event(
                "idle",
                r#"{"chance": "DEFAULT", "text": ["@mc does nothing."], "req": {"mc": ""}}"#,
                &items,
                &map,
            ),
        ];
        let mut game = Game::new(items, events, roster, map, Box::new(EnglishInflect));
        let mut rng = rng();
        game.start_with_rng(&mut rng);
        game.round();
        match game.next_with_rng(&mut rng).unwrap() {
            Turn::Acted(Some(outcome)) => {
                assert_eq!(outcome.texts, vec!["Robin does nothing."]);
            }
            other => panic!("expected an outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_no_match_for_living_character_is_an_error() {
        let items = vec![Item::new("bread", vec!["food".into()])];
        let mut map = Map::new();
        map.add_zone(Zone::new("cornucopia", None));
        let mut roster = Roster::new();
        roster.add(Character::new("Robin", None, Pronouns::she()));

        let events = vec![event(
            "spar",
            r#"{"chance": "common", "text": ["@mc spars with @other."],
                "req": {"mc": "", "other": ""}}"#,
            &items,
            &map,
        )];
        let mut game = Game::new(items, events, roster, map, Box::new(EnglishInflect));
        let mut rng = rng();
        game.start_with_rng(&mut rng);
        game.round();
        let err = game.next_with_rng(&mut rng).unwrap_err();
        assert!(matches!(err, EngineError::NoEventMatched(name) if name == "Robin"));
    }

    #[test]
    fn test_trigger_by_name() {
        let mut game = game();
        let mut rng = rng();
        game.start_with_rng(&mut rng);
        game.round();
        // Age Robin past round zero so the implicit round check passes.
        let robin = game.roster().id_by_name("Robin").unwrap();
        game.roster.get_mut(robin).inc_age();

        assert!(matches!(
            game.trigger_by_name_with_rng("Nobody", "wander", &mut rng).unwrap(),
            TriggerByName::UnknownCharacter(name) if name == "Nobody"
        ));
        assert!(matches!(
            game.trigger_by_name_with_rng("Robin", "nothing", &mut rng).unwrap(),
            TriggerByName::UnknownEvent(name) if name == "nothing"
        ));
        match game.trigger_by_name_with_rng("Robin", "wander", &mut rng).unwrap() {
            TriggerByName::Triggered(outcome) => {
                assert_eq!(outcome.main, Some(robin));
                assert_eq!(outcome.texts, vec!["Robin wanders."]);
                assert!(!game.roster().get(robin).is_in(game.map().start_zone()));
            }
            other => panic!("expected a trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_dead_characters_sit_out_the_round() {
        let mut game = game();
        let mut rng = rng();
        game.start_with_rng(&mut rng);
        let robin = game.roster().id_by_name("Robin").unwrap();
        game.roster.get_mut(robin).kill();
        game.round();

        let mut acted = 0;
        while let Turn::Acted(_) = game.next_with_rng(&mut rng).unwrap() {
            acted += 1;
        }
        assert_eq!(acted, 1);
    }
}
