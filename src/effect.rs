//! Effects: the mutation half of the rule DSL.
//!
//! An effect mutates one character through the character's own methods and
//! returns a short narration fragment describing what happened. Effects
//! never fail a match; by the time they run the event has already
//! triggered, so any problem here is a runtime error, not a "no".

use crate::character::{CharId, Roster, Tag};
use crate::error::{EngineError, LoadError};
use crate::map::{Map, ZoneId};
use crate::part::{annotate_line, parse_group, split_groups, PartSpec};
use crate::state::State;
use crate::valids::Valids;
use rand::seq::SliceRandom;
use rand::RngCore;

#[derive(Debug, Clone)]
pub enum Effect {
    /// `tag name duration?`; forever when the duration is omitted.
    Tag { name: String, age: Option<u32> },
    /// `untag name`.
    Untag(String),
    /// `status name`.
    Status(String),
    /// `clear`.
    ClearStatus,
    /// `give short`: copy the bound item into the inventory.
    Give(String),
    /// `consume short`: remove the bound item copy from the inventory.
    Consume(String),
    /// `ally short`: merge alliances with the bound character.
    Ally(String),
    /// `leave`.
    Leave,
    /// `move zone?`; a random connection of the current zone when omitted.
    Move(Option<ZoneId>),
    /// `kill`.
    Kill,
    /// `revive`.
    Revive,
}

impl Effect {
    pub fn perform(
        &self,
        who: CharId,
        roster: &mut Roster,
        map: &Map,
        state: &State,
        rng: &mut dyn RngCore,
    ) -> Result<String, EngineError> {
        match self {
            Effect::Tag { name, age } => {
                let tag = match age {
                    Some(rounds) => Tag::lasting(name.clone(), *rounds),
                    None => Tag::forever(name.clone()),
                };
                roster.get_mut(who).add_tag(tag);
                Ok(format!("added tag: {name}"))
            }

            Effect::Untag(name) => {
                roster.get_mut(who).remove_tag(name);
                Ok(format!("removed tag: {name}"))
            }

            Effect::Status(name) => {
                roster.get_mut(who).set_status(name.clone());
                Ok(format!("set status: {name}"))
            }

            Effect::ClearStatus => {
                roster.get_mut(who).clear_status();
                Ok("cleared status".to_string())
            }

            Effect::Give(short) => {
                let item = state
                    .item(short)
                    .ok_or_else(|| EngineError::UnboundItem(short.clone()))?
                    .clone();
                roster.give_item(who, &item);
                Ok(format!("gave item: {}", item.name()))
            }

            Effect::Consume(short) => {
                let item = state
                    .item(short)
                    .ok_or_else(|| EngineError::UnboundItem(short.clone()))?
                    .clone();
                match roster.get_mut(who).take_item(item.instance()) {
                    Some(_) => Ok(format!("consumed item: {}", item.name())),
                    None => Err(EngineError::ItemNotHeld {
                        holder: roster.get(who).name().to_string(),
                        item: item.name().to_string(),
                    }),
                }
            }

            Effect::Ally(short) => {
                let target = state
                    .char_id(short)
                    .ok_or_else(|| EngineError::UnboundCharacter(short.clone()))?;
                let target_name = roster.get(target).name().to_string();
                let my_alliance = roster.get(who).alliance();
                let their_alliance = roster.get(target).alliance();
                match (my_alliance, their_alliance) {
                    (None, None) => {
                        roster.form_alliance(who, target);
                        Ok(format!("allied with: {target_name}"))
                    }
                    (Some(mine), _) => {
                        roster.join_alliance(target, mine);
                        Ok(format!("alliance joined by: {target_name}"))
                    }
                    (None, Some(theirs)) => {
                        roster.join_alliance(who, theirs);
                        Ok(format!("joined alliance of: {target_name}"))
                    }
                }
            }

            Effect::Leave => {
                roster.leave_alliance(who);
                Ok("left alliance".to_string())
            }

            Effect::Move(zone) => {
                let dest = match zone {
                    Some(zone) => *zone,
                    None => {
                        let here = roster.get(who).location().ok_or_else(|| {
                            EngineError::NoLocation(roster.get(who).name().to_string())
                        })?;
                        *map.zone(here).connections().choose(rng).ok_or_else(|| {
                            EngineError::IsolatedZone(map.zone(here).name().to_string())
                        })?
                    }
                };
                roster.get_mut(who).move_to(dest);
                Ok(format!("moved to zone: {}", map.zone(dest).name()))
            }

            Effect::Kill => {
                roster.get_mut(who).kill();
                Ok(format!("killed: {}", roster.get(who).name()))
            }

            Effect::Revive => {
                roster.get_mut(who).revive();
                Ok(format!("revived: {}", roster.get(who).name()))
            }
        }
    }
}

pub static EFFECT_PARTS: &[PartSpec<Effect>] = &[
    PartSpec {
        keywords: &["ally"],
        args: &["type", "target char shorthand"],
        build: |t, v| Ok(Effect::Ally(v.char_short(&t[1])?)),
    },
    PartSpec {
        keywords: &["consume"],
        args: &["type", "item shorthand"],
        build: |t, v| Ok(Effect::Consume(v.item_short(&t[1])?)),
    },
    PartSpec {
        keywords: &["clear"],
        args: &["type"],
        build: |_, _| Ok(Effect::ClearStatus),
    },
    PartSpec {
        keywords: &["give"],
        args: &["type", "item shorthand"],
        build: |t, v| Ok(Effect::Give(v.item_short(&t[1])?)),
    },
    PartSpec {
        keywords: &["kill"],
        args: &["type"],
        build: |_, _| Ok(Effect::Kill),
    },
    PartSpec {
        keywords: &["leave"],
        args: &["type"],
        build: |_, _| Ok(Effect::Leave),
    },
    PartSpec {
        keywords: &["move"],
        args: &["type", "zone name?"],
        build: |t, v| {
            let zone = match t.get(1) {
                Some(name) => Some(v.zone(name)?),
                None => None,
            };
            Ok(Effect::Move(zone))
        },
    },
    PartSpec {
        keywords: &["revive"],
        args: &["type"],
        build: |_, _| Ok(Effect::Revive),
    },
    PartSpec {
        keywords: &["status"],
        args: &["type", "status name"],
        build: |t, _| Ok(Effect::Status(t[1].clone())),
    },
    PartSpec {
        keywords: &["tag"],
        args: &["type", "tag name", "duration?"],
        build: |t, v| {
            v.note_tag_name(&t[1]);
            let age = match t.get(2) {
                Some(token) => Some(Valids::number(token)?),
                None => None,
            };
            Ok(Effect::Tag {
                name: t[1].clone(),
                age,
            })
        },
    },
    PartSpec {
        keywords: &["untag"],
        args: &["type", "tag name"],
        build: |t, v| Ok(Effect::Untag(v.known_tag_name(&t[1])?)),
    },
];

/// The result suite for one character shorthand.
#[derive(Debug, Clone)]
pub struct EffectSuite {
    short: String,
    effects: Vec<Effect>,
}

impl EffectSuite {
    /// Parse one `res` line. The shorthand must already be declared by a
    /// check suite somewhere in the event tree.
    pub fn parse(short: &str, line: &str, valids: &mut Valids) -> Result<EffectSuite, LoadError> {
        if let Err(err) = valids.char_short(short) {
            return Err(LoadError::InLine {
                line: format!("{short}: {line}"),
                source: err,
            });
        }

        let groups = split_groups(line);
        let mut effects = Vec::with_capacity(groups.len());
        for (i, group) in groups.iter().enumerate() {
            match parse_group(group, EFFECT_PARTS, valids) {
                Ok(effect) => effects.push(effect),
                Err(err) => {
                    return Err(LoadError::InLine {
                        line: annotate_line(&groups, i),
                        source: err,
                    })
                }
            }
        }
        Ok(EffectSuite {
            short: short.to_string(),
            effects,
        })
    }

    pub fn short(&self) -> &str {
        &self.short
    }

    /// Run every effect in order, collecting narration fragments. Unlike
    /// checks there is no short-circuit.
    pub fn perform_all(
        &self,
        who: CharId,
        roster: &mut Roster,
        map: &Map,
        state: &State,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<String>, EngineError> {
        let mut texts = Vec::with_capacity(self.effects.len());
        for effect in &self.effects {
            texts.push(effect.perform(who, roster, map, state, rng)?);
        }
        Ok(texts)
    }
}
