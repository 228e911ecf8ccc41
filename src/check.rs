//! Checks: the requirement half of the rule DSL.
//!
//! A check is a predicate over one character. Binding checks additionally
//! write a shorthand→item binding into the match [`State`] when they pass;
//! no check ever mutates a character. The recognized instruction shapes
//! live in [`CHECK_PARTS`], scanned in declaration order.

use crate::character::{CharId, Roster};
use crate::error::{EngineError, LoadError, PartError};
use crate::item::Item;
use crate::map::{Map, TroveId, ZoneId};
use crate::part::{annotate_line, parse_group, split_groups, CmpOp, PartSpec};
use crate::state::State;
use crate::valids::Valids;
use rand::seq::SliceRandom;
use rand::RngCore;

#[derive(Debug, Clone)]
pub enum Check {
    /// `alive` / `dead`.
    Alive(bool),
    /// `nearby target?` / `anydistance`; no target means always true.
    Nearby(Option<String>),
    /// `alone` / `allied`.
    Alone(bool),
    /// `ally target` / `enemy target`.
    Relation { ally: bool, target: String },
    /// `tag name`, `tag !name`.
    TagPresent { name: String, negate: bool },
    /// `tag= name age` and friends.
    TagAge { name: String, cmp: CmpOp, age: u32 },
    /// `item short tags..`: bind an inventory item by tags.
    ItemByTags { short: String, tags: Vec<String> },
    /// `itemnamed short name`: bind an inventory item by exact name.
    ItemByName { short: String, name: String },
    /// `create short tags..` / `createnamed short name`: bind a fresh
    /// item drawn from the matching catalog subset. Always passes.
    Create { short: String, pool: Vec<Item> },
    /// `loot short trove`: bind a trove draw. The draw is only reserved
    /// here; the event commits the removal when it actually triggers.
    Loot { short: String, trove: TroveId },
    /// `in zone`.
    In(ZoneId),
    /// `limit n` / `limittotal n`.
    Limit { per_char: bool, max: u32 },
    /// `round cmp n`: compare the character's age counter.
    Round { cmp: CmpOp, age: u32 },
    /// `status name?`: holds the named status, or any status.
    StatusPresent { name: Option<String> },
    /// `status= name age` and friends.
    StatusAge { name: String, cmp: CmpOp, age: u32 },
}

impl Check {
    pub fn eval(
        &self,
        who: CharId,
        roster: &Roster,
        map: &Map,
        state: &mut State,
        rng: &mut dyn RngCore,
    ) -> Result<bool, EngineError> {
        let me = roster.get(who);
        match self {
            Check::Alive(want) => Ok(me.is_alive() == *want),

            Check::Nearby(None) => Ok(true),
            Check::Nearby(Some(target)) => {
                let target = state
                    .char_id(target)
                    .ok_or_else(|| EngineError::UnboundCharacter(target.clone()))?;
                Ok(me.is_nearby(roster.get(target)))
            }

            Check::Alone(want) => Ok(me.is_alone() == *want),

            Check::Relation { ally, target } => {
                let target = state
                    .char_id(target)
                    .ok_or_else(|| EngineError::UnboundCharacter(target.clone()))?;
                Ok(roster.is_ally_of(who, target) == *ally)
            }

            Check::TagPresent { name, negate } => Ok(me.has_tag(name) != *negate),

            Check::TagAge { name, cmp, age } => Ok(me
                .tag_age(name)
                .map(|a| cmp.eval(a, *age))
                .unwrap_or(false)),

            Check::ItemByTags { short, tags } => match me.item_by_tags(tags) {
                Some(item) => {
                    state.bind_item(short, item.clone());
                    Ok(true)
                }
                None => Ok(false),
            },

            Check::ItemByName { short, name } => match me.item_by_name(name) {
                Some(item) => {
                    state.bind_item(short, item.clone());
                    Ok(true)
                }
                None => Ok(false),
            },

            Check::Create { short, pool } => match pool.choose(rng) {
                Some(item) => {
                    state.bind_item(short, item.clone());
                    Ok(true)
                }
                None => Ok(false),
            },

            Check::Loot { short, trove } => {
                let reserved = state.reserved_in(*trove);
                match map.trove(*trove).peek(&reserved, rng) {
                    Some((idx, item)) => {
                        state.bind_item(short, item);
                        state.reserve_loot(*trove, idx);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }

            Check::In(zone) => Ok(me.is_in(*zone)),

            Check::Limit { per_char, max } => {
                let count = if *per_char {
                    state.triggers().for_char(who)
                } else {
                    state.triggers().total()
                };
                Ok(count <= *max)
            }

            Check::Round { cmp, age } => Ok(cmp.eval(me.age(), *age)),

            Check::StatusPresent { name } => Ok(match name {
                Some(name) => me.has_status(name),
                None => me.status().is_some(),
            }),

            Check::StatusAge { name, cmp, age } => Ok(me
                .status_age(name)
                .map(|a| cmp.eval(a, *age))
                .unwrap_or(false)),
        }
    }
}

fn cmp_for_keyword(keyword: &str) -> CmpOp {
    if keyword.ends_with('<') {
        CmpOp::Lt
    } else if keyword.ends_with('>') {
        CmpOp::Gt
    } else {
        CmpOp::Eq
    }
}

pub static CHECK_PARTS: &[PartSpec<Check>] = &[
    PartSpec {
        keywords: &["alive", "dead"],
        args: &["alive state (type)"],
        build: |t, _| Ok(Check::Alive(t[0] == "alive")),
    },
    PartSpec {
        keywords: &["nearby"],
        args: &["type", "target char shorthand?"],
        build: |t, v| {
            if t.len() == 2 {
                Ok(Check::Nearby(Some(v.char_short(&t[1])?)))
            } else {
                Ok(Check::Nearby(None))
            }
        },
    },
    PartSpec {
        keywords: &["anydistance"],
        args: &["type"],
        build: |_, _| Ok(Check::Nearby(None)),
    },
    PartSpec {
        keywords: &["alone", "allied"],
        args: &["type"],
        build: |t, _| Ok(Check::Alone(t[0] == "alone")),
    },
    PartSpec {
        keywords: &["ally", "enemy"],
        args: &["relationship (type)", "target char shorthand"],
        build: |t, v| {
            Ok(Check::Relation {
                ally: t[0] == "ally",
                target: v.char_short(&t[1])?,
            })
        },
    },
    PartSpec {
        keywords: &["tag"],
        args: &["type", "tag name"],
        build: |t, v| {
            let (name, negate) = match t[1].strip_prefix('!') {
                Some(stripped) => (stripped.to_string(), true),
                None => (t[1].clone(), false),
            };
            v.note_tag_name(&name);
            Ok(Check::TagPresent { name, negate })
        },
    },
    PartSpec {
        keywords: &["tag=", "tag<", "tag>"],
        args: &["type", "tag name", "age"],
        build: |t, v| {
            v.note_tag_name(&t[1]);
            Ok(Check::TagAge {
                name: t[1].clone(),
                cmp: cmp_for_keyword(&t[0]),
                age: Valids::number(&t[2])?,
            })
        },
    },
    PartSpec {
        keywords: &["item"],
        args: &["type", "item shorthand", "*item tags"],
        build: |t, v| {
            v.declare_item_short(&t[1])?;
            let tags = t[2..]
                .iter()
                .map(|tag| v.item_tag(tag))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Check::ItemByTags {
                short: t[1].clone(),
                tags,
            })
        },
    },
    PartSpec {
        keywords: &["itemnamed"],
        args: &["type", "item shorthand", "item name"],
        build: |t, v| {
            v.declare_item_short(&t[1])?;
            Ok(Check::ItemByName {
                short: t[1].clone(),
                name: v.item_name(&t[2])?,
            })
        },
    },
    PartSpec {
        keywords: &["create"],
        args: &["type", "item shorthand", "*item tags"],
        build: |t, v| {
            v.declare_item_short(&t[1])?;
            let tags = t[2..]
                .iter()
                .map(|tag| v.item_tag(tag))
                .collect::<Result<Vec<_>, _>>()?;
            let pool = v.items_with_tags(&tags);
            if pool.is_empty() {
                return Err(PartError::Invalid {
                    expected: "item tag set matching at least one item",
                    token: t[2..].join(" "),
                });
            }
            Ok(Check::Create {
                short: t[1].clone(),
                pool,
            })
        },
    },
    PartSpec {
        keywords: &["createnamed"],
        args: &["type", "item shorthand", "item name"],
        build: |t, v| {
            v.declare_item_short(&t[1])?;
            let name = v.item_name(&t[2])?;
            let pool = match v.item_by_name(&name) {
                Some(item) => vec![item.clone()],
                None => Vec::new(),
            };
            Ok(Check::Create {
                short: t[1].clone(),
                pool,
            })
        },
    },
    PartSpec {
        keywords: &["loot", "takefrom"],
        args: &["type", "item shorthand", "trove name"],
        build: |t, v| {
            v.declare_item_short(&t[1])?;
            Ok(Check::Loot {
                short: t[1].clone(),
                trove: v.trove(&t[2])?,
            })
        },
    },
    PartSpec {
        keywords: &["in"],
        args: &["type", "zone name"],
        build: |t, v| Ok(Check::In(v.zone(&t[1])?)),
    },
    PartSpec {
        keywords: &["limit", "limittotal"],
        args: &["type", "trigger count"],
        build: |t, _| {
            Ok(Check::Limit {
                per_char: t[0] == "limit",
                max: Valids::number(&t[1])?,
            })
        },
    },
    PartSpec {
        keywords: &["round"],
        args: &["type", "comparison", "round number"],
        build: |t, _| {
            Ok(Check::Round {
                cmp: Valids::comparison(&t[1])?,
                age: Valids::number(&t[2])?,
            })
        },
    },
    PartSpec {
        keywords: &["status"],
        args: &["type", "status name?"],
        build: |t, _| {
            Ok(Check::StatusPresent {
                name: t.get(1).cloned(),
            })
        },
    },
    PartSpec {
        keywords: &["status=", "status<", "status>"],
        args: &["type", "status name", "age"],
        build: |t, _| {
            Ok(Check::StatusAge {
                name: t[1].clone(),
                cmp: cmp_for_keyword(&t[0]),
                age: Valids::number(&t[2])?,
            })
        },
    },
];

/// Where a check suite sits in its event, which decides the implicit
/// defaults it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuitePosition {
    /// First suite of a top-level event: the acting character.
    Main,
    /// Later suite of a top-level event: a matched co-star.
    Companion,
    /// Any suite of a sub-event. No defaults; the parent vetted the cast.
    Sub,
}

/// The requirement suite for one character shorthand.
#[derive(Debug, Clone)]
pub struct CheckSuite {
    short: String,
    checks: Vec<Check>,
}

impl CheckSuite {
    /// Parse one `req` line. Top-level suites get an implicit `alive`
    /// check and an implicit `round != 0` check when the line has none,
    /// and companion suites additionally get `nearby <main>` when the
    /// line constrains distance in no way.
    pub fn parse(
        short: &str,
        line: &str,
        position: SuitePosition,
        valids: &mut Valids,
    ) -> Result<CheckSuite, LoadError> {
        valids.declare_char_short(short);

        let groups = split_groups(line);
        let mut checks = Vec::with_capacity(groups.len() + 3);
        for (i, group) in groups.iter().enumerate() {
            match parse_group(group, CHECK_PARTS, valids) {
                Ok(check) => checks.push(check),
                Err(err) => {
                    return Err(LoadError::InLine {
                        line: annotate_line(&groups, i),
                        source: err,
                    })
                }
            }
        }

        if position != SuitePosition::Sub {
            if !checks.iter().any(|c| matches!(c, Check::Round { .. })) {
                checks.insert(0, Check::Round { cmp: CmpOp::Ne, age: 0 });
            }
            if !checks.iter().any(|c| matches!(c, Check::Alive(_))) {
                checks.insert(0, Check::Alive(true));
            }
        }
        if position == SuitePosition::Companion
            && !checks.iter().any(|c| matches!(c, Check::Nearby(_)))
        {
            if let Some(main) = valids.main_short() {
                checks.push(Check::Nearby(Some(main.to_string())));
            }
        }

        Ok(CheckSuite {
            short: short.to_string(),
            checks,
        })
    }

    pub fn short(&self) -> &str {
        &self.short
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Bind the candidate to this suite's shorthand and run every check,
    /// short-circuiting on the first failure. Earlier binding checks are
    /// visible to later checks in the same suite.
    pub fn check_all(
        &self,
        who: CharId,
        roster: &Roster,
        map: &Map,
        state: &mut State,
        rng: &mut dyn RngCore,
    ) -> Result<bool, EngineError> {
        state.bind_char(&self.short, who);
        for check in &self.checks {
            if !check.eval(who, roster, map, state, rng)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
