//! Narration templates.
//!
//! Event text mixes literal prose with substitution tokens matched by
//! [`struct@TOKEN_RE`]: an optional prefix, a sigil, and a shorthand.
//! `@short` tokens project a bound character (name, pronouns, or a
//! conjugated verb); `&short` tokens project a bound item, optionally with
//! an indefinite article. Templates are validated against the declared
//! shorthands at load time and rendered against a [`State`] at trigger time.

use crate::character::{capitalize, Roster};
use crate::error::{EngineError, LoadError};
use crate::state::State;
use crate::valids::Valids;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// prefix, sigil, shorthand.
    pub static ref TOKEN_RE: Regex =
        Regex::new(r"([A-Za-z']*)(@|&)(\w+)").unwrap();
}

/// English surface-form helpers used when rendering tokens. A trait so the
/// platform layer can swap in a smarter inflector without touching the
/// engine.
pub trait Inflect {
    /// Conjugate a base-form verb for a third-person singular subject.
    fn third_person(&self, verb: &str) -> String;

    /// The indefinite article for a noun phrase.
    fn article(&self, noun: &str) -> &'static str;
}

/// Rule-based inflector. Handles the common English patterns and the
/// irregulars that actually show up in event text.
pub struct EnglishInflect;

impl Inflect for EnglishInflect {
    fn third_person(&self, verb: &str) -> String {
        match verb {
            "are" => return "is".to_string(),
            "were" => return "was".to_string(),
            "have" => return "has".to_string(),
            "do" => return "does".to_string(),
            "don't" => return "doesn't".to_string(),
            "aren't" => return "isn't".to_string(),
            "go" => return "goes".to_string(),
            _ => {}
        }
        if verb.ends_with('s')
            || verb.ends_with('x')
            || verb.ends_with('z')
            || verb.ends_with("ch")
            || verb.ends_with("sh")
        {
            format!("{verb}es")
        } else if verb.ends_with('y')
            && !verb
                .chars()
                .rev()
                .nth(1)
                .is_some_and(|c| "aeiou".contains(c))
        {
            format!("{}ies", &verb[..verb.len() - 1])
        } else {
            format!("{verb}s")
        }
    }

    fn article(&self, noun: &str) -> &'static str {
        if noun
            .chars()
            .next()
            .is_some_and(|c| "aeiouAEIOU".contains(c))
        {
            "an"
        } else {
            "a"
        }
    }
}

/// Check every token in a template against the shorthands the event's
/// checks declare. Character tokens accept any prefix (it becomes a verb
/// or pronoun); item tokens accept only an article prefix.
pub fn validate_template(text: &str, valids: &Valids) -> Result<(), LoadError> {
    for caps in TOKEN_RE.captures_iter(text) {
        let prefix = &caps[1];
        let sigil = &caps[2];
        let short = &caps[3];
        match sigil {
            "@" => {
                if !valids.has_char_short(short) {
                    return Err(LoadError::InText {
                        text: text.to_string(),
                        problem: format!("references undeclared character shorthand `{short}`"),
                    });
                }
            }
            _ => {
                if !valids.has_item_short(short) {
                    return Err(LoadError::InText {
                        text: text.to_string(),
                        problem: format!("references undeclared item shorthand `{short}`"),
                    });
                }
                if !prefix.is_empty() && !prefix.eq_ignore_ascii_case("a") && !prefix.eq_ignore_ascii_case("an")
                {
                    return Err(LoadError::InText {
                        text: text.to_string(),
                        problem: format!("item token has a non-article prefix `{prefix}`"),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Render a template against the bindings of a triggered event.
pub fn render_template(
    text: &str,
    state: &State,
    roster: &Roster,
    inflect: &dyn Inflect,
) -> Result<String, EngineError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        out.push_str(&text[last..whole.0]);
        let prefix = &caps[1];
        let short = &caps[3];
        match &caps[2] {
            "@" => {
                let id = state
                    .char_id(short)
                    .ok_or_else(|| EngineError::UnboundCharacter(short.to_string()))?;
                out.push_str(&roster.get(id).token(prefix, inflect));
            }
            _ => {
                let item = state
                    .item(short)
                    .ok_or_else(|| EngineError::UnboundItem(short.to_string()))?;
                if prefix.is_empty() {
                    out.push_str(item.name());
                } else {
                    let article = inflect.article(item.name());
                    let article = if prefix.starts_with(|c: char| c.is_uppercase()) {
                        capitalize(article)
                    } else {
                        article.to_string()
                    };
                    out.push_str(&article);
                    out.push(' ');
                    out.push_str(item.name());
                }
            }
        }
        last = whole.1;
    }
    out.push_str(&text[last..]);
    Ok(out)
}
