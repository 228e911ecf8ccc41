//! Error types for the two failure tiers: content/authoring errors raised
//! while loading a rule set, and logic errors raised during a live game.

use thiserror::Error;

/// A problem inside a single check/effect token group.
///
/// These are produced while parsing one instruction of the rule DSL and are
/// wrapped with line and event context before reaching the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartError {
    #[error("needs {required} argument(s) ({got} received): {usage}")]
    ArgCount {
        /// Human-readable bound, e.g. `"2"`, `"1 or 2"`, `"3 or more"`.
        required: String,
        got: usize,
        usage: String,
    },

    #[error("encountered an invalid {expected}: `{token}`")]
    Invalid {
        expected: &'static str,
        token: String,
    },

    #[error("encountered a duplicate shorthand: `{0}`")]
    DuplicateShort(String),

    #[error("not recognized as a valid event part")]
    Unrecognized,
}

/// Content/authoring errors raised while loading characters, items, maps,
/// and events. Context is attached by wrapping, outermost first, so a
/// rendered error reads `in file X: in event "Y": in line "...": ...`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("in file {file}: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<LoadError>,
    },

    #[error("in event \"{event}\": {source}")]
    InEvent {
        event: String,
        #[source]
        source: Box<LoadError>,
    },

    #[error("in line \"{line}\": {source}")]
    InLine {
        line: String,
        #[source]
        source: PartError,
    },

    #[error("in text \"{text}\": {problem}")]
    InText { text: String, problem: String },

    #[error("missing required `{0}` value")]
    MissingField(&'static str),

    #[error("`{field}` value has the wrong type (got: {got})")]
    WrongType { field: &'static str, got: String },

    #[error("unknown rarity class `{0}`")]
    UnknownRarity(String),

    #[error("`using` names no earlier event in the file: `{0}`")]
    UnknownUsing(String),

    #[error("encountered duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },

    #[error("character {name} needs 6 pronoun fields (got {got}: {spec})")]
    BadPronouns {
        name: String,
        got: usize,
        spec: String,
    },

    #[error("item `{name}`: {problem}")]
    BadItem { name: String, problem: String },

    #[error("zone `{zone}` connects to unknown zone `{connection}`")]
    BadConnection { zone: String, connection: String },

    #[error("trove `{trove}`: {problem}")]
    BadTrove { trove: String, problem: String },

    #[error("couldn't find any game object files named `{0}`")]
    NoSuchFile(String),
}

impl LoadError {
    /// Wrap this error with the name of the event it occurred in.
    pub fn in_event(self, event: impl Into<String>) -> LoadError {
        LoadError::InEvent {
            event: event.into(),
            source: Box::new(self),
        }
    }

    /// Wrap this error with the name of the file it occurred in.
    pub fn in_file(self, file: impl Into<String>) -> LoadError {
        LoadError::InFile {
            file: file.into(),
            source: Box::new(self),
        }
    }
}

/// Logic errors during a live game. Most of these indicate a defect in the
/// loaded rule set that validation could not catch statically; the engine
/// fails loudly rather than silently skipping a character's turn.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no event matched for living character {0}")]
    NoEventMatched(String),

    #[error("no character bound to shorthand `{0}`")]
    UnboundCharacter(String),

    #[error("no item bound to shorthand `{0}`")]
    UnboundItem(String),

    #[error("{holder} does not hold the bound item {item}")]
    ItemNotHeld { holder: String, item: String },

    #[error("character {0} has no location")]
    NoLocation(String),

    #[error("zone {0} has no connections to move to")]
    IsolatedZone(String),

    #[error("event has no narration text")]
    NoText,
}
