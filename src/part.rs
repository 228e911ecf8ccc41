//! Shared machinery for parsing rule-DSL instruction lines.
//!
//! A line is a comma-separated list of token groups; each group starts
//! with a keyword and parses into one check or one effect. The tables of
//! recognized groups live in `check.rs` and `effect.rs` as static
//! [`PartSpec`] slices; this module handles splitting, argument-count
//! enforcement, and dispatch.

use crate::error::PartError;
use crate::valids::Valids;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A comparison operator usable wherever the DSL compares numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn eval(self, lhs: u32, rhs: u32) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CmpOp {
    type Err = PartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(CmpOp::Eq),
            "!=" => Ok(CmpOp::Ne),
            "<" => Ok(CmpOp::Lt),
            ">" => Ok(CmpOp::Gt),
            "<=" => Ok(CmpOp::Le),
            ">=" => Ok(CmpOp::Ge),
            _ => Err(PartError::Invalid {
                expected: "comparison operator",
                token: s.to_string(),
            }),
        }
    }
}

/// One recognized instruction shape.
///
/// `args` describes the expected tokens, keyword included. A trailing `?`
/// marks an argument optional; a leading `*` marks it variadic (one or
/// more, or zero or more with both markers, as in `*tags?`).
pub struct PartSpec<P> {
    pub keywords: &'static [&'static str],
    pub args: &'static [&'static str],
    pub build: fn(&[String], &mut Valids) -> Result<P, PartError>,
}

/// Enforce a group's argument count against its spec.
pub fn check_arg_count(tokens: &[String], args: &[&str]) -> Result<(), PartError> {
    let mut min = 0usize;
    let mut unbounded = false;
    let mut max = 0usize;
    for arg in &args[1..] {
        let variadic = arg.starts_with('*');
        let optional = arg.ends_with('?');
        if variadic {
            unbounded = true;
            if !optional {
                min += 1;
            }
        } else {
            if !optional {
                min += 1;
            }
            max += 1;
        }
    }

    let got = tokens.len() - 1;
    let ok = got >= min && (unbounded || got <= max);
    if ok {
        return Ok(());
    }
    let required = if unbounded {
        format!("{min} or more")
    } else if min == max {
        format!("{min}")
    } else if max == min + 1 {
        format!("{min} or {max}")
    } else {
        format!("{min} to {max}")
    };
    Err(PartError::ArgCount {
        required,
        got,
        usage: args.join(" "),
    })
}

/// Split an instruction line into token groups.
pub fn split_groups(line: &str) -> Vec<Vec<String>> {
    line.split(',')
        .map(|group| group.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|group: &Vec<String>| !group.is_empty())
        .collect()
}

/// Parse one token group against a spec table.
pub fn parse_group<P>(
    tokens: &[String],
    specs: &[PartSpec<P>],
    valids: &mut Valids,
) -> Result<P, PartError> {
    let spec = specs
        .iter()
        .find(|s| s.keywords.contains(&tokens[0].as_str()))
        .ok_or(PartError::Unrecognized)?;
    check_arg_count(tokens, spec.args)?;
    (spec.build)(tokens, valids)
}

/// Re-render a split line with a `->` marker on the group that failed,
/// for use in load-error messages.
pub fn annotate_line(groups: &[Vec<String>], failing: usize) -> String {
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let rendered = group.join(" ");
            if i == failing {
                format!("->{rendered}")
            } else {
                rendered
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
