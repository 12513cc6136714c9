//! The injected dice oracle and small helpers for composing
//! expressions.
//!
//! Expression *evaluation* is always delegated to the injected roller;
//! the helpers here only split an expression into its dice part and flat
//! modifier so criticals can double the dice without doubling the
//! modifier, and so the tactical heuristic can rank abilities by
//! expected damage.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;

/// Evaluates a dice expression (e.g. `"2d6+3"`). Deterministic in test
/// mode.
pub trait DiceRoller: Send + Sync {
    fn roll(&self, expression: &str) -> Result<i64>;
}

/// An expression split into its rollable dice and flat modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitExpression {
    /// The `NdM` part, `None` for flat expressions like "3".
    pub dice: Option<String>,
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

fn expression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:(\d*)d(\d+))?\s*(?:([+-])\s*(\d+))?\s*$").expect("static regex")
    })
}

/// Split `"2d6+3"` into dice `"2d6"` and modifier `3`. Returns `None`
/// for expressions the simple `NdM±K` grammar does not cover; callers
/// then pass the whole expression to the roller untouched.
pub fn split_expression(expression: &str) -> Option<SplitExpression> {
    let caps = expression_re().captures(expression)?;
    let dice_sides = caps.get(2);
    let sign = caps.get(3).map_or("+", |m| m.as_str());
    let flat: i64 = caps.get(4).map_or(0, |m| m.as_str().parse().unwrap_or(0));
    let modifier = if sign == "-" { -flat } else { flat };

    match dice_sides {
        Some(sides) => {
            let count: u32 = match caps.get(1).map(|m| m.as_str()) {
                Some("") | None => 1,
                Some(n) => n.parse().ok()?,
            };
            let sides: u32 = sides.as_str().parse().ok()?;
            if sides == 0 {
                return None;
            }
            Some(SplitExpression {
                dice: Some(format!("{count}d{sides}")),
                count,
                sides,
                modifier,
            })
        }
        None => {
            // Flat value only; reject the empty expression.
            caps.get(4)?;
            Some(SplitExpression {
                dice: None,
                count: 0,
                sides: 0,
                modifier,
            })
        }
    }
}

/// Expected value of an expression, for heuristic ranking. Unparseable
/// expressions rank at zero.
pub fn average_roll(expression: &str) -> f64 {
    match split_expression(expression) {
        Some(split) => {
            f64::from(split.count) * (f64::from(split.sides) + 1.0) / 2.0 + split.modifier as f64
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_dice_and_modifier() {
        let split = split_expression("2d6+3").unwrap();
        assert_eq!(split.dice.as_deref(), Some("2d6"));
        assert_eq!(split.modifier, 3);

        let split = split_expression("1d4-1").unwrap();
        assert_eq!(split.dice.as_deref(), Some("1d4"));
        assert_eq!(split.modifier, -1);

        let split = split_expression("d20").unwrap();
        assert_eq!(split.dice.as_deref(), Some("1d20"));
        assert_eq!(split.modifier, 0);
    }

    #[test]
    fn flat_expression_has_no_dice() {
        let split = split_expression("+3").unwrap();
        assert_eq!(split.dice, None);
        assert_eq!(split.modifier, 3);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(split_expression("fireball").is_none());
        assert!(split_expression("").is_none());
        assert!(split_expression("2d0").is_none());
    }

    #[test]
    fn average_matches_expectation() {
        assert_eq!(average_roll("1d4+2"), 4.5);
        assert_eq!(average_roll("2d6"), 7.0);
        assert_eq!(average_roll("nonsense"), 0.0);
    }
}
