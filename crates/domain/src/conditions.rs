//! Conditions with fixed mechanical effects.
//!
//! The mechanical interpretation (vantage shifts, auto-failed saves,
//! zeroed speed) lives in `tw-rules`; this module only models the data.

use serde::{Deserialize, Serialize};

use crate::combatant::Stat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Unconscious,
    Paralyzed,
    Stunned,
    Prone,
    Frightened,
    Blinded,
    Restrained,
    Grappled,
    Incapacitated,
    /// Dodge action taken: attacks against are at disadvantage until the
    /// start of the dodger's next turn.
    Dodging,
    /// Disengage action taken: movement provokes no opportunity attacks
    /// this turn.
    Disengaging,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Unconscious => "unconscious",
            ConditionKind::Paralyzed => "paralyzed",
            ConditionKind::Stunned => "stunned",
            ConditionKind::Prone => "prone",
            ConditionKind::Frightened => "frightened",
            ConditionKind::Blinded => "blinded",
            ConditionKind::Restrained => "restrained",
            ConditionKind::Grappled => "grappled",
            ConditionKind::Incapacitated => "incapacitated",
            ConditionKind::Dodging => "dodging",
            ConditionKind::Disengaging => "disengaging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionDuration {
    Rounds(u32),
    Indefinite,
}

/// A condition currently affecting a combatant. Durations tick down at
/// the end of the afflicted combatant's turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub kind: ConditionKind,
    pub duration: ConditionDuration,
    /// Combatant (or effect) that applied the condition.
    pub source_id: String,
    /// Repeat save to shake the condition off, when one exists.
    #[serde(default)]
    pub save_dc: Option<i32>,
    #[serde(default)]
    pub save_ability: Option<Stat>,
}

impl ActiveCondition {
    pub fn new(kind: ConditionKind, rounds: Option<u32>, source_id: impl Into<String>) -> Self {
        Self {
            kind,
            duration: match rounds {
                Some(n) => ConditionDuration::Rounds(n),
                None => ConditionDuration::Indefinite,
            },
            source_id: source_id.into(),
            save_dc: None,
            save_ability: None,
        }
    }

    /// Decrement a round-limited duration. Returns true once expired.
    pub fn tick(&mut self) -> bool {
        match &mut self.duration {
            ConditionDuration::Rounds(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            ConditionDuration::Indefinite => false,
        }
    }

    pub fn expired(&self) -> bool {
        matches!(self.duration, ConditionDuration::Rounds(0))
    }
}
