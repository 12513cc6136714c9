//! Immutable per-turn records forming the append-only combat log.
//!
//! A `TurnRecord` captures everything needed to replay the turn against
//! an earlier state: the intent, the dice consumed, and the mechanical
//! deltas actually committed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combatant::{Stat, Status};
use crate::conditions::ConditionKind;
use crate::intent::Intent;

/// Which rung of the fallback ladder produced the executed intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Oracle,
    OracleRetry,
    Heuristic,
    Default,
}

impl SourceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTier::Oracle => "oracle",
            SourceTier::OracleRetry => "oracle_retry",
            SourceTier::Heuristic => "heuristic",
            SourceTier::Default => "default",
        }
    }

    /// The tier tried after this one fails. `Default` has no successor:
    /// its failure is fatal.
    pub fn next(self) -> Option<SourceTier> {
        match self {
            SourceTier::Oracle => Some(SourceTier::OracleRetry),
            SourceTier::OracleRetry => Some(SourceTier::Heuristic),
            SourceTier::Heuristic => Some(SourceTier::Default),
            SourceTier::Default => None,
        }
    }
}

/// One dice roll consumed during the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub expression: String,
    pub result: i64,
    pub purpose: String,
}

impl DiceRoll {
    pub fn new(expression: impl Into<String>, result: i64, purpose: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            result,
            purpose: purpose.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCondition {
    pub target: String,
    pub condition: ConditionKind,
    /// Duration in rounds; `None` means indefinite.
    #[serde(default)]
    pub duration_rounds: Option<u32>,
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub target: String,
    pub stat: Stat,
    pub dc: i32,
    pub total: i64,
    pub success: bool,
    #[serde(default)]
    pub auto_failed: bool,
    #[serde(default)]
    pub legendary_resistance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub target: String,
    pub status: Status,
}

/// An attribute rider granted or cleared on a combatant (e.g. the
/// "bless_bonus" a concentration spell maintains).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderChange {
    pub target: String,
    pub attribute: String,
    /// `Some(bonus)` when granted, `None` when cleared.
    #[serde(default)]
    pub bonus: Option<i32>,
}

/// The mechanical deltas committed by one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MechanicalResults {
    /// Net HP lost per target, after resistance adjustment and flooring.
    #[serde(default)]
    pub damage: HashMap<String, i32>,
    /// Net HP regained per target.
    #[serde(default)]
    pub healing: HashMap<String, i32>,
    #[serde(default)]
    pub conditions_applied: Vec<AppliedCondition>,
    #[serde(default)]
    pub conditions_removed: Vec<AppliedCondition>,
    #[serde(default)]
    pub saves: Vec<SaveRecord>,
    #[serde(default)]
    pub status_changes: Vec<StatusChange>,
    #[serde(default)]
    pub riders: Vec<RiderChange>,
    /// Concentration effects that ended this turn (caster id, spell).
    #[serde(default)]
    pub concentration_dropped: Vec<(String, String)>,
    /// Death-save counters after this turn, when one was rolled.
    #[serde(default)]
    pub death_saves: Option<(u8, u8)>,
}

impl MechanicalResults {
    pub fn is_empty(&self) -> bool {
        self.damage.is_empty()
            && self.healing.is_empty()
            && self.conditions_applied.is_empty()
            && self.conditions_removed.is_empty()
            && self.saves.is_empty()
            && self.status_changes.is_empty()
            && self.riders.is_empty()
            && self.concentration_dropped.is_empty()
            && self.death_saves.is_none()
    }
}

/// Immutable record of one resolved turn. Rollback markers are log
/// entries too, with `rollback: true` and no mechanical results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub resolution_id: Uuid,
    pub round: u32,
    pub combatant_id: String,
    /// `None` for death-save turns and rollback markers.
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub rolls: Vec<DiceRoll>,
    #[serde(default)]
    pub results: MechanicalResults,
    #[serde(default)]
    pub narrative: String,
    pub source_tier: SourceTier,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub rollback: bool,
}

impl TurnRecord {
    pub fn hp_change(&self, target: &str) -> i32 {
        self.results.healing.get(target).copied().unwrap_or(0)
            - self.results.damage.get(target).copied().unwrap_or(0)
    }
}
