//! Events delivered to the observer.
//!
//! The schema is stable over the engine's lifetime: within a turn the
//! sequence is `turn_start, intent, dice*, (result | rollback)`, and
//! results are published only after the transaction commits.

use serde::Serialize;

use crate::encounter::Winner;
use crate::intent::Intent;
use crate::record::{SourceTier, TurnRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RoundStart {
        round: u32,
    },
    TurnStart {
        round: u32,
        combatant_id: String,
    },
    Intent {
        combatant_id: String,
        intent: Intent,
        source_tier: SourceTier,
    },
    Dice {
        combatant_id: String,
        expression: String,
        result: i64,
        purpose: String,
    },
    Result {
        turn_record: TurnRecord,
    },
    Rollback {
        round: u32,
        combatant_id: String,
        reason: String,
    },
    TurnTimeout {
        combatant_id: String,
    },
    Lag {
        dropped_events: u64,
    },
    EncounterEnd {
        winner: Winner,
    },
    Fatal {
        message: String,
    },
}
