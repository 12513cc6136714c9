//! Shared types for the TurnWarden resolution engine: combatants,
//! encounters, intents, turn records, observer events, configuration,
//! the error taxonomy, and the collaborator contracts (dice roller,
//! cancellation token) injected at `start`.

pub mod cancel;
pub mod combatant;
pub mod conditions;
pub mod config;
pub mod encounter;
pub mod error;
pub mod events;
pub mod intent;
pub mod record;
pub mod roll;

pub use cancel::CancelToken;
pub use combatant::{
    Ability, AbilityKind, AbilityScores, ActionEconomy, Combatant, Concentration, Cover,
    DamageType, DeathSaves, Position, RechargeRange, Side, Stat, Status,
};
pub use conditions::{ActiveCondition, ConditionDuration, ConditionKind};
pub use config::EngineConfig;
pub use encounter::{EncounterState, Environment, Winner};
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use intent::{DiceRequest, Intent, OracleReply};
pub use record::{
    AppliedCondition, DiceRoll, MechanicalResults, RiderChange, SaveRecord, SourceTier,
    StatusChange, TurnRecord,
};
pub use roll::DiceRoller;
