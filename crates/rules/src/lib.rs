//! Deterministic rules engine: attack and save math, damage and
//! condition application, action economy, movement with opportunity
//! attacks, death saves, recharge rolls, and the pure replay fold.
//!
//! Nothing here talks to the oracle or the observer; every function is a
//! plain state transition driven by the injected dice roller, so the
//! whole crate is testable with a scripted sequence of rolls.

pub mod attack;
pub mod conditions;
pub mod damage;
pub mod death;
pub mod executor;
pub mod hooks;
pub mod movement;
pub mod recharge;
pub mod replay;
pub mod save;
pub mod vantage;

pub use attack::{resolve_attack_roll, roll_damage, AttackResolution};
pub use damage::{apply_damage, apply_healing, DamageOutcome, HealOutcome};
pub use death::{roll_death_save, DeathSaveOutcome};
pub use executor::{execute_intent, MechanicalOutcome, RulesConfig};
pub use hooks::{AttackEvent, NoReactions, ReactionHooks};
pub use vantage::Vantage;
