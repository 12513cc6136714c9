//! Per-turn transactions: snapshot before execution, validate the
//! post-state, commit or restore. A bad oracle or a bad roll never
//! leaves a half-mutated combatant behind.

use tw_domain::{EncounterState, Error, Result, Status};

pub struct Transaction {
    snapshot: EncounterState,
}

impl Transaction {
    /// Deep, independent copy of the whole encounter.
    pub fn begin(encounter: &EncounterState) -> Self {
        Self {
            snapshot: encounter.clone(),
        }
    }

    /// Post-turn validation: HP bounds, status/HP coherence, condition
    /// durations, economy sanity, and ability-tag purity.
    pub fn validate(encounter: &EncounterState) -> Result<()> {
        for combatant in &encounter.combatants {
            if combatant.hp < 0 || combatant.hp > combatant.max_hp {
                return Err(Error::StateCorruption(format!(
                    "{} has hp {} outside [0, {}]",
                    combatant.id, combatant.hp, combatant.max_hp
                )));
            }
            match combatant.status {
                Status::Unconscious | Status::Stable | Status::Dead => {
                    if combatant.hp != 0 {
                        return Err(Error::StateCorruption(format!(
                            "{} is {:?} with {} hp",
                            combatant.id, combatant.status, combatant.hp
                        )));
                    }
                }
                Status::Ok => {
                    if combatant.hp == 0 {
                        return Err(Error::StateCorruption(format!(
                            "{} is ok with 0 hp",
                            combatant.id
                        )));
                    }
                }
            }
            if combatant.economy.movement_remaining < 0 {
                return Err(Error::StateCorruption(format!(
                    "{} has negative movement",
                    combatant.id
                )));
            }
            let tag = combatant.canonical_tag();
            for ability in &combatant.abilities {
                if ability.tag != tag {
                    return Err(Error::StateCorruption(format!(
                        "{} carries foreign ability {} ({})",
                        combatant.id, ability.name, ability.tag
                    )));
                }
            }
        }
        Ok(())
    }

    /// Restore the pre-turn snapshot, preserving nothing from the
    /// aborted execution.
    pub fn rollback(self, encounter: &mut EncounterState) {
        *encounter = self.snapshot;
    }
}
