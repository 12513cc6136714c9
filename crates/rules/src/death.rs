//! Death saves, rolled at the start of an unconscious combatant's turn.

use tw_domain::{Combatant, DiceRoll, DiceRoller, Result, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathSaveOutcome {
    Failed,
    Succeeded,
    Stabilized,
    Died,
    /// Natural 20: back to 1 HP and awake.
    Revived,
}

/// Roll one death save: 1 counts as two failures, 2–9 one failure,
/// 10–19 one success, 20 revives at 1 HP. Three successes stabilize,
/// three failures kill.
pub fn roll_death_save(
    roller: &dyn DiceRoller,
    combatant: &mut Combatant,
) -> Result<(DeathSaveOutcome, DiceRoll)> {
    let natural = roller.roll("1d20")?;
    let roll = DiceRoll::new("1d20", natural, "death save");

    let outcome = match natural {
        20 => {
            combatant.hp = 1;
            combatant.status = Status::Ok;
            combatant.death_saves.reset();
            combatant.remove_condition(tw_domain::ConditionKind::Unconscious);
            DeathSaveOutcome::Revived
        }
        1 => {
            combatant.death_saves.failures = (combatant.death_saves.failures + 2).min(3);
            if combatant.death_saves.failures >= 3 {
                combatant.status = Status::Dead;
                DeathSaveOutcome::Died
            } else {
                DeathSaveOutcome::Failed
            }
        }
        2..=9 => {
            combatant.death_saves.failures += 1;
            if combatant.death_saves.failures >= 3 {
                combatant.status = Status::Dead;
                DeathSaveOutcome::Died
            } else {
                DeathSaveOutcome::Failed
            }
        }
        _ => {
            combatant.death_saves.successes += 1;
            if combatant.death_saves.successes >= 3 {
                combatant.status = Status::Stable;
                combatant.death_saves.reset();
                DeathSaveOutcome::Stabilized
            } else {
                DeathSaveOutcome::Succeeded
            }
        }
    };

    Ok((outcome, roll))
}
