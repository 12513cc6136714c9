//! Movement without a grid: distances shrink toward the chosen target
//! and grow away from everyone left behind. Leaving the 5-ft reach of a
//! hostile with its reaction available provokes an opportunity attack,
//! resolved inline before the movement continues.

use std::collections::HashMap;

use tw_domain::roll::average_roll;
use tw_domain::{
    Ability, AppliedCondition, Combatant, ConditionKind, DiceRoll, DiceRoller, EncounterState,
    Error, Result, RiderChange, SaveRecord, StatusChange,
};

use crate::attack::{resolve_attack_roll, roll_damage};
use crate::conditions::{cannot_react, speed_is_zero};
use crate::damage::apply_damage;
use crate::hooks::NoReactions;

#[derive(Debug, Clone, Default)]
pub struct MovementOutcome {
    pub moved: i32,
    /// An opportunity attack dropped the mover; remaining movement (and
    /// the rest of the turn) is cancelled.
    pub halted: bool,
    pub rolls: Vec<DiceRoll>,
    pub damage: HashMap<String, i32>,
    pub saves: Vec<SaveRecord>,
    pub status_changes: Vec<StatusChange>,
    pub concentration_dropped: Vec<(String, String)>,
    pub riders_cleared: Vec<RiderChange>,
    pub conditions_removed: Vec<AppliedCondition>,
}

/// The melee option a reactor swings with, by expected damage.
pub fn best_melee_ability(combatant: &Combatant) -> Option<Ability> {
    combatant
        .abilities
        .iter()
        .filter(|a| a.is_melee() && !combatant.ability_expended(&a.name))
        .max_by(|a, b| {
            let da = a.damage.as_deref().map_or(0.0, average_roll);
            let db = b.damage.as_deref().map_or(0.0, average_roll);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
}

/// Move `feet` toward `target_id`, deducting from the movement budget
/// (doubled on difficult terrain) and resolving any provoked
/// opportunity attacks first.
pub fn move_toward(
    encounter: &mut EncounterState,
    mover_id: &str,
    target_id: &str,
    feet: i32,
    roller: &dyn DiceRoller,
    critical_range: &[u8],
    monster_unconscious_max_hp: i32,
) -> Result<MovementOutcome> {
    let mut outcome = MovementOutcome::default();
    if feet <= 0 {
        return Ok(outcome);
    }

    let (available, difficult, disengaging, mover_side) = {
        let mover = encounter
            .combatant(mover_id)
            .ok_or_else(|| Error::Rules(format!("unknown combatant {mover_id}")))?;
        if speed_is_zero(mover) {
            return Ok(outcome);
        }
        (
            mover.economy.movement_remaining,
            encounter.environment.difficult_terrain.contains(mover_id),
            mover.has_condition(ConditionKind::Disengaging),
            mover.side,
        )
    };

    let cost_multiplier = if difficult { 2 } else { 1 };
    let affordable = feet.min(available / cost_multiplier);
    if affordable <= 0 {
        return Ok(outcome);
    }

    // Hostiles whose melee reach the mover is leaving. Moving toward
    // the chosen target never leaves its own reach.
    let provokers: Vec<String> = if disengaging {
        Vec::new()
    } else {
        encounter
            .combatants
            .iter()
            .filter(|h| {
                h.id != mover_id
                    && h.id != target_id
                    && h.side.hostile_to(mover_side)
                    && h.is_active()
                    && h.economy.reaction
                    && !cannot_react(h)
                    && h.position.distance_to(mover_id) <= 5
            })
            .map(|h| h.id.clone())
            .collect()
    };

    for reactor_id in &provokers {
        let Some(ability) = encounter
            .combatant(reactor_id)
            .and_then(best_melee_ability)
        else {
            continue;
        };
        if let Some(reactor) = encounter.combatant_mut(reactor_id) {
            if !reactor.economy.spend_reaction() {
                continue;
            }
        }
        tracing::debug!(
            mover = mover_id,
            reactor = %reactor_id,
            ability = %ability.name,
            "opportunity attack provoked"
        );

        // Opportunity attacks are not themselves reactable.
        let attack = resolve_attack_roll(
            encounter,
            reactor_id,
            mover_id,
            &ability,
            critical_range,
            roller,
            &mut NoReactions,
        )?;
        outcome.rolls.extend(attack.rolls.clone());

        if attack.hit {
            if let Some(expression) = &ability.damage {
                let (amount, damage_rolls) = roll_damage(roller, expression, attack.critical)?;
                outcome.rolls.extend(damage_rolls);
                let report = apply_damage(
                    encounter,
                    mover_id,
                    amount,
                    ability.damage_type,
                    roller,
                    monster_unconscious_max_hp,
                )?;
                *outcome.damage.entry(mover_id.to_string()).or_insert(0) += report.applied;
                outcome.rolls.extend(report.rolls);
                outcome.saves.extend(report.saves);
                outcome.status_changes.extend(report.status_change);
                outcome
                    .concentration_dropped
                    .extend(report.concentration_dropped);
                outcome.riders_cleared.extend(report.riders_cleared);
                outcome.conditions_removed.extend(report.conditions_removed);
            }
        }

        let mover_down = encounter
            .combatant(mover_id)
            .is_some_and(|m| !m.is_active());
        if mover_down {
            outcome.halted = true;
            if let Some(mover) = encounter.combatant_mut(mover_id) {
                mover.economy.movement_remaining = 0;
            }
            return Ok(outcome);
        }
    }

    // Commit the movement: spend budget, close on the target, open the
    // distance to everyone whose reach was left behind.
    if let Some(mover) = encounter.combatant_mut(mover_id) {
        mover.economy.movement_remaining -= affordable * cost_multiplier;
    }
    encounter.close_distance(mover_id, target_id, affordable);
    for left_behind in &provokers {
        let widened = encounter
            .combatant(mover_id)
            .map(|m| m.position.distance_to(left_behind))
            .unwrap_or_default()
            + affordable;
        if let Some(mover) = encounter.combatant_mut(mover_id) {
            mover
                .position
                .distance_to
                .insert(left_behind.clone(), widened);
        }
        if let Some(other) = encounter.combatant_mut(left_behind) {
            other
                .position
                .distance_to
                .insert(mover_id.to_string(), widened);
        }
    }
    outcome.moved = affordable;
    Ok(outcome)
}
