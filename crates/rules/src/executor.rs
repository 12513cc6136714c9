//! Intent execution: spends action-economy slots, rolls dice through
//! the injected roller, and applies damage, healing and conditions.
//! Every violation surfaces as `Error::Rules`, which the transaction
//! manager answers with a rollback.

use tw_domain::{
    Ability, Combatant, ConditionKind, DiceRoll, DiceRoller, EncounterState, Error, Intent,
    MechanicalResults, Result, RiderChange,
};

use crate::attack::{resolve_attack_roll, roll_damage};
use crate::conditions::{apply_condition, cannot_act};
use crate::damage::{apply_damage, apply_healing, drop_concentration, DamageOutcome};
use crate::hooks::ReactionHooks;
use crate::movement::move_toward;
use crate::save::resolve_save;

/// Rules parameters extracted from the engine configuration.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    pub critical_range: Vec<u8>,
    pub monster_unconscious_max_hp: i32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            critical_range: vec![20],
            monster_unconscious_max_hp: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MechanicalOutcome {
    pub results: MechanicalResults,
    pub rolls: Vec<DiceRoll>,
}

/// Execute one validated intent against the encounter.
pub fn execute_intent(
    encounter: &mut EncounterState,
    actor_id: &str,
    intent: &Intent,
    roller: &dyn DiceRoller,
    hooks: &mut dyn ReactionHooks,
    config: &RulesConfig,
) -> Result<MechanicalOutcome> {
    let mut outcome = MechanicalOutcome::default();

    match intent {
        Intent::Attack {
            ability_name,
            targets,
            movement_cost,
            uses_reaction,
        } => {
            let ability = owned_ability(encounter, actor_id, ability_name)?;
            if movement_phase(encounter, actor_id, targets, *movement_cost, roller, config, &mut outcome)? {
                return Ok(outcome);
            }
            if *uses_reaction {
                spend_reaction(encounter, actor_id)?;
            } else {
                spend_action(encounter, actor_id)?;
            }
            resolve_offensive(
                encounter, actor_id, &ability, targets, roller, hooks, config, &mut outcome,
            )?;
        }

        Intent::Spell {
            ability_name,
            targets,
            movement_cost,
            uses_reaction,
            spell_slot_level: _,
        } => {
            let ability = owned_ability(encounter, actor_id, ability_name)?;
            if movement_phase(encounter, actor_id, targets, *movement_cost, roller, config, &mut outcome)? {
                return Ok(outcome);
            }
            if *uses_reaction {
                spend_reaction(encounter, actor_id)?;
            } else {
                spend_action(encounter, actor_id)?;
            }
            hooks.on_spell_cast(encounter, actor_id, &ability.name);
            resolve_offensive(
                encounter, actor_id, &ability, targets, roller, hooks, config, &mut outcome,
            )?;
        }

        Intent::Cantrip {
            ability_name,
            targets,
            movement_cost,
        } => {
            let ability = owned_ability(encounter, actor_id, ability_name)?;
            if movement_phase(encounter, actor_id, targets, *movement_cost, roller, config, &mut outcome)? {
                return Ok(outcome);
            }
            spend_action(encounter, actor_id)?;
            hooks.on_spell_cast(encounter, actor_id, &ability.name);
            resolve_offensive(
                encounter, actor_id, &ability, targets, roller, hooks, config, &mut outcome,
            )?;
        }

        Intent::Dash { movement_cost } => {
            spend_action(encounter, actor_id)?;
            let speed = {
                let actor = combatant(encounter, actor_id)?;
                actor.speed
            };
            if let Some(actor) = encounter.combatant_mut(actor_id) {
                actor.economy.movement_remaining += speed;
            }
            let toward = nearest_enemy(encounter, actor_id);
            if let (Some(feet), Some(toward)) = (movement_cost, toward) {
                let moved = move_toward(
                    encounter,
                    actor_id,
                    &toward,
                    *feet,
                    roller,
                    &config.critical_range,
                    config.monster_unconscious_max_hp,
                )?;
                absorb_movement(&mut outcome, moved);
            }
        }

        Intent::Dodge => {
            spend_action(encounter, actor_id)?;
            let applied = {
                let actor = mut_combatant(encounter, actor_id)?;
                let source = actor.id.clone();
                apply_condition(actor, ConditionKind::Dodging, Some(1), &source)
            };
            outcome.results.conditions_applied.push(applied);
        }

        Intent::Disengage { movement_cost } => {
            spend_action(encounter, actor_id)?;
            let applied = {
                let actor = mut_combatant(encounter, actor_id)?;
                let source = actor.id.clone();
                apply_condition(actor, ConditionKind::Disengaging, Some(1), &source)
            };
            outcome.results.conditions_applied.push(applied);
            if let Some(feet) = movement_cost {
                retreat(encounter, actor_id, *feet);
            }
        }

        Intent::Help { targets } => {
            spend_action(encounter, actor_id)?;
            let Some(target_id) = targets.first() else {
                return Err(Error::Rules("help requires a target".into()));
            };
            let target = mut_combatant(encounter, target_id)?;
            target.attributes.insert("help_advantage".into(), 1);
            outcome.results.riders.push(RiderChange {
                target: target_id.clone(),
                attribute: "help_advantage".into(),
                bonus: Some(1),
            });
        }

        Intent::Hide => {
            spend_action(encounter, actor_id)?;
            let actor = mut_combatant(encounter, actor_id)?;
            actor.attributes.insert("hidden".into(), 1);
            outcome.results.riders.push(RiderChange {
                target: actor_id.to_string(),
                attribute: "hidden".into(),
                bonus: Some(1),
            });
        }

        Intent::Ready { ability_name } => {
            // The readied trigger itself is not modelled; the action is
            // spent and the record carries the declared ability.
            owned_ability(encounter, actor_id, ability_name)?;
            spend_action(encounter, actor_id)?;
        }

        Intent::UseItem {
            ability_name,
            targets,
        } => {
            let ability = owned_ability(encounter, actor_id, ability_name)?;
            spend_action(encounter, actor_id)?;
            if ability.is_heal() {
                resolve_heal(encounter, actor_id, &ability, targets, roller, &mut outcome)?;
            } else {
                resolve_offensive(
                    encounter, actor_id, &ability, targets, roller, hooks, config, &mut outcome,
                )?;
            }
        }

        Intent::RechargeAbility { ability_name } => {
            // Deliberately no expended check: recharging an expended
            // ability is the whole point.
            let ability = combatant(encounter, actor_id)?
                .ability(ability_name)
                .cloned()
                .ok_or_else(|| {
                    Error::Rules(format!("{actor_id} does not own {ability_name}"))
                })?;
            spend_action(encounter, actor_id)?;
            let Some(range) = ability.recharge else {
                return Err(Error::Rules(format!(
                    "{ability_name} is not a recharge ability"
                )));
            };
            let natural = roller.roll("1d6")?;
            outcome.rolls.push(DiceRoll::new(
                "1d6",
                natural,
                format!("recharge {ability_name}"),
            ));
            if range.contains(natural) {
                if let Some(actor) = encounter.combatant_mut(actor_id) {
                    actor.recharge_spent.remove(ability_name);
                }
            }
        }

        Intent::Legendary {
            ability_name,
            targets,
            cost,
        } => {
            let ability = owned_ability(encounter, actor_id, ability_name)?;
            {
                let actor = mut_combatant(encounter, actor_id)?;
                if actor.legendary_max == 0 {
                    return Err(Error::Rules(format!("{actor_id} has no legendary pool")));
                }
                if actor.economy.legendary_used + cost > actor.legendary_max {
                    return Err(Error::Rules("legendary pool exhausted".into()));
                }
                actor.economy.legendary_used += cost;
            }
            if ability.is_heal() {
                resolve_heal(encounter, actor_id, &ability, targets, roller, &mut outcome)?;
            } else {
                resolve_offensive(
                    encounter, actor_id, &ability, targets, roller, hooks, config, &mut outcome,
                )?;
            }
        }
    }

    Ok(outcome)
}

// ── Internal helpers ─────────────────────────────────────────────────

fn combatant<'a>(encounter: &'a EncounterState, id: &str) -> Result<&'a Combatant> {
    encounter
        .combatant(id)
        .ok_or_else(|| Error::Rules(format!("unknown combatant {id}")))
}

fn mut_combatant<'a>(encounter: &'a mut EncounterState, id: &str) -> Result<&'a mut Combatant> {
    encounter
        .combatant_mut(id)
        .ok_or_else(|| Error::Rules(format!("unknown combatant {id}")))
}

/// Fetch a clone of an owned ability, checking the recharge state.
fn owned_ability(encounter: &EncounterState, actor_id: &str, name: &str) -> Result<Ability> {
    let actor = combatant(encounter, actor_id)?;
    let ability = actor
        .ability(name)
        .ok_or_else(|| Error::Rules(format!("{actor_id} does not own {name}")))?
        .clone();
    if actor.ability_expended(name) {
        return Err(Error::Rules(format!("{name} has not recharged")));
    }
    Ok(ability)
}

fn spend_action(encounter: &mut EncounterState, actor_id: &str) -> Result<()> {
    let actor = mut_combatant(encounter, actor_id)?;
    if cannot_act(actor) {
        return Err(Error::Rules(format!("{actor_id} is unable to act")));
    }
    if !actor.economy.spend_action() {
        return Err(Error::Rules(format!("{actor_id} has no action left")));
    }
    Ok(())
}

fn spend_reaction(encounter: &mut EncounterState, actor_id: &str) -> Result<()> {
    let actor = mut_combatant(encounter, actor_id)?;
    if cannot_act(actor) {
        return Err(Error::Rules(format!("{actor_id} is unable to react")));
    }
    if !actor.economy.spend_reaction() {
        return Err(Error::Rules(format!("{actor_id} has no reaction left")));
    }
    Ok(())
}

/// Pre-action movement toward the first target. Returns true when an
/// opportunity attack dropped the actor and the turn ends here.
fn movement_phase(
    encounter: &mut EncounterState,
    actor_id: &str,
    targets: &[String],
    movement_cost: Option<i32>,
    roller: &dyn DiceRoller,
    config: &RulesConfig,
    outcome: &mut MechanicalOutcome,
) -> Result<bool> {
    let Some(feet) = movement_cost else {
        return Ok(false);
    };
    let Some(toward) = targets
        .first()
        .cloned()
        .or_else(|| nearest_enemy(encounter, actor_id))
    else {
        return Ok(false);
    };
    let moved = move_toward(
        encounter,
        actor_id,
        &toward,
        feet,
        roller,
        &config.critical_range,
        config.monster_unconscious_max_hp,
    )?;
    let halted = moved.halted;
    absorb_movement(outcome, moved);
    Ok(halted)
}

fn absorb_movement(outcome: &mut MechanicalOutcome, moved: crate::movement::MovementOutcome) {
    outcome.rolls.extend(moved.rolls);
    for (target, amount) in moved.damage {
        *outcome.results.damage.entry(target).or_insert(0) += amount;
    }
    outcome.results.saves.extend(moved.saves);
    outcome.results.status_changes.extend(moved.status_changes);
    outcome
        .results
        .concentration_dropped
        .extend(moved.concentration_dropped);
    outcome.results.riders.extend(moved.riders_cleared);
    outcome
        .results
        .conditions_removed
        .extend(moved.conditions_removed);
}

fn absorb_damage_report(outcome: &mut MechanicalOutcome, target_id: &str, report: DamageOutcome) {
    if report.applied > 0 {
        *outcome
            .results
            .damage
            .entry(target_id.to_string())
            .or_insert(0) += report.applied;
    }
    outcome.rolls.extend(report.rolls);
    outcome.results.saves.extend(report.saves);
    outcome.results.status_changes.extend(report.status_change);
    outcome
        .results
        .concentration_dropped
        .extend(report.concentration_dropped);
    outcome.results.riders.extend(report.riders_cleared);
    outcome
        .results
        .conditions_removed
        .extend(report.conditions_removed);
}

fn nearest_enemy(encounter: &EncounterState, actor_id: &str) -> Option<String> {
    let actor = encounter.combatant(actor_id)?;
    encounter
        .living_enemies_of(actor_id)
        .into_iter()
        .filter(|e| e.is_active())
        .min_by_key(|e| actor.position.distance_to(&e.id))
        .map(|e| e.id.clone())
}

/// Widen the distance to every hostile; used by disengage retreats.
fn retreat(encounter: &mut EncounterState, actor_id: &str, feet: i32) {
    let Some(actor) = encounter.combatant(actor_id) else {
        return;
    };
    let affordable = feet.min(actor.economy.movement_remaining).max(0);
    if affordable == 0 {
        return;
    }
    let hostiles: Vec<String> = encounter
        .living_enemies_of(actor_id)
        .into_iter()
        .map(|e| e.id.clone())
        .collect();
    if let Some(actor) = encounter.combatant_mut(actor_id) {
        actor.economy.movement_remaining -= affordable;
    }
    for hostile in hostiles {
        let widened = encounter
            .combatant(actor_id)
            .map(|a| a.position.distance_to(&hostile))
            .unwrap_or_default()
            + affordable;
        if let Some(actor) = encounter.combatant_mut(actor_id) {
            actor.position.distance_to.insert(hostile.clone(), widened);
        }
        if let Some(other) = encounter.combatant_mut(&hostile) {
            other
                .position
                .distance_to
                .insert(actor_id.to_string(), widened);
        }
    }
}

/// Range gate for one attack or targeted effect.
fn check_range(encounter: &EncounterState, actor_id: &str, target_id: &str, ability: &Ability) -> Result<()> {
    let actor = combatant(encounter, actor_id)?;
    let distance = actor.position.distance_to(target_id);
    if ability.is_melee() {
        if distance > ability.reach_ft {
            return Err(Error::Rules(format!(
                "{target_id} is beyond melee reach ({distance} ft)"
            )));
        }
    } else if let Some(range) = ability.range_ft {
        if distance > range {
            return Err(Error::Rules(format!(
                "{target_id} is out of range ({distance} ft)"
            )));
        }
    }
    Ok(())
}

/// Consume the one-shot advantage riders (help, hidden) after an attack
/// they boosted.
fn consume_attack_riders(encounter: &mut EncounterState, actor_id: &str, outcome: &mut MechanicalOutcome) {
    let Some(actor) = encounter.combatant_mut(actor_id) else {
        return;
    };
    for key in ["help_advantage", "hidden"] {
        if actor.attributes.remove(key).is_some() {
            outcome.results.riders.push(RiderChange {
                target: actor_id.to_string(),
                attribute: key.into(),
                bonus: None,
            });
        }
    }
}

/// Resolve an offensive or buff ability against its targets: attack
/// rolls for weapon-style abilities, saving throws for DC-based ones,
/// riders and concentration for buffs.
#[allow(clippy::too_many_arguments)]
fn resolve_offensive(
    encounter: &mut EncounterState,
    actor_id: &str,
    ability: &Ability,
    targets: &[String],
    roller: &dyn DiceRoller,
    hooks: &mut dyn ReactionHooks,
    config: &RulesConfig,
    outcome: &mut MechanicalOutcome,
) -> Result<()> {
    // Expend the recharge, if the ability carries one.
    if ability.recharge.is_some() {
        let round = encounter.round;
        if let Some(actor) = encounter.combatant_mut(actor_id) {
            actor.recharge_spent.insert(ability.name.clone(), round);
        }
    }

    if ability.is_heal() {
        return resolve_heal(encounter, actor_id, ability, targets, roller, outcome);
    }

    if ability.is_attack() {
        for target_id in targets {
            let target = combatant(encounter, target_id)?;
            if target.is_dead() {
                return Err(Error::Rules(format!("{target_id} is already dead")));
            }
            check_range(encounter, actor_id, target_id, ability)?;

            let attack = resolve_attack_roll(
                encounter,
                actor_id,
                target_id,
                ability,
                &config.critical_range,
                roller,
                hooks,
            )?;
            outcome.rolls.extend(attack.rolls.clone());
            consume_attack_riders(encounter, actor_id, outcome);

            if !attack.hit {
                continue;
            }
            if let Some(expression) = &ability.damage {
                let (amount, damage_rolls) = roll_damage(roller, expression, attack.critical)?;
                outcome.rolls.extend(damage_rolls);
                let report = apply_damage(
                    encounter,
                    target_id,
                    amount,
                    ability.damage_type,
                    roller,
                    config.monster_unconscious_max_hp,
                )?;
                absorb_damage_report(outcome, target_id, report);
            }
            apply_on_hit_condition(encounter, actor_id, target_id, ability, roller, outcome)?;
        }
        return Ok(());
    }

    if let (Some(dc), Some(stat)) = (ability.save_dc, ability.save_ability) {
        // One damage roll for the effect, shared by every target.
        let damage = match &ability.damage {
            Some(expression) => {
                let (amount, damage_rolls) = roll_damage(roller, expression, false)?;
                outcome.rolls.extend(damage_rolls);
                Some(amount)
            }
            None => None,
        };

        for target_id in targets.iter() {
            let target = combatant(encounter, target_id)?;
            if target.is_dead() {
                return Err(Error::Rules(format!("{target_id} is already dead")));
            }
            let save = {
                let target = mut_combatant(encounter, target_id)?;
                resolve_save(roller, target, stat, dc)?
            };
            outcome.rolls.extend(save.rolls.clone());
            let succeeded = save.record.success;
            outcome.results.saves.push(save.record);

            if let Some(amount) = damage {
                let dealt = if succeeded {
                    if ability.half_on_save {
                        amount / 2
                    } else {
                        0
                    }
                } else {
                    amount
                };
                if dealt > 0 {
                    let report = apply_damage(
                        encounter,
                        target_id,
                        dealt,
                        ability.damage_type,
                        roller,
                        config.monster_unconscious_max_hp,
                    )?;
                    absorb_damage_report(outcome, target_id, report);
                }
            }
            if !succeeded {
                if let Some(kind) = ability.applies_condition {
                    let applied = {
                        let target = mut_combatant(encounter, target_id)?;
                        apply_condition(target, kind, ability.condition_duration, actor_id)
                    };
                    outcome.results.conditions_applied.push(applied);
                }
            }
        }
        return Ok(());
    }

    // Pure buff: grant the rider to each target, under concentration
    // when the ability demands it.
    if let Some(attribute) = &ability.grants_attribute {
        for target_id in targets {
            let target = mut_combatant(encounter, target_id)?;
            target
                .attributes
                .insert(attribute.clone(), ability.grants_bonus);
            outcome.results.riders.push(RiderChange {
                target: target_id.clone(),
                attribute: attribute.clone(),
                bonus: Some(ability.grants_bonus),
            });
        }
    }
    if ability.concentration {
        // Recasting drops the previous concentration effect first.
        let mut dropped = DamageOutcome::default();
        drop_concentration(encounter, actor_id, &mut dropped);
        absorb_damage_report(outcome, actor_id, dropped);
        if let Some(actor) = encounter.combatant_mut(actor_id) {
            actor.concentration = Some(tw_domain::Concentration {
                spell: ability.name.clone(),
                targets: targets.to_vec(),
                rider: ability.grants_attribute.clone(),
            });
        }
    }
    if let Some(kind) = ability.applies_condition {
        for target_id in targets {
            let applied = {
                let target = mut_combatant(encounter, target_id)?;
                apply_condition(target, kind, ability.condition_duration, actor_id)
            };
            outcome.results.conditions_applied.push(applied);
        }
    }
    Ok(())
}

/// Conditions riding on a weapon hit, gated by a save when a DC is set.
fn apply_on_hit_condition(
    encounter: &mut EncounterState,
    actor_id: &str,
    target_id: &str,
    ability: &Ability,
    roller: &dyn DiceRoller,
    outcome: &mut MechanicalOutcome,
) -> Result<()> {
    let Some(kind) = ability.applies_condition else {
        return Ok(());
    };
    let resisted = if let (Some(dc), Some(stat)) = (ability.save_dc, ability.save_ability) {
        let save = {
            let target = mut_combatant(encounter, target_id)?;
            resolve_save(roller, target, stat, dc)?
        };
        outcome.rolls.extend(save.rolls.clone());
        let success = save.record.success;
        outcome.results.saves.push(save.record);
        success
    } else {
        false
    };
    if !resisted {
        let applied = {
            let target = mut_combatant(encounter, target_id)?;
            apply_condition(target, kind, ability.condition_duration, actor_id)
        };
        outcome.results.conditions_applied.push(applied);
    }
    Ok(())
}

fn resolve_heal(
    encounter: &mut EncounterState,
    actor_id: &str,
    ability: &Ability,
    targets: &[String],
    roller: &dyn DiceRoller,
    outcome: &mut MechanicalOutcome,
) -> Result<()> {
    let Some(expression) = &ability.heal else {
        return Err(Error::Rules(format!("{} heals nothing", ability.name)));
    };
    let target_ids: Vec<String> = if targets.is_empty() {
        vec![actor_id.to_string()]
    } else {
        targets.to_vec()
    };
    for target_id in target_ids {
        let (amount, rolls) = roll_damage(roller, expression, false)?;
        for roll in &rolls {
            outcome
                .rolls
                .push(DiceRoll::new(roll.expression.clone(), roll.result, "healing"));
        }
        let healed = apply_healing(encounter, &target_id, amount)?;
        if healed.applied > 0 {
            *outcome
                .results
                .healing
                .entry(target_id.clone())
                .or_insert(0) += healed.applied;
        }
        outcome.results.status_changes.extend(healed.status_change);
    }
    Ok(())
}
