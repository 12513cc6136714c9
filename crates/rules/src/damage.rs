//! Damage and healing application: resistance adjustment, HP flooring,
//! status transitions, instant death, and concentration checks.

use tw_domain::{
    Combatant, DamageType, DiceRoll, DiceRoller, EncounterState, Error, Result, RiderChange,
    Side, Stat, Status, StatusChange,
};

use crate::save::resolve_save;

#[derive(Debug, Clone, Default)]
pub struct DamageOutcome {
    /// HP actually removed, after adjustment and flooring.
    pub applied: i32,
    pub status_change: Option<StatusChange>,
    pub instant_death: bool,
    /// (caster id, spell) for every concentration effect that ended.
    pub concentration_dropped: Vec<(String, String)>,
    pub riders_cleared: Vec<RiderChange>,
    pub conditions_removed: Vec<tw_domain::AppliedCondition>,
    pub saves: Vec<tw_domain::SaveRecord>,
    pub rolls: Vec<DiceRoll>,
}

#[derive(Debug, Clone, Default)]
pub struct HealOutcome {
    pub applied: i32,
    pub status_change: Option<StatusChange>,
}

/// Resistance/immunity/vulnerability adjustment. Resistance halves
/// rounding down but never below 1 for a positive hit.
pub fn adjust_for_traits(target: &Combatant, amount: i64, damage_type: Option<DamageType>) -> i64 {
    let Some(damage_type) = damage_type else {
        return amount.max(0);
    };
    if target.immunities.contains(&damage_type) {
        return 0;
    }
    if target.resistances.contains(&damage_type) {
        return if amount > 0 { (amount / 2).max(1) } else { 0 };
    }
    if target.vulnerabilities.contains(&damage_type) {
        return (amount * 2).max(0);
    }
    amount.max(0)
}

/// Apply raw damage to a combatant, adjusting for traits and handling
/// every knock-on effect: unconsciousness, death, instant death and
/// concentration checks.
pub fn apply_damage(
    encounter: &mut EncounterState,
    target_id: &str,
    raw: i64,
    damage_type: Option<DamageType>,
    roller: &dyn DiceRoller,
    monster_unconscious_max_hp: i32,
) -> Result<DamageOutcome> {
    let mut outcome = DamageOutcome::default();

    let (adjusted, hp_before, max_hp, side, status_before, was_concentrating) = {
        let target = encounter
            .combatant(target_id)
            .ok_or_else(|| Error::Rules(format!("unknown target {target_id}")))?;
        (
            adjust_for_traits(target, raw, damage_type),
            target.hp,
            target.max_hp,
            target.side,
            target.status,
            target.concentration.is_some(),
        )
    };

    let hp_after = (i64::from(hp_before) - adjusted).max(0) as i32;
    outcome.applied = hp_before - hp_after;
    let excess = adjusted - i64::from(hp_before);

    {
        let target = encounter.combatant_mut(target_id).expect("checked above");
        target.hp = hp_after;

        if hp_after == 0 && target.status == Status::Ok {
            let new_status = if excess >= i64::from(max_hp) {
                outcome.instant_death = true;
                Status::Dead
            } else {
                match side {
                    Side::Player | Side::Npc => Status::Unconscious,
                    Side::Monster => {
                        if max_hp <= monster_unconscious_max_hp {
                            Status::Unconscious
                        } else {
                            Status::Dead
                        }
                    }
                }
            };
            target.status = new_status;
            outcome.status_change = Some(StatusChange {
                target: target_id.to_string(),
                status: new_status,
            });
        } else if hp_before == 0
            && adjusted > 0
            && matches!(status_before, Status::Unconscious | Status::Stable)
        {
            // A hit on a creature already at 0 HP is two failed death
            // saves (hits at that range are automatic criticals).
            target.status = Status::Unconscious;
            target.death_saves.failures = (target.death_saves.failures + 2).min(3);
            let new_status = if target.death_saves.failures >= 3 {
                target.status = Status::Dead;
                Status::Dead
            } else {
                Status::Unconscious
            };
            if new_status != status_before {
                outcome.status_change = Some(StatusChange {
                    target: target_id.to_string(),
                    status: new_status,
                });
            }
        }
    }

    // Concentration: dropping to 0 ends it outright; otherwise any
    // damage forces a Con save against max(10, damage/2).
    if was_concentrating && outcome.applied > 0 {
        let broken = if hp_after == 0 {
            true
        } else {
            let dc = (adjusted / 2).max(10) as i32;
            let save = {
                let target = encounter.combatant_mut(target_id).expect("checked above");
                resolve_save(roller, target, Stat::Con, dc)?
            };
            outcome.rolls.extend(save.rolls.clone());
            let failed = !save.record.success;
            outcome.saves.push(save.record);
            failed
        };
        if broken {
            drop_concentration(encounter, target_id, &mut outcome);
        }
    }

    Ok(outcome)
}

/// End a caster's concentration effect, clearing its riders and
/// conditions from every affected combatant.
pub fn drop_concentration(
    encounter: &mut EncounterState,
    caster_id: &str,
    outcome: &mut DamageOutcome,
) {
    let Some(concentration) = encounter
        .combatant_mut(caster_id)
        .and_then(|c| c.concentration.take())
    else {
        return;
    };

    for affected_id in &concentration.targets {
        if let Some(rider) = &concentration.rider {
            if let Some(affected) = encounter.combatant_mut(affected_id) {
                if affected.attributes.remove(rider).is_some() {
                    outcome.riders_cleared.push(RiderChange {
                        target: affected_id.clone(),
                        attribute: rider.clone(),
                        bonus: None,
                    });
                }
            }
        }
        if let Some(affected) = encounter.combatant_mut(affected_id) {
            let mut removed = Vec::new();
            affected.conditions.retain(|c| {
                if c.source_id == caster_id {
                    removed.push(tw_domain::AppliedCondition {
                        target: affected_id.clone(),
                        condition: c.kind,
                        duration_rounds: None,
                        source_id: c.source_id.clone(),
                    });
                    false
                } else {
                    true
                }
            });
            outcome.conditions_removed.extend(removed);
        }
    }

    outcome
        .concentration_dropped
        .push((caster_id.to_string(), concentration.spell));
}

/// Positive healing wakes the unconscious: status back to `ok`, death
/// saves reset, HP set to the healed amount clamped to max.
pub fn apply_healing(
    encounter: &mut EncounterState,
    target_id: &str,
    amount: i64,
) -> Result<HealOutcome> {
    let target = encounter
        .combatant_mut(target_id)
        .ok_or_else(|| Error::Rules(format!("unknown target {target_id}")))?;
    if target.is_dead() {
        return Err(Error::Rules(format!("{target_id} is dead and cannot be healed")));
    }
    let mut outcome = HealOutcome::default();
    if amount <= 0 {
        return Ok(outcome);
    }

    let hp_before = target.hp;
    target.hp = (i64::from(target.hp) + amount).min(i64::from(target.max_hp)) as i32;
    outcome.applied = target.hp - hp_before;

    if matches!(target.status, Status::Unconscious | Status::Stable) {
        target.status = Status::Ok;
        target.death_saves.reset();
        target.remove_condition(tw_domain::ConditionKind::Unconscious);
        outcome.status_change = Some(StatusChange {
            target: target_id.to_string(),
            status: Status::Ok,
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SequenceRoller;
    use tw_domain::{
        AbilityScores, ActionEconomy, Concentration, DeathSaves, Position,
    };

    fn combatant(id: &str, side: Side, hp: i32, max_hp: i32) -> Combatant {
        Combatant {
            id: id.into(),
            name: id.into(),
            side,
            scores: AbilityScores::default(),
            ac: 10,
            hp,
            max_hp,
            speed: 30,
            initiative: 10,
            initiative_advantage: false,
            status: Status::Ok,
            position: Position::default(),
            economy: ActionEconomy::default(),
            conditions: Vec::new(),
            resistances: Default::default(),
            immunities: Default::default(),
            vulnerabilities: Default::default(),
            concentration: None,
            death_saves: DeathSaves::default(),
            recharge_spent: Default::default(),
            legendary_max: 0,
            legendary_resistance: 0,
            proficiency: 2,
            save_proficiencies: Default::default(),
            attributes: Default::default(),
            abilities: Vec::new(),
        }
    }

    #[test]
    fn adjustment_table() {
        let mut target = combatant("t", Side::Monster, 10, 10);
        target.resistances.insert(DamageType::Fire);
        target.immunities.insert(DamageType::Poison);
        target.vulnerabilities.insert(DamageType::Cold);

        assert_eq!(adjust_for_traits(&target, 7, Some(DamageType::Fire)), 3);
        assert_eq!(adjust_for_traits(&target, 1, Some(DamageType::Fire)), 1);
        assert_eq!(adjust_for_traits(&target, 9, Some(DamageType::Poison)), 0);
        assert_eq!(adjust_for_traits(&target, 4, Some(DamageType::Cold)), 8);
        assert_eq!(adjust_for_traits(&target, 4, Some(DamageType::Radiant)), 4);
    }

    #[test]
    fn monster_dies_at_zero_player_falls_unconscious() {
        let roller = SequenceRoller::new([]);
        let mut enc = EncounterState::new(vec![
            combatant("mon", Side::Monster, 5, 5),
            combatant("pc", Side::Player, 5, 5),
        ]);

        let out = apply_damage(&mut enc, "mon", 5, None, &roller, 0).unwrap();
        assert_eq!(out.applied, 5);
        assert_eq!(enc.combatant("mon").unwrap().status, Status::Dead);

        let out = apply_damage(&mut enc, "pc", 5, None, &roller, 0).unwrap();
        assert_eq!(enc.combatant("pc").unwrap().status, Status::Unconscious);
        assert!(!out.instant_death);
    }

    #[test]
    fn instant_death_when_excess_reaches_max_hp() {
        let roller = SequenceRoller::new([]);
        let mut enc = EncounterState::new(vec![combatant("pc", Side::Player, 4, 4)]);
        let out = apply_damage(&mut enc, "pc", 10, None, &roller, 0).unwrap();
        assert!(out.instant_death);
        assert_eq!(enc.combatant("pc").unwrap().status, Status::Dead);
    }

    #[test]
    fn concentration_save_failure_clears_riders_everywhere() {
        // Wizard concentrating on Bless over two allies; 12 damage
        // forces DC max(10, 6) = 10 and the scripted 3 fails it.
        let mut wizard = combatant("wiz", Side::Player, 20, 20);
        wizard.concentration = Some(Concentration {
            spell: "Bless".into(),
            targets: vec!["a1".into(), "a2".into()],
            rider: Some("bless_bonus".into()),
        });
        let mut a1 = combatant("a1", Side::Player, 10, 10);
        a1.attributes.insert("bless_bonus".into(), 2);
        let mut a2 = combatant("a2", Side::Player, 10, 10);
        a2.attributes.insert("bless_bonus".into(), 2);

        let mut enc = EncounterState::new(vec![wizard, a1, a2]);
        let roller = SequenceRoller::new([3]);
        let out = apply_damage(&mut enc, "wiz", 12, None, &roller, 0).unwrap();

        assert_eq!(out.concentration_dropped, vec![("wiz".to_string(), "Bless".to_string())]);
        assert_eq!(out.riders_cleared.len(), 2);
        assert!(!enc.combatant("a1").unwrap().attributes.contains_key("bless_bonus"));
        assert!(!enc.combatant("a2").unwrap().attributes.contains_key("bless_bonus"));
        assert!(enc.combatant("wiz").unwrap().concentration.is_none());
    }

    #[test]
    fn concentration_save_success_keeps_the_spell() {
        let mut wizard = combatant("wiz", Side::Player, 20, 20);
        wizard.concentration = Some(Concentration {
            spell: "Bless".into(),
            targets: vec![],
            rider: None,
        });
        let mut enc = EncounterState::new(vec![wizard]);
        let roller = SequenceRoller::new([15]);
        let out = apply_damage(&mut enc, "wiz", 8, None, &roller, 0).unwrap();
        assert!(out.concentration_dropped.is_empty());
        assert!(enc.combatant("wiz").unwrap().concentration.is_some());
    }

    #[test]
    fn healing_wakes_and_resets_death_saves() {
        let mut pc = combatant("pc", Side::Player, 0, 12);
        pc.status = Status::Unconscious;
        pc.death_saves.failures = 2;
        let mut enc = EncounterState::new(vec![pc]);

        let out = apply_healing(&mut enc, "pc", 7).unwrap();
        assert_eq!(out.applied, 7);
        let pc = enc.combatant("pc").unwrap();
        assert_eq!(pc.status, Status::Ok);
        assert_eq!(pc.hp, 7);
        assert_eq!(pc.death_saves, DeathSaves::default());
    }

    #[test]
    fn healing_clamps_to_max() {
        let mut enc = EncounterState::new(vec![combatant("pc", Side::Player, 10, 12)]);
        let out = apply_healing(&mut enc, "pc", 10).unwrap();
        assert_eq!(out.applied, 2);
        assert_eq!(enc.combatant("pc").unwrap().hp, 12);
    }
}
