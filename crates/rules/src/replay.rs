//! Pure replay: folding the committed turn records over the initial
//! encounter state reproduces the combat outcome observed live. Used by
//! the test suite to cross-check the live engine, and by anything that
//! wants to reconstruct a fight from its log.

use tw_domain::{ActiveCondition, EncounterState, TurnRecord};

/// Apply one committed record to the state. Rollback markers carry no
/// mechanical results and are skipped by `replay`.
pub fn apply_record(encounter: &mut EncounterState, record: &TurnRecord) {
    let results = &record.results;

    for (target_id, amount) in &results.damage {
        if let Some(target) = encounter.combatant_mut(target_id) {
            target.hp = (target.hp - amount).max(0);
        }
    }
    for (target_id, amount) in &results.healing {
        if let Some(target) = encounter.combatant_mut(target_id) {
            target.hp = (target.hp + amount).min(target.max_hp);
        }
    }
    for applied in &results.conditions_applied {
        if let Some(target) = encounter.combatant_mut(&applied.target) {
            target.conditions.push(ActiveCondition::new(
                applied.condition,
                applied.duration_rounds,
                applied.source_id.clone(),
            ));
        }
    }
    for removed in &results.conditions_removed {
        if let Some(target) = encounter.combatant_mut(&removed.target) {
            target.remove_condition(removed.condition);
        }
    }
    for rider in &results.riders {
        if let Some(target) = encounter.combatant_mut(&rider.target) {
            match rider.bonus {
                Some(bonus) => {
                    target.attributes.insert(rider.attribute.clone(), bonus);
                }
                None => {
                    target.attributes.remove(&rider.attribute);
                }
            }
        }
    }
    for (caster_id, _) in &results.concentration_dropped {
        if let Some(caster) = encounter.combatant_mut(caster_id) {
            caster.concentration = None;
        }
    }
    if let Some((successes, failures)) = results.death_saves {
        if let Some(target) = encounter.combatant_mut(&record.combatant_id) {
            target.death_saves.successes = successes;
            target.death_saves.failures = failures;
        }
    }
    // Status transitions last: they are recorded post-hoc and override
    // whatever the deltas above implied.
    for change in &results.status_changes {
        if let Some(target) = encounter.combatant_mut(&change.target) {
            target.status = change.status;
            if change.status == tw_domain::Status::Ok && target.hp == 0 {
                // A natural-20 death save revives at 1 HP.
                target.hp = 1;
            }
        }
    }
    encounter.round = record.round;
}

/// Fold the whole log over the initial state.
pub fn replay(initial: &EncounterState, log: &[TurnRecord]) -> EncounterState {
    let mut state = initial.clone();
    for record in log.iter().filter(|r| !r.rollback) {
        apply_record(&mut state, record);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tw_domain::{
        AbilityScores, ActionEconomy, Combatant, DeathSaves, MechanicalResults, Position, Side,
        SourceTier, Status, StatusChange,
    };
    use uuid::Uuid;

    fn combatant(id: &str, hp: i32) -> Combatant {
        Combatant {
            id: id.into(),
            name: id.into(),
            side: Side::Player,
            scores: AbilityScores::default(),
            ac: 10,
            hp,
            max_hp: hp,
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

    fn record(round: u32, actor: &str, results: MechanicalResults) -> TurnRecord {
        TurnRecord {
            resolution_id: Uuid::nil(),
            round,
            combatant_id: actor.into(),
            intent: None,
            rolls: Vec::new(),
            results,
            narrative: String::new(),
            source_tier: SourceTier::Heuristic,
            timestamp: Utc::now(),
            rollback: false,
        }
    }

    #[test]
    fn damage_and_status_replay_exactly() {
        let initial = EncounterState::new(vec![combatant("a", 10), combatant("b", 6)]);

        let mut first = MechanicalResults::default();
        first.damage.insert("b".into(), 6);
        first.status_changes.push(StatusChange {
            target: "b".into(),
            status: Status::Unconscious,
        });
        let mut second = MechanicalResults::default();
        second.healing.insert("b".into(), 4);
        second.status_changes.push(StatusChange {
            target: "b".into(),
            status: Status::Ok,
        });

        let log = vec![record(1, "a", first), record(1, "x", second)];
        let replayed = replay(&initial, &log);

        let b = replayed.combatant("b").unwrap();
        assert_eq!(b.hp, 4);
        assert_eq!(b.status, Status::Ok);
    }

    #[test]
    fn rollback_markers_are_skipped() {
        let initial = EncounterState::new(vec![combatant("a", 10)]);
        let mut results = MechanicalResults::default();
        results.damage.insert("a".into(), 5);
        let mut rolled_back = record(1, "a", results);
        rolled_back.rollback = true;

        let replayed = replay(&initial, &[rolled_back]);
        assert_eq!(replayed.combatant("a").unwrap().hp, 10);
    }
}
