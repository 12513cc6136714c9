//! Bounded context summariser: the last few turns verbatim, one-line
//! digests before them under a char budget, and a ribbon of significant
//! events (deaths, conditions, concentration drops) preserved from the
//! digests that fell off the window.

use tw_domain::{EncounterState, Status, TurnRecord};

fn display_name(encounter: &EncounterState, id: &str) -> String {
    encounter
        .combatant(id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn digest_line(encounter: &EncounterState, record: &TurnRecord) -> String {
    let actor = display_name(encounter, &record.combatant_id);
    let action = record
        .intent
        .as_ref()
        .map_or("death_save", |i| i.action_type());
    let target = record
        .intent
        .as_ref()
        .and_then(|i| i.targets().first())
        .map(|t| display_name(encounter, t))
        .unwrap_or_else(|| "-".into());
    let hp_change: i32 = record
        .results
        .healing
        .values()
        .sum::<i32>()
        - record.results.damage.values().sum::<i32>();
    format!(
        "R{}:{}→{} on {} ({:+})",
        record.round, actor, action, target, hp_change
    )
}

fn verbatim_line(encounter: &EncounterState, record: &TurnRecord) -> String {
    let mut line = digest_line(encounter, record);
    if !record.narrative.is_empty() {
        line.push_str(" - ");
        line.push_str(&record.narrative);
    }
    line
}

fn significant_events(encounter: &EncounterState, records: &[&TurnRecord]) -> Vec<String> {
    let mut events = Vec::new();
    for record in records {
        for change in &record.results.status_changes {
            if change.status == Status::Dead {
                events.push(format!(
                    "R{}: {} died",
                    record.round,
                    display_name(encounter, &change.target)
                ));
            }
        }
        for applied in &record.results.conditions_applied {
            events.push(format!(
                "R{}: {} became {}",
                record.round,
                display_name(encounter, &applied.target),
                applied.condition.as_str()
            ));
        }
        for removed in &record.results.conditions_removed {
            events.push(format!(
                "R{}: {} no longer {}",
                record.round,
                display_name(encounter, &removed.target),
                removed.condition.as_str()
            ));
        }
        for (caster, spell) in &record.results.concentration_dropped {
            events.push(format!(
                "R{}: {} lost concentration on {}",
                record.round,
                display_name(encounter, caster),
                spell
            ));
        }
    }
    events
}

/// Summarise the committed log for the next prompt.
pub fn summarise(
    encounter: &EncounterState,
    verbatim_turns: usize,
    char_budget: usize,
) -> String {
    let committed: Vec<&TurnRecord> = encounter.log.iter().filter(|r| !r.rollback).collect();
    if committed.is_empty() {
        return String::new();
    }

    let split = committed.len().saturating_sub(verbatim_turns);
    let (older, recent) = committed.split_at(split);

    // Digest window: newest-first accumulation under the budget, then
    // restored to chronological order.
    let mut digests = Vec::new();
    let mut used = 0usize;
    let mut dropped = Vec::new();
    for record in older.iter().rev() {
        let line = digest_line(encounter, record);
        if used + line.len() + 1 > char_budget {
            dropped.push(*record);
            continue;
        }
        used += line.len() + 1;
        digests.push(line);
    }
    digests.reverse();
    dropped.reverse();

    let mut sections = Vec::new();
    let ribbon = significant_events(encounter, &dropped);
    if !ribbon.is_empty() {
        sections.push(format!("Earlier: {}", ribbon.join("; ")));
    }
    if !digests.is_empty() {
        sections.push(digests.join("\n"));
    }
    if !recent.is_empty() {
        let lines: Vec<String> = recent
            .iter()
            .map(|r| verbatim_line(encounter, r))
            .collect();
        sections.push(lines.join("\n"));
    }
    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tw_domain::{
        AbilityScores, ActionEconomy, Combatant, DeathSaves, Intent, MechanicalResults,
        Position, Side, SourceTier, StatusChange,
    };
    use uuid::Uuid;

    fn combatant(id: &str, name: &str) -> Combatant {
        Combatant {
            id: id.into(),
            name: name.into(),
            side: Side::Monster,
            scores: AbilityScores::default(),
            ac: 10,
            hp: 10,
            max_hp: 10,
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

    fn attack_record(round: u32, actor: &str, target: &str, damage: i32) -> TurnRecord {
        let mut results = MechanicalResults::default();
        results.damage.insert(target.into(), damage);
        TurnRecord {
            resolution_id: Uuid::nil(),
            round,
            combatant_id: actor.into(),
            intent: Some(Intent::Attack {
                ability_name: "Claw".into(),
                targets: vec![target.into()],
                movement_cost: None,
                uses_reaction: false,
            }),
            rolls: Vec::new(),
            results,
            narrative: format!("hits for {damage}"),
            source_tier: SourceTier::Oracle,
            timestamp: Utc::now(),
            rollback: false,
        }
    }

    fn arena_with_log(turns: usize) -> EncounterState {
        let mut enc = EncounterState::new(vec![combatant("a", "Drake"), combatant("b", "Hero")]);
        for i in 0..turns {
            enc.log
                .push(attack_record((i / 2 + 1) as u32, "a", "b", 3));
        }
        enc
    }

    #[test]
    fn recent_turns_are_verbatim_older_are_digests() {
        let enc = arena_with_log(5);
        let summary = summarise(&enc, 3, 1_200);
        // 5 records: 2 digests + 3 verbatim lines with narrative.
        assert_eq!(summary.matches("hits for").count(), 3);
        assert_eq!(summary.matches("Drake→attack").count(), 5);
    }

    #[test]
    fn digest_window_honours_the_char_budget() {
        let enc = arena_with_log(40);
        let tight = summarise(&enc, 3, 60);
        // Two-ish digest lines fit in 60 chars; everything else is
        // dropped (possibly into the ribbon, which stays empty here).
        assert!(tight.len() < 60 + 3 * 120);
    }

    #[test]
    fn deaths_survive_the_digest_cut_in_the_ribbon() {
        let mut enc = arena_with_log(30);
        let mut death = attack_record(1, "a", "b", 10);
        death.results.status_changes.push(StatusChange {
            target: "b".into(),
            status: Status::Dead,
        });
        enc.log.insert(0, death);

        let summary = summarise(&enc, 3, 40);
        assert!(summary.contains("Hero died"), "summary: {summary}");
    }

    #[test]
    fn empty_log_is_an_empty_summary() {
        let enc = arena_with_log(0);
        assert_eq!(summarise(&enc, 3, 1_200), "");
    }
}
