//! Mechanical interpretation of conditions: how each named condition
//! shifts attack vantage, forbids actions, zeroes speed or auto-fails
//! saves. The data model lives in `tw-domain`; this module is the rules
//! lookup table.

use tw_domain::{
    ActiveCondition, AppliedCondition, Combatant, ConditionDuration, ConditionKind,
    EncounterState, Stat, Status,
};

use crate::vantage::Vantage;

/// Conditions (or the unconscious status) that leave a combatant unable
/// to take actions, bonus actions or reactions.
pub fn cannot_act(combatant: &Combatant) -> bool {
    !combatant.is_active()
        || combatant.has_condition(ConditionKind::Stunned)
        || combatant.has_condition(ConditionKind::Paralyzed)
        || combatant.has_condition(ConditionKind::Incapacitated)
        || combatant.has_condition(ConditionKind::Unconscious)
}

pub fn cannot_react(combatant: &Combatant) -> bool {
    cannot_act(combatant)
}

/// Restrained and grappled creatures have a speed of 0.
pub fn speed_is_zero(combatant: &Combatant) -> bool {
    combatant.has_condition(ConditionKind::Restrained)
        || combatant.has_condition(ConditionKind::Grappled)
}

fn helpless(target: &Combatant) -> bool {
    matches!(target.status, Status::Unconscious | Status::Stable)
        || target.has_condition(ConditionKind::Unconscious)
        || target.has_condition(ConditionKind::Paralyzed)
}

/// Vantage granted to an incoming attack by the defender's state.
pub fn defender_vantage(target: &Combatant, melee: bool) -> Vantage {
    let mut vantage = Vantage::Normal;
    if helpless(target)
        || target.has_condition(ConditionKind::Stunned)
        || target.has_condition(ConditionKind::Restrained)
        || target.has_condition(ConditionKind::Blinded)
    {
        vantage = vantage.combine(Vantage::Advantage);
    }
    if target.has_condition(ConditionKind::Prone) {
        vantage = vantage.combine(if melee {
            Vantage::Advantage
        } else {
            Vantage::Disadvantage
        });
    }
    if target.has_condition(ConditionKind::Dodging) {
        vantage = vantage.combine(Vantage::Disadvantage);
    }
    vantage
}

/// Vantage the attacker's own state imposes on its attack rolls.
pub fn attacker_vantage(attacker: &Combatant, encounter: &EncounterState) -> Vantage {
    let mut vantage = Vantage::Normal;
    if attacker.has_condition(ConditionKind::Blinded)
        || attacker.has_condition(ConditionKind::Restrained)
    {
        vantage = vantage.combine(Vantage::Disadvantage);
    }
    if attacker.has_condition(ConditionKind::Frightened) {
        // Line of sight is not modelled; a living fear source counts.
        let source_alive = attacker
            .conditions
            .iter()
            .filter(|c| c.kind == ConditionKind::Frightened)
            .any(|c| {
                encounter
                    .combatant(&c.source_id)
                    .is_some_and(|s| s.is_active())
            });
        if source_alive {
            vantage = vantage.combine(Vantage::Disadvantage);
        }
    }
    if attacker.position.flanking {
        vantage = vantage.combine(Vantage::Advantage);
    }
    if attacker.attributes.get("help_advantage").copied().unwrap_or(0) > 0
        || attacker.attributes.get("hidden").copied().unwrap_or(0) > 0
    {
        vantage = vantage.combine(Vantage::Advantage);
    }
    vantage
}

/// A hit against an unconscious or paralyzed target within 5 ft is a
/// critical hit.
pub fn auto_crit_in_melee(target: &Combatant, distance_ft: i32) -> bool {
    helpless(target) && distance_ft <= 5
}

/// Unconscious, paralyzed and stunned creatures auto-fail Strength and
/// Dexterity saves.
pub fn auto_fails_save(target: &Combatant, stat: Stat) -> bool {
    if !matches!(stat, Stat::Str | Stat::Dex) {
        return false;
    }
    helpless(target)
        || target.has_condition(ConditionKind::Stunned)
        || target.has_condition(ConditionKind::Unconscious)
}

/// Vantage on the saving throw itself.
pub fn save_vantage(target: &Combatant, stat: Stat) -> Vantage {
    if stat == Stat::Dex && target.has_condition(ConditionKind::Restrained) {
        Vantage::Disadvantage
    } else {
        Vantage::Normal
    }
}

/// The `(kind, source)` keys of the conditions currently on a
/// combatant, captured before a turn executes so conditions gained
/// during the turn are exempt from that turn's tick.
pub fn condition_keys(combatant: &Combatant) -> Vec<(ConditionKind, String)> {
    combatant
        .conditions
        .iter()
        .map(|c| (c.kind, c.source_id.clone()))
        .collect()
}

/// End-of-turn duration tick for the acting combatant. Only conditions
/// in `established` (present before the turn) count down; a dodge or
/// disengage gained this turn keeps its full duration. Returns the
/// conditions that just expired, already removed from the combatant.
pub fn end_of_turn_tick(
    combatant: &mut Combatant,
    established: &[(ConditionKind, String)],
) -> Vec<AppliedCondition> {
    let mut expired = Vec::new();
    for condition in &mut combatant.conditions {
        let was_established = established
            .iter()
            .any(|(kind, source)| *kind == condition.kind && *source == condition.source_id);
        if was_established {
            condition.tick();
        }
    }
    let owner = combatant.id.clone();
    combatant.conditions.retain(|c| {
        if c.expired() {
            expired.push(AppliedCondition {
                target: owner.clone(),
                condition: c.kind,
                duration_rounds: Some(0),
                source_id: c.source_id.clone(),
            });
            false
        } else {
            true
        }
    });
    expired
}

/// Round-start sweep: drop entries that already expired (belt over the
/// per-turn tick) without decrementing anything.
pub fn sweep_expired(combatant: &mut Combatant) -> Vec<AppliedCondition> {
    let mut removed = Vec::new();
    let owner = combatant.id.clone();
    combatant.conditions.retain(|c| {
        if matches!(c.duration, ConditionDuration::Rounds(0)) {
            removed.push(AppliedCondition {
                target: owner.clone(),
                condition: c.kind,
                duration_rounds: Some(0),
                source_id: c.source_id.clone(),
            });
            false
        } else {
            true
        }
    });
    removed
}

pub fn apply_condition(
    target: &mut Combatant,
    kind: ConditionKind,
    rounds: Option<u32>,
    source_id: &str,
) -> AppliedCondition {
    target
        .conditions
        .push(ActiveCondition::new(kind, rounds, source_id));
    AppliedCondition {
        target: target.id.clone(),
        condition: kind,
        duration_rounds: rounds,
        source_id: source_id.to_string(),
    }
}
