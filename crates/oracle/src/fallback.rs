//! The deterministic tiers of the fallback ladder: the retry correction
//! block, the rule-based tactical heuristic, and the always-legal
//! default. The ladder itself is sequenced by the pipeline; each tier
//! here is a pure function of the encounter.

use tw_domain::roll::average_roll;
use tw_domain::{Ability, AbilityKind, Combatant, EncounterState, Intent};

/// Appended to the re-prompt after a validation failure.
pub fn correction_block(reason: &str) -> String {
    format!(
        "\n\n## Correction\nYour previous reply was rejected: {reason}.\n\
Reply again with a single JSON object following the schema exactly, \
using only abilities from your own list and only living, legal targets."
    )
}

/// The minimal safe default: always legal, always succeeds.
pub fn default_intent() -> Intent {
    Intent::Dodge
}

fn in_range(actor: &Combatant, ability: &Ability, distance: i32) -> bool {
    !actor.ability_expended(&ability.name)
        && if ability.is_melee() {
            distance <= ability.reach_ft
        } else {
            distance <= ability.range_ft.unwrap_or(600)
        }
}

/// Weapon attacks usable against a target at the given distance. This
/// tier is conservative: leveled spells spend resources and are never
/// picked here.
fn usable_attacks<'a>(actor: &'a Combatant, distance: i32) -> impl Iterator<Item = &'a Ability> {
    actor
        .abilities
        .iter()
        .filter(move |a| a.is_attack() && a.damage.is_some() && in_range(actor, a, distance))
}

fn usable_cantrips<'a>(actor: &'a Combatant, distance: i32) -> impl Iterator<Item = &'a Ability> {
    actor.abilities.iter().filter(move |a| {
        a.kind == AbilityKind::Cantrip && a.damage.is_some() && in_range(actor, a, distance)
    })
}

fn best_by_damage<'a>(abilities: impl Iterator<Item = &'a Ability>) -> Option<Ability> {
    abilities
        .max_by(|a, b| {
            let da = a.damage.as_deref().map_or(0.0, average_roll);
            let db = b.damage.as_deref().map_or(0.0, average_roll);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
}

/// Action preference: highest-damage attack, then a cantrip.
fn best_offensive(actor: &Combatant, distance: i32) -> Option<Ability> {
    best_by_damage(usable_attacks(actor, distance))
        .or_else(|| best_by_damage(usable_cantrips(actor, distance)))
}

fn offensive_intent(ability: &Ability, target_id: &str) -> Intent {
    if ability.kind == AbilityKind::Cantrip {
        Intent::Cantrip {
            ability_name: ability.name.clone(),
            targets: vec![target_id.to_string()],
            movement_cost: None,
        }
    } else {
        Intent::Attack {
            ability_name: ability.name.clone(),
            targets: vec![target_id.to_string()],
            movement_cost: None,
            uses_reaction: false,
        }
    }
}

/// Target desirability: wounded, lightly armoured, adjacent and near
/// targets score high.
fn target_score(actor: &Combatant, target: &Combatant) -> f64 {
    let hp_fraction = f64::from(target.hp) / f64::from(target.max_hp.max(1));
    let distance = actor.position.distance_to(&target.id);
    let in_melee = if distance <= 5 { 1.0 } else { 0.0 };
    (1.0 - hp_fraction) * 30.0
        + f64::from((20 - target.ac).max(0)) * 2.0
        + 20.0 * in_melee
        - f64::from(distance)
}

/// Tier two: the deterministic tactical chooser.
///
/// In order: self-heal when at or below a quarter HP, finish an
/// unconscious enemy in reach, otherwise press the best-scoring target
/// with the highest-damage usable attack (a cantrip only when no
/// weapon reaches), closing distance or dodging when nothing applies.
pub fn heuristic_intent(actor: &Combatant, encounter: &EncounterState) -> Intent {
    // 1. Emergency self-heal.
    if actor.hp * 4 <= actor.max_hp {
        if let Some(heal) = actor
            .abilities
            .iter()
            .find(|a| a.is_heal() && !actor.ability_expended(&a.name))
        {
            let intent = match heal.kind {
                AbilityKind::Spell => Intent::Spell {
                    ability_name: heal.name.clone(),
                    targets: vec![actor.id.clone()],
                    spell_slot_level: None,
                    movement_cost: None,
                    uses_reaction: false,
                },
                _ => Intent::UseItem {
                    ability_name: heal.name.clone(),
                    targets: vec![actor.id.clone()],
                },
            };
            return intent;
        }
    }

    let enemies = encounter.living_enemies_of(&actor.id);

    // 2. Finish a downed enemy within melee reach.
    for enemy in &enemies {
        if !enemy.is_active() && !enemy.is_dead() {
            let distance = actor.position.distance_to(&enemy.id);
            if let Some(melee) = usable_attacks(actor, distance).find(|a| a.is_melee()) {
                return offensive_intent(melee, &enemy.id);
            }
        }
    }

    // 3. Best-scoring live target.
    let mut scored: Vec<&&Combatant> = enemies.iter().filter(|e| e.is_active()).collect();
    scored.sort_by(|a, b| {
        target_score(actor, b)
            .partial_cmp(&target_score(actor, a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(target) = scored.first() {
        let distance = actor.position.distance_to(&target.id);
        if let Some(ability) = best_offensive(actor, distance) {
            return offensive_intent(&ability, &target.id);
        }
        // Nothing reaches: close on the nearest enemy.
        let nearest = scored
            .iter()
            .min_by_key(|e| actor.position.distance_to(&e.id));
        if let Some(nearest) = nearest {
            let distance = actor.position.distance_to(&nearest.id);
            if actor.speed > 0 && distance > 5 {
                return Intent::Dash {
                    movement_cost: Some(distance.min(actor.speed)),
                };
            }
        }
    }

    Intent::Dodge
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_domain::{
        AbilityScores, ActionEconomy, DamageType, DeathSaves, Position, Side, Status,
    };

    fn attack(name: &str, damage: &str, melee: bool) -> Ability {
        Ability {
            name: name.into(),
            tag: String::new(),
            kind: if melee {
                AbilityKind::MeleeAttack
            } else {
                AbilityKind::RangedAttack
            },
            attack_bonus: 4,
            damage: Some(damage.into()),
            damage_type: Some(DamageType::Slashing),
            reach_ft: 5,
            range_ft: if melee { None } else { Some(60) },
            save_dc: None,
            save_ability: None,
            half_on_save: false,
            heal: None,
            friendly: false,
            concentration: false,
            grants_attribute: None,
            grants_bonus: 0,
            recharge: None,
            legendary_cost: None,
            reaction_ac_bonus: None,
            applies_condition: None,
            condition_duration: None,
        }
    }

    fn healing_potion() -> Ability {
        Ability {
            name: "Healing Potion".into(),
            tag: String::new(),
            kind: AbilityKind::Heal,
            attack_bonus: 0,
            damage: None,
            damage_type: None,
            reach_ft: 5,
            range_ft: None,
            save_dc: None,
            save_ability: None,
            half_on_save: false,
            heal: Some("2d4+2".into()),
            friendly: true,
            concentration: false,
            grants_attribute: None,
            grants_bonus: 0,
            recharge: None,
            legendary_cost: None,
            reaction_ac_bonus: None,
            applies_condition: None,
            condition_duration: None,
        }
    }

    fn cast(name: &str, kind: AbilityKind, damage: &str) -> Ability {
        Ability {
            name: name.into(),
            tag: String::new(),
            kind,
            attack_bonus: 0,
            damage: Some(damage.into()),
            damage_type: Some(DamageType::Fire),
            reach_ft: 5,
            range_ft: Some(60),
            save_dc: Some(13),
            save_ability: None,
            half_on_save: false,
            heal: None,
            friendly: false,
            concentration: false,
            grants_attribute: None,
            grants_bonus: 0,
            recharge: None,
            legendary_cost: None,
            reaction_ac_bonus: None,
            applies_condition: None,
            condition_duration: None,
        }
    }

    fn combatant(id: &str, side: Side, hp: i32, max_hp: i32, ac: i32) -> Combatant {
        Combatant {
            id: id.into(),
            name: id.into(),
            side,
            scores: AbilityScores::default(),
            ac,
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
    fn low_hp_prefers_a_self_heal() {
        let mut actor = combatant("a", Side::Player, 2, 12, 14);
        actor.abilities.push(attack("Sword", "1d8+2", true));
        actor.abilities.push(healing_potion());
        let enemy = combatant("e", Side::Monster, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone(), enemy]);

        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.action_type(), "use_item");
        assert_eq!(intent.ability_name(), Some("Healing Potion"));
        assert_eq!(intent.targets(), ["a".to_string()]);
    }

    #[test]
    fn finishes_an_unconscious_enemy_in_reach() {
        let mut actor = combatant("a", Side::Monster, 10, 10, 12);
        actor.abilities.push(attack("Claw", "1d6+2", true));
        actor.position.distance_to.insert("down".into(), 5);
        actor.position.distance_to.insert("up".into(), 5);
        let mut down = combatant("down", Side::Player, 0, 10, 12);
        down.status = Status::Unconscious;
        let up = combatant("up", Side::Player, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone(), down, up]);

        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.targets(), ["down".to_string()]);
    }

    #[test]
    fn prefers_the_wounded_low_ac_adjacent_target() {
        let mut actor = combatant("a", Side::Monster, 10, 10, 12);
        actor.abilities.push(attack("Claw", "1d6+2", true));
        actor.abilities.push(attack("Bow", "1d8", false));
        actor.position.distance_to.insert("tank".into(), 30);
        actor.position.distance_to.insert("mage".into(), 5);
        let tank = combatant("tank", Side::Player, 30, 30, 19);
        let mage = combatant("mage", Side::Player, 4, 12, 11);
        let enc = EncounterState::new(vec![actor.clone(), tank, mage]);

        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.targets(), ["mage".to_string()]);
        // Adjacent: the melee claw out-damages the bow.
        assert_eq!(intent.ability_name(), Some("Claw"));
    }

    #[test]
    fn a_weaker_attack_beats_a_stronger_cantrip() {
        let mut actor = combatant("a", Side::Monster, 10, 10, 12);
        actor.abilities.push(attack("Dagger", "1d4", true));
        actor
            .abilities
            .push(cast("Eldritch Blast", AbilityKind::Cantrip, "1d10"));
        actor.position.distance_to.insert("pc".into(), 5);
        let pc = combatant("pc", Side::Player, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone(), pc]);

        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.action_type(), "attack");
        assert_eq!(intent.ability_name(), Some("Dagger"));
    }

    #[test]
    fn cantrip_is_chosen_when_no_weapon_reaches() {
        let mut actor = combatant("a", Side::Monster, 10, 10, 12);
        actor.abilities.push(attack("Claw", "1d6+2", true));
        actor
            .abilities
            .push(cast("Fire Bolt", AbilityKind::Cantrip, "1d10"));
        actor.position.distance_to.insert("pc".into(), 30);
        let pc = combatant("pc", Side::Player, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone(), pc]);

        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.action_type(), "cantrip");
        assert_eq!(intent.ability_name(), Some("Fire Bolt"));
    }

    #[test]
    fn leveled_spells_are_never_picked_by_this_tier() {
        let mut actor = combatant("a", Side::Monster, 10, 10, 12);
        actor
            .abilities
            .push(cast("Fireball", AbilityKind::Spell, "8d6"));
        actor.position.distance_to.insert("pc".into(), 30);
        let pc = combatant("pc", Side::Player, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone(), pc]);

        // With only a leveled spell on the list, the tier closes the
        // distance instead of spending the slot.
        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.action_type(), "dash");
    }

    #[test]
    fn dashes_when_nothing_reaches() {
        let mut actor = combatant("a", Side::Monster, 10, 10, 12);
        actor.abilities.push(attack("Claw", "1d6+2", true));
        actor.position.distance_to.insert("pc".into(), 40);
        let pc = combatant("pc", Side::Player, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone(), pc]);

        let intent = heuristic_intent(&actor, &enc);
        assert_eq!(intent.action_type(), "dash");
        assert_eq!(intent.movement_cost(), Some(30));
    }

    #[test]
    fn dodges_with_no_enemies_left() {
        let actor = combatant("a", Side::Monster, 10, 10, 12);
        let enc = EncounterState::new(vec![actor.clone()]);
        assert_eq!(heuristic_intent(&actor, &enc), Intent::Dodge);
    }
}
