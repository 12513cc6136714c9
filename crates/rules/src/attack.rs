//! Attack-roll resolution: vantage composition, cover, criticals, and
//! the reaction window between the roll and the committed outcome.

use tw_domain::roll::split_expression;
use tw_domain::{Ability, Cover, DiceRoll, DiceRoller, EncounterState, Error, Result};

use crate::conditions::{attacker_vantage, auto_crit_in_melee, defender_vantage};
use crate::hooks::{AttackEvent, ReactionHooks};
use crate::vantage::Vantage;

/// Attribute riders added to attack totals while their source effect
/// holds (cleared when concentration drops).
const ATTACK_RIDER: &str = "bless_bonus";

#[derive(Debug, Clone)]
pub struct AttackResolution {
    pub hit: bool,
    pub critical: bool,
    /// The natural d20 result after vantage selection.
    pub natural: i64,
    pub total: i64,
    /// True when full cover turned the attack into an auto-miss before
    /// any dice were rolled.
    pub auto_miss_cover: bool,
    /// AC rider a reacting defender added, 0 otherwise.
    pub reaction_ac_bonus: i32,
    pub rolls: Vec<DiceRoll>,
}

/// Resolve the to-hit roll of one attack. Damage is rolled separately so
/// the caller can batch multi-target abilities.
pub fn resolve_attack_roll(
    encounter: &mut EncounterState,
    attacker_id: &str,
    target_id: &str,
    ability: &Ability,
    critical_range: &[u8],
    roller: &dyn DiceRoller,
    hooks: &mut dyn ReactionHooks,
) -> Result<AttackResolution> {
    let attacker = encounter
        .combatant(attacker_id)
        .ok_or_else(|| Error::Rules(format!("unknown attacker {attacker_id}")))?;
    let target = encounter
        .combatant(target_id)
        .ok_or_else(|| Error::Rules(format!("unknown target {target_id}")))?;

    let melee = ability.is_melee();
    let distance = attacker.position.distance_to(target_id);
    let cover = target.position.cover;
    let target_ac = i64::from(target.ac);
    let vantage = attacker_vantage(attacker, encounter).combine(defender_vantage(target, melee));
    let rider = i64::from(attacker.attributes.get(ATTACK_RIDER).copied().unwrap_or(0));
    let helpless_in_reach = auto_crit_in_melee(target, distance);

    if cover == Some(Cover::Full) {
        return Ok(AttackResolution {
            hit: false,
            critical: false,
            natural: 0,
            total: 0,
            auto_miss_cover: true,
            reaction_ac_bonus: 0,
            rolls: Vec::new(),
        });
    }

    let mut rolls = Vec::new();
    let first = roller.roll("1d20")?;
    rolls.push(DiceRoll::new("1d20", first, "attack"));
    let natural = if vantage == Vantage::Normal {
        first
    } else {
        let second = roller.roll("1d20")?;
        rolls.push(DiceRoll::new("1d20", second, "attack"));
        vantage.pick(first, second)
    };

    let natural_crit = natural >= 1 && critical_range.contains(&(natural.clamp(0, 20) as u8));
    let total = natural + i64::from(ability.attack_bonus) + rider;
    let mut effective_ac = target_ac
        + i64::from(cover.map_or(0, Cover::ac_bonus));

    let mut hit = natural != 1 && (natural_crit || total >= effective_ac);

    let event = AttackEvent {
        attacker_id: attacker_id.to_string(),
        target_id: target_id.to_string(),
        total,
        effective_ac,
        would_hit: hit,
        critical: natural_crit,
    };
    let mut reaction_ac_bonus = 0;
    if let Some(bonus) = hooks.on_attack_resolved(encounter, &event) {
        reaction_ac_bonus = bonus;
        effective_ac += i64::from(bonus);
        // A natural critical still lands through a raised AC.
        hit = natural != 1 && (natural_crit || total >= effective_ac);
    }

    let critical = hit && (natural_crit || helpless_in_reach);

    Ok(AttackResolution {
        hit,
        critical,
        natural,
        total,
        auto_miss_cover: false,
        reaction_ac_bonus,
        rolls,
    })
}

/// Roll damage for an expression. On a critical the dice are doubled,
/// never the flat modifier.
pub fn roll_damage(
    roller: &dyn DiceRoller,
    expression: &str,
    critical: bool,
) -> Result<(i64, Vec<DiceRoll>)> {
    let purpose = if critical { "damage (critical)" } else { "damage" };
    match split_expression(expression) {
        Some(split) => match split.dice {
            Some(dice) => {
                let base = roller.roll(&dice)?;
                let rolled = if critical { base * 2 } else { base };
                let total = (rolled + split.modifier).max(0);
                Ok((total, vec![DiceRoll::new(dice, base, purpose)]))
            }
            None => Ok((split.modifier.max(0), Vec::new())),
        },
        None => {
            // Unrecognised grammar: hand the whole expression to the
            // roller, rolling twice on a critical.
            let mut rolls = Vec::new();
            let mut total = roller.roll(expression)?;
            rolls.push(DiceRoll::new(expression, total, purpose));
            if critical {
                let second = roller.roll(expression)?;
                rolls.push(DiceRoll::new(expression, second, purpose));
                total += second;
            }
            Ok((total.max(0), rolls))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoReactions;
    use crate::testutil::SequenceRoller;
    use tw_domain::{
        AbilityKind, AbilityScores, ActionEconomy, Combatant, DamageType, DeathSaves,
        EncounterState, Position, Side, Status,
    };

    fn bite() -> Ability {
        Ability {
            name: "Bite".into(),
            tag: String::new(),
            kind: AbilityKind::MeleeAttack,
            attack_bonus: 4,
            damage: Some("1d4+2".into()),
            damage_type: Some(DamageType::Piercing),
            reach_ft: 5,
            range_ft: None,
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

    fn fighter(id: &str, side: Side, ac: i32) -> Combatant {
        Combatant {
            id: id.into(),
            name: id.into(),
            side,
            scores: AbilityScores::default(),
            ac,
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

    fn arena() -> EncounterState {
        let mut attacker = fighter("atk", Side::Monster, 12);
        attacker.position.distance_to.insert("def".into(), 5);
        let mut defender = fighter("def", Side::Player, 14);
        defender.position.distance_to.insert("atk".into(), 5);
        EncounterState::new(vec![attacker, defender])
    }

    #[test]
    fn natural_twenty_crits_and_hits() {
        let mut enc = arena();
        let roller = SequenceRoller::new([20]);
        let res = resolve_attack_roll(
            &mut enc,
            "atk",
            "def",
            &bite(),
            &[20],
            &roller,
            &mut NoReactions,
        )
        .unwrap();
        assert!(res.hit);
        assert!(res.critical);
        assert_eq!(res.natural, 20);
    }

    #[test]
    fn natural_one_always_misses() {
        let mut enc = arena();
        // AC 14 would be hit by 1 + 4 + plenty, but nat 1 misses.
        enc.combatant_mut("def").unwrap().ac = 2;
        let roller = SequenceRoller::new([1]);
        let res = resolve_attack_roll(
            &mut enc,
            "atk",
            "def",
            &bite(),
            &[20],
            &roller,
            &mut NoReactions,
        )
        .unwrap();
        assert!(!res.hit);
    }

    #[test]
    fn half_cover_raises_effective_ac() {
        let mut enc = arena();
        enc.combatant_mut("def").unwrap().position.cover = Some(Cover::Half);
        // 10 + 4 = 14 hits AC 14, but half cover pushes it to 16.
        let roller = SequenceRoller::new([10]);
        let res = resolve_attack_roll(
            &mut enc,
            "atk",
            "def",
            &bite(),
            &[20],
            &roller,
            &mut NoReactions,
        )
        .unwrap();
        assert!(!res.hit);
    }

    #[test]
    fn full_cover_is_an_auto_miss_without_rolling() {
        let mut enc = arena();
        enc.combatant_mut("def").unwrap().position.cover = Some(Cover::Full);
        let roller = SequenceRoller::new([20]);
        let res = resolve_attack_roll(
            &mut enc,
            "atk",
            "def",
            &bite(),
            &[20],
            &roller,
            &mut NoReactions,
        )
        .unwrap();
        assert!(res.auto_miss_cover);
        assert!(res.rolls.is_empty());
    }

    #[test]
    fn advantage_rolls_twice_and_takes_higher() {
        let mut enc = arena();
        enc.combatant_mut("atk").unwrap().position.flanking = true;
        let roller = SequenceRoller::new([3, 17]);
        let res = resolve_attack_roll(
            &mut enc,
            "atk",
            "def",
            &bite(),
            &[20],
            &roller,
            &mut NoReactions,
        )
        .unwrap();
        assert_eq!(res.natural, 17);
        assert_eq!(res.rolls.len(), 2);
        assert!(res.hit);
    }

    #[test]
    fn critical_doubles_dice_not_modifier() {
        let roller = SequenceRoller::new([4]);
        let (total, rolls) = roll_damage(&roller, "1d4+2", true).unwrap();
        assert_eq!(total, 10); // 2·4 + 2
        assert_eq!(rolls.len(), 1);

        let roller = SequenceRoller::new([4]);
        let (total, _) = roll_damage(&roller, "1d4+2", false).unwrap();
        assert_eq!(total, 6);
    }

    struct ShieldOnce;
    impl ReactionHooks for ShieldOnce {
        fn on_attack_resolved(
            &mut self,
            _encounter: &mut EncounterState,
            event: &AttackEvent,
        ) -> Option<i32> {
            event.would_hit.then_some(5)
        }
    }

    #[test]
    fn reaction_ac_rider_turns_a_hit_into_a_miss() {
        let mut enc = arena();
        // 12 + 4 = 16 vs AC 14 hits; +5 shield turns it away.
        let roller = SequenceRoller::new([12]);
        let res = resolve_attack_roll(
            &mut enc,
            "atk",
            "def",
            &bite(),
            &[20],
            &roller,
            &mut ShieldOnce,
        )
        .unwrap();
        assert!(!res.hit);
        assert_eq!(res.reaction_ac_bonus, 5);
    }
}
