//! Start-of-turn recharge rolls for expended abilities.

use tw_domain::{Combatant, DiceRoll, DiceRoller, Result};

/// Roll a d6 for every recharge ability expended in a prior turn. An
/// in-range roll makes the ability available again.
pub fn roll_recharges(
    roller: &dyn DiceRoller,
    combatant: &mut Combatant,
    current_round: u32,
) -> Result<Vec<DiceRoll>> {
    let mut rolls = Vec::new();
    let candidates: Vec<(String, tw_domain::RechargeRange)> = combatant
        .abilities
        .iter()
        .filter_map(|ability| {
            let range = ability.recharge?;
            let spent_round = combatant.recharge_spent.get(&ability.name)?;
            // Only uses from a prior turn are eligible.
            (*spent_round < current_round).then(|| (ability.name.clone(), range))
        })
        .collect();

    for (name, range) in candidates {
        let natural = roller.roll("1d6")?;
        rolls.push(DiceRoll::new("1d6", natural, format!("recharge {name}")));
        if range.contains(natural) {
            combatant.recharge_spent.remove(&name);
        }
    }
    Ok(rolls)
}
