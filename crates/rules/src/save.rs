//! Saving throws: proficiency, auto-fail conditions, save vantage and
//! legendary resistance.

use tw_domain::{Combatant, DiceRoll, DiceRoller, Result, SaveRecord, Stat};

use crate::conditions::{auto_fails_save, save_vantage};
use crate::vantage::Vantage;

/// Attribute rider added to save totals while its source effect holds.
const SAVE_RIDER: &str = "bless_bonus";

#[derive(Debug, Clone)]
pub struct SaveResolution {
    pub record: SaveRecord,
    pub rolls: Vec<DiceRoll>,
}

/// Resolve a saving throw. Legendary resistance, when available,
/// converts a failure into a success automatically and decrements the
/// pool.
pub fn resolve_save(
    roller: &dyn DiceRoller,
    target: &mut Combatant,
    stat: Stat,
    dc: i32,
) -> Result<SaveResolution> {
    let mut rolls = Vec::new();

    let (mut success, total, auto_failed) = if auto_fails_save(target, stat) {
        (false, 0, true)
    } else {
        let vantage = save_vantage(target, stat);
        let first = roller.roll("1d20")?;
        rolls.push(DiceRoll::new("1d20", first, "save"));
        let natural = if vantage == Vantage::Normal {
            first
        } else {
            let second = roller.roll("1d20")?;
            rolls.push(DiceRoll::new("1d20", second, "save"));
            vantage.pick(first, second)
        };
        let rider = i64::from(target.attributes.get(SAVE_RIDER).copied().unwrap_or(0));
        let total = natural + i64::from(target.save_bonus(stat)) + rider;
        (total >= i64::from(dc), total, false)
    };

    let mut legendary_resistance = false;
    if !success && target.legendary_resistance > 0 {
        target.legendary_resistance -= 1;
        success = true;
        legendary_resistance = true;
    }

    Ok(SaveResolution {
        record: SaveRecord {
            target: target.id.clone(),
            stat,
            dc,
            total,
            success,
            auto_failed,
            legendary_resistance,
        },
        rolls,
    })
}
