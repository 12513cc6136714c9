//! Combatant model: the primary entity handed to the engine at `start`.
//!
//! Combatants are created externally (content loading is out of scope),
//! mutated only inside a turn transaction, and observed through emitted
//! events — never by direct reference to live state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::conditions::{ActiveCondition, ConditionKind};

/// Which side of the encounter a combatant fights for.
///
/// `Npc` combatants are allied with the players for the purpose of the
/// end-of-encounter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Monster,
    Npc,
}

impl Side {
    /// True when the two sides are hostile to each other.
    pub fn hostile_to(self, other: Side) -> bool {
        matches!(
            (self, other),
            (Side::Monster, Side::Player)
                | (Side::Monster, Side::Npc)
                | (Side::Player, Side::Monster)
                | (Side::Npc, Side::Monster)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    Unconscious,
    Dead,
    Stable,
}

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// One of the six abilities, as used by saves and checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl AbilityScores {
    pub fn score(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Str => self.strength,
            Stat::Dex => self.dexterity,
            Stat::Con => self.constitution,
            Stat::Int => self.intelligence,
            Stat::Wis => self.wisdom,
            Stat::Cha => self.charisma,
        }
    }

    /// Standard 5e modifier, rounded down (so 8 → -1, 13 → +1).
    pub fn modifier(&self, stat: Stat) -> i32 {
        (self.score(stat) - 10).div_euclid(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Psychic,
    Force,
}

/// Degree of cover a combatant currently enjoys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cover {
    Half,
    ThreeQuarters,
    Full,
}

impl Cover {
    /// AC bonus granted by this degree of cover. Full cover is an
    /// auto-miss and never reaches the AC comparison.
    pub fn ac_bonus(self) -> i32 {
        match self {
            Cover::Half => 2,
            Cover::ThreeQuarters => 5,
            Cover::Full => 0,
        }
    }
}

/// Opaque position bag. There is no grid: relative distances between
/// combatants are all the movement model knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    /// Distance in feet to each other combatant.
    #[serde(default)]
    pub distance_to: HashMap<String, i32>,
    #[serde(default)]
    pub cover: Option<Cover>,
    #[serde(default)]
    pub terrain: Option<String>,
    /// Set when this combatant currently flanks its melee target.
    #[serde(default)]
    pub flanking: bool,
}

/// Distance assumed between combatants that have no recorded entry.
pub const DEFAULT_DISTANCE_FT: i32 = 30;

impl Position {
    pub fn distance_to(&self, id: &str) -> i32 {
        self.distance_to
            .get(id)
            .copied()
            .unwrap_or(DEFAULT_DISTANCE_FT)
    }
}

/// Per-turn action budget. All booleans reset to `true` and movement to
/// the combatant's speed at the start of its turn; `legendary_used`
/// resets at round start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action: bool,
    pub bonus_action: bool,
    pub reaction: bool,
    pub movement_remaining: i32,
    pub legendary_used: u8,
}

impl Default for ActionEconomy {
    fn default() -> Self {
        Self {
            action: true,
            bonus_action: true,
            reaction: true,
            movement_remaining: 0,
            legendary_used: 0,
        }
    }
}

impl ActionEconomy {
    /// Start-of-turn reset. Does not touch `legendary_used`, which is a
    /// per-round pool.
    pub fn reset_for_turn(&mut self, speed: i32) {
        self.action = true;
        self.bonus_action = true;
        self.reaction = true;
        self.movement_remaining = speed;
    }

    /// Spend the main action. Returns false if already spent.
    pub fn spend_action(&mut self) -> bool {
        std::mem::replace(&mut self.action, false)
    }

    pub fn spend_bonus_action(&mut self) -> bool {
        std::mem::replace(&mut self.bonus_action, false)
    }

    pub fn spend_reaction(&mut self) -> bool {
        std::mem::replace(&mut self.reaction, false)
    }
}

/// Death-save bookkeeping for combatants dying at 0 HP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

impl DeathSaves {
    pub fn reset(&mut self) {
        self.successes = 0;
        self.failures = 0;
    }
}

/// Recharge range on a d6, e.g. "Recharge 5–6" is `lo: 5, hi: 6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeRange {
    pub lo: u8,
    pub hi: u8,
}

impl RechargeRange {
    pub fn contains(&self, roll: i64) -> bool {
        roll >= i64::from(self.lo) && roll <= i64::from(self.hi)
    }
}

/// An ongoing concentration effect bound to a caster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    /// Name of the concentration spell (e.g. "Bless").
    pub spell: String,
    /// Combatants currently affected by the spell.
    pub targets: Vec<String>,
    /// Attribute rider the spell granted to its targets, cleared when
    /// concentration drops (e.g. "bless_bonus").
    #[serde(default)]
    pub rider: Option<String>,
}

/// Rough classification of an ability, used for economy and targeting
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    MeleeAttack,
    RangedAttack,
    Spell,
    Cantrip,
    Heal,
    Utility,
}

/// A declared action, trait or spell owned by one combatant.
///
/// Every ability carries the canonical-ownership tag of its owner
/// (`[<name>_<id>_ability]`); the ability validator rejects intents that
/// name an ability tagged for someone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    /// Canonical-ownership marker, `[<owner_name>_<owner_id>_ability]`.
    #[serde(default)]
    pub tag: String,
    pub kind: AbilityKind,
    #[serde(default)]
    pub attack_bonus: i32,
    /// Damage dice expression, e.g. "1d4+2".
    #[serde(default)]
    pub damage: Option<String>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default = "d_reach")]
    pub reach_ft: i32,
    #[serde(default)]
    pub range_ft: Option<i32>,
    #[serde(default)]
    pub save_dc: Option<i32>,
    #[serde(default)]
    pub save_ability: Option<Stat>,
    /// Save-based effects deal half damage on a success instead of none.
    #[serde(default)]
    pub half_on_save: bool,
    /// Healing dice expression, e.g. "1d8+3".
    #[serde(default)]
    pub heal: Option<String>,
    /// May target allies (heals, wards). Hostile targeting is the default.
    #[serde(default)]
    pub friendly: bool,
    #[serde(default)]
    pub concentration: bool,
    /// Attribute rider granted to each target while the effect holds,
    /// with its flat bonus (e.g. ("bless_bonus", 2)).
    #[serde(default)]
    pub grants_attribute: Option<String>,
    #[serde(default)]
    pub grants_bonus: i32,
    /// Recharge range on a d6; `None` for at-will abilities.
    #[serde(default)]
    pub recharge: Option<RechargeRange>,
    /// Cost when used as a legendary action; `None` if not usable as one.
    #[serde(default)]
    pub legendary_cost: Option<u8>,
    /// Reaction rider: AC bonus granted when spent as a shield-style
    /// reaction against an incoming hit.
    #[serde(default)]
    pub reaction_ac_bonus: Option<i32>,
    #[serde(default)]
    pub applies_condition: Option<ConditionKind>,
    #[serde(default)]
    pub condition_duration: Option<u32>,
}

fn d_reach() -> i32 {
    5
}

impl Ability {
    pub fn is_attack(&self) -> bool {
        matches!(self.kind, AbilityKind::MeleeAttack | AbilityKind::RangedAttack)
    }

    pub fn is_melee(&self) -> bool {
        matches!(self.kind, AbilityKind::MeleeAttack)
    }

    pub fn is_heal(&self) -> bool {
        matches!(self.kind, AbilityKind::Heal) || self.heal.is_some()
    }
}

/// A participant with initiative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub side: Side,
    #[serde(default)]
    pub scores: AbilityScores,
    pub ac: i32,
    pub hp: i32,
    pub max_hp: i32,
    /// Speed in feet per round.
    pub speed: i32,
    pub initiative: i32,
    #[serde(default)]
    pub initiative_advantage: bool,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub economy: ActionEconomy,
    #[serde(default)]
    pub conditions: Vec<ActiveCondition>,
    #[serde(default)]
    pub resistances: HashSet<DamageType>,
    #[serde(default)]
    pub immunities: HashSet<DamageType>,
    #[serde(default)]
    pub vulnerabilities: HashSet<DamageType>,
    #[serde(default)]
    pub concentration: Option<Concentration>,
    #[serde(default)]
    pub death_saves: DeathSaves,
    /// Ability name → round it was last expended; entries are removed
    /// again once the recharge roll succeeds.
    #[serde(default)]
    pub recharge_spent: HashMap<String, u32>,
    #[serde(default)]
    pub legendary_max: u8,
    #[serde(default)]
    pub legendary_resistance: u8,
    #[serde(default)]
    pub proficiency: i32,
    #[serde(default)]
    pub save_proficiencies: HashSet<Stat>,
    /// Transient numeric riders granted by ongoing effects
    /// (e.g. "bless_bonus" → 2). Cleared when the source effect ends.
    #[serde(default)]
    pub attributes: HashMap<String, i32>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl Combatant {
    /// The canonical-ownership tag carried by every ability of this
    /// combatant: `[<name>_<id>_ability]`, name lowercased with
    /// whitespace collapsed to underscores.
    pub fn canonical_tag(&self) -> String {
        let name = self
            .name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        format!("[{}_{}_ability]", name, self.id)
    }

    pub fn ability(&self, name: &str) -> Option<&Ability> {
        self.abilities
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Able to take turns and be targeted as a live combatant.
    pub fn is_active(&self) -> bool {
        matches!(self.status, Status::Ok)
    }

    /// Counts toward the end-of-encounter check: unconscious, stable
    /// or dead.
    pub fn is_down(&self) -> bool {
        !self.is_active()
    }

    pub fn is_dead(&self) -> bool {
        matches!(self.status, Status::Dead)
    }

    pub fn has_condition(&self, kind: ConditionKind) -> bool {
        self.conditions.iter().any(|c| c.kind == kind)
    }

    pub fn remove_condition(&mut self, kind: ConditionKind) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.kind != kind);
        self.conditions.len() != before
    }

    pub fn modifier(&self, stat: Stat) -> i32 {
        self.scores.modifier(stat)
    }

    /// Save bonus including proficiency where it applies.
    pub fn save_bonus(&self, stat: Stat) -> i32 {
        let mut bonus = self.scores.modifier(stat);
        if self.save_proficiencies.contains(&stat) {
            bonus += self.proficiency;
        }
        bonus
    }

    /// An ability is expended if it has a recharge range and its last
    /// use has not recharged yet.
    pub fn ability_expended(&self, name: &str) -> bool {
        self.recharge_spent.contains_key(name)
    }

    /// Stamp every owned ability with this combatant's canonical tag.
    /// Called once at encounter load.
    pub fn tag_abilities(&mut self) {
        let tag = self.canonical_tag();
        for ability in &mut self.abilities {
            ability.tag = tag.clone();
        }
    }
}
