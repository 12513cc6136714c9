//! The structured tactical decision produced per turn.
//!
//! A tagged sum over `action_type`: each variant carries exactly its
//! required fields, so a malformed oracle reply fails at the parse
//! boundary instead of deep inside execution.

use serde::{Deserialize, Serialize};

/// Universal basic actions available to every combatant regardless of
/// its declared ability list.
pub const BASIC_ACTIONS: &[&str] = &["dash", "dodge", "disengage", "help", "hide", "ready"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Intent {
    Attack {
        ability_name: String,
        targets: Vec<String>,
        #[serde(default)]
        movement_cost: Option<i32>,
        #[serde(default)]
        uses_reaction: bool,
    },
    Spell {
        ability_name: String,
        targets: Vec<String>,
        #[serde(default)]
        spell_slot_level: Option<u8>,
        #[serde(default)]
        movement_cost: Option<i32>,
        #[serde(default)]
        uses_reaction: bool,
    },
    Cantrip {
        ability_name: String,
        targets: Vec<String>,
        #[serde(default)]
        movement_cost: Option<i32>,
    },
    Dash {
        #[serde(default)]
        movement_cost: Option<i32>,
    },
    Dodge,
    Disengage {
        #[serde(default)]
        movement_cost: Option<i32>,
    },
    Help {
        targets: Vec<String>,
    },
    Hide,
    Ready {
        ability_name: String,
    },
    UseItem {
        ability_name: String,
        targets: Vec<String>,
    },
    RechargeAbility {
        ability_name: String,
    },
    Legendary {
        ability_name: String,
        targets: Vec<String>,
        #[serde(default = "d_one")]
        cost: u8,
    },
}

fn d_one() -> u8 {
    1
}

impl Intent {
    /// The wire name of the variant, as it appears in `action_type`.
    pub fn action_type(&self) -> &'static str {
        match self {
            Intent::Attack { .. } => "attack",
            Intent::Spell { .. } => "spell",
            Intent::Cantrip { .. } => "cantrip",
            Intent::Dash { .. } => "dash",
            Intent::Dodge => "dodge",
            Intent::Disengage { .. } => "disengage",
            Intent::Help { .. } => "help",
            Intent::Hide => "hide",
            Intent::Ready { .. } => "ready",
            Intent::UseItem { .. } => "use_item",
            Intent::RechargeAbility { .. } => "recharge_ability",
            Intent::Legendary { .. } => "legendary",
        }
    }

    /// The named ability, for variants that carry one.
    pub fn ability_name(&self) -> Option<&str> {
        match self {
            Intent::Attack { ability_name, .. }
            | Intent::Spell { ability_name, .. }
            | Intent::Cantrip { ability_name, .. }
            | Intent::Ready { ability_name }
            | Intent::UseItem { ability_name, .. }
            | Intent::RechargeAbility { ability_name }
            | Intent::Legendary { ability_name, .. } => Some(ability_name),
            _ => None,
        }
    }

    pub fn targets(&self) -> &[String] {
        match self {
            Intent::Attack { targets, .. }
            | Intent::Spell { targets, .. }
            | Intent::Cantrip { targets, .. }
            | Intent::Help { targets }
            | Intent::UseItem { targets, .. }
            | Intent::Legendary { targets, .. } => targets,
            _ => &[],
        }
    }

    pub fn movement_cost(&self) -> Option<i32> {
        match self {
            Intent::Attack { movement_cost, .. }
            | Intent::Spell { movement_cost, .. }
            | Intent::Cantrip { movement_cost, .. }
            | Intent::Dash { movement_cost }
            | Intent::Disengage { movement_cost } => *movement_cost,
            _ => None,
        }
    }

    pub fn uses_reaction(&self) -> bool {
        match self {
            Intent::Attack { uses_reaction, .. } | Intent::Spell { uses_reaction, .. } => {
                *uses_reaction
            }
            _ => false,
        }
    }

    /// Basic actions are always legal regardless of the actor's ability
    /// list (the `Ready` payload still names an owned ability).
    pub fn is_basic_action(&self) -> bool {
        matches!(
            self,
            Intent::Dash { .. }
                | Intent::Dodge
                | Intent::Disengage { .. }
                | Intent::Help { .. }
                | Intent::Hide
        )
    }
}

/// A dice request echoed by the oracle. The engine rolls all dice itself
/// through the injected roller; these are advisory and recorded only for
/// the narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRequest {
    pub expression: String,
    pub purpose: String,
}

/// The full reply envelope the oracle is asked for: the intent fields at
/// the top level plus optional narrative colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleReply {
    #[serde(flatten)]
    pub intent: Intent,
    #[serde(default)]
    pub dice_requests: Vec<DiceRequest>,
    #[serde(default)]
    pub narrative: String,
}
