//! Prompt construction: fixed schema preamble, summarised history,
//! actor block with tag-scoped abilities, and enemy blocks with HP
//! bands hidden or revealed per configuration.

use tw_domain::{Ability, Combatant, EncounterState, EngineConfig};

const SCHEMA_PREAMBLE: &str = r#"You control one combatant in a D&D 5e encounter. Reply with a single JSON object and nothing else:
{
  "action_type": one of "attack" | "spell" | "cantrip" | "dash" | "dodge" | "disengage" | "help" | "hide" | "ready" | "use_item" | "recharge_ability" | "legendary",
  "ability_name": the exact name of one of YOUR abilities (omit for basic actions),
  "targets": ["combatant_id", ...],
  "movement_cost": feet to move toward the first target (optional),
  "dice_requests": [{"expression": "2d6+3", "purpose": "damage"}],
  "narrative": one or two sentences of colour
}
Only use abilities from your own ability list. Only target living combatants by their id."#;

/// Band description used when exact enemy HP is hidden.
pub fn hp_band(hp: i32, max_hp: i32) -> &'static str {
    if hp <= 0 {
        return "down";
    }
    let percent = hp * 100 / max_hp.max(1);
    match percent {
        76..=i32::MAX => "healthy",
        51..=75 => "wounded",
        26..=50 => "bloodied",
        _ => "critical",
    }
}

fn describe_ability(ability: &Ability) -> String {
    let mut parts = Vec::new();
    if ability.is_attack() {
        parts.push(format!("{:+} to hit", ability.attack_bonus));
    }
    if let Some(damage) = &ability.damage {
        match ability.damage_type {
            Some(kind) => parts.push(format!("{damage} {kind:?}").to_lowercase()),
            None => parts.push(damage.clone()),
        }
    }
    if let Some(heal) = &ability.heal {
        parts.push(format!("heals {heal}"));
    }
    if let (Some(dc), Some(stat)) = (ability.save_dc, ability.save_ability) {
        parts.push(format!("DC {dc} {stat:?} save").to_lowercase());
    }
    if let Some(range) = ability.recharge {
        parts.push(format!("recharge {}-{}", range.lo, range.hi));
    }
    if let Some(cost) = ability.legendary_cost {
        parts.push(format!("legendary cost {cost}"));
    }
    if parts.is_empty() {
        format!("{} {}", ability.name, ability.tag)
    } else {
        format!("{} {} ({})", ability.name, ability.tag, parts.join(", "))
    }
}

fn describe_actor(actor: &Combatant) -> String {
    let mut block = format!(
        "## You\nid: {} | {} | HP {}/{} | AC {} | speed {} ft\n",
        actor.id, actor.name, actor.hp, actor.max_hp, actor.ac, actor.speed
    );
    block.push_str(&format!(
        "economy: action={} bonus_action={} reaction={} movement={} ft\n",
        actor.economy.action,
        actor.economy.bonus_action,
        actor.economy.reaction,
        actor.economy.movement_remaining
    ));
    if !actor.conditions.is_empty() {
        let names: Vec<&str> = actor.conditions.iter().map(|c| c.kind.as_str()).collect();
        block.push_str(&format!("conditions: {}\n", names.join(", ")));
    }
    block.push_str("abilities:\n");
    for ability in &actor.abilities {
        let expended = if actor.ability_expended(&ability.name) {
            " [expended]"
        } else {
            ""
        };
        block.push_str(&format!("- {}{}\n", describe_ability(ability), expended));
    }
    block
}

fn describe_enemies(actor: &Combatant, encounter: &EncounterState, hide_hp: bool) -> String {
    let mut block = String::from("## Enemies\n");
    for enemy in encounter.living_enemies_of(&actor.id) {
        if !enemy.is_active() {
            block.push_str(&format!("- {} (id {}): down\n", enemy.name, enemy.id));
            continue;
        }
        let hp = if hide_hp {
            hp_band(enemy.hp, enemy.max_hp).to_string()
        } else {
            format!("{}/{}", enemy.hp, enemy.max_hp)
        };
        let mut line = format!(
            "- {} (id {}): HP {}, AC {}, {} ft away",
            enemy.name,
            enemy.id,
            hp,
            enemy.ac,
            actor.position.distance_to(&enemy.id)
        );
        if !enemy.conditions.is_empty() {
            let names: Vec<&str> = enemy.conditions.iter().map(|c| c.kind.as_str()).collect();
            line.push_str(&format!(", {}", names.join("/")));
        }
        block.push_str(&line);
        block.push('\n');
    }
    block
}

/// The full per-turn prompt. The caller passes it through the ability
/// validator before dispatch.
pub fn build_prompt(
    actor: &Combatant,
    encounter: &EncounterState,
    summary: &str,
    config: &EngineConfig,
) -> String {
    let mut prompt = String::from(SCHEMA_PREAMBLE);
    prompt.push_str("\n\n");
    if !summary.is_empty() {
        prompt.push_str("## Recent combat\n");
        prompt.push_str(summary);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&describe_actor(actor));
    prompt.push('\n');
    prompt.push_str(&describe_enemies(actor, encounter, config.hide_enemy_hp_bands));
    prompt.push_str("\nChoose this turn's action.\n");
    prompt
}

/// Reduced prompt for a between-turns legendary action. The oracle may
/// reply with the single word `skip`.
pub fn build_legendary_prompt(
    actor: &Combatant,
    encounter: &EncounterState,
    config: &EngineConfig,
) -> String {
    let remaining = actor.legendary_max - actor.economy.legendary_used;
    let mut prompt = String::from(SCHEMA_PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "Another combatant's turn just ended. You have {remaining} legendary action(s) left this round. \
Reply with an intent of action_type \"legendary\" naming one of your legendary-cost abilities, or reply exactly `skip`.\n\n"
    ));
    prompt.push_str(&describe_actor(actor));
    prompt.push('\n');
    prompt.push_str(&describe_enemies(actor, encounter, config.hide_enemy_hp_bands));
    prompt
}
