//! Ability ownership validation.
//!
//! LLM oracles, shown several creatures in one context, leak abilities
//! across them ("the skeleton breathes fire"). Every ability carries a
//! canonical tag `[<name>_<id>_ability]`; prompts are rewritten so only
//! the actor's tags survive, and intents naming a foreign ability are
//! rejected before they reach execution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use tw_domain::{Combatant, Error, Intent, Result};

pub struct AbilityValidator {
    /// Canonical ability sets keyed by `(name, id)`; combatant ability
    /// lists are immutable for the life of an encounter.
    cache: Mutex<HashMap<(String, String), Arc<HashSet<String>>>>,
    tag_re: Regex,
}

impl Default for AbilityValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityValidator {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            tag_re: Regex::new(r"\[[A-Za-z0-9_\-]+_ability\]").expect("static regex"),
        }
    }

    /// The actor's canonical ability names, lowercased, cached per
    /// `(name, id)`.
    pub fn canonical_set(&self, actor: &Combatant) -> Arc<HashSet<String>> {
        let key = (actor.name.clone(), actor.id.clone());
        let mut cache = self.cache.lock();
        cache
            .entry(key)
            .or_insert_with(|| {
                Arc::new(
                    actor
                        .abilities
                        .iter()
                        .map(|a| a.name.to_lowercase())
                        .collect(),
                )
            })
            .clone()
    }

    /// Strip prompt lines carrying a foreign ability tag and retag any
    /// untagged mention of the actor's own abilities.
    pub fn clean_prompt(&self, prompt: &str, actor: &Combatant) -> String {
        let own_tag = actor.canonical_tag();
        let mut cleaned = String::with_capacity(prompt.len());
        for line in prompt.lines() {
            let foreign = self
                .tag_re
                .find_iter(line)
                .any(|m| m.as_str() != own_tag);
            if foreign {
                continue;
            }
            cleaned.push_str(line);
            cleaned.push('\n');
        }

        // Retag: an ability phrase of the actor's own list appearing
        // without its tag gets the canonical tag appended.
        for ability in &actor.abilities {
            let tagged = format!("{} {}", ability.name, own_tag);
            if cleaned.contains(&tagged) {
                continue;
            }
            if cleaned.contains(&ability.name) {
                cleaned = cleaned.replace(&ability.name, &tagged);
                // Collapse any double tagging the replace introduced.
                let doubled = format!("{tagged} {own_tag}");
                cleaned = cleaned.replace(&doubled, &tagged);
            }
        }
        cleaned
    }

    /// Reject intents whose ability is not in the actor's canonical
    /// set. Universal basic actions always pass.
    pub fn validate_intent(&self, intent: &Intent, actor: &Combatant) -> Result<()> {
        if intent.is_basic_action() {
            return Ok(());
        }
        let Some(name) = intent.ability_name() else {
            return Ok(());
        };
        let set = self.canonical_set(actor);
        if set.contains(&name.to_lowercase()) {
            Ok(())
        } else {
            Err(Error::InvalidIntent(format!(
                "{} does not belong to {} ({})",
                name, actor.name, actor.id
            )))
        }
    }
}
