//! The oracle gateway: prompt → deadline-wrapped completion → parse →
//! validation, reported as a value the fallback ladder dispatches on.

use std::time::Duration;

use tw_domain::{
    CancelToken, Combatant, EncounterState, EngineConfig, Error, Intent, OracleReply, Result,
};

use crate::fallback::correction_block;
use crate::parse::parse_reply;
use crate::prompt::{build_legendary_prompt, build_prompt};
use crate::traits::Oracle;
use crate::validator::AbilityValidator;

/// Outcome of one oracle consultation. The ladder dispatches by value;
/// no error is thrown across this boundary.
#[derive(Debug)]
pub enum IntentOutcome {
    Ok(OracleReply),
    Transport(String),
    Parse(String),
    Invalid(String),
}

/// Outcome of a legendary-action consultation: failures are skips, not
/// ladder entries.
#[derive(Debug)]
pub enum LegendaryOutcome {
    Reply(OracleReply),
    Skip,
    Failed(String),
}

pub struct OracleGateway {
    validator: AbilityValidator,
}

impl Default for OracleGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleGateway {
    pub fn new() -> Self {
        Self {
            validator: AbilityValidator::new(),
        }
    }

    pub fn validator(&self) -> &AbilityValidator {
        &self.validator
    }

    /// Full intent validation: ability ownership, recharge state,
    /// target legality and action economy.
    pub fn validate(
        &self,
        intent: &Intent,
        actor: &Combatant,
        encounter: &EncounterState,
    ) -> Result<()> {
        self.validator.validate_intent(intent, actor)?;

        let ability = intent
            .ability_name()
            .and_then(|name| actor.ability(name));
        if let Some(ability) = ability {
            if actor.ability_expended(&ability.name)
                && !matches!(intent, Intent::RechargeAbility { .. })
            {
                return Err(Error::InvalidIntent(format!(
                    "{} has not recharged",
                    ability.name
                )));
            }
        }

        // Target legality.
        let friendly_ok = ability.map(|a| a.friendly).unwrap_or(false)
            || matches!(intent, Intent::Help { .. });
        for target_id in intent.targets() {
            let Some(target) = encounter.combatant(target_id) else {
                return Err(Error::InvalidIntent(format!("unknown target {target_id}")));
            };
            if target.is_dead() {
                return Err(Error::InvalidIntent(format!("{target_id} is dead")));
            }
            let hostile = target.side.hostile_to(actor.side);
            if friendly_ok {
                if hostile {
                    return Err(Error::InvalidIntent(format!(
                        "{target_id} is an enemy of {}",
                        actor.id
                    )));
                }
            } else if !hostile && target_id != &actor.id {
                return Err(Error::InvalidIntent(format!(
                    "friendly fire on {target_id}"
                )));
            }
        }

        // Action economy.
        match intent {
            Intent::Legendary { cost, .. } => {
                if actor.legendary_max == 0 {
                    return Err(Error::InvalidIntent(format!(
                        "{} has no legendary actions",
                        actor.id
                    )));
                }
                if actor.economy.legendary_used + cost > actor.legendary_max {
                    return Err(Error::InvalidIntent("legendary pool exhausted".into()));
                }
            }
            _ if intent.uses_reaction() => {
                if !actor.economy.reaction {
                    return Err(Error::InvalidIntent("reaction already spent".into()));
                }
            }
            _ => {
                if !actor.economy.action {
                    return Err(Error::InvalidIntent("action already spent".into()));
                }
            }
        }

        if let Some(feet) = intent.movement_cost() {
            if feet < 0 {
                return Err(Error::InvalidIntent("negative movement".into()));
            }
            let budget = match intent {
                Intent::Dash { .. } => actor.economy.movement_remaining + actor.speed,
                _ => actor.economy.movement_remaining,
            };
            if feet > budget {
                return Err(Error::InvalidIntent(format!(
                    "movement {feet} ft exceeds the {budget} ft budget"
                )));
            }
        }

        Ok(())
    }

    /// One oracle consultation under a deadline. `correction` carries
    /// the previous rejection on the retry tier.
    #[allow(clippy::too_many_arguments)]
    pub async fn request_intent(
        &self,
        oracle: &dyn Oracle,
        actor_id: &str,
        encounter: &EncounterState,
        summary: &str,
        config: &EngineConfig,
        deadline_ms: u64,
        cancel: &CancelToken,
        correction: Option<&str>,
    ) -> IntentOutcome {
        let Some(actor) = encounter.combatant(actor_id) else {
            return IntentOutcome::Invalid(format!("unknown actor {actor_id}"));
        };

        let mut prompt = self
            .validator
            .clean_prompt(&build_prompt(actor, encounter, summary, config), actor);
        if let Some(reason) = correction {
            prompt.push_str(&correction_block(reason));
        }

        let raw = match tokio::time::timeout(
            Duration::from_millis(deadline_ms),
            oracle.complete(&prompt, cancel),
        )
        .await
        {
            Err(_) => {
                tracing::warn!(actor = actor_id, deadline_ms, "oracle deadline exceeded");
                return IntentOutcome::Transport("oracle deadline exceeded".into());
            }
            Ok(Err(Error::Cancelled)) => {
                return IntentOutcome::Transport("oracle cancelled".into());
            }
            Ok(Err(err)) => return IntentOutcome::Transport(err.to_string()),
            Ok(Ok(raw)) => raw,
        };

        let reply = match parse_reply(&raw) {
            Ok(reply) => reply,
            Err(err) => return IntentOutcome::Parse(err.to_string()),
        };

        match self.validate(&reply.intent, actor, encounter) {
            Ok(()) => IntentOutcome::Ok(reply),
            Err(err) => {
                tracing::info!(actor = actor_id, error = %err, "oracle intent rejected");
                IntentOutcome::Invalid(err.to_string())
            }
        }
    }

    /// Legendary-action consultation between turns. Anything other than
    /// a valid legendary intent is a skip or a silent failure.
    pub async fn request_legendary(
        &self,
        oracle: &dyn Oracle,
        actor_id: &str,
        encounter: &EncounterState,
        config: &EngineConfig,
        deadline_ms: u64,
        cancel: &CancelToken,
    ) -> LegendaryOutcome {
        let Some(actor) = encounter.combatant(actor_id) else {
            return LegendaryOutcome::Failed(format!("unknown actor {actor_id}"));
        };

        let prompt = self
            .validator
            .clean_prompt(&build_legendary_prompt(actor, encounter, config), actor);

        let raw = match tokio::time::timeout(
            Duration::from_millis(deadline_ms),
            oracle.complete(&prompt, cancel),
        )
        .await
        {
            Err(_) => return LegendaryOutcome::Failed("oracle deadline exceeded".into()),
            Ok(Err(err)) => return LegendaryOutcome::Failed(err.to_string()),
            Ok(Ok(raw)) => raw,
        };

        if raw.trim().eq_ignore_ascii_case("skip") {
            return LegendaryOutcome::Skip;
        }
        let reply = match parse_reply(&raw) {
            Ok(reply) => reply,
            Err(_) => return LegendaryOutcome::Skip,
        };
        if !matches!(reply.intent, Intent::Legendary { .. }) {
            return LegendaryOutcome::Failed(format!(
                "expected a legendary intent, got {}",
                reply.intent.action_type()
            ));
        }
        match self.validate(&reply.intent, actor, encounter) {
            Ok(()) => LegendaryOutcome::Reply(reply),
            Err(err) => LegendaryOutcome::Failed(err.to_string()),
        }
    }
}
