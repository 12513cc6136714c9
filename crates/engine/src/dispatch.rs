//! Legendary & reaction dispatcher.
//!
//! Between turns, combatants with legendary actions left get a
//! miniature resolution: a reduced oracle consultation, validation of
//! the pool cost, execution under a nested transaction. Shield-style
//! reactions are interleaved into in-flight attacks through the
//! `ReactionHooks` seam.

use chrono::Utc;
use uuid::Uuid;

use tw_domain::{
    DiceRoller, EncounterState, EngineConfig, EngineEvent, Result, SourceTier, TurnRecord,
};
use tw_oracle::{LegendaryOutcome, Oracle, OracleGateway};
use tw_rules::conditions::cannot_react;
use tw_rules::executor::{execute_intent, RulesConfig};
use tw_rules::hooks::{AttackEvent, ReactionHooks};

use crate::control::ControlCenter;
use crate::observer::EventBus;
use crate::transaction::Transaction;

/// Spends defender reactions on shield-style AC riders when that turns
/// an incoming hit into a miss.
pub(crate) struct ReactionBroker;

impl ReactionHooks for ReactionBroker {
    fn on_attack_resolved(
        &mut self,
        encounter: &mut EncounterState,
        event: &AttackEvent,
    ) -> Option<i32> {
        if !event.would_hit || event.critical {
            return None;
        }
        let defender = encounter.combatant(&event.target_id)?;
        if !defender.is_active() || !defender.economy.reaction || cannot_react(defender) {
            return None;
        }
        let bonus = defender
            .abilities
            .iter()
            .filter_map(|a| a.reaction_ac_bonus)
            .find(|bonus| event.total < event.effective_ac + i64::from(*bonus))?;

        let defender = encounter.combatant_mut(&event.target_id)?;
        if !defender.economy.spend_reaction() {
            return None;
        }
        tracing::debug!(
            defender = %event.target_id,
            bonus,
            "reaction spent to deflect an incoming hit"
        );
        Some(bonus)
    }

    fn on_spell_cast(&mut self, _encounter: &mut EncounterState, caster_id: &str, spell: &str) {
        tracing::debug!(caster = caster_id, spell, "spell cast hook");
    }
}

/// Run the between-turns legendary phase: every eligible combatant
/// except the one whose turn just ended gets one consultation.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_legendary_phase(
    encounter: &mut EncounterState,
    gateway: &OracleGateway,
    oracle: &dyn Oracle,
    roller: &dyn DiceRoller,
    bus: &EventBus,
    control: &ControlCenter,
    config: &EngineConfig,
    rules_config: &RulesConfig,
    resolution_id: Uuid,
    current_actor: &str,
) -> Result<()> {
    let order = encounter.order.clone();
    for actor_id in order {
        if actor_id == current_actor {
            continue;
        }
        let eligible = encounter.combatant(&actor_id).is_some_and(|c| {
            c.is_active()
                && c.legendary_max > 0
                && c.economy.legendary_used < c.legendary_max
                && !tw_rules::conditions::cannot_act(c)
        });
        if !eligible {
            continue;
        }

        control.check_cancelled()?;
        let cancel = control.cancel_token();
        let outcome = gateway
            .request_legendary(
                oracle,
                &actor_id,
                encounter,
                config,
                config.oracle_deadline_ms,
                &cancel,
            )
            .await;
        control.check_cancelled()?;

        let reply = match outcome {
            LegendaryOutcome::Reply(reply) => reply,
            LegendaryOutcome::Skip => continue,
            LegendaryOutcome::Failed(reason) => {
                tracing::debug!(actor = %actor_id, reason, "legendary consultation skipped");
                continue;
            }
        };

        let txn = Transaction::begin(encounter);
        let mut broker = ReactionBroker;
        let executed = execute_intent(
            encounter,
            &actor_id,
            &reply.intent,
            roller,
            &mut broker,
            rules_config,
        );
        let executed =
            executed.and_then(|outcome| Transaction::validate(encounter).map(|()| outcome));

        match executed {
            Ok(executed) => {
                let record = TurnRecord {
                    resolution_id,
                    round: encounter.round,
                    combatant_id: actor_id.clone(),
                    intent: Some(reply.intent.clone()),
                    rolls: executed.rolls,
                    results: executed.results,
                    narrative: reply.narrative,
                    source_tier: SourceTier::Oracle,
                    timestamp: Utc::now(),
                    rollback: false,
                };
                encounter.log.push(record.clone());
                bus.publish(EngineEvent::Intent {
                    combatant_id: actor_id.clone(),
                    intent: reply.intent,
                    source_tier: SourceTier::Oracle,
                });
                for roll in &record.rolls {
                    bus.publish(EngineEvent::Dice {
                        combatant_id: actor_id.clone(),
                        expression: roll.expression.clone(),
                        result: roll.result,
                        purpose: roll.purpose.clone(),
                    });
                }
                bus.publish(EngineEvent::Result {
                    turn_record: record,
                });
            }
            Err(err) => {
                let round = encounter.round;
                txn.rollback(encounter);
                tracing::warn!(actor = %actor_id, error = %err, "legendary action rolled back");
                bus.publish(EngineEvent::Rollback {
                    round,
                    combatant_id: actor_id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(())
}
