//! The resolution worker: one long-running task owning the encounter
//! state, driving the round loop through the ladder, the transaction
//! manager and the dispatcher. All suspension points live here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use tw_domain::{
    DiceRoll, DiceRoller, EncounterState, EngineConfig, EngineEvent, Error, MechanicalResults,
    Result, Side, SourceTier, Status, StatusChange, TurnRecord, Winner,
};
use tw_oracle::{default_intent, heuristic_intent, IntentOutcome, Oracle, OracleGateway};
use tw_rules::conditions::{
    cannot_act, condition_keys, end_of_turn_tick, speed_is_zero, sweep_expired,
};
use tw_rules::death::{roll_death_save, DeathSaveOutcome};
use tw_rules::executor::{execute_intent, RulesConfig};
use tw_rules::recharge::roll_recharges;

use crate::control::ControlCenter;
use crate::dispatch::{run_legendary_phase, ReactionBroker};
use crate::observer::EventBus;
use crate::pipeline::ResolutionMode;
use crate::transaction::Transaction;

/// Hard cap on rounds; a fight that cannot conclude is declared a draw
/// instead of spinning forever.
const MAX_ROUNDS: u32 = 100;

pub(crate) struct Worker {
    pub encounter: EncounterState,
    pub roller: Arc<dyn DiceRoller>,
    pub oracle: Arc<dyn Oracle>,
    pub gateway: OracleGateway,
    pub bus: EventBus,
    pub control: Arc<ControlCenter>,
    pub config: EngineConfig,
    pub rules_config: RulesConfig,
    pub mode: ResolutionMode,
    pub resolution_id: Uuid,
}

impl Worker {
    pub async fn run(mut self) {
        match self.run_inner().await {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                tracing::debug!("resolution stopped before completion");
            }
            Err(Error::Fatal(message)) => {
                tracing::error!(%message, "resolution failed fatally");
                self.bus.publish(EngineEvent::Fatal { message });
            }
            Err(err) => {
                tracing::error!(error = %err, "resolution failed");
                self.bus.publish(EngineEvent::Fatal {
                    message: err.to_string(),
                });
            }
        }
        self.control.set_finished();
    }

    async fn run_inner(&mut self) -> Result<()> {
        loop {
            if self.encounter.round > MAX_ROUNDS {
                tracing::warn!(max_rounds = MAX_ROUNDS, "round cap reached, declaring a draw");
                self.bus.publish(EngineEvent::EncounterEnd {
                    winner: Winner::Draw,
                });
                return Ok(());
            }
            self.round_start();

            let order = self.encounter.order.clone();
            for (turn_index, actor_id) in order.iter().enumerate() {
                // Suspension point: wait out a pause, observe a stop.
                self.control.wait_ready().await?;
                self.encounter.turn_index = turn_index;
                self.control.set_progress(self.encounter.round, turn_index);

                let status = match self.encounter.combatant(actor_id) {
                    Some(actor) => actor.status,
                    None => continue,
                };
                match status {
                    Status::Dead | Status::Stable => continue,
                    Status::Unconscious => {
                        let side = self
                            .encounter
                            .combatant(actor_id)
                            .map(|c| c.side)
                            .unwrap_or(Side::Monster);
                        if side == Side::Monster {
                            continue;
                        }
                        self.bus.publish(EngineEvent::TurnStart {
                            round: self.encounter.round,
                            combatant_id: actor_id.clone(),
                        });
                        self.death_save_turn(actor_id)?;
                    }
                    Status::Ok => {
                        self.bus.publish(EngineEvent::TurnStart {
                            round: self.encounter.round,
                            combatant_id: actor_id.clone(),
                        });
                        self.take_turn(actor_id).await?;
                    }
                }

                if self.check_end()? {
                    return Ok(());
                }

                run_legendary_phase(
                    &mut self.encounter,
                    &self.gateway,
                    self.oracle.as_ref(),
                    self.roller.as_ref(),
                    &self.bus,
                    &self.control,
                    &self.config,
                    &self.rules_config,
                    self.resolution_id,
                    actor_id,
                )
                .await?;

                if self.check_end()? {
                    return Ok(());
                }

                if self.mode == ResolutionMode::Step {
                    self.control.pause();
                }
            }
            self.encounter.round += 1;
        }
    }

    fn check_end(&mut self) -> Result<bool> {
        if let Some(winner) = self.encounter.winner() {
            tracing::info!(?winner, round = self.encounter.round, "encounter ended");
            self.bus.publish(EngineEvent::EncounterEnd { winner });
            return Ok(true);
        }
        Ok(false)
    }

    /// Round start: reset legendary pools and sweep conditions that
    /// already expired at an end-of-turn tick.
    fn round_start(&mut self) {
        self.bus.publish(EngineEvent::RoundStart {
            round: self.encounter.round,
        });
        for combatant in &mut self.encounter.combatants {
            combatant.economy.legendary_used = 0;
            sweep_expired(combatant);
        }
    }

    fn death_save_turn(&mut self, actor_id: &str) -> Result<()> {
        let (outcome, roll) = {
            let actor = self
                .encounter
                .combatant_mut(actor_id)
                .ok_or_else(|| Error::Fatal(format!("combatant {actor_id} vanished")))?;
            roll_death_save(self.roller.as_ref(), actor)?
        };

        let mut results = MechanicalResults::default();
        let narrative = match outcome {
            DeathSaveOutcome::Failed => "fails a death save".to_string(),
            DeathSaveOutcome::Succeeded => "makes a death save".to_string(),
            DeathSaveOutcome::Stabilized => {
                results.status_changes.push(StatusChange {
                    target: actor_id.to_string(),
                    status: Status::Stable,
                });
                "stabilizes".to_string()
            }
            DeathSaveOutcome::Died => {
                results.status_changes.push(StatusChange {
                    target: actor_id.to_string(),
                    status: Status::Dead,
                });
                "succumbs to their wounds".to_string()
            }
            DeathSaveOutcome::Revived => {
                results.status_changes.push(StatusChange {
                    target: actor_id.to_string(),
                    status: Status::Ok,
                });
                "surges back to consciousness".to_string()
            }
        };
        if let Some(actor) = self.encounter.combatant(actor_id) {
            results.death_saves =
                Some((actor.death_saves.successes, actor.death_saves.failures));
        }

        let record = TurnRecord {
            resolution_id: self.resolution_id,
            round: self.encounter.round,
            combatant_id: actor_id.to_string(),
            intent: None,
            rolls: vec![roll],
            results,
            narrative,
            source_tier: SourceTier::Default,
            timestamp: Utc::now(),
            rollback: false,
        };
        self.encounter.log.push(record.clone());
        for roll in &record.rolls {
            self.bus.publish(EngineEvent::Dice {
                combatant_id: actor_id.to_string(),
                expression: roll.expression.clone(),
                result: roll.result,
                purpose: roll.purpose.clone(),
            });
        }
        self.bus.publish(EngineEvent::Result {
            turn_record: record,
        });
        Ok(())
    }

    async fn take_turn(&mut self, actor_id: &str) -> Result<()> {
        let turn_deadline =
            Instant::now() + Duration::from_millis(self.config.turn_deadline_ms);

        // Start-of-turn economy reset (legendary pools are per-round).
        {
            let actor = self
                .encounter
                .combatant_mut(actor_id)
                .ok_or_else(|| Error::Fatal(format!("combatant {actor_id} vanished")))?;
            let speed = if speed_is_zero(actor) { 0 } else { actor.speed };
            actor.economy.reset_for_turn(speed);
        }

        // Incapacitated combatants pass their turn without an oracle
        // consultation; durations still tick.
        let incapacitated = self
            .encounter
            .combatant(actor_id)
            .is_some_and(cannot_act);
        if incapacitated {
            let mut results = MechanicalResults::default();
            if let Some(actor) = self.encounter.combatant_mut(actor_id) {
                let established = condition_keys(actor);
                results
                    .conditions_removed
                    .extend(end_of_turn_tick(actor, &established));
            }
            let record = TurnRecord {
                resolution_id: self.resolution_id,
                round: self.encounter.round,
                combatant_id: actor_id.to_string(),
                intent: None,
                rolls: Vec::new(),
                results,
                narrative: "incapacitated and loses the turn".to_string(),
                source_tier: SourceTier::Default,
                timestamp: Utc::now(),
                rollback: false,
            };
            self.encounter.log.push(record.clone());
            self.bus.publish(EngineEvent::Result {
                turn_record: record,
            });
            return Ok(());
        }

        // Recharge rolls, before the oracle sees the ability list.
        let recharge_rolls = {
            let round = self.encounter.round;
            let actor = self
                .encounter
                .combatant_mut(actor_id)
                .ok_or_else(|| Error::Fatal(format!("combatant {actor_id} vanished")))?;
            roll_recharges(self.roller.as_ref(), actor, round)?
        };

        let summary = tw_oracle::summary::summarise(
            &self.encounter,
            self.config.summary_verbatim_turns,
            self.config.summary_char_budget,
        );

        self.resolve_with_ladder(actor_id, recharge_rolls, &summary, turn_deadline)
            .await
    }

    /// Obtain an intent through the fallback ladder and execute it
    /// inside a transaction. Rollbacks advance the ladder one tier; a
    /// default-tier rollback is fatal.
    async fn resolve_with_ladder(
        &mut self,
        actor_id: &str,
        recharge_rolls: Vec<DiceRoll>,
        summary: &str,
        turn_deadline: Instant,
    ) -> Result<()> {
        let mut tier = SourceTier::Oracle;
        let mut correction: Option<String> = None;
        let mut retries_left = self.config.retry_budget;
        let mut timeout_emitted = false;

        loop {
            // Turn wall-clock budget: once blown, only the default
            // action remains.
            if tier != SourceTier::Default && Instant::now() >= turn_deadline {
                if !timeout_emitted {
                    tracing::warn!(actor = actor_id, "turn deadline exceeded");
                    self.bus.publish(EngineEvent::TurnTimeout {
                        combatant_id: actor_id.to_string(),
                    });
                    timeout_emitted = true;
                }
                tier = SourceTier::Default;
            }

            let (intent, narrative, used_tier) = match tier {
                SourceTier::Oracle | SourceTier::OracleRetry => {
                    // Suspension point before the oracle call.
                    self.control.wait_ready().await?;
                    let remaining = turn_deadline.saturating_duration_since(Instant::now());
                    let deadline_ms = self
                        .config
                        .oracle_deadline_ms
                        .min(remaining.as_millis() as u64)
                        .max(1);
                    let cancel = self.control.cancel_token();
                    let outcome = self
                        .gateway
                        .request_intent(
                            self.oracle.as_ref(),
                            actor_id,
                            &self.encounter,
                            summary,
                            &self.config,
                            deadline_ms,
                            &cancel,
                            correction.as_deref(),
                        )
                        .await;
                    // Suspension point after the oracle call.
                    self.control.check_cancelled()?;

                    match outcome {
                        IntentOutcome::Ok(reply) => (reply.intent, reply.narrative, tier),
                        IntentOutcome::Transport(reason)
                        | IntentOutcome::Parse(reason)
                        | IntentOutcome::Invalid(reason) => {
                            tracing::info!(
                                actor = actor_id,
                                tier = tier.as_str(),
                                %reason,
                                "oracle tier failed, falling back"
                            );
                            if tier == SourceTier::Oracle && retries_left > 0 {
                                retries_left -= 1;
                                correction = Some(reason);
                                tier = SourceTier::OracleRetry;
                            } else {
                                tier = SourceTier::Heuristic;
                            }
                            continue;
                        }
                    }
                }
                SourceTier::Heuristic => {
                    let actor = self
                        .encounter
                        .combatant(actor_id)
                        .ok_or_else(|| Error::Fatal(format!("combatant {actor_id} vanished")))?;
                    let intent = heuristic_intent(actor, &self.encounter);
                    match self.gateway.validate(&intent, actor, &self.encounter) {
                        Ok(()) => (intent, String::new(), SourceTier::Heuristic),
                        Err(err) => {
                            tracing::warn!(
                                actor = actor_id,
                                error = %err,
                                "heuristic produced an illegal intent"
                            );
                            tier = SourceTier::Default;
                            continue;
                        }
                    }
                }
                SourceTier::Default => (default_intent(), String::new(), SourceTier::Default),
            };

            self.bus.publish(EngineEvent::Intent {
                combatant_id: actor_id.to_string(),
                intent: intent.clone(),
                source_tier: used_tier,
            });

            let established = self
                .encounter
                .combatant(actor_id)
                .map(|actor| condition_keys(actor))
                .unwrap_or_default();
            let txn = Transaction::begin(&self.encounter);
            let mut broker = ReactionBroker;
            let executed = execute_intent(
                &mut self.encounter,
                actor_id,
                &intent,
                self.roller.as_ref(),
                &mut broker,
                &self.rules_config,
            );
            let executed =
                executed.and_then(|outcome| Transaction::validate(&self.encounter).map(|()| outcome));

            match executed {
                Ok(mut executed) => {
                    // End-of-turn duration tick, committed with the turn.
                    if let Some(actor) = self.encounter.combatant_mut(actor_id) {
                        executed
                            .results
                            .conditions_removed
                            .extend(end_of_turn_tick(actor, &established));
                    }

                    let mut rolls = recharge_rolls.clone();
                    rolls.extend(executed.rolls);
                    let record = TurnRecord {
                        resolution_id: self.resolution_id,
                        round: self.encounter.round,
                        combatant_id: actor_id.to_string(),
                        intent: Some(intent),
                        rolls,
                        results: executed.results,
                        narrative,
                        source_tier: used_tier,
                        timestamp: Utc::now(),
                        rollback: false,
                    };
                    self.encounter.log.push(record.clone());

                    for roll in &record.rolls {
                        self.bus.publish(EngineEvent::Dice {
                            combatant_id: actor_id.to_string(),
                            expression: roll.expression.clone(),
                            result: roll.result,
                            purpose: roll.purpose.clone(),
                        });
                    }
                    self.bus.publish(EngineEvent::Result {
                        turn_record: record,
                    });
                    return Ok(());
                }
                Err(err) => {
                    let round = self.encounter.round;
                    txn.rollback(&mut self.encounter);
                    tracing::warn!(
                        actor = actor_id,
                        tier = used_tier.as_str(),
                        error = %err,
                        "turn rolled back"
                    );
                    self.encounter.log.push(TurnRecord {
                        resolution_id: self.resolution_id,
                        round,
                        combatant_id: actor_id.to_string(),
                        intent: Some(intent),
                        rolls: Vec::new(),
                        results: MechanicalResults::default(),
                        narrative: err.to_string(),
                        source_tier: used_tier,
                        timestamp: Utc::now(),
                        rollback: true,
                    });
                    self.bus.publish(EngineEvent::Rollback {
                        round,
                        combatant_id: actor_id.to_string(),
                        reason: err.to_string(),
                    });

                    tier = match used_tier {
                        SourceTier::Oracle => {
                            if retries_left > 0 {
                                retries_left -= 1;
                                correction = Some(err.to_string());
                                SourceTier::OracleRetry
                            } else {
                                SourceTier::Heuristic
                            }
                        }
                        SourceTier::OracleRetry => SourceTier::Heuristic,
                        SourceTier::Heuristic => SourceTier::Default,
                        SourceTier::Default => {
                            return Err(Error::Fatal(format!(
                                "default action failed for {actor_id}: {err}"
                            )));
                        }
                    };
                }
            }
        }
    }
}
