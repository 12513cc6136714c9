//! Shared fixtures for the end-to-end scenarios: a scripted dice
//! roller, a programmable oracle, and a collecting observer.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use tw_domain::{
    Ability, AbilityKind, AbilityScores, ActionEconomy, CancelToken, Combatant, DamageType,
    DeathSaves, DiceRoller, EngineEvent, Error, Position, Result, Side, Status,
};
use tw_engine::Observer;
use tw_oracle::Oracle;

/// Pops scripted results in order; falls back to 10 when exhausted.
pub struct SequenceRoller {
    rolls: Mutex<VecDeque<i64>>,
}

impl SequenceRoller {
    pub fn new(rolls: impl IntoIterator<Item = i64>) -> Self {
        Self {
            rolls: Mutex::new(rolls.into_iter().collect()),
        }
    }
}

impl DiceRoller for SequenceRoller {
    fn roll(&self, _expression: &str) -> Result<i64> {
        Ok(self.rolls.lock().pop_front().unwrap_or(10))
    }
}

/// Replies in order, then the fallback forever. An optional delay makes
/// every call slow while still honouring the cancellation token.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    delay: Option<Duration>,
    pub cancel_seen: Arc<AtomicBool>,
}

impl ScriptedOracle {
    pub fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            fallback: "skip".to_string(),
            delay: None,
            cancel_seen: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, _prompt: &str, cancel: &CancelToken) -> Result<String> {
        if let Some(delay) = self.delay {
            let deadline = tokio::time::Instant::now() + delay;
            while tokio::time::Instant::now() < deadline {
                if cancel.is_cancelled() {
                    self.cancel_seen.store(true, Ordering::SeqCst);
                    return Err(Error::Cancelled);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        Ok(self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Collects every event; tests poll `wait_for` with a deadline.
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub async fn wait_for(&self, predicate: impl Fn(&[EngineEvent]) -> bool) -> Vec<EngineEvent> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            {
                let events = self.events.lock();
                if predicate(&events) {
                    return events.clone();
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for events; saw {:?}",
                self.events()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Observer for CollectingObserver {
    fn on_event(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

pub fn ended(events: &[EngineEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, EngineEvent::EncounterEnd { .. } | EngineEvent::Fatal { .. }))
}

/// A bare combatant; tests fill in abilities and positions.
pub fn combatant(id: &str, name: &str, side: Side, hp: i32, ac: i32, initiative: i32) -> Combatant {
    Combatant {
        id: id.into(),
        name: name.into(),
        side,
        scores: AbilityScores::default(),
        ac,
        hp,
        max_hp: hp,
        speed: 30,
        initiative,
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

pub fn melee_attack(name: &str, attack_bonus: i32, damage: &str) -> Ability {
    Ability {
        name: name.into(),
        tag: String::new(),
        kind: AbilityKind::MeleeAttack,
        attack_bonus,
        damage: Some(damage.into()),
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

/// Symmetric distance entry between two combatants.
pub fn place(combatants: &mut [Combatant], a: &str, b: &str, feet: i32) {
    for combatant in combatants.iter_mut() {
        if combatant.id == a {
            combatant.position.distance_to.insert(b.to_string(), feet);
        }
        if combatant.id == b {
            combatant.position.distance_to.insert(a.to_string(), feet);
        }
    }
}
