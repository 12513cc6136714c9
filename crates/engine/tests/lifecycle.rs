//! Lifecycle contract tests: exclusive starts, pause/resume semantics,
//! step mode, and the idempotence laws.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{combatant, melee_attack, place, CollectingObserver, ScriptedOracle, SequenceRoller};
use tw_domain::{EncounterState, EngineConfig, EngineEvent, Error, Side};
use tw_engine::{ResolutionEngine, ResolutionMode};

fn slow_duel() -> EncounterState {
    let mut kobold = combatant("kob", "Kobold", Side::Monster, 50, 12, 15);
    kobold.abilities.push(melee_attack("Dagger", 4, "1d4"));
    let mut commoner = combatant("com", "Commoner", Side::Player, 50, 10, 10);
    commoner.abilities.push(melee_attack("Club", 2, "1d4"));
    let mut combatants = vec![kobold, commoner];
    place(&mut combatants, "kob", "com", 5);
    EncounterState::new(combatants)
}

fn slow_oracle() -> Arc<ScriptedOracle> {
    // Every consultation takes a while, keeping the resolution alive
    // for the duration of the test.
    Arc::new(ScriptedOracle::new([]).with_delay(Duration::from_millis(100)))
}

#[tokio::test]
async fn a_second_start_is_rejected_while_running() {
    let engine = ResolutionEngine::new();
    let observer = CollectingObserver::new();
    let handle = engine
        .start(
            slow_duel(),
            Arc::new(SequenceRoller::new([])),
            slow_oracle(),
            observer.clone(),
            ResolutionMode::Continuous,
            EngineConfig::default(),
        )
        .unwrap();

    let second = engine.start(
        slow_duel(),
        Arc::new(SequenceRoller::new([])),
        slow_oracle(),
        CollectingObserver::new(),
        ResolutionMode::Continuous,
        EngineConfig::default(),
    );
    assert!(matches!(second, Err(Error::AlreadyRunning)));

    engine.stop(handle).await.unwrap();

    // After the stop, a fresh resolution may start.
    let third = engine.start(
        slow_duel(),
        Arc::new(SequenceRoller::new([])),
        slow_oracle(),
        CollectingObserver::new(),
        ResolutionMode::Continuous,
        EngineConfig::default(),
    );
    assert!(third.is_ok());
    engine.stop(third.unwrap()).await.unwrap();
}

#[tokio::test]
async fn operations_on_an_unknown_handle_are_not_running() {
    let engine = ResolutionEngine::new();
    let observer = CollectingObserver::new();
    let handle = engine
        .start(
            slow_duel(),
            Arc::new(SequenceRoller::new([])),
            slow_oracle(),
            observer,
            ResolutionMode::Continuous,
            EngineConfig::default(),
        )
        .unwrap();
    engine.stop(handle).await.unwrap();

    // A handle from a different engine instance is unknown here.
    let other_engine = ResolutionEngine::new();
    assert!(matches!(other_engine.pause(handle), Err(Error::NotRunning)));
    assert!(matches!(other_engine.resume(handle), Err(Error::NotRunning)));
    assert!(matches!(
        other_engine.stop(handle).await,
        Err(Error::NotRunning)
    ));
}

#[tokio::test]
async fn pause_holds_the_worker_and_resume_releases_it() {
    let engine = ResolutionEngine::new();
    let observer = CollectingObserver::new();
    let handle = engine
        .start(
            slow_duel(),
            Arc::new(SequenceRoller::new([])),
            slow_oracle(),
            observer.clone(),
            ResolutionMode::Continuous,
            EngineConfig::default(),
        )
        .unwrap();

    observer
        .wait_for(|events| {
            events
                .iter()
                .any(|e| matches!(e, EngineEvent::TurnStart { .. }))
        })
        .await;

    engine.pause(handle).unwrap();
    // Pause while paused is a no-op.
    engine.pause(handle).unwrap();
    assert!(engine.status(handle).unwrap().paused);

    // Let the in-flight turn drain, then confirm no new turns start.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let turns_while_paused = observer
        .events()
        .iter()
        .filter(|e| matches!(e, EngineEvent::TurnStart { .. }))
        .count();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let turns_after_waiting = observer
        .events()
        .iter()
        .filter(|e| matches!(e, EngineEvent::TurnStart { .. }))
        .count();
    assert_eq!(turns_while_paused, turns_after_waiting);

    engine.resume(handle).unwrap();
    assert!(!engine.status(handle).unwrap().paused);
    observer
        .wait_for(move |events| {
            events
                .iter()
                .filter(|e| matches!(e, EngineEvent::TurnStart { .. }))
                .count()
                > turns_after_waiting
        })
        .await;

    engine.stop(handle).await.unwrap();
}

#[tokio::test]
async fn step_mode_pauses_after_each_turn() {
    let engine = ResolutionEngine::new();
    let observer = CollectingObserver::new();
    let oracle = Arc::new(ScriptedOracle::new([
        r#"{"action_type":"dodge"}"#,
        r#"{"action_type":"dodge"}"#,
        r#"{"action_type":"dodge"}"#,
    ]));
    let handle = engine
        .start(
            slow_duel(),
            Arc::new(SequenceRoller::new([])),
            oracle,
            observer.clone(),
            ResolutionMode::Step,
            EngineConfig::default(),
        )
        .unwrap();

    observer
        .wait_for(|events| {
            events
                .iter()
                .any(|e| matches!(e, EngineEvent::Result { .. }))
        })
        .await;
    // The worker self-paused after committing the first turn.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.status(handle).unwrap().paused);
    let turns = observer
        .events()
        .iter()
        .filter(|e| matches!(e, EngineEvent::TurnStart { .. }))
        .count();
    assert_eq!(turns, 1);

    // Resume releases exactly one further turn.
    engine.resume(handle).unwrap();
    observer
        .wait_for(|events| {
            events
                .iter()
                .filter(|e| matches!(e, EngineEvent::TurnStart { .. }))
                .count()
                == 2
        })
        .await;

    engine.stop(handle).await.unwrap();
}
