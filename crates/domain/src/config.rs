//! Engine configuration, applied once at `start` and immutable for the
//! lifetime of the resolution.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock budget for one full turn.
    #[serde(default = "d_60000u")]
    pub turn_deadline_ms: u64,
    /// Budget for a single oracle completion.
    #[serde(default = "d_30000u")]
    pub oracle_deadline_ms: u64,
    /// Oracle re-prompts allowed per turn after a validation failure.
    #[serde(default = "d_1")]
    pub retry_budget: u32,
    /// Prior turns included verbatim in the prompt.
    #[serde(default = "d_3")]
    pub summary_verbatim_turns: usize,
    /// Char budget for the digest window before verbatim turns.
    #[serde(default = "d_1200")]
    pub summary_char_budget: usize,
    /// Natural d20 results that crit (e.g. `[19, 20]` with improved
    /// critical).
    #[serde(default = "d_crit")]
    pub critical_range: Vec<u8>,
    /// Describe enemy HP as bands instead of exact numbers.
    #[serde(default = "d_true")]
    pub hide_enemy_hp_bands: bool,
    /// Drop the oldest pending update when the observer lags, emitting a
    /// `lag` diagnostic, instead of blocking the worker.
    #[serde(default = "d_true")]
    pub drop_oldest_on_observer_lag: bool,
    /// Grace period `stop` waits for the worker after cancelling an
    /// in-flight oracle call.
    #[serde(default = "d_5000u")]
    pub stop_grace_ms: u64,
    /// Capacity of the observer event channel.
    #[serde(default = "d_256")]
    pub event_channel_capacity: usize,
    /// Monsters with `max_hp` at or below this fall unconscious at 0 HP
    /// instead of dying outright.
    #[serde(default)]
    pub monster_unconscious_max_hp: i32,
}

fn d_60000u() -> u64 {
    60_000
}
fn d_30000u() -> u64 {
    30_000
}
fn d_5000u() -> u64 {
    5_000
}
fn d_1() -> u32 {
    1
}
fn d_3() -> usize {
    3
}
fn d_1200() -> usize {
    1_200
}
fn d_256() -> usize {
    256
}
fn d_crit() -> Vec<u8> {
    vec![20]
}
fn d_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            turn_deadline_ms: d_60000u(),
            oracle_deadline_ms: d_30000u(),
            retry_budget: d_1(),
            summary_verbatim_turns: d_3(),
            summary_char_budget: d_1200(),
            critical_range: d_crit(),
            hide_enemy_hp_bands: d_true(),
            drop_oldest_on_observer_lag: d_true(),
            stop_grace_ms: d_5000u(),
            event_channel_capacity: d_256(),
            monster_unconscious_max_hp: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.turn_deadline_ms, 60_000);
        assert_eq!(config.oracle_deadline_ms, 30_000);
        assert_eq!(config.retry_budget, 1);
        assert_eq!(config.summary_verbatim_turns, 3);
        assert_eq!(config.summary_char_budget, 1_200);
        assert_eq!(config.critical_range, vec![20]);
        assert!(config.hide_enemy_hp_bands);
        assert!(config.drop_oldest_on_observer_lag);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.oracle_deadline_ms, 30_000);
        assert_eq!(config.critical_range, vec![20]);
    }
}
