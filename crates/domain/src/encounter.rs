//! Encounter state: combatants, initiative order, environment and the
//! append-only combat log. The engine owns this exclusively between
//! `start` and termination; the snapshot taken by the transaction
//! manager is a plain deep clone.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::combatant::{Combatant, Side, Status};
use crate::record::TurnRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Environment {
    /// Combatants whose current footing is difficult terrain; entering
    /// costs double movement.
    #[serde(default)]
    pub difficult_terrain: HashSet<String>,
    #[serde(default)]
    pub hazards: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Players,
    Monsters,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterState {
    pub combatants: Vec<Combatant>,
    /// Combatant ids in initiative order. Filled by `sort_initiative`.
    #[serde(default)]
    pub order: Vec<String>,
    pub round: u32,
    pub turn_index: usize,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub log: Vec<TurnRecord>,
}

impl EncounterState {
    pub fn new(combatants: Vec<Combatant>) -> Self {
        let mut state = Self {
            combatants,
            order: Vec::new(),
            round: 1,
            turn_index: 0,
            environment: Environment::default(),
            log: Vec::new(),
        };
        for combatant in &mut state.combatants {
            combatant.tag_abilities();
        }
        state.sort_initiative();
        state
    }

    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    /// Sort the initiative order: descending initiative, then descending
    /// dexterity, then combatants with initiative advantage first.
    pub fn sort_initiative(&mut self) {
        let mut ids: Vec<(String, i32, i32, bool)> = self
            .combatants
            .iter()
            .map(|c| {
                (
                    c.id.clone(),
                    c.initiative,
                    c.scores.dexterity,
                    c.initiative_advantage,
                )
            })
            .collect();
        ids.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(b.2.cmp(&a.2))
                .then(b.3.cmp(&a.3))
        });
        self.order = ids.into_iter().map(|(id, ..)| id).collect();
    }

    /// Living, targetable enemies of the given combatant.
    pub fn living_enemies_of(&self, id: &str) -> Vec<&Combatant> {
        let Some(actor) = self.combatant(id) else {
            return Vec::new();
        };
        self.combatants
            .iter()
            .filter(|c| c.side.hostile_to(actor.side) && !c.is_dead())
            .collect()
    }

    pub fn allies_of(&self, id: &str) -> Vec<&Combatant> {
        let Some(actor) = self.combatant(id) else {
            return Vec::new();
        };
        self.combatants
            .iter()
            .filter(|c| c.id != id && !c.side.hostile_to(actor.side) && !c.is_dead())
            .collect()
    }

    fn side_defeated(&self, hostile: bool) -> bool {
        let mut any = false;
        for combatant in &self.combatants {
            let on_side = (combatant.side == Side::Monster) == hostile;
            if on_side {
                any = true;
                if combatant.is_active() {
                    return false;
                }
            }
        }
        any
    }

    /// Terminal condition: every creature of one side is unconscious,
    /// stable or dead.
    pub fn winner(&self) -> Option<Winner> {
        let monsters_down = self.side_defeated(true);
        let players_down = self.side_defeated(false);
        match (players_down, monsters_down) {
            (true, true) => Some(Winner::Draw),
            (true, false) => Some(Winner::Monsters),
            (false, true) => Some(Winner::Players),
            (false, false) => None,
        }
    }

    /// Symmetrically reduce the recorded distance between two combatants.
    pub fn close_distance(&mut self, a: &str, b: &str, feet: i32) {
        let current = self
            .combatant(a)
            .map(|c| c.position.distance_to(b))
            .unwrap_or(crate::combatant::DEFAULT_DISTANCE_FT);
        let updated = (current - feet).max(0);
        if let Some(ca) = self.combatant_mut(a) {
            ca.position.distance_to.insert(b.to_string(), updated);
        }
        if let Some(cb) = self.combatant_mut(b) {
            cb.position.distance_to.insert(a.to_string(), updated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{AbilityScores, Side};

    fn combatant(id: &str, side: Side, init: i32, dex: i32) -> Combatant {
        Combatant {
            id: id.into(),
            name: id.into(),
            side,
            scores: AbilityScores {
                dexterity: dex,
                ..AbilityScores::default()
            },
            ac: 10,
            hp: 10,
            max_hp: 10,
            speed: 30,
            initiative: init,
            initiative_advantage: false,
            status: Status::Ok,
            position: Default::default(),
            economy: Default::default(),
            conditions: Vec::new(),
            resistances: Default::default(),
            immunities: Default::default(),
            vulnerabilities: Default::default(),
            concentration: None,
            death_saves: Default::default(),
            recharge_spent: Default::default(),
            legendary_max: 0,
            legendary_resistance: 0,
            proficiency: 2,
            save_proficiencies: Default::default(),
            attributes: Default::default(),
            abilities: Vec::new(),
        }
    }

    #[test]
    fn initiative_sorts_descending_with_dex_tiebreak() {
        let state = EncounterState::new(vec![
            combatant("slow", Side::Player, 10, 12),
            combatant("fast", Side::Monster, 18, 8),
            combatant("tied_low_dex", Side::Monster, 10, 10),
        ]);
        assert_eq!(state.order, ["fast", "slow", "tied_low_dex"]);
    }

    #[test]
    fn winner_requires_a_whole_side_down() {
        let mut state = EncounterState::new(vec![
            combatant("pc", Side::Player, 10, 10),
            combatant("mon1", Side::Monster, 12, 10),
            combatant("mon2", Side::Monster, 8, 10),
        ]);
        assert_eq!(state.winner(), None);

        state.combatant_mut("mon1").unwrap().status = Status::Dead;
        assert_eq!(state.winner(), None);

        state.combatant_mut("mon2").unwrap().status = Status::Unconscious;
        assert_eq!(state.winner(), Some(Winner::Players));
    }

    #[test]
    fn npcs_count_with_the_players() {
        let mut state = EncounterState::new(vec![
            combatant("pc", Side::Player, 10, 10),
            combatant("ally", Side::Npc, 11, 10),
            combatant("mon", Side::Monster, 12, 10),
        ]);
        state.combatant_mut("pc").unwrap().status = Status::Dead;
        // The NPC still stands, so the monsters have not won yet.
        assert_eq!(state.winner(), None);
        state.combatant_mut("ally").unwrap().status = Status::Dead;
        assert_eq!(state.winner(), Some(Winner::Monsters));
    }

    #[test]
    fn close_distance_is_symmetric_and_floored() {
        let mut state = EncounterState::new(vec![
            combatant("a", Side::Player, 10, 10),
            combatant("b", Side::Monster, 12, 10),
        ]);
        state
            .combatant_mut("a")
            .unwrap()
            .position
            .distance_to
            .insert("b".into(), 20);
        state
            .combatant_mut("b")
            .unwrap()
            .position
            .distance_to
            .insert("a".into(), 20);

        state.close_distance("a", "b", 15);
        assert_eq!(state.combatant("a").unwrap().position.distance_to("b"), 5);
        assert_eq!(state.combatant("b").unwrap().position.distance_to("a"), 5);

        state.close_distance("a", "b", 30);
        assert_eq!(state.combatant("a").unwrap().position.distance_to("b"), 0);
    }
}
