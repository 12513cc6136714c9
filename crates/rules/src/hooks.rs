//! Reaction hooks: the seam through which the dispatcher interleaves
//! shield-style reactions into an in-flight attack before the outcome
//! commits. Opportunity attacks never fire these hooks (they are not
//! themselves reactable).

use tw_domain::EncounterState;

/// A resolved-but-uncommitted attack, offered to reacting combatants.
#[derive(Debug, Clone)]
pub struct AttackEvent {
    pub attacker_id: String,
    pub target_id: String,
    /// Attack total after bonuses, before any reaction rider.
    pub total: i64,
    /// Effective AC at resolution time (cover included).
    pub effective_ac: i64,
    pub would_hit: bool,
    pub critical: bool,
}

pub trait ReactionHooks {
    /// Called after the to-hit roll but before the outcome commits. A
    /// reacting defender may spend its reaction and return an AC bonus
    /// that is applied to this attack.
    fn on_attack_resolved(
        &mut self,
        _encounter: &mut EncounterState,
        _event: &AttackEvent,
    ) -> Option<i32> {
        None
    }

    /// Called when a spell is cast, before its effects resolve.
    fn on_spell_cast(&mut self, _encounter: &mut EncounterState, _caster_id: &str, _spell: &str) {}
}

/// No reactions: used for opportunity attacks and in tests.
pub struct NoReactions;

impl ReactionHooks for NoReactions {}
