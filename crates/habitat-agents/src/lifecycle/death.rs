//! Agent death and its consequences.
//!
//! Killing an agent flips it to dead in the registry and emits `AgentDied`
//! exactly once. The cascade that follows tears the agent out of every
//! dependent subsystem. Each step only touches its own port, so a missing
//! port skips that step and nothing else.
//!
//! A respawned agent goes the other way through [`LifecycleEngine::revive_agent`].

use std::collections::BTreeMap;

use habitat_events::SimEvent;
use habitat_types::{ActivityKind, Agent, DeathCause, EntityId, LifeStage, ResourceKind};
use tracing::{debug, info};

use super::{LifecycleEngine, LifecycleWorld};

/// What the cascade removed for one dead agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeathCascade {
    /// Resources dropped at the death position.
    pub dropped: BTreeMap<ResourceKind, u32>,
    /// Queued tasks discarded.
    pub tasks_cleared: usize,
    /// Relationships forgotten.
    pub bonds_removed: usize,
    /// Whether a needs record was removed.
    pub needs_removed: bool,
    /// Whether the agent left a household.
    pub left_household: bool,
}

impl LifecycleEngine {
    /// Kill an agent and run the death cascade.
    ///
    /// Returns `false`, doing nothing, for unknown or already-dead agents.
    pub fn kill_agent(
        &mut self,
        id: EntityId,
        cause: DeathCause,
        now_ms: u64,
        world: &mut LifecycleWorld<'_>,
    ) -> bool {
        let Some((position, age_years)) = world.agents.get(id).map(|a| (a.position, a.age_years)) else {
            return false;
        };
        if !world.agents.mark_dead_with_cause(id, cause, now_ms) {
            return false;
        }
        world.events.emit(SimEvent::AgentDied {
            agent_id: id,
            cause,
            position,
            age_years,
        });
        info!(agent_id = %id, %cause, age_years, "agent died");
        self.finalize_death(id, now_ms, world);
        true
    }

    /// Run only the cascade, for an agent already marked dead elsewhere.
    pub fn finalize_death(&mut self, id: EntityId, now_ms: u64, world: &mut LifecycleWorld<'_>) -> DeathCascade {
        let mut cascade = DeathCascade::default();
        let position = world.agents.get(id).map(|a| a.position).unwrap_or_default();
        let ports = &mut *world.ports;

        if let Some(inventory) = ports.inventory.as_deref_mut() {
            cascade.dropped = inventory.drain(id);
            if !cascade.dropped.is_empty() {
                world.events.emit(SimEvent::InventoryDropped {
                    agent_id: id,
                    position,
                    items: cascade.dropped.clone(),
                });
            }
        }
        if let Some(tasks) = ports.tasks.as_deref_mut() {
            cascade.tasks_cleared = tasks.clear(id);
        }
        cascade.needs_removed = world.needs.remove(id);
        if let Some(social) = ports.social.as_deref_mut() {
            cascade.bonds_removed = social.remove(id);
        }
        if let Some(movement) = ports.movement.as_deref_mut() {
            movement.remove(id);
        }
        if let Some(households) = ports.household.as_deref_mut() {
            cascade.left_household = households.remove(id);
        }
        if let Some(roles) = ports.roles.as_deref_mut() {
            roles.remove(id);
        }
        if let Some(genealogy) = ports.genealogy.as_deref_mut() {
            genealogy.record_death(id, now_ms);
        }
        if let Some(activity) = ports.activity.as_deref_mut() {
            activity.set_activity(id, ActivityKind::Idle);
        }

        self.housing_queue.retain(|queued| *queued != id);
        self.pair_cooldowns.retain(|(mother, father), _| *mother != id && *father != id);
        cascade
    }

    /// Put a respawned agent back into the role board, the genealogy's
    /// living set, and the housing queue.
    ///
    /// The needs engine restores the registry entry, needs, inventory, and
    /// movement before this runs. Returns `false` for unknown or dead agents.
    pub fn revive_agent(&mut self, id: EntityId, world: &mut LifecycleWorld<'_>) -> bool {
        let Some(stage) = world.agents.get(id).filter(|a| a.alive).map(|a| a.life_stage) else {
            return false;
        };
        if let Some(roles) = world.ports.roles.as_deref_mut() {
            roles.assign(id, stage);
        }
        if let Some(genealogy) = world.ports.genealogy.as_deref_mut() {
            genealogy.record_revival(id);
        }
        if stage != LifeStage::Child {
            self.queue_housing(id);
        }
        debug!(agent_id = %id, stage = stage.as_str(), "agent rejoined lifecycle");
        true
    }

    /// Kill an agent if alive, then delete its registry record.
    pub fn remove_agent(
        &mut self,
        id: EntityId,
        cause: DeathCause,
        now_ms: u64,
        world: &mut LifecycleWorld<'_>,
    ) -> Option<Agent> {
        self.kill_agent(id, cause, now_ms, world);
        world.needs.cancel_respawn(id);
        world.agents.remove(id)
    }
}
