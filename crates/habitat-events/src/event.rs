//! Outbound domain events and inbound commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use habitat_types::{DeathCause, EntityId, HouseholdId, LifeStage, NeedKind, Position, ResourceKind};

/// A state change observable by systems outside the simulation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SimEvent {
    /// An agent died. Emitted exactly once per death.
    AgentDied {
        /// The agent that died.
        agent_id: EntityId,
        /// Why it died.
        cause: DeathCause,
        /// Where it died.
        position: Position,
        /// Age in years at death.
        age_years: f32,
    },
    /// A dead agent was revived after the respawn delay.
    AgentRespawned {
        /// The revived agent.
        agent_id: EntityId,
    },
    /// A child agent was born.
    AgentBorn {
        /// The child.
        agent_id: EntityId,
        /// The mother.
        mother: EntityId,
        /// The father.
        father: EntityId,
        /// The child's generation number.
        generation: u32,
    },
    /// An agent moved from one life stage to the next.
    LifeStageChanged {
        /// The agent.
        agent_id: EntityId,
        /// Stage before the change.
        from: LifeStage,
        /// Stage after the change.
        to: LifeStage,
    },
    /// A newly adult agent was placed in a household.
    AgentHoused {
        /// The agent.
        agent_id: EntityId,
        /// The household it joined.
        household_id: HouseholdId,
    },
    /// A breeding pair was selected and passed every gate.
    ReproductionAttempt {
        /// The mother.
        mother: EntityId,
        /// The father.
        father: EntityId,
    },
    /// A breeding attempt produced a child.
    ReproductionSuccess {
        /// The mother.
        mother: EntityId,
        /// The father.
        father: EntityId,
        /// The child.
        child: EntityId,
    },
    /// A need crossed into the critical band.
    NeedCritical {
        /// The agent.
        agent_id: EntityId,
        /// Which need.
        need: NeedKind,
        /// The value after the crossing.
        value: f32,
    },
    /// A need rose into the satisfied band.
    NeedSatisfied {
        /// The agent.
        agent_id: EntityId,
        /// Which need.
        need: NeedKind,
        /// The value after the crossing.
        value: f32,
    },
    /// A dead agent's inventory was dropped at its position.
    InventoryDropped {
        /// The dead agent.
        agent_id: EntityId,
        /// Where the items were dropped.
        position: Position,
        /// Quantities dropped, by resource.
        items: BTreeMap<ResourceKind, u32>,
    },
    /// An animal was spawned into the world.
    AnimalSpawned {
        /// The animal.
        animal_id: EntityId,
        /// Its species.
        species: String,
        /// Where it appeared.
        position: Position,
    },
    /// An animal died.
    AnimalDied {
        /// The animal.
        animal_id: EntityId,
        /// Its species.
        species: String,
        /// Why it died.
        cause: DeathCause,
    },
    /// Two animals produced offspring.
    AnimalReproduced {
        /// The mother.
        mother: EntityId,
        /// The father.
        father: EntityId,
        /// The offspring.
        child: EntityId,
        /// The species of all three.
        species: String,
    },
}

impl SimEvent {
    /// Short snake-case name of the event variant, for logs and filtering.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AgentDied { .. } => "agent_died",
            Self::AgentRespawned { .. } => "agent_respawned",
            Self::AgentBorn { .. } => "agent_born",
            Self::LifeStageChanged { .. } => "life_stage_changed",
            Self::AgentHoused { .. } => "agent_housed",
            Self::ReproductionAttempt { .. } => "reproduction_attempt",
            Self::ReproductionSuccess { .. } => "reproduction_success",
            Self::NeedCritical { .. } => "need_critical",
            Self::NeedSatisfied { .. } => "need_satisfied",
            Self::InventoryDropped { .. } => "inventory_dropped",
            Self::AnimalSpawned { .. } => "animal_spawned",
            Self::AnimalDied { .. } => "animal_died",
            Self::AnimalReproduced { .. } => "animal_reproduced",
        }
    }
}

/// A command from outside the core, applied at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundCommand {
    /// An external actor killed an animal.
    AnimalHunted {
        /// The animal that was killed.
        animal_id: EntityId,
        /// Who killed it, if known.
        hunter_id: Option<EntityId>,
    },
    /// An external system killed an agent.
    KillAgent {
        /// The agent to kill.
        agent_id: EntityId,
        /// Cause to record.
        cause: DeathCause,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag() {
        let event = SimEvent::AgentRespawned {
            agent_id: EntityId::new(),
        };
        let json = serde_json::to_value(&event).ok();
        let tag = json
            .as_ref()
            .and_then(|v| v.get("type"))
            .and_then(serde_json::Value::as_str);
        assert_eq!(tag, Some("agent_respawned"));
        assert_eq!(event.name(), "agent_respawned");
    }

    #[test]
    fn inbound_command_parses_from_json() {
        let id = EntityId::new();
        let json = format!(r#"{{"type":"animal_hunted","animal_id":"{id}","hunter_id":null}}"#);
        let parsed: Option<InboundCommand> = serde_json::from_str(&json).ok();
        assert_eq!(
            parsed,
            Some(InboundCommand::AnimalHunted {
                animal_id: id,
                hunter_id: None
            })
        );
    }
}
