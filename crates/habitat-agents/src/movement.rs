//! Movement targets.

use std::collections::BTreeMap;

use habitat_types::{EntityId, Position};

use crate::ports::MovementPort;

/// Movement state of one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    /// Where the agent was registered.
    pub origin: Position,
    /// Where it is heading.
    pub target: Option<Position>,
}

/// Movement state of every tracked agent.
#[derive(Debug, Clone, Default)]
pub struct MovementTable {
    states: BTreeMap<EntityId, MovementState>,
}

impl MovementTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            states: BTreeMap::new(),
        }
    }

    /// Look up an agent's state.
    pub fn get(&self, agent: EntityId) -> Option<&MovementState> {
        self.states.get(&agent)
    }

    /// Number of tracked agents.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no agent is tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl MovementPort for MovementTable {
    fn register(&mut self, agent: EntityId, position: Position) {
        self.states.insert(
            agent,
            MovementState {
                origin: position,
                target: None,
            },
        );
    }

    fn target(&self, agent: EntityId) -> Option<Position> {
        self.states.get(&agent).and_then(|s| s.target)
    }

    fn set_target(&mut self, agent: EntityId, target: Option<Position>) {
        if let Some(state) = self.states.get_mut(&agent) {
            state.target = target;
        }
    }

    fn remove(&mut self, agent: EntityId) -> bool {
        self.states.remove(&agent).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_only_for_registered_agents() {
        let mut table = MovementTable::new();
        let a = EntityId::new();
        let stranger = EntityId::new();
        table.register(a, Position::new(1.0, 1.0));
        table.set_target(a, Some(Position::new(5.0, 5.0)));
        table.set_target(stranger, Some(Position::new(5.0, 5.0)));
        assert_eq!(table.target(a), Some(Position::new(5.0, 5.0)));
        assert_eq!(table.target(stranger), None);
        assert!(table.remove(a));
        assert!(table.is_empty());
    }
}
