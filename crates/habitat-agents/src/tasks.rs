//! AI task queues and current activities.

use std::collections::{BTreeMap, VecDeque};

use habitat_types::{ActivityKind, EntityId};

use crate::ports::{ActivityPort, TaskPort};

/// Queued tasks per agent.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    queues: BTreeMap<EntityId, VecDeque<String>>,
}

impl TaskBoard {
    /// Create an empty board.
    pub const fn new() -> Self {
        Self {
            queues: BTreeMap::new(),
        }
    }

    /// Queue a task.
    pub fn push(&mut self, agent: EntityId, task: impl Into<String>) {
        self.queues.entry(agent).or_default().push_back(task.into());
    }

    /// Take the next task.
    pub fn pop(&mut self, agent: EntityId) -> Option<String> {
        self.queues.get_mut(&agent)?.pop_front()
    }

    /// Number of queued tasks for an agent.
    pub fn pending(&self, agent: EntityId) -> usize {
        self.queues.get(&agent).map_or(0, VecDeque::len)
    }
}

impl TaskPort for TaskBoard {
    fn clear(&mut self, agent: EntityId) -> usize {
        self.queues.remove(&agent).map_or(0, |q| q.len())
    }
}

/// Current activity per agent.
#[derive(Debug, Clone, Default)]
pub struct ActivityBoard {
    current: BTreeMap<EntityId, ActivityKind>,
}

impl ActivityBoard {
    /// Create an empty board.
    pub const fn new() -> Self {
        Self {
            current: BTreeMap::new(),
        }
    }
}

impl ActivityPort for ActivityBoard {
    fn activity(&self, agent: EntityId) -> ActivityKind {
        self.current.get(&agent).copied().unwrap_or(ActivityKind::Idle)
    }

    fn set_activity(&mut self, agent: EntityId, activity: ActivityKind) {
        if activity == ActivityKind::Idle {
            self.current.remove(&agent);
        } else {
            self.current.insert(agent, activity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_reports_dropped_tasks() {
        let mut board = TaskBoard::new();
        let agent = EntityId::new();
        board.push(agent, "gather");
        board.push(agent, "build");
        assert_eq!(board.pop(agent).as_deref(), Some("gather"));
        assert_eq!(board.clear(agent), 1);
        assert_eq!(board.clear(agent), 0);
        assert_eq!(board.pending(agent), 0);
    }

    #[test]
    fn unknown_agents_are_idle() {
        let mut board = ActivityBoard::new();
        let agent = EntityId::new();
        assert_eq!(board.activity(agent), ActivityKind::Idle);
        board.set_activity(agent, ActivityKind::Sleeping);
        assert_eq!(board.activity(agent), ActivityKind::Sleeping);
    }
}
