//! The outbound event queue and inbound command queue.
//!
//! Sequence numbers are assigned at emission and never reset, so a consumer
//! that persists envelopes across ticks can order them totally by
//! `sequence` alone.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use habitat_types::EventId;

use crate::event::{InboundCommand, SimEvent};

/// A [`SimEvent`] stamped with its identity and ordering metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventEnvelope {
    /// Unique event identifier.
    pub id: EventId,
    /// The tick during which the event was emitted.
    pub tick: u64,
    /// Monotonic emission sequence across the whole run.
    pub sequence: u64,
    /// Wall-clock time of emission.
    pub emitted_at: DateTime<Utc>,
    /// The event itself.
    pub event: SimEvent,
}

/// Synchronous, in-order event queue shared by every engine in a tick.
#[derive(Debug, Default)]
pub struct EventBus {
    tick: u64,
    next_sequence: u64,
    outbound: Vec<EventEnvelope>,
    inbound: VecDeque<InboundCommand>,
}

impl EventBus {
    /// Create an empty bus at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick stamped on subsequently emitted events.
    pub const fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// The tick currently stamped on emitted events.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Queue an event. Returns its sequence number.
    pub fn emit(&mut self, event: SimEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        tracing::trace!(tick = self.tick, sequence, event = event.name(), "event emitted");
        self.outbound.push(EventEnvelope {
            id: EventId::new(),
            tick: self.tick,
            sequence,
            emitted_at: Utc::now(),
            event,
        });
        sequence
    }

    /// Take every queued event, in emission order.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.outbound)
    }

    /// Queued events not yet drained.
    pub fn pending(&self) -> &[EventEnvelope] {
        &self.outbound
    }

    /// Number of queued events.
    pub const fn len(&self) -> usize {
        self.outbound.len()
    }

    /// Whether no events are queued.
    pub const fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Enqueue a command for the next tick.
    pub fn push_command(&mut self, command: InboundCommand) {
        self.inbound.push_back(command);
    }

    /// Take every pending command, in arrival order.
    pub fn drain_commands(&mut self) -> Vec<InboundCommand> {
        self.inbound.drain(..).collect()
    }

    /// Number of pending inbound commands.
    pub fn pending_commands(&self) -> usize {
        self.inbound.len()
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::{DeathCause, EntityId};

    use super::*;

    #[test]
    fn drain_preserves_emission_order() {
        let mut bus = EventBus::new();
        bus.begin_tick(3);
        let a = EntityId::new();
        let b = EntityId::new();
        bus.emit(SimEvent::AgentRespawned { agent_id: a });
        bus.emit(SimEvent::AgentRespawned { agent_id: b });
        assert_eq!(bus.len(), 2);

        let drained = bus.drain();
        assert!(bus.is_empty());
        let ids: Vec<u64> = drained.iter().map(|e| e.sequence).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(drained.iter().all(|e| e.tick == 3));
    }

    #[test]
    fn sequence_continues_across_ticks() {
        let mut bus = EventBus::new();
        bus.emit(SimEvent::AgentRespawned {
            agent_id: EntityId::new(),
        });
        let _ = bus.drain();
        bus.begin_tick(1);
        let seq = bus.emit(SimEvent::AgentRespawned {
            agent_id: EntityId::new(),
        });
        assert_eq!(seq, 1);
    }

    #[test]
    fn commands_drain_fifo() {
        let mut bus = EventBus::new();
        let first = EntityId::new();
        let second = EntityId::new();
        bus.push_command(InboundCommand::KillAgent {
            agent_id: first,
            cause: DeathCause::Killed,
        });
        bus.push_command(InboundCommand::AnimalHunted {
            animal_id: second,
            hunter_id: None,
        });
        assert_eq!(bus.pending_commands(), 2);
        let drained = bus.drain_commands();
        assert_eq!(drained.len(), 2);
        assert!(matches!(
            drained.first(),
            Some(InboundCommand::KillAgent { agent_id, .. }) if *agent_id == first
        ));
        assert_eq!(bus.pending_commands(), 0);
    }
}
