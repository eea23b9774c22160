//! State exchanged with the host each tick.
//!
//! The host owns the world's extent and zone layout and reads back a
//! [`HostFrame`] after every tick. [`HostState`] is the hand-off point:
//! the host writes zones in, the simulation publishes frames out.

use habitat_types::{AgentSnapshot, AnimalSnapshot, PopulationStats, Zone};
use serde::Serialize;

/// What the host reads back after a tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostFrame {
    /// Tick that produced the frame.
    pub tick: u64,
    /// Simulated milliseconds at the end of the tick.
    pub now_ms: u64,
    /// Population counts.
    pub population: PopulationStats,
    /// Live agents.
    pub agents: Vec<AgentSnapshot>,
    /// Live animals.
    pub animals: Vec<AnimalSnapshot>,
}

/// Host-side inputs and the latest published frame.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    world_size: (f32, f32),
    pending_zones: Option<Vec<Zone>>,
    frame: HostFrame,
    frames_published: u64,
}

impl HostState {
    /// Host state for a world of the given size with no zones.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            world_size: (width, height),
            ..Self::default()
        }
    }

    /// World width and height.
    pub const fn world_size(&self) -> (f32, f32) {
        self.world_size
    }

    /// Replace the zone layout. Applied at the start of the next tick.
    pub fn set_zones(&mut self, zones: Vec<Zone>) {
        self.pending_zones = Some(zones);
    }

    /// Take a zone layout written since the last call.
    pub fn take_zones(&mut self) -> Option<Vec<Zone>> {
        self.pending_zones.take()
    }

    /// Store the frame for the tick that just finished.
    pub fn publish(&mut self, frame: HostFrame) {
        self.frame = frame;
        self.frames_published = self.frames_published.saturating_add(1);
    }

    /// The most recently published frame.
    pub const fn frame(&self) -> &HostFrame {
        &self.frame
    }

    /// Frames published so far.
    pub const fn frames_published(&self) -> u64 {
        self.frames_published
    }
}

#[cfg(test)]
mod tests {
    use habitat_types::{Position, ZoneId, ZoneKind};

    use super::*;

    #[test]
    fn zones_are_taken_once() {
        let mut host = HostState::new(10.0, 20.0);
        assert!(host.take_zones().is_none());
        host.set_zones(vec![Zone {
            id: ZoneId::new(),
            kind: ZoneKind::Well,
            center: Position::new(1.0, 1.0),
            radius: 2.0,
        }]);
        assert_eq!(host.take_zones().map(|z| z.len()), Some(1));
        assert!(host.take_zones().is_none());
        assert_eq!(host.world_size(), (10.0, 20.0));
    }

    #[test]
    fn publish_replaces_frame() {
        let mut host = HostState::new(10.0, 10.0);
        host.publish(HostFrame {
            tick: 3,
            ..HostFrame::default()
        });
        assert_eq!(host.frame().tick, 3);
        assert_eq!(host.frames_published(), 1);
    }

    #[test]
    fn frame_serializes_for_the_host() {
        let frame = HostFrame {
            tick: 7,
            now_ms: 7_000,
            ..HostFrame::default()
        };
        let json = serde_json::to_value(&frame).unwrap_or_default();
        assert_eq!(json["tick"], 7);
        assert_eq!(json["now_ms"], 7_000);
        assert!(json["agents"].as_array().is_some_and(Vec::is_empty));
    }
}
