//! Terrain lookups for grazing and drinking.
//!
//! The host owns the terrain; the engine only asks what kind of ground lies
//! under an animal.

use habitat_types::{Position, TerrainKind};

/// Terrain kind at a world position.
pub trait TerrainPort: Send + Sync {
    /// Terrain under `position`.
    fn terrain_at(&self, position: Position) -> TerrainKind;
}

/// The same terrain everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformTerrain(pub TerrainKind);

impl Default for UniformTerrain {
    fn default() -> Self {
        Self(TerrainKind::Grass)
    }
}

impl TerrainPort for UniformTerrain {
    fn terrain_at(&self, _position: Position) -> TerrainKind {
        self.0
    }
}

/// A base terrain with circular patches of other kinds laid over it.
/// Later patches win where they overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchTerrain {
    base: TerrainKind,
    patches: Vec<(Position, f32, TerrainKind)>,
}

impl PatchTerrain {
    /// Terrain that is `base` everywhere.
    pub const fn new(base: TerrainKind) -> Self {
        Self {
            base,
            patches: Vec::new(),
        }
    }

    /// Lay a patch of `kind` of the given radius over `center`.
    #[must_use]
    pub fn with_patch(mut self, center: Position, radius: f32, kind: TerrainKind) -> Self {
        self.patches.push((center, radius, kind));
        self
    }
}

impl TerrainPort for PatchTerrain {
    fn terrain_at(&self, position: Position) -> TerrainKind {
        self.patches
            .iter()
            .rev()
            .find(|(center, radius, _)| position.distance_sq(*center) <= radius * radius)
            .map_or(self.base, |(_, _, kind)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_patches_win() {
        let terrain = PatchTerrain::new(TerrainKind::Sand)
            .with_patch(Position::new(0.0, 0.0), 5.0, TerrainKind::Grass)
            .with_patch(Position::new(2.0, 0.0), 1.0, TerrainKind::Water);
        assert_eq!(terrain.terrain_at(Position::new(2.0, 0.5)), TerrainKind::Water);
        assert_eq!(terrain.terrain_at(Position::new(-3.0, 0.0)), TerrainKind::Grass);
        assert_eq!(terrain.terrain_at(Position::new(10.0, 0.0)), TerrainKind::Sand);
    }
}
