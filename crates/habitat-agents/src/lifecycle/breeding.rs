//! Pair selection, reproduction gates, and child creation.

use std::collections::BTreeMap;

use habitat_events::SimEvent;
use habitat_types::{Agent, Appearance, EntityId, LifeStage, Position, Sex, Traits};
use rand::Rng;
use tracing::{debug, info, warn};

use super::{LifecycleEngine, LifecycleWorld};
use crate::error::AgentError;

const CHILD_NAMES: [&str; 16] = [
    "Ada", "Bram", "Cleo", "Dara", "Eli", "Fenn", "Greta", "Hale", "Ines", "Jory", "Kit", "Lior",
    "Mira", "Noor", "Oren", "Pia",
];

/// Average of two parent values plus a uniform mutation in
/// `[-range, range]`, clamped to `[0, 1]`.
fn inherit(a: f32, b: f32, range: f32, rng: &mut impl Rng) -> f32 {
    let mutation = if range > 0.0 {
        rng.random_range(-range..=range)
    } else {
        0.0
    };
    ((a + b) * 0.5 + mutation).clamp(0.0, 1.0)
}

/// Blend two parents' traits into a child's.
///
/// Named traits and extras both parents carry are averaged and mutated.
/// An extra only one parent carries is inherited unchanged.
pub fn blend_traits(a: &Traits, b: &Traits, mutation: f32, rng: &mut impl Rng) -> Traits {
    let mut named = [0.0; 5];
    for ((slot, x), y) in named.iter_mut().zip(a.named()).zip(b.named()) {
        *slot = inherit(x, y, mutation, rng);
    }

    let mut extra = BTreeMap::new();
    for (key, x) in &a.extra {
        let value = match b.extra.get(key) {
            Some(y) => inherit(*x, *y, mutation, rng),
            None => *x,
        };
        extra.insert(key.clone(), value);
    }
    for (key, y) in &b.extra {
        extra.entry(key.clone()).or_insert(*y);
    }
    Traits::from_named(named, extra)
}

/// Blend two parents' appearance into a child's.
pub fn blend_appearance(a: &Appearance, b: &Appearance, mutation: f32, rng: &mut impl Rng) -> Appearance {
    Appearance {
        skin_tone: inherit(a.skin_tone, b.skin_tone, mutation, rng),
        hair_tone: inherit(a.hair_tone, b.hair_tone, mutation, rng),
        height: inherit(a.height, b.height, mutation, rng),
    }
}

impl LifecycleEngine {
    /// Pick one random adult pair and try to breed them.
    pub(super) fn try_breed(&mut self, now_ms: u64, world: &mut LifecycleWorld<'_>) -> Option<EntityId> {
        let mothers = world.agents.ids_by_stage(LifeStage::Adult, Sex::Female);
        let fathers = world.agents.ids_by_stage(LifeStage::Adult, Sex::Male);
        if mothers.is_empty() || fathers.is_empty() {
            return None;
        }
        let mother = *mothers.get(self.rng.random_range(0..mothers.len()))?;
        let father = *fathers.get(self.rng.random_range(0..fathers.len()))?;

        if let Err(err) = self.check_pair(mother, father, now_ms, world) {
            debug!(%mother, %father, error = %err, "breeding pair rejected");
            return None;
        }

        world.events.emit(SimEvent::ReproductionAttempt { mother, father });
        self.pair_cooldowns
            .insert((mother, father), now_ms.saturating_add(self.config.pair_cooldown_ms));

        let chance = if self.config.success_chance.is_nan() {
            0.0
        } else {
            self.config.success_chance.clamp(0.0, 1.0)
        };
        if !self.rng.random_bool(chance) {
            debug!(%mother, %father, "breeding attempt failed");
            return None;
        }

        match self.spawn_child(mother, father, now_ms, world) {
            Ok(child) => Some(child),
            Err(err) => {
                warn!(%mother, %father, error = %err, "child could not be spawned");
                None
            }
        }
    }

    /// Check whether two agents may breed right now.
    pub fn check_pair(
        &self,
        mother: EntityId,
        father: EntityId,
        now_ms: u64,
        world: &LifecycleWorld<'_>,
    ) -> Result<(), AgentError> {
        let cooldown = self.pair_cooldowns.get(&(mother, father)).copied();
        if let Some(ready_at) = cooldown.filter(|at| *at > now_ms) {
            return Err(AgentError::ReproductionFailed {
                reason: format!("pair on cooldown for another {} ms", ready_at.saturating_sub(now_ms)),
            });
        }

        for parent in [mother, father] {
            let needs = world
                .needs
                .needs(parent)
                .ok_or(AgentError::AgentNotFound(parent))?;
            if needs.hunger < self.config.min_hunger {
                return Err(AgentError::ReproductionFailed {
                    reason: format!(
                        "{parent} hunger is {:.1}, needs at least {:.1}",
                        needs.hunger, self.config.min_hunger
                    ),
                });
            }
            if needs.energy < self.config.min_energy {
                return Err(AgentError::ReproductionFailed {
                    reason: format!(
                        "{parent} energy is {:.1}, needs at least {:.1}",
                        needs.energy, self.config.min_energy
                    ),
                });
            }
        }

        let population = world.agents.alive_count();
        if population >= self.config.population_cap {
            return Err(AgentError::ReproductionFailed {
                reason: format!("population cap reached: {population}/{}", self.config.population_cap),
            });
        }
        Ok(())
    }

    /// Create a child of two live agents and register it everywhere.
    pub fn spawn_child(
        &mut self,
        mother: EntityId,
        father: EntityId,
        now_ms: u64,
        world: &mut LifecycleWorld<'_>,
    ) -> Result<EntityId, AgentError> {
        let find = |id: EntityId| {
            world
                .agents
                .get(id)
                .filter(|a| a.alive)
                .cloned()
                .ok_or(AgentError::AgentNotFound(id))
        };
        let mom = find(mother)?;
        let dad = find(father)?;

        let traits = blend_traits(&mom.traits, &dad.traits, self.config.trait_mutation, &mut self.rng);
        let appearance = blend_appearance(
            &mom.appearance,
            &dad.appearance,
            self.config.appearance_mutation,
            &mut self.rng,
        );
        let reach = self.config.spawn_offset;
        let (dx, dy) = if reach > 0.0 {
            (
                self.rng.random_range(-reach..=reach),
                self.rng.random_range(-reach..=reach),
            )
        } else {
            (0.0, 0.0)
        };
        let (width, height) = world.bounds;
        let position = Position::new(mom.position.x + dx, mom.position.y + dy)
            .clamp_to(width.max(0.0), height.max(0.0));
        let sex = if self.rng.random_bool(0.5) { Sex::Female } else { Sex::Male };
        let name = CHILD_NAMES
            .get(self.rng.random_range(0..CHILD_NAMES.len()))
            .copied()
            .unwrap_or("Kit")
            .to_owned();
        let generation = mom.generation.max(dad.generation).saturating_add(1);

        let id = EntityId::new();
        let child = Agent {
            id,
            name,
            position,
            alive: true,
            sex,
            age_years: 0.0,
            life_stage: LifeStage::Child,
            generation,
            parent_a: Some(mother),
            parent_b: Some(father),
            traits,
            appearance,
            social_status: (mom.social_status + dad.social_status) * 0.5,
            immortal: false,
            died_at_ms: None,
            cause_of_death: None,
        };
        if !world.agents.register(child) {
            return Err(AgentError::ReproductionFailed {
                reason: format!("child id {id} already registered"),
            });
        }

        world.needs.register(id);
        if let Some(inventory) = world.ports.inventory.as_deref_mut() {
            inventory.open(id);
        }
        if let Some(movement) = world.ports.movement.as_deref_mut() {
            movement.register(id, position);
        }
        if let Some(genealogy) = world.ports.genealogy.as_deref_mut() {
            genealogy.record_birth(id, mother, father, generation);
        }
        if let Some(roles) = world.ports.roles.as_deref_mut() {
            roles.assign(id, LifeStage::Child);
        }

        world.events.emit(SimEvent::ReproductionSuccess {
            mother,
            father,
            child: id,
        });
        world.events.emit(SimEvent::AgentBorn {
            agent_id: id,
            mother,
            father,
            generation,
        });
        info!(agent_id = %id, %mother, %father, generation, now_ms, "agent born");
        Ok(id)
    }
}
