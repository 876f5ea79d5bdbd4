//! Collision routing
//!
//! Physics contacts become domain effects through a table of rules keyed by
//! the unordered pair of participant kinds. Rules are plain functions that
//! read the participants and emit mutations; the router applies them.
//!
//! Ordering and duplicates: events are handled in arrival order. Each
//! participant pair is handled at most once per tick, and an event whose
//! participants are no longer alive (removed by an earlier event this tick)
//! is skipped, so effects such as spawn-on-destroy fire exactly once.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use super::entity::{Entity, EntityId, EntityKind};
use super::physics::{CollisionEvent, Participant, PhysicsWorld};
use super::pool::{EntityPool, EntityTemplate};
use crate::error::{Result, SimError};

/// One side of a rule key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Kind(EntityKind),
    Boundary,
}

/// Unordered pair of sides, stored with the smaller side first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindPair(Side, Side);

impl KindPair {
    pub fn new(a: Side, b: Side) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }
}

/// A change requested by a rule
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    MarkForRemoval(EntityId),
    Spawn {
        template: EntityTemplate,
        position: Vec2,
        velocity: Vec2,
    },
    SetVelocity { id: EntityId, velocity: Vec2 },
}

/// What a rule sees of a contact
///
/// `first` and `second` follow the order the rule was registered with.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub first: &'a Entity,
    /// `None` when the other participant is the boundary
    pub second: Option<&'a Entity>,
    pub point: Vec2,
    pub normal_impulse: f32,
}

pub type Rule = fn(&Hit<'_>, &mut Vec<Mutation>);

#[derive(Debug, Clone, Copy)]
struct RuleEntry {
    /// Side the rule expects as `first`
    first: Side,
    rule: Rule,
}

/// Counters for one routing pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteReport {
    pub routed: u32,
    pub unmapped: u32,
    pub duplicates: u32,
    pub removed: Vec<EntityId>,
    pub spawned: Vec<EntityId>,
}

/// Static rule table for one scenario
#[derive(Debug, Clone, Default)]
pub struct CollisionRouter {
    rules: BTreeMap<KindPair, RuleEntry>,
}

impl CollisionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule for `first` touching `second` (in either order)
    pub fn with_rule(mut self, first: Side, second: Side, rule: Rule) -> Self {
        self.rules
            .insert(KindPair::new(first, second), RuleEntry { first, rule });
        self
    }

    pub fn has_rule(&self, a: Side, b: Side) -> bool {
        self.rules.contains_key(&KindPair::new(a, b))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Route one tick's collision events into pool mutations
    pub fn process<I>(
        &self,
        events: I,
        pool: &mut EntityPool,
        world: &mut PhysicsWorld,
    ) -> Result<RouteReport>
    where
        I: IntoIterator<Item = CollisionEvent>,
    {
        let mut report = RouteReport::default();
        let mut seen: BTreeSet<(Participant, Participant)> = BTreeSet::new();
        let mut mutations = Vec::new();

        for event in events {
            let a = Participant::Entity(event.entity_a);
            let pair_key = if a <= event.b { (a, event.b) } else { (event.b, a) };
            if !seen.insert(pair_key) {
                report.duplicates += 1;
                continue;
            }

            let Some(entity_a) = pool.get(event.entity_a).filter(|e| e.is_alive()) else {
                continue;
            };
            let entity_b = match event.b {
                Participant::Entity(id) => match pool.get(id).filter(|e| e.is_alive()) {
                    Some(e) => Some(e),
                    None => continue,
                },
                Participant::Boundary => None,
            };

            let side_a = Side::Kind(entity_a.kind);
            let side_b = entity_b.map_or(Side::Boundary, |e| Side::Kind(e.kind));
            let Some(entry) = self.rules.get(&KindPair::new(side_a, side_b)) else {
                report.unmapped += 1;
                continue;
            };

            let hit = match (entity_b, entry.first == side_a) {
                (Some(b), false) => Hit {
                    first: b,
                    second: Some(entity_a),
                    point: event.contact_point,
                    normal_impulse: event.normal_impulse,
                },
                // Boundary is never `first` when the other side is an entity kind
                _ => Hit {
                    first: entity_a,
                    second: entity_b,
                    point: event.contact_point,
                    normal_impulse: event.normal_impulse,
                },
            };

            mutations.clear();
            (entry.rule)(&hit, &mut mutations);
            report.routed += 1;
            for mutation in mutations.drain(..) {
                apply(mutation, pool, world, &mut report)?;
            }
        }

        if report.duplicates > 0 {
            log::debug!("Ignored {} duplicate contact reports", report.duplicates);
        }
        Ok(report)
    }
}

fn apply(
    mutation: Mutation,
    pool: &mut EntityPool,
    world: &mut PhysicsWorld,
    report: &mut RouteReport,
) -> Result<()> {
    match mutation {
        Mutation::MarkForRemoval(id) => {
            if pool.mark_for_removal(id)? {
                report.removed.push(id);
            }
        }
        Mutation::SetVelocity { id, velocity } => pool.set_velocity(world, id, velocity)?,
        Mutation::Spawn {
            template,
            position,
            velocity,
        } => match pool.spawn(world, &template, position, velocity) {
            Ok(id) => report.spawned.push(id),
            Err(SimError::CapacityExceeded { kind, .. }) => {
                log::debug!("Collision spawn of {kind:?} skipped: pool full");
            }
            Err(e) => return Err(e),
        },
    }
    Ok(())
}

/// Reusable rules
pub mod rules {
    use super::{Hit, Mutation};

    /// Remove the second participant
    pub fn remove_second(hit: &Hit<'_>, out: &mut Vec<Mutation>) {
        if let Some(e) = hit.second {
            out.push(Mutation::MarkForRemoval(e.id));
        }
    }
}
