use bevy::math::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::PortalGeometry;

/// Evaluation pass counter. Snapshots tagged with a generation are only usable by the
/// evaluation pass carrying the same tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct PortalSnapshot {
    pub geometry: PortalGeometry,
    pub tick: u64,
}

/// Poses of a moving portal at the previous and current tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedPortalState {
    previous: PortalSnapshot,
    current: PortalSnapshot,
    generation: Generation,
}

impl AnimatedPortalState {
    pub fn new(geometry: PortalGeometry, tick: u64, generation: Generation) -> Self {
        let snapshot = PortalSnapshot { geometry, tick };
        AnimatedPortalState {
            previous: snapshot.clone(),
            current: snapshot,
            generation,
        }
    }

    /// Push the pose for a new tick. Must run once per tick, before any observer
    /// evaluates that tick.
    pub fn advance(&mut self, next: PortalGeometry, tick: u64, generation: Generation) {
        let current = std::mem::replace(
            &mut self.current,
            PortalSnapshot {
                geometry: next,
                tick,
            },
        );
        self.previous = current;
        self.generation = generation;
    }

    pub fn previous(&self) -> &PortalSnapshot {
        &self.previous
    }

    pub fn current(&self) -> &PortalSnapshot {
        &self.current
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Start and end poses for a swept test, if both were recorded for `generation`.
    /// A stale pair means the portal is handled as static.
    pub fn pair_for(&self, generation: Generation) -> Option<(&PortalGeometry, &PortalGeometry)> {
        if self.generation != generation || self.previous.tick == self.current.tick {
            return None;
        }
        Some((&self.previous.geometry, &self.current.geometry))
    }
}

/// Built-in per-tick motion for animated portals. The destination side stays put.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationDriver {
    /// Moves the portal origin by `velocity` every tick.
    Translate { velocity: DVec3 },
    /// Spins the portal about `axis` through its origin.
    Rotate { axis: DVec3, radians_per_tick: f64 },
    /// Moves back and forth along the portal normal.
    Oscillate {
        amplitude: f64,
        period_ticks: u64,
    },
}

impl AnimationDriver {
    /// Pose of `base` after `elapsed` ticks of motion.
    pub fn sample(&self, base: &PortalGeometry, elapsed: u64) -> PortalGeometry {
        let mut next = base.clone();
        let elapsed_f = elapsed as f64;
        match *self {
            AnimationDriver::Translate { velocity } => {
                next.origin = base.origin + velocity * elapsed_f;
            }
            AnimationDriver::Rotate {
                axis,
                radians_per_tick,
            } => {
                if let Some(axis) = axis.try_normalize() {
                    let spin = DQuat::from_axis_angle(axis, radians_per_tick * elapsed_f);
                    next.orientation = (spin * base.orientation).normalize();
                    // Keep the observer-facing mapping stable while the entry side spins
                    next.rotation = (base.rotation * spin.inverse()).normalize();
                }
            }
            AnimationDriver::Oscillate {
                amplitude,
                period_ticks,
            } => {
                let period = period_ticks.max(1) as f64;
                let phase = std::f64::consts::TAU * elapsed_f / period;
                next.origin = base.origin + base.normal() * amplitude * phase.sin();
            }
        }
        next
    }
}
