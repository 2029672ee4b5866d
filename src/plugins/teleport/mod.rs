//! Crossing detection and world transitions for tracked observers.
//!
//! Each evaluation collects the portals the observer's eye went through, picks the
//! first one crossed and commits the transition. Up to `combo_limit` transitions can
//! be chained in one evaluation, e.g. through a short corridor between two portals.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod candidate;
mod crossing;
mod engine;
mod executor;
mod hooks;
mod throttle;
mod traveler;

pub use candidate::{collect_candidates, select_nearest, PortalPointVelocity, TeleportationCandidate};
pub use crossing::{test_crossing, test_ray, CrossingPoint, RayCrossing};
pub use engine::TeleportEngine;
pub use executor::{execute, transform_velocity};
pub use hooks::{
    AllowAll, CrossingPolicy, Detached, KeepUpright, OrientationHook, PassPhase, RemovalReason,
    RenderHook, TeleportConfirmation, TeleportContext, TransitionSink, WorldDirectory,
};
pub use throttle::ThrottleState;
pub use traveler::{TravelerState, Vehicle};

use crate::plugins::portal::{EntityId, PortalId, WorldId};

/// Summary of one committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub entity: EntityId,
    pub portal: PortalId,
    pub from_world: WorldId,
    pub to_world: WorldId,
    pub tick: u64,
    /// Evaluation pass counter at the time of the transition.
    pub pass: u64,
    pub dynamic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeleportError {
    /// The caller asked for a world swap while a render pass or message redirection
    /// was running on this side. This is a scheduling bug upstream.
    #[error("world swap of {entity:?} requested during {phase:?}")]
    PhaseViolation { entity: EntityId, phase: PassPhase },
    #[error("destination world {0:?} is not loaded")]
    UnknownWorld(WorldId),
    /// A chained crossing failed after earlier ones of the same evaluation were
    /// committed. `committed` is the last transition that went through.
    #[error("transition chain interrupted after {committed:?}: {cause}")]
    Interrupted {
        committed: Box<TransitionRecord>,
        cause: Box<TeleportError>,
    },
}

impl TeleportError {
    /// The transition already applied when the error was raised, if any.
    pub fn committed(&self) -> Option<&TransitionRecord> {
        match self {
            TeleportError::Interrupted { committed, .. } => Some(committed),
            _ => None,
        }
    }
}
