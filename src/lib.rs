#![allow(clippy::type_complexity)]

pub mod config;
pub mod plugins;
pub mod util;

pub mod prelude {
    pub use crate::config::{ConfigError, TransitConfig};
    pub use crate::plugins::{
        physics::PhysicsPlugin,
        portal::{
            AnimationDriver, EntityId, GeometryError, PortalGeometry, PortalId, PortalIndex,
            PortalRegistry, PortalShape, WorldId,
        },
        raycast::{
            can_reach, cast_through_portals, redirect_placement, BlockFace, HitKind, Placement,
            PortalRayHit, RayHit, Reacher, SolidQuery,
        },
        teleport::{
            PassPhase, TeleportConfirmation, TeleportContext, TeleportEngine, TeleportError,
            TransitionRecord, TravelerState,
        },
        transit::{
            InWorld, LoadedWorlds, PortalPointer, PortalTransitPlugin, PortalTraveler,
            RenderInvalidated, SimulatedWorld, TransitLabels,
        },
    };
}
