//! Portal geometry: identities, apertures, the portal transform and animated snapshots.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod animation;
mod geometry;
mod registry;
mod shape;

pub use animation::{AnimatedPortalState, AnimationDriver, Generation, PortalSnapshot};
pub use geometry::PortalGeometry;
pub use registry::{PortalEntry, PortalIndex, PortalRegistry};
pub use shape::PortalShape;

/// Identifies an independently simulated world (dimension).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WorldId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortalId(pub u64);

/// Identity of a tracked entity inside a world directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("portal axes are degenerate or not orthogonal")]
    DegenerateAxes,
    #[error("portal scale must be finite and positive, got {0}")]
    InvalidScale(f64),
    #[error("portal shape has no area")]
    EmptyShape,
    #[error("portal polygon needs at least 3 vertices, got {0}")]
    InvalidPolygon(usize),
    #[error("portal position or rotation is not finite")]
    NonFinite,
}
