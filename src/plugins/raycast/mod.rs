//! Reach-limited interaction queries that continue through portals.

use bevy::{
    math::{DVec2, DVec3, IVec3},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::plugins::{
    portal::{PortalGeometry, PortalId, PortalIndex, WorldId},
    teleport::test_ray,
};

mod rapier;

pub use rapier::RapierSolids;

/// Distance the ray is pushed past a portal before continuing, so it does not
/// immediately hit the portal leading back.
const CONTINUATION_OFFSET: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitKind {
    Solid,
    Fluid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    pub world: WorldId,
    pub point: DVec3,
    pub normal: DVec3,
    /// Distance from the origin of the query that produced the hit.
    pub distance: f64,
    pub kind: HitKind,
}

/// Geometry a ray can stop on, queried one world at a time.
pub trait SolidQuery {
    fn cast_solid(
        &self,
        world: WorldId,
        origin: DVec3,
        direction: DVec3,
        max_distance: f64,
    ) -> Option<RayHit>;

    fn cast_fluid(
        &self,
        world: WorldId,
        origin: DVec3,
        direction: DVec3,
        max_distance: f64,
    ) -> Option<RayHit>;
}

/// Empty space everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSolids;

impl SolidQuery for NoSolids {
    fn cast_solid(&self, _: WorldId, _: DVec3, _: DVec3, _: f64) -> Option<RayHit> {
        None
    }

    fn cast_fluid(&self, _: WorldId, _: DVec3, _: DVec3, _: f64) -> Option<RayHit> {
        None
    }
}

/// A hit found behind one or more portals.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalRayHit {
    /// Last portal the ray went through.
    pub portal: PortalGeometry,
    /// Every portal crossed, in order.
    pub chain: Vec<PortalId>,
    pub hit: RayHit,
    /// Total path length, in units of the world the ray started in.
    pub traveled: f64,
}

/// Casts a ray that continues through every permitted portal it enters before hitting
/// anything, up to `chain_limit` portals.
///
/// The reach is shared by the whole path: each segment only gets what is left of
/// `max_distance`, converted through the scale of the portals crossed so far.
/// Returns `None` when no portal is crossed (a plain raycast answers that), when
/// nothing is hit within reach, or when the chain limit runs out.
#[allow(clippy::too_many_arguments)]
pub fn cast_through_portals(
    world: WorldId,
    origin: DVec3,
    direction: DVec3,
    max_distance: f64,
    portals: &dyn PortalIndex,
    solids: &dyn SolidQuery,
    permitted: &dyn Fn(&PortalGeometry) -> bool,
    chain_limit: usize,
) -> Option<PortalRayHit> {
    let mut direction = direction.try_normalize()?;
    if !origin.is_finite() || !(max_distance > 0.) {
        return None;
    }

    let mut world = world;
    let mut origin = origin;
    let mut remaining = max_distance;
    // Length of one starting-world unit in the current world
    let mut scale = 1.;
    let mut traveled = 0.;
    let mut last: Option<PortalGeometry> = None;
    let mut chain = Vec::new();

    loop {
        let blocking = nearest_hit(solids, world, origin, direction, remaining);
        let portal_reach = blocking.map_or(remaining, |hit| hit.distance);
        let entered = nearest_portal(portals, world, origin, direction, portal_reach, permitted)
            .filter(|(_, distance)| blocking.map_or(true, |hit| *distance < hit.distance));

        let (portal, distance) = match entered {
            Some(entered) => entered,
            None => {
                let portal = last?;
                let hit = blocking?;
                traveled += hit.distance / scale;
                return Some(PortalRayHit {
                    portal,
                    chain,
                    hit,
                    traveled,
                });
            }
        };

        if chain.len() >= chain_limit {
            debug!("Portal raycast gave up after {} portals", chain.len());
            return None;
        }

        let crossing = origin + direction * distance;
        let next_direction = portal.transform_direction(direction).try_normalize()?;
        traveled += (distance + CONTINUATION_OFFSET) / scale;
        remaining = (remaining - distance - CONTINUATION_OFFSET) * portal.scale;
        scale *= portal.scale;
        if remaining <= 0. {
            return None;
        }

        world = portal.dest_world;
        origin = portal.transform_point(crossing) + next_direction * CONTINUATION_OFFSET * portal.scale;
        direction = next_direction;
        chain.push(portal.id);
        last = Some(portal);
    }
}

/// Nearest of the solid and fluid hits. A fluid only wins when strictly closer.
fn nearest_hit(
    solids: &dyn SolidQuery,
    world: WorldId,
    origin: DVec3,
    direction: DVec3,
    max_distance: f64,
) -> Option<RayHit> {
    let solid = solids.cast_solid(world, origin, direction, max_distance);
    let fluid = solids.cast_fluid(world, origin, direction, max_distance);
    match (solid, fluid) {
        (Some(solid), Some(fluid)) if fluid.distance < solid.distance => Some(fluid),
        (Some(solid), _) => Some(solid),
        (None, fluid) => fluid,
    }
}

fn nearest_portal(
    portals: &dyn PortalIndex,
    world: WorldId,
    origin: DVec3,
    direction: DVec3,
    max_distance: f64,
    permitted: &dyn Fn(&PortalGeometry) -> bool,
) -> Option<(PortalGeometry, f64)> {
    let mut entries = portals.nearby_portals(world, origin, max_distance);
    entries.extend(portals.global_portals(world));

    entries
        .into_iter()
        .map(|entry| entry.geometry)
        .filter(|portal| permitted(*portal))
        .filter_map(|portal| {
            test_ray(portal, origin, direction, max_distance).map(|ray| (portal, ray.distance))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(portal, distance)| (portal.clone(), distance))
}

/// Who is trying to reach something, and how far they can.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reacher {
    pub world: WorldId,
    pub position: DVec3,
    /// Reach distance already multiplied by the reacher's own scale.
    pub reach: f64,
}

/// Server-side check of an interaction request: the target must be within reach
/// directly, or through a nearby interactable portal leading to the target's world.
pub fn can_reach(
    reacher: &Reacher,
    target_world: WorldId,
    target: DVec3,
    portals: &dyn PortalIndex,
    interactable: &dyn Fn(&PortalGeometry) -> bool,
    search_radius: f64,
) -> bool {
    let reach_squared = reacher.reach * reacher.reach;
    if reacher.world == target_world && reacher.position.distance_squared(target) < reach_squared {
        return true;
    }

    portals
        .nearby_portals(reacher.world, reacher.position, search_radius)
        .into_iter()
        .map(|entry| entry.geometry)
        .any(|portal| {
            portal.dest_world == target_world
                && interactable(portal)
                && portal.transform_point(reacher.position).distance_squared(target)
                    < reach_squared * portal.scale * portal.scale
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockFace {
    NegX,
    PosX,
    NegY,
    PosY,
    NegZ,
    PosZ,
}

impl BlockFace {
    pub fn normal(self) -> IVec3 {
        match self {
            BlockFace::NegX => IVec3::NEG_X,
            BlockFace::PosX => IVec3::X,
            BlockFace::NegY => IVec3::NEG_Y,
            BlockFace::PosY => IVec3::Y,
            BlockFace::NegZ => IVec3::NEG_Z,
            BlockFace::PosZ => IVec3::Z,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            BlockFace::NegX => BlockFace::PosX,
            BlockFace::PosX => BlockFace::NegX,
            BlockFace::NegY => BlockFace::PosY,
            BlockFace::PosY => BlockFace::NegY,
            BlockFace::NegZ => BlockFace::PosZ,
            BlockFace::PosZ => BlockFace::NegZ,
        }
    }
}

/// Face of a unit block targeted by a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub world: WorldId,
    pub block: IVec3,
    pub face: BlockFace,
}

/// Sends a placement against a block face that sits flush with a global portal to the
/// other side of that portal. Returns `None` when no global portal covers the face.
pub fn redirect_placement(placement: &Placement, portals: &dyn PortalIndex) -> Option<Placement> {
    const FACING_THRESHOLD: f64 = -0.9;
    const MAX_PLANE_DISTANCE: f64 = 0.6;
    const PAST_FACE: f64 = 0.501;

    let side = placement.face.normal().as_dvec3();
    let min = placement.block.as_dvec3();
    let center = min + DVec3::splat(0.5);

    let portal = portals
        .global_portals(placement.world)
        .into_iter()
        .map(|entry| entry.geometry)
        .find(|portal| {
            portal.normal().dot(side) < FACING_THRESHOLD
                && portal.signed_distance(center).abs() < MAX_PLANE_DISTANCE
                && block_in_projection(portal, min)
        })?;

    let target = portal.transform_point(center + side * PAST_FACE);
    Some(Placement {
        world: portal.dest_world,
        block: target.floor().as_ivec3(),
        face: placement.face.opposite(),
    })
}

fn block_in_projection(portal: &PortalGeometry, min: DVec3) -> bool {
    let mut lo = DVec2::splat(f64::INFINITY);
    let mut hi = DVec2::splat(f64::NEG_INFINITY);
    for corner in 0..8 {
        let offset = DVec3::new(
            (corner & 1) as f64,
            ((corner >> 1) & 1) as f64,
            ((corner >> 2) & 1) as f64,
        );
        let local = portal.local_xy(min + offset);
        lo = lo.min(local);
        hi = hi.max(local);
    }
    portal.shape.contains_box(lo, hi)
}
