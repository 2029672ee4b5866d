use bevy::{math::DVec3, prelude::*};

use super::{crossing::test_crossing, CrossingPolicy, TravelerState, WorldDirectory};
use crate::{
    config::TransitConfig,
    plugins::portal::{Generation, PortalEntry, PortalGeometry, PortalIndex},
};

/// Velocity of the crossing point on each side of a moving portal, per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortalPointVelocity {
    pub this_side: DVec3,
    pub other_side: DVec3,
}

/// A portal the observer went through during this evaluation, with the observer
/// state already mapped to the destination side.
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportationCandidate {
    /// Portal pose at the moment of crossing.
    pub portal: PortalGeometry,
    pub collision_point: DVec3,
    /// The collision point seen from the destination side.
    pub checkpoint: DVec3,
    pub new_eye_pos: DVec3,
    pub new_last_tick_eye_pos: DVec3,
    /// The evaluated segment end, mapped through the portal.
    pub new_frame_point: DVec3,
    pub point_velocity: PortalPointVelocity,
    pub dynamic: bool,
}

/// Runs the crossing test of `prev -> curr` against every permitted portal near the
/// observer and returns the successes in enumeration order.
///
/// Portals whose snapshot pair belongs to `generation` get the swept test, the rest
/// the static one. Portals leading to worlds the directory does not know are dropped.
#[allow(clippy::too_many_arguments)]
pub fn collect_candidates(
    traveler: &TravelerState,
    prev: DVec3,
    curr: DVec3,
    portals: &dyn PortalIndex,
    policy: &dyn CrossingPolicy,
    worlds: &dyn WorldDirectory,
    generation: Generation,
    config: &TransitConfig,
) -> Vec<TeleportationCandidate> {
    if prev.distance_squared(curr) > config.max_segment_length * config.max_segment_length {
        debug!(
            "Traveler {:?} moved too fast for crossing detection",
            traveler.id
        );
        return Vec::new();
    }

    let mut entries = portals.nearby_portals(traveler.world, curr, config.max_portal_radius);
    entries.extend(portals.global_portals(traveler.world));

    entries
        .into_iter()
        .filter(|entry| policy.can_cross(traveler, entry.geometry))
        .filter(|entry| {
            let known = worlds.has_world(entry.geometry.dest_world);
            if !known {
                debug!(
                    "Ignoring portal {:?}: destination {:?} is not loaded",
                    entry.geometry.id, entry.geometry.dest_world
                );
            }
            known
        })
        .filter_map(|entry| candidate_for(entry, traveler, prev, curr, generation))
        .collect()
}

fn candidate_for(
    entry: PortalEntry<'_>,
    traveler: &TravelerState,
    prev: DVec3,
    curr: DVec3,
    generation: Generation,
) -> Option<TeleportationCandidate> {
    match entry.animation.and_then(|a| a.pair_for(generation)) {
        Some((start, end)) => dynamic_candidate(start, end, traveler, prev, curr),
        None => static_candidate(entry.geometry, traveler, prev, curr),
    }
}

fn static_candidate(
    portal: &PortalGeometry,
    traveler: &TravelerState,
    prev: DVec3,
    curr: DVec3,
) -> Option<TeleportationCandidate> {
    let crossing = test_crossing(prev, curr, portal, None)?;
    Some(TeleportationCandidate {
        portal: portal.clone(),
        collision_point: crossing.point,
        checkpoint: portal.transform_point(crossing.point),
        new_eye_pos: portal.transform_point(traveler.eye_pos),
        new_last_tick_eye_pos: portal.transform_point(traveler.last_tick_eye_pos),
        new_frame_point: portal.transform_point(curr),
        point_velocity: PortalPointVelocity::default(),
        dynamic: false,
    })
}

fn dynamic_candidate(
    start: &PortalGeometry,
    end: &PortalGeometry,
    traveler: &TravelerState,
    prev: DVec3,
    curr: DVec3,
) -> Option<TeleportationCandidate> {
    let crossing = test_crossing(prev, curr, start, Some(end))?;
    let at = PortalGeometry::interpolate(start, end, crossing.t);

    // Follow the same portal-local point through the tick on both sides
    let local = crossing.local.extend(0.);
    let start_point = start.from_local(local);
    let end_point = end.from_local(local);
    let point_velocity = PortalPointVelocity {
        this_side: end_point - start_point,
        other_side: end.transform_point(end_point) - start.transform_point(start_point),
    };

    Some(TeleportationCandidate {
        checkpoint: at.transform_point(crossing.point),
        collision_point: crossing.point,
        new_eye_pos: end.transform_point(traveler.eye_pos),
        new_last_tick_eye_pos: start.transform_point(traveler.last_tick_eye_pos),
        new_frame_point: end.transform_point(curr),
        point_velocity,
        dynamic: true,
        portal: at,
    })
}

/// The candidate whose collision point is nearest to `prev`, i.e. the first plane
/// crossed. Ties go to the earliest enumerated candidate.
pub fn select_nearest(
    candidates: Vec<TeleportationCandidate>,
    prev: DVec3,
) -> Option<TeleportationCandidate> {
    candidates.into_iter().min_by(|a, b| {
        a.collision_point
            .distance_squared(prev)
            .total_cmp(&b.collision_point.distance_squared(prev))
    })
}
