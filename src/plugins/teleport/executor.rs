use bevy::{math::DVec3, prelude::*};

use super::{
    PassPhase, PortalPointVelocity, RemovalReason, TeleportConfirmation, TeleportContext,
    TeleportError, TeleportationCandidate, ThrottleState, TransitionRecord, TravelerState,
};
use crate::{config::TransitConfig, plugins::portal::{PortalGeometry, WorldId}};

/// Applies a selected candidate to the traveler.
///
/// `throttle` is the traveler's rate limit as it stood when the evaluation started, so
/// the cooldown set by the first crossing of a combo does not veto the next one.
/// Returns `Ok(None)` when it is limited: that is an expected veto and leaves
/// everything untouched. A world swap requested outside [`PassPhase::Idle`] is
/// refused before anything is written.
pub fn execute(
    traveler: &mut TravelerState,
    candidate: &TeleportationCandidate,
    throttle: &ThrottleState,
    tick: u64,
    pass: u64,
    ctx: &mut TeleportContext<'_>,
    config: &TransitConfig,
) -> Result<Option<TransitionRecord>, TeleportError> {
    let portal = &candidate.portal;

    if throttle.is_limited(tick) {
        debug!(
            "Teleportation of {:?} through {:?} rejected: throttled",
            traveler.id, portal.id
        );
        return Ok(None);
    }

    let from_world = traveler.world;
    if portal.dest_world != from_world {
        ensure_swap_allowed(traveler, ctx.phase)?;
    }
    let pre_teleport_position = traveler.last_tick_eye_pos;

    if portal.dest_world != from_world {
        swap_world(traveler, portal.dest_world, ctx);
    }

    // The orientation hook is not allowed to change the velocity
    let velocity = traveler.velocity;
    traveler.orientation = portal.transform_rotation(traveler.orientation);
    ctx.orientation.realign_orientation(traveler, portal);
    traveler.velocity = transform_velocity(portal, velocity, &candidate.point_velocity);

    // The vehicle stays straight below (or above) the rider, whatever the portal rotation
    let vehicle_drop = traveler
        .vehicle
        .as_ref()
        .map(|vehicle| (vehicle.position.y - traveler.eye_pos.y) * portal.scale);

    traveler.eye_pos = candidate.new_eye_pos;
    traveler.last_tick_eye_pos = candidate.new_last_tick_eye_pos;

    let mounted = traveler.vehicle.is_some();
    if let (Some(vehicle), Some(drop)) = (traveler.vehicle.as_mut(), vehicle_drop) {
        vehicle.position = traveler.eye_pos + DVec3::Y * drop;
        vehicle.velocity = transform_velocity(portal, vehicle.velocity, &candidate.point_velocity);
    }

    traveler
        .throttle
        .record_teleport(tick, config.teleport_cooldown_ticks);
    if mounted {
        traveler.throttle.disable_for(tick, config.vehicle_cooldown_ticks);
    }

    ctx.network.send_confirmation(TeleportConfirmation {
        entity: traveler.id,
        source_world: from_world,
        pre_teleport_position,
        portal: portal.id,
    });
    ctx.render.invalidate_render_state();

    let record = TransitionRecord {
        entity: traveler.id,
        portal: portal.id,
        from_world,
        to_world: traveler.world,
        tick,
        pass,
        dynamic: candidate.dynamic,
    };
    info!(
        "Teleported {:?} through portal {:?} tick: {} pass: {} dynamic: {}",
        record.entity, record.portal, record.tick, record.pass, record.dynamic
    );
    Ok(Some(record))
}

/// Maps a velocity through the portal, relative to the moving portal surface.
pub fn transform_velocity(
    portal: &PortalGeometry,
    velocity: DVec3,
    point_velocity: &PortalPointVelocity,
) -> DVec3 {
    portal.transform_direction(velocity - point_velocity.this_side) + point_velocity.other_side
}

pub(crate) fn ensure_swap_allowed(
    traveler: &TravelerState,
    phase: PassPhase,
) -> Result<(), TeleportError> {
    if phase == PassPhase::Idle {
        return Ok(());
    }
    error!(
        "World swap of {:?} requested during {:?}, refusing",
        traveler.id, phase
    );
    Err(TeleportError::PhaseViolation {
        entity: traveler.id,
        phase,
    })
}

/// Moves the traveler (and its vehicle) from its current world's directory to `to`
/// and rebinds world-scoped caches. Positions are left to the caller.
pub(crate) fn swap_world(traveler: &mut TravelerState, to: WorldId, ctx: &mut TeleportContext<'_>) {
    let from = traveler.world;

    ctx.worlds
        .remove(from, traveler.id, RemovalReason::ChangedWorld);
    if let Some(vehicle) = &traveler.vehicle {
        ctx.worlds.remove(from, vehicle.id, RemovalReason::ChangedWorld);
    }

    traveler.world = to;
    ctx.worlds.add(to, traveler.id);
    if let Some(vehicle) = &traveler.vehicle {
        ctx.worlds.add(to, vehicle.id);
    }
    ctx.render.rebind_world(traveler.id, from, to);

    info!(
        "Traveler {:?} changed world from {:?} to {:?}, age: {}",
        traveler.id, from, to, traveler.age
    );
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use bevy::math::DQuat;

    use super::*;
    use crate::plugins::portal::{PortalId, PortalShape};

    fn portal(rotation: DQuat, scale: f64) -> PortalGeometry {
        PortalGeometry::new(
            PortalId(1),
            WorldId(0),
            DVec3::ZERO,
            DVec3::X,
            DVec3::Y,
            PortalShape::rectangle(2., 2.),
        )
        .unwrap()
        .with_destination(WorldId(1), DVec3::new(50., 0., 0.), rotation, scale)
        .unwrap()
    }

    #[test]
    fn identity_portal_preserves_speed() {
        let v = DVec3::new(0.3, -1.2, -4.);
        let out = transform_velocity(
            &portal(DQuat::IDENTITY, 1.),
            v,
            &PortalPointVelocity::default(),
        );
        assert_abs_diff_eq!(out.length(), v.length(), epsilon = 1e-12);
    }

    #[test]
    fn rotation_and_scale_apply_to_velocity() {
        let out = transform_velocity(
            &portal(DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2), 2.),
            DVec3::new(0., 0., -1.),
            &PortalPointVelocity::default(),
        );
        assert!(out.abs_diff_eq(DVec3::new(-2., 0., 0.), 1e-12));
    }

    #[test]
    fn moving_surface_velocity_is_relative() {
        let point_velocity = PortalPointVelocity {
            this_side: DVec3::new(0., 0., 1.),
            other_side: DVec3::new(0., 0.5, 0.),
        };
        let out = transform_velocity(
            &portal(DQuat::IDENTITY, 1.),
            DVec3::new(0., 0., -1.),
            &point_velocity,
        );
        assert!(out.abs_diff_eq(DVec3::new(0., 0.5, -2.), 1e-12));
    }

    #[test]
    fn swap_outside_idle_is_refused() {
        let traveler = TravelerState::new(
            crate::plugins::portal::EntityId(4),
            WorldId(0),
            DVec3::ZERO,
        );
        assert!(ensure_swap_allowed(&traveler, PassPhase::Idle).is_ok());
        assert_eq!(
            ensure_swap_allowed(&traveler, PassPhase::Rendering),
            Err(TeleportError::PhaseViolation {
                entity: traveler.id,
                phase: PassPhase::Rendering
            })
        );
    }
}
