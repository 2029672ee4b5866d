//! Capabilities the engine borrows from its host.

use bevy::{math::DVec3, prelude::*};
use euclid::Angle;
use serde::{Deserialize, Serialize};

use super::TravelerState;
use crate::plugins::portal::{EntityId, PortalGeometry, PortalId, PortalIndex, WorldId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    ChangedWorld,
    Discarded,
}

/// Live entity storage, one partition per world.
pub trait WorldDirectory {
    fn has_world(&self, world: WorldId) -> bool;
    fn get(&self, world: WorldId, id: EntityId) -> bool;
    fn remove(&mut self, world: WorldId, id: EntityId, reason: RemovalReason);
    fn add(&mut self, world: WorldId, id: EntityId);
}

pub trait CrossingPolicy {
    fn can_cross(&self, traveler: &TravelerState, portal: &PortalGeometry) -> bool;
    fn is_interactable(&self, portal: &PortalGeometry, entity: EntityId) -> bool;
}

/// Lets every traveler through every portal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl CrossingPolicy for AllowAll {
    fn can_cross(&self, _traveler: &TravelerState, _portal: &PortalGeometry) -> bool {
        true
    }

    fn is_interactable(&self, _portal: &PortalGeometry, _entity: EntityId) -> bool {
        true
    }
}

/// Runs after a traveler has been rotated through a portal. May change orientation;
/// the engine restores the velocity afterwards.
pub trait OrientationHook {
    fn realign_orientation(&mut self, traveler: &mut TravelerState, portal: &PortalGeometry);
}

/// Puts a traveler that came out tilted back on its feet, keeping where it looks.
///
/// The look vector survives: its horizontal part becomes the body heading and its
/// vertical part becomes the pitch.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepUpright;

impl OrientationHook for KeepUpright {
    fn realign_orientation(&mut self, traveler: &mut TravelerState, _portal: &PortalGeometry) {
        const UPRIGHT_TOLERANCE: f64 = 0.001;

        if traveler.up().abs_diff_eq(DVec3::Y, UPRIGHT_TOLERANCE) {
            return;
        }
        let look = traveler.look_direction();
        let horizontal = DVec3::new(look.x, 0., look.z);
        traveler.orientation = if horizontal.length() > UPRIGHT_TOLERANCE {
            bevy::math::DQuat::from_rotation_y(f64::atan2(-horizontal.x, -horizontal.z))
        } else {
            bevy::math::DQuat::IDENTITY
        };
        traveler.pitch = Angle::radians(look.y.clamp(-1., 1.).asin());
    }
}

/// Render-side state bound to the observer's world.
pub trait RenderHook {
    /// Swap world-scoped caches (light maps, particle owners, ...) to `to`.
    fn rebind_world(&mut self, entity: EntityId, from: WorldId, to: WorldId);
    /// Called after every transition, before the next render pass.
    fn invalidate_render_state(&mut self);
}

/// Outbound message sent once per committed transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleportConfirmation {
    pub entity: EntityId,
    pub source_world: WorldId,
    pub pre_teleport_position: DVec3,
    pub portal: PortalId,
}

pub trait TransitionSink {
    fn send_confirmation(&mut self, confirmation: TeleportConfirmation);
}

/// Hooks that do nothing, for hosts without renderer or network.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl OrientationHook for Detached {
    fn realign_orientation(&mut self, _traveler: &mut TravelerState, _portal: &PortalGeometry) {}
}

impl RenderHook for Detached {
    fn rebind_world(&mut self, _entity: EntityId, _from: WorldId, _to: WorldId) {}

    fn invalidate_render_state(&mut self) {}
}

impl TransitionSink for Detached {
    fn send_confirmation(&mut self, confirmation: TeleportConfirmation) {
        debug!("Dropping teleport confirmation {:?}", confirmation);
    }
}

/// What the caller is currently doing on this side. World swaps are only legal
/// while `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Resource)]
pub enum PassPhase {
    #[default]
    Idle,
    Rendering,
    RedirectingMessages,
}

/// Collaborators threaded through one evaluation.
pub struct TeleportContext<'a> {
    pub phase: PassPhase,
    pub portals: &'a dyn PortalIndex,
    pub worlds: &'a mut dyn WorldDirectory,
    pub policy: &'a dyn CrossingPolicy,
    pub orientation: &'a mut dyn OrientationHook,
    pub render: &'a mut dyn RenderHook,
    pub network: &'a mut dyn TransitionSink,
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;
    use bevy::math::DQuat;

    use super::*;
    use crate::plugins::portal::{PortalShape, WorldId};

    fn any_portal() -> PortalGeometry {
        PortalGeometry::new(
            PortalId(1),
            WorldId(0),
            DVec3::ZERO,
            DVec3::X,
            DVec3::Y,
            PortalShape::rectangle(1., 1.),
        )
        .unwrap()
    }

    #[test]
    fn upright_traveler_is_left_alone() {
        let mut traveler = TravelerState::new(EntityId(1), WorldId(0), DVec3::ZERO);
        traveler.orientation = DQuat::from_rotation_y(1.2);
        let before = traveler.clone();
        KeepUpright.realign_orientation(&mut traveler, &any_portal());
        assert_eq!(traveler, before);
    }

    #[test]
    fn rolled_traveler_keeps_look_direction() {
        let mut traveler = TravelerState::new(EntityId(1), WorldId(0), DVec3::ZERO);
        // Rolled onto its side while facing slightly left
        traveler.orientation = DQuat::from_rotation_z(FRAC_PI_2) * DQuat::from_rotation_x(0.3);
        let look = traveler.look_direction();

        KeepUpright.realign_orientation(&mut traveler, &any_portal());

        assert!(traveler.up().abs_diff_eq(DVec3::Y, 1e-9));
        assert!(traveler.look_direction().abs_diff_eq(look, 1e-9));
        assert_abs_diff_eq!(traveler.pitch.radians, look.y.asin(), epsilon = 1e-12);
    }
}
