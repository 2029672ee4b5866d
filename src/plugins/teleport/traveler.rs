use bevy::math::{DQuat, DVec3};
use euclid::Angle;

use super::ThrottleState;
use crate::plugins::portal::{EntityId, WorldId};

/// Entity ridden by a traveler. It crosses portals together with its rider.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: EntityId,
    pub position: DVec3,
    /// Displacement per tick.
    pub velocity: DVec3,
}

/// Everything the engine reads and writes on a tracked observer.
///
/// `orientation` is the body rotation and `pitch` the look angle above the horizon,
/// the way a first person controller splits them.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelerState {
    pub id: EntityId,
    pub world: WorldId,
    pub eye_pos: DVec3,
    pub last_tick_eye_pos: DVec3,
    /// Displacement per tick, the unit of [`PortalPointVelocity`](super::PortalPointVelocity).
    pub velocity: DVec3,
    pub orientation: DQuat,
    pub pitch: Angle<f64>,
    /// Ticks since the observer entered the simulation.
    pub age: u64,
    pub vehicle: Option<Vehicle>,
    pub throttle: ThrottleState,
    /// Eye position at the end of the previous evaluation, when known.
    pub last_eye_pos: Option<DVec3>,
}

impl TravelerState {
    pub fn new(id: EntityId, world: WorldId, eye_pos: DVec3) -> Self {
        TravelerState {
            id,
            world,
            eye_pos,
            last_tick_eye_pos: eye_pos,
            velocity: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            pitch: Angle::zero(),
            age: 0,
            vehicle: None,
            throttle: ThrottleState::default(),
            last_eye_pos: None,
        }
    }

    /// Look direction combining body rotation and pitch. Forward is -Z.
    pub fn look_direction(&self) -> DVec3 {
        self.orientation * DQuat::from_rotation_x(self.pitch.radians) * DVec3::NEG_Z
    }

    pub fn up(&self) -> DVec3 {
        self.orientation * DVec3::Y
    }
}
