use std::f64::consts::PI;

use bevy::{
    math::{DMat3, DQuat, DVec2, DVec3},
    prelude::*,
};

use super::{GeometryError, PortalId, PortalShape, WorldId};

/// Planar portal connecting a region of `world` to `dest_world`.
///
/// The portal frame is given by `orientation`: local X is the width axis, local Y the
/// height axis and local Z the normal. The normal points toward the entry side, so an
/// observer crosses the portal by moving from positive to negative signed distance.
///
/// Points map to the destination side with
/// `dest_origin + rotation * (p - origin) * scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalGeometry {
    pub id: PortalId,
    pub world: WorldId,
    pub origin: DVec3,
    pub orientation: DQuat,
    pub shape: PortalShape,
    pub scale: f64,
    pub dest_world: WorldId,
    pub dest_origin: DVec3,
    pub rotation: DQuat,
    /// Lets an observer occupy both sides at once (e.g. a portal over a floor).
    /// Flips the direction of the post-teleport nudge.
    pub overlapping_allowed: bool,
    /// Velocity gain applied while an observer touches the portal.
    pub motion_affinity: f64,
}

impl PortalGeometry {
    /// Build a portal from its in-plane axes. The normal is `axis_w x axis_h`.
    ///
    /// The destination defaults to the same world and location with an identity
    /// transform, see [`PortalGeometry::with_destination`].
    pub fn new(
        id: PortalId,
        world: WorldId,
        origin: DVec3,
        axis_w: DVec3,
        axis_h: DVec3,
        shape: PortalShape,
    ) -> Result<Self, GeometryError> {
        const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

        let axis_w = axis_w.try_normalize().ok_or(GeometryError::DegenerateAxes)?;
        let axis_h = axis_h.try_normalize().ok_or(GeometryError::DegenerateAxes)?;
        if axis_w.dot(axis_h).abs() > ORTHOGONALITY_TOLERANCE {
            return Err(GeometryError::DegenerateAxes);
        }
        let normal = axis_w.cross(axis_h);
        let orientation = DQuat::from_mat3(&DMat3::from_cols(axis_w, axis_h, normal)).normalize();

        let portal = PortalGeometry {
            id,
            world,
            origin,
            orientation,
            shape,
            scale: 1.,
            dest_world: world,
            dest_origin: origin,
            rotation: DQuat::IDENTITY,
            overlapping_allowed: false,
            motion_affinity: 0.,
        };
        portal.validate()?;
        Ok(portal)
    }

    /// Build the portal going from `entry` to `exit`, two portal-surface transforms whose
    /// forward direction points into the surface they sit on. Walking into the entry
    /// surface brings the observer out of the exit surface.
    pub fn linking(
        id: PortalId,
        world: WorldId,
        entry: &Transform,
        dest_world: WorldId,
        exit: &Transform,
        shape: PortalShape,
    ) -> Result<Self, GeometryError> {
        let entry_rotation = entry.rotation.as_f64();
        let exit_rotation = exit.rotation.as_f64();
        let flip = DQuat::from_rotation_y(PI);

        let portal = PortalGeometry {
            id,
            world,
            origin: entry.translation.as_dvec3(),
            orientation: entry_rotation.normalize(),
            shape,
            scale: f64::from(exit.scale.x) / f64::from(entry.scale.x),
            dest_world,
            dest_origin: exit.translation.as_dvec3(),
            rotation: (exit_rotation * flip * entry_rotation.inverse()).normalize(),
            overlapping_allowed: false,
            motion_affinity: 0.,
        };
        portal.validate()?;
        Ok(portal)
    }

    pub fn with_destination(
        mut self,
        dest_world: WorldId,
        dest_origin: DVec3,
        rotation: DQuat,
        scale: f64,
    ) -> Result<Self, GeometryError> {
        self.dest_world = dest_world;
        self.dest_origin = dest_origin;
        self.rotation = rotation;
        self.scale = scale;
        self.validate()?;
        Ok(self)
    }

    /// Checks the invariants the crossing math relies on: unit frames, a positive scale
    /// (so the transform stays invertible) and a non-empty aperture.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !(self.origin.is_finite()
            && self.dest_origin.is_finite()
            && self.orientation.is_finite()
            && self.rotation.is_finite())
        {
            return Err(GeometryError::NonFinite);
        }
        if !self.orientation.is_normalized() || !self.rotation.is_normalized() {
            return Err(GeometryError::DegenerateAxes);
        }
        if !self.scale.is_finite() || self.scale <= 0. {
            return Err(GeometryError::InvalidScale(self.scale));
        }
        self.shape.validate()
    }

    /// Cheap form of [`PortalGeometry::validate`] used on hot paths.
    pub fn is_degenerate(&self) -> bool {
        !(self.origin.is_finite()
            && self.orientation.is_finite()
            && self.orientation.is_normalized()
            && self.scale.is_finite()
            && self.scale > 0.)
    }

    pub fn normal(&self) -> DVec3 {
        self.orientation * DVec3::Z
    }

    pub fn axis_w(&self) -> DVec3 {
        self.orientation * DVec3::X
    }

    pub fn axis_h(&self) -> DVec3 {
        self.orientation * DVec3::Y
    }

    /// Direction an observer moves in after passing through the portal.
    pub fn content_direction(&self) -> DVec3 {
        -self.normal()
    }

    /// Same as [`PortalGeometry::content_direction`], seen from the destination side.
    pub fn dest_content_direction(&self) -> DVec3 {
        self.rotation * self.content_direction()
    }

    pub fn signed_distance(&self, point: DVec3) -> f64 {
        (point - self.origin).dot(self.normal())
    }

    pub fn to_local(&self, point: DVec3) -> DVec3 {
        self.orientation.inverse() * (point - self.origin)
    }

    pub fn from_local(&self, local: DVec3) -> DVec3 {
        self.origin + self.orientation * local
    }

    /// Position of the point projected on the portal plane, in shape coordinates.
    pub fn local_xy(&self, point: DVec3) -> DVec2 {
        self.to_local(point).truncate()
    }

    pub fn is_point_in_projection(&self, point: DVec3) -> bool {
        self.shape.contains(self.local_xy(point))
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.dest_origin + self.rotation * (point - self.origin) * self.scale
    }

    pub fn inverse_transform_point(&self, point: DVec3) -> DVec3 {
        self.origin + self.rotation.inverse() * (point - self.dest_origin) / self.scale
    }

    /// Maps a displacement or velocity. Lengths are multiplied by `scale`.
    pub fn transform_direction(&self, direction: DVec3) -> DVec3 {
        self.rotation * direction * self.scale
    }

    pub fn transform_rotation(&self, orientation: DQuat) -> DQuat {
        (self.rotation * orientation).normalize()
    }

    pub fn bounding_radius(&self) -> f64 {
        self.shape.bounding_radius()
    }

    /// Pose of a moving portal at `t` in `[0, 1]` between two snapshots. Positions
    /// interpolate linearly, rotations spherically. Identity and flags come from `start`.
    pub fn interpolate(start: &PortalGeometry, end: &PortalGeometry, t: f64) -> PortalGeometry {
        PortalGeometry {
            id: start.id,
            world: start.world,
            origin: start.origin.lerp(end.origin, t),
            orientation: start.orientation.slerp(end.orientation, t).normalize(),
            shape: start.shape.lerp(&end.shape, t),
            scale: start.scale + (end.scale - start.scale) * t,
            dest_world: start.dest_world,
            dest_origin: start.dest_origin.lerp(end.dest_origin, t),
            rotation: start.rotation.slerp(end.rotation, t).normalize(),
            overlapping_allowed: start.overlapping_allowed,
            motion_affinity: start.motion_affinity,
        }
    }
}
