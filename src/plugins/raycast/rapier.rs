use bevy::{math::DVec3, prelude::*};
use bevy_rapier3d::prelude::{CollisionGroups, Group, InteractionGroups, QueryFilter, RapierContext};

use super::{HitKind, RayHit, SolidQuery};
use crate::plugins::{
    physics::{FLUID_GROUP, RAYCAST_GROUP, SOLID_GROUP},
    portal::WorldId,
};

/// [`SolidQuery`] over the Rapier scene, which simulates a single world.
pub struct RapierSolids<'a> {
    pub context: &'a RapierContext,
    pub world: WorldId,
}

impl RapierSolids<'_> {
    fn cast(
        &self,
        world: WorldId,
        origin: DVec3,
        direction: DVec3,
        max_distance: f64,
        group: Group,
        kind: HitKind,
    ) -> Option<RayHit> {
        if world != self.world {
            return None;
        }
        let (_, intersection) = self.context.cast_ray_and_get_normal(
            origin.as_vec3(),
            direction.as_vec3(),
            max_distance as f32,
            true,
            QueryFilter {
                groups: Some(InteractionGroups::from(CollisionGroups::new(RAYCAST_GROUP, group))),
                ..default()
            },
        )?;
        Some(RayHit {
            world,
            point: intersection.point.as_dvec3(),
            normal: intersection.normal.as_dvec3(),
            distance: f64::from(intersection.toi),
            kind,
        })
    }
}

impl SolidQuery for RapierSolids<'_> {
    fn cast_solid(
        &self,
        world: WorldId,
        origin: DVec3,
        direction: DVec3,
        max_distance: f64,
    ) -> Option<RayHit> {
        self.cast(world, origin, direction, max_distance, SOLID_GROUP, HitKind::Solid)
    }

    fn cast_fluid(
        &self,
        world: WorldId,
        origin: DVec3,
        direction: DVec3,
        max_distance: f64,
    ) -> Option<RayHit> {
        self.cast(world, origin, direction, max_distance, FLUID_GROUP, HitKind::Fluid)
    }
}
