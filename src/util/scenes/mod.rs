use std::f32::consts::PI;

use bevy::{app::AppExit, prelude::*};
use bevy_rapier3d::prelude::*;

use crate::{
    config::TransitConfig,
    plugins::{
        physics::SOLID_GROUP,
        portal::{GeometryError, PortalGeometry, PortalId, PortalRegistry, PortalShape, WorldId},
        teleport::{TeleportEngine, TransitionRecord},
        transit::{InWorld, LoadedWorlds, PortalPointer, PortalTraveler},
    },
};

pub const OVERWORLD: WorldId = WorldId(0);
pub const UNDERWORLD: WorldId = WorldId(1);

const DEMO_TICKS: u64 = 260;

/// A door at z = -5 of the overworld opens at the origin of the underworld, offset by
/// 100 on X. A second door 10 further down the underworld leads back to z = -20 of the
/// overworld, so walking straight ahead makes a round trip.
pub fn corridor_portals() -> Result<Vec<PortalGeometry>, GeometryError> {
    let shape = PortalShape::rectangle(2., 3.);
    let facing_back = Quat::from_rotation_y(PI);

    let down = PortalGeometry::linking(
        PortalId(1),
        OVERWORLD,
        &Transform::from_xyz(0., 1.5, -5.),
        UNDERWORLD,
        &Transform::from_xyz(100., 1.5, 0.).with_rotation(facing_back),
        shape.clone(),
    )?;
    let up = PortalGeometry::linking(
        PortalId(2),
        UNDERWORLD,
        &Transform::from_xyz(100., 1.5, -10.),
        OVERWORLD,
        &Transform::from_xyz(0., 1.5, -20.).with_rotation(facing_back),
        shape,
    )?;
    Ok(vec![down, up])
}

pub fn setup_corridor(
    mut commands: Commands,
    mut registry: ResMut<PortalRegistry>,
    mut worlds: ResMut<LoadedWorlds>,
) {
    const WALL_THICKNESS: f32 = 1.;

    worlds.load(OVERWORLD);
    worlds.load(UNDERWORLD);
    match corridor_portals() {
        Ok(portals) => {
            for portal in portals {
                info!("Registering portal {:?} in {:?}", portal.id, portal.world);
                registry.insert(portal);
            }
        }
        Err(err) => error!("Could not build the corridor portals: {}", err),
    }

    // Dead end of the overworld corridor, past the exit of the second door
    commands.spawn((
        Name::from("Wall"),
        TransformBundle::from_transform(Transform::from_xyz(0., 1.5, -25. - WALL_THICKNESS / 2.)),
        RigidBody::Fixed,
        Collider::cuboid(5., 3., WALL_THICKNESS / 2.),
        CollisionGroups::new(SOLID_GROUP, Group::ALL),
    ));

    commands.spawn((
        Name::from("Walker"),
        TransformBundle::from_transform(Transform::from_xyz(0., 0., 5.)),
        Velocity::linear(Vec3::new(0., 0., -2.)),
        PortalTraveler::new(1.6),
        InWorld(OVERWORLD),
        PortalPointer {
            max_distance: 30.,
            result: None,
        },
    ));
}

/// Moves travelers along their velocity by one fixed tick, so the demo replays
/// identically. No collision response: the demo only needs straight paths.
pub fn walk(
    config: Res<TransitConfig>,
    mut travelers: Query<(&Velocity, &mut Transform), With<PortalTraveler>>,
) {
    let step = (1. / config.ticks_per_second) as f32;
    for (velocity, mut transform) in &mut travelers {
        transform.translation += velocity.linvel * step;
    }
}

pub fn report(
    mut transitions: EventReader<TransitionRecord>,
    pointers: Query<(&Name, &InWorld, &PortalPointer), Changed<InWorld>>,
) {
    for record in transitions.iter() {
        info!(
            "{:?} went from {:?} to {:?} through {:?} at tick {}",
            record.entity, record.from_world, record.to_world, record.portal, record.tick
        );
    }
    for (name, world, pointer) in &pointers {
        match &pointer.result {
            Some(hit) => info!(
                "{} in {:?} points at {:?} {} units away, through {:?}",
                name, world.0, hit.hit.kind, hit.traveled, hit.chain
            ),
            None => info!("{} in {:?} points at nothing through portals", name, world.0),
        }
    }
}

pub fn stop_when_done(engine: Res<TeleportEngine>, mut exit: EventWriter<AppExit>) {
    if engine.tick() >= DEMO_TICKS {
        info!("Demo finished after {} ticks", engine.tick());
        exit.send(AppExit);
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::DVec3;

    use super::*;

    #[test]
    fn corridor_doors_chain_into_a_round_trip() {
        let portals = corridor_portals().unwrap();
        let (down, up) = (&portals[0], &portals[1]);

        assert!(down.normal().abs_diff_eq(DVec3::Z, 1e-6));
        let arrival = down.transform_point(DVec3::new(0., 1.6, -5.));
        assert!(arrival.abs_diff_eq(DVec3::new(100., 1.6, 0.), 1e-5));
        assert!(down
            .transform_direction(DVec3::NEG_Z)
            .abs_diff_eq(DVec3::NEG_Z, 1e-6));

        let back = up.transform_point(DVec3::new(100., 1.6, -10.));
        assert!(back.abs_diff_eq(DVec3::new(0., 1.6, -20.), 1e-5));
    }
}
