use bevy::{
    ecs::event::Events,
    math::{DQuat, DVec3},
    prelude::*,
};
use bevy_rapier3d::prelude::Velocity;
use portal_transit::{
    plugins::teleport::{AllowAll, Detached, KeepUpright, WorldDirectory},
    prelude::*,
};

const W1: WorldId = WorldId(1);
const W2: WorldId = WorldId(2);

fn door(dest_origin: DVec3) -> PortalGeometry {
    PortalGeometry::new(
        PortalId(1),
        W1,
        DVec3::ZERO,
        DVec3::X,
        DVec3::Y,
        PortalShape::rectangle(4., 4.),
    )
    .unwrap()
    .with_destination(W2, dest_origin, DQuat::IDENTITY, 1.)
    .unwrap()
}

#[test]
fn walking_through_a_door_changes_world() {
    let mut registry = PortalRegistry::new();
    registry.insert(door(DVec3::new(100., 0., 0.)));
    let mut worlds = LoadedWorlds::default();
    worlds.load(W1);
    worlds.load(W2);
    worlds.add(W1, EntityId(1));

    let mut engine = TeleportEngine::default();
    engine.begin_tick();
    engine.begin_pass();

    let prev = DVec3::new(0., 0., 5.);
    let curr = DVec3::new(0., 0., -5.);
    let mut traveler = TravelerState::new(EntityId(1), W1, curr);
    traveler.last_tick_eye_pos = prev;

    let mut orientation = Detached;
    let mut render = Detached;
    let mut network = Detached;
    let mut ctx = TeleportContext {
        phase: PassPhase::Idle,
        portals: &registry,
        worlds: &mut worlds,
        policy: &AllowAll,
        orientation: &mut orientation,
        render: &mut render,
        network: &mut network,
    };
    let record = engine
        .evaluate(&mut traveler, prev, curr, &mut ctx)
        .unwrap()
        .expect("the door is crossed");

    assert_eq!(record.portal, PortalId(1));
    assert_eq!(traveler.world, W2);
    // Crossing at the origin lands on (100, 0, 0); the eye kept going 5 more units
    assert!(traveler.eye_pos.abs_diff_eq(DVec3::new(100., 0., -5.), 1e-9));
    assert_eq!(worlds.entities(W2).collect::<Vec<_>>(), vec![EntityId(1)]);
    assert!(!worlds.get(W1, EntityId(1)));
}

#[test]
fn sideways_door_keeps_traveler_upright() {
    let mut registry = PortalRegistry::new();
    // Walking into a wall door, coming out of a floor door with the body tilted forward
    registry.insert(
        door(DVec3::new(50., 0., 0.))
            .with_destination(
                W2,
                DVec3::new(50., 0., 0.),
                DQuat::from_rotation_x(-std::f64::consts::FRAC_PI_2),
                1.,
            )
            .unwrap(),
    );
    let mut worlds = LoadedWorlds::default();
    worlds.load(W1);
    worlds.load(W2);

    let engine = TeleportEngine::default();
    let prev = DVec3::new(0., 1., 1.);
    let curr = DVec3::new(0., 1., -1.);
    let mut traveler = TravelerState::new(EntityId(3), W1, curr);
    traveler.velocity = DVec3::new(0., 0., -3.);

    let mut orientation = KeepUpright;
    let mut render = Detached;
    let mut network = Detached;
    let mut ctx = TeleportContext {
        phase: PassPhase::Idle,
        portals: &registry,
        worlds: &mut worlds,
        policy: &AllowAll,
        orientation: &mut orientation,
        render: &mut render,
        network: &mut network,
    };
    engine
        .evaluate(&mut traveler, prev, curr, &mut ctx)
        .unwrap()
        .expect("crossing");

    assert!(traveler.up().abs_diff_eq(DVec3::Y, 1e-9));
    assert!(traveler.velocity.abs_diff_eq(DVec3::new(0., -3., 0.), 1e-9));
    assert!(traveler.look_direction().abs_diff_eq(DVec3::NEG_Y, 1e-9));
}

fn app_with_door() -> App {
    let mut app = App::new();
    app.add_plugin(PortalTransitPlugin::default());
    {
        let mut worlds = app.world.resource_mut::<LoadedWorlds>();
        worlds.load(W1);
        worlds.load(W2);
    }
    app.world
        .resource_mut::<PortalRegistry>()
        .insert(door(DVec3::new(100., 0., 0.)));
    app
}

#[test]
fn plugin_moves_traveler_entities() {
    let mut app = app_with_door();
    let walker = app
        .world
        .spawn((
            Transform::from_xyz(0., 0., 1.),
            GlobalTransform::default(),
            Velocity::linear(Vec3::new(0., 0., -2.)),
            PortalTraveler::new(0.),
            InWorld(W1),
        ))
        .id();

    app.update();
    assert_eq!(app.world.get::<InWorld>(walker), Some(&InWorld(W1)));

    app.world
        .get_mut::<Transform>(walker)
        .unwrap()
        .translation
        .z = -1.;
    app.update();

    assert_eq!(app.world.get::<InWorld>(walker), Some(&InWorld(W2)));
    let translation = app.world.get::<Transform>(walker).unwrap().translation;
    assert!(translation.abs_diff_eq(Vec3::new(100., 0., -1.), 1e-4));
    let velocity = app.world.get::<Velocity>(walker).unwrap().linvel;
    assert!(velocity.abs_diff_eq(Vec3::new(0., 0., -2.), 1e-4));

    let records = app.world.resource::<Events<TransitionRecord>>();
    let mut reader = records.get_reader();
    let records: Vec<_> = reader.iter(records).cloned().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_world, W2);

    let confirmations = app.world.resource::<Events<TeleportConfirmation>>();
    assert_eq!(confirmations.get_reader().iter(confirmations).count(), 1);
    assert!(app
        .world
        .resource::<LoadedWorlds>()
        .get(W2, portal_transit::plugins::transit::entity_id(walker)));
}

#[test]
fn plugin_refuses_swaps_while_rendering() {
    let mut app = app_with_door();
    *app.world.resource_mut::<PassPhase>() = PassPhase::Rendering;
    let walker = app
        .world
        .spawn((
            Transform::from_xyz(0., 0., 1.),
            GlobalTransform::default(),
            PortalTraveler::new(0.),
            InWorld(W1),
        ))
        .id();

    app.update();
    app.world
        .get_mut::<Transform>(walker)
        .unwrap()
        .translation
        .z = -1.;
    app.update();

    assert_eq!(app.world.get::<InWorld>(walker), Some(&InWorld(W1)));
    let translation = app.world.get::<Transform>(walker).unwrap().translation;
    assert!(translation.abs_diff_eq(Vec3::new(0., 0., -1.), 1e-6));
    let records = app.world.resource::<Events<TransitionRecord>>();
    assert_eq!(records.get_reader().iter(records).count(), 0);

    // The refused crossing goes through on the next idle update
    *app.world.resource_mut::<PassPhase>() = PassPhase::Idle;
    app.update();

    assert_eq!(app.world.get::<InWorld>(walker), Some(&InWorld(W2)));
    let translation = app.world.get::<Transform>(walker).unwrap().translation;
    assert!(translation.abs_diff_eq(Vec3::new(100., 0., -1.), 1e-4));
}

#[test]
fn sweeping_door_pushes_resting_traveler() {
    let mut app = App::new();
    app.add_plugin(PortalTransitPlugin::default());
    {
        let mut worlds = app.world.resource_mut::<LoadedWorlds>();
        worlds.load(W1);
        worlds.load(W2);
    }
    // The door moves one unit per tick towards the walker
    app.world.resource_mut::<PortalRegistry>().insert_animated(
        door(DVec3::new(100., 0., 0.)),
        AnimationDriver::Translate {
            velocity: DVec3::new(0., 0., 1.),
        },
        0,
    );
    let walker = app
        .world
        .spawn((
            Transform::from_xyz(0., 0., 1.5),
            GlobalTransform::default(),
            Velocity::zero(),
            PortalTraveler::new(0.),
            InWorld(W1),
        ))
        .id();

    app.update();
    assert_eq!(app.world.get::<InWorld>(walker), Some(&InWorld(W1)));
    app.update();
    assert_eq!(app.world.get::<InWorld>(walker), Some(&InWorld(W2)));

    // One unit per tick, reported per second
    let ticks_per_second = app.world.resource::<TransitConfig>().ticks_per_second as f32;
    let velocity = app.world.get::<Velocity>(walker).unwrap().linvel;
    assert!(velocity.abs_diff_eq(Vec3::new(0., 0., -ticks_per_second), 1e-3));
}
