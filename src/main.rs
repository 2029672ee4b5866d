use std::{env, process, time::Duration};

use bevy::{app::ScheduleRunnerSettings, log::LogPlugin, prelude::*};
use bevy_rapier3d::prelude::*;
use portal_transit::{prelude::*, util::scenes};

fn main() {
    let config = match env::args().nth(1) {
        Some(path) => match TransitConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Could not load {}: {}", path, err);
                process::exit(1);
            }
        },
        None => TransitConfig::default(),
    };

    App::new()
        .insert_resource(ScheduleRunnerSettings::run_loop(Duration::from_secs_f64(
            1. / config.ticks_per_second,
        )))
        .add_plugins(MinimalPlugins)
        .add_plugin(LogPlugin::default())
        .add_plugin(TransformPlugin)
        .add_plugin(HierarchyPlugin)
        .add_plugin(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugin(PhysicsPlugin)
        .add_plugin(PortalTransitPlugin { config })
        .add_startup_system(scenes::setup_corridor)
        .add_system(scenes::walk.before(TransitLabels::BeginTick))
        .add_system(scenes::report.after(TransitLabels::Raycast))
        .add_system(scenes::stop_when_done)
        .run();
}
