use bevy::prelude::*;
use bevy_rapier3d::prelude::{Group, RapierConfiguration, TimestepMode};

use crate::config::TransitConfig;

/// Colliders portal rays stop on.
pub const SOLID_GROUP: Group = Group::GROUP_1;
/// Colliders portal rays stop on only when nothing solid is closer.
pub const FLUID_GROUP: Group = Group::GROUP_2;
pub const RAYCAST_GROUP: Group = Group::GROUP_3;

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_startup_system(configure_rapier);
    }
}

/// Caps the Rapier step at one transit tick, so bodies never move further per step
/// than the crossing engine sees per evaluation.
fn configure_rapier(
    rapier: Option<ResMut<RapierConfiguration>>,
    transit: Option<Res<TransitConfig>>,
) {
    let ticks_per_second = transit.map_or_else(
        || TransitConfig::default().ticks_per_second,
        |transit| transit.ticks_per_second,
    );
    if let Some(mut rapier) = rapier {
        rapier.timestep_mode = TimestepMode::Variable {
            max_dt: (1. / ticks_per_second) as f32,
            time_scale: 1.,
            substeps: 4,
        };
        debug!("Rapier steps capped at {} per second", ticks_per_second);
    }
}
