use std::collections::{HashMap, HashSet};

use bevy::{math::DVec3, prelude::*};
use bevy_rapier3d::prelude::{RapierContext, Velocity};
use euclid::Angle;

use crate::{
    config::TransitConfig,
    plugins::{
        portal::{EntityId, PortalGeometry, PortalIndex, PortalRegistry, WorldId},
        raycast::{cast_through_portals, NoSolids, PortalRayHit, RapierSolids, SolidQuery},
        teleport::{
            AllowAll, CrossingPolicy, KeepUpright, PassPhase, RemovalReason, RenderHook,
            TeleportConfirmation, TeleportContext, TeleportEngine, ThrottleState,
            TransitionRecord, TransitionSink, TravelerState, WorldDirectory,
        },
    },
};

#[derive(Debug, Default)]
pub struct PortalTransitPlugin {
    pub config: TransitConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, SystemLabel)]
pub enum TransitLabels {
    BeginTick,
    AdvanceAnimations,
    Evaluate,
    Raycast,
}

/// Entity tracked for portal crossings. Its `Transform` is the feet position; the
/// crossing test follows the eye, `eye_height` above it.
#[derive(Debug, Clone, Component)]
pub struct PortalTraveler {
    pub eye_height: f32,
    pub pitch: Angle<f64>,
    pub age: u64,
    pub throttle: ThrottleState,
    pub last_eye_pos: Option<DVec3>,
    pub last_tick_eye_pos: Option<DVec3>,
}

impl PortalTraveler {
    pub fn new(eye_height: f32) -> Self {
        PortalTraveler {
            eye_height,
            pitch: Angle::zero(),
            age: 0,
            throttle: ThrottleState::default(),
            last_eye_pos: None,
            last_tick_eye_pos: None,
        }
    }
}

/// World the entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct InWorld(pub WorldId);

/// Asks for a portal-aware cast along the entity's forward axis every update.
#[derive(Debug, Clone, Default, Component)]
pub struct PortalPointer {
    pub max_distance: f64,
    pub result: Option<PortalRayHit>,
}

/// The world simulated by the Rapier scene of this app.
#[derive(Debug, Clone, Copy, Default, Resource)]
pub struct SimulatedWorld(pub WorldId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInvalidated;

/// Entities known to live in each loaded world.
#[derive(Debug, Default, Resource)]
pub struct LoadedWorlds {
    worlds: HashMap<WorldId, HashSet<EntityId>>,
}

impl LoadedWorlds {
    pub fn load(&mut self, world: WorldId) {
        self.worlds.entry(world).or_default();
    }

    pub fn unload(&mut self, world: WorldId) -> Option<HashSet<EntityId>> {
        self.worlds.remove(&world)
    }

    pub fn entities(&self, world: WorldId) -> impl Iterator<Item = EntityId> + '_ {
        self.worlds.get(&world).into_iter().flatten().copied()
    }
}

impl WorldDirectory for LoadedWorlds {
    fn has_world(&self, world: WorldId) -> bool {
        self.worlds.contains_key(&world)
    }

    fn get(&self, world: WorldId, id: EntityId) -> bool {
        self.worlds
            .get(&world)
            .map_or(false, |entities| entities.contains(&id))
    }

    fn remove(&mut self, world: WorldId, id: EntityId, reason: RemovalReason) {
        if let Some(entities) = self.worlds.get_mut(&world) {
            if entities.remove(&id) {
                debug!("Removed {:?} from {:?} ({:?})", id, world, reason);
            }
        }
    }

    fn add(&mut self, world: WorldId, id: EntityId) {
        self.worlds.entry(world).or_default().insert(id);
    }
}

/// Collects what the engine wants to tell the rest of the app during one system run.
#[derive(Default)]
struct Outbox {
    confirmations: Vec<TeleportConfirmation>,
}

impl TransitionSink for Outbox {
    fn send_confirmation(&mut self, confirmation: TeleportConfirmation) {
        self.confirmations.push(confirmation);
    }
}

#[derive(Default)]
struct RenderState {
    invalidated: bool,
}

impl RenderHook for RenderState {
    fn rebind_world(&mut self, entity: EntityId, from: WorldId, to: WorldId) {
        debug!("Rebinding render state of {:?} from {:?} to {:?}", entity, from, to);
    }

    fn invalidate_render_state(&mut self) {
        self.invalidated = true;
    }
}

pub fn entity_id(entity: Entity) -> EntityId {
    EntityId(entity.to_bits())
}

impl Plugin for PortalTransitPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .insert_resource(TeleportEngine::new(self.config.clone()))
            .init_resource::<PortalRegistry>()
            .init_resource::<LoadedWorlds>()
            .init_resource::<PassPhase>()
            .init_resource::<SimulatedWorld>()
            .add_event::<TeleportConfirmation>()
            .add_event::<TransitionRecord>()
            .add_event::<RenderInvalidated>()
            .add_system_set(
                SystemSet::new()
                    .label(TransitLabels::BeginTick)
                    .with_system(begin_tick)
                    .with_system(register_travelers),
            )
            .add_system(
                advance_animations
                    .label(TransitLabels::AdvanceAnimations)
                    .after(TransitLabels::BeginTick),
            )
            .add_system(
                evaluate_travelers
                    .label(TransitLabels::Evaluate)
                    .after(TransitLabels::AdvanceAnimations),
            )
            .add_system(
                cast_pointers
                    .label(TransitLabels::Raycast)
                    .after(TransitLabels::Evaluate),
            );
    }
}

fn begin_tick(mut engine: ResMut<TeleportEngine>, mut travelers: Query<&mut PortalTraveler>) {
    engine.begin_tick();
    engine.begin_pass();
    for mut traveler in &mut travelers {
        traveler.age += 1;
    }
}

fn register_travelers(
    mut worlds: ResMut<LoadedWorlds>,
    travelers: Query<(Entity, &InWorld), Added<PortalTraveler>>,
) {
    for (entity, world) in &travelers {
        if !worlds.has_world(world.0) {
            warn!("Traveler {:?} spawned in unloaded world {:?}", entity, world.0);
        }
        worlds.add(world.0, entity_id(entity));
    }
}

fn advance_animations(engine: Res<TeleportEngine>, mut registry: ResMut<PortalRegistry>) {
    registry.advance_animations(engine.tick(), engine.generation());
}

/// Portal whose surface the eye is touching, if any.
fn touched_portal<'a>(
    registry: &'a PortalRegistry,
    world: WorldId,
    eye: DVec3,
) -> Option<&'a PortalGeometry> {
    const TOUCH_DISTANCE: f64 = 0.5;

    registry
        .nearby_portals(world, eye, TOUCH_DISTANCE)
        .into_iter()
        .map(|entry| entry.geometry)
        .find(|portal| {
            portal.signed_distance(eye).abs() < TOUCH_DISTANCE && portal.is_point_in_projection(eye)
        })
}

#[allow(clippy::too_many_arguments)]
fn evaluate_travelers(
    engine: Res<TeleportEngine>,
    registry: Res<PortalRegistry>,
    phase: Res<PassPhase>,
    mut worlds: ResMut<LoadedWorlds>,
    mut travelers: Query<(
        Entity,
        &mut PortalTraveler,
        &mut InWorld,
        &mut Transform,
        Option<&mut Velocity>,
    )>,
    mut confirmations: EventWriter<TeleportConfirmation>,
    mut transitions: EventWriter<TransitionRecord>,
    mut invalidations: EventWriter<RenderInvalidated>,
) {
    let mut outbox = Outbox::default();
    let mut render = RenderState::default();
    let mut orientation = KeepUpright;
    // Rapier velocities are per second, the engine works per tick
    let ticks_per_second = engine.config().ticks_per_second;

    for (entity, mut traveler, mut in_world, mut transform, velocity) in &mut travelers {
        let eye_offset = Vec3::Y * traveler.eye_height;
        let eye = (transform.translation + eye_offset).as_dvec3();

        let mut state = TravelerState::new(entity_id(entity), in_world.0, eye);
        state.last_tick_eye_pos = traveler.last_tick_eye_pos.unwrap_or(eye);
        state.velocity = velocity.as_ref().map_or(DVec3::ZERO, |velocity| {
            velocity.linvel.as_dvec3() / ticks_per_second
        });
        state.orientation = transform.rotation.as_f64();
        state.pitch = traveler.pitch;
        state.age = traveler.age;
        state.throttle = traveler.throttle;
        state.last_eye_pos = traveler.last_eye_pos;

        let touched = touched_portal(&registry, state.world, state.eye_pos);
        TeleportEngine::apply_motion_affinity(&mut state, touched);

        let mut ctx = TeleportContext {
            phase: *phase,
            portals: &*registry,
            worlds: &mut *worlds,
            policy: &AllowAll,
            orientation: &mut orientation,
            render: &mut render,
            network: &mut outbox,
        };
        match engine.track(&mut state, &mut ctx) {
            Ok(Some(record)) => transitions.send(record),
            Ok(None) => {}
            Err(err) => {
                error!("Portal evaluation of {:?} failed: {}", entity, err);
                if let Some(record) = err.committed() {
                    transitions.send(record.clone());
                }
            }
        }

        transform.translation = state.eye_pos.as_vec3() - eye_offset;
        transform.rotation = state.orientation.as_f32();
        if let Some(mut velocity) = velocity {
            velocity.linvel = (state.velocity * ticks_per_second).as_vec3();
        }
        if in_world.0 != state.world {
            in_world.0 = state.world;
        }
        traveler.pitch = state.pitch;
        traveler.throttle = state.throttle;
        traveler.last_eye_pos = state.last_eye_pos;
        traveler.last_tick_eye_pos = Some(state.eye_pos);
    }

    confirmations.send_batch(outbox.confirmations.drain(..));
    if render.invalidated {
        invalidations.send(RenderInvalidated);
    }
}

fn cast_pointers(
    engine: Res<TeleportEngine>,
    registry: Res<PortalRegistry>,
    simulated: Res<SimulatedWorld>,
    rapier: Option<Res<RapierContext>>,
    mut pointers: Query<(Entity, &mut PortalPointer, &InWorld, &GlobalTransform)>,
) {
    let rapier_solids = rapier.as_deref().map(|context| RapierSolids {
        context,
        world: simulated.0,
    });
    let solids: &dyn SolidQuery = match &rapier_solids {
        Some(solids) => solids,
        None => &NoSolids,
    };

    for (entity, mut pointer, world, transform) in &mut pointers {
        let id = entity_id(entity);
        let permitted = |portal: &PortalGeometry| AllowAll.is_interactable(portal, id);
        pointer.result = cast_through_portals(
            world.0,
            transform.translation().as_dvec3(),
            transform.forward().as_dvec3(),
            pointer.max_distance,
            &*registry,
            solids,
            &permitted,
            engine.config().raycast_chain_limit,
        );
    }
}
