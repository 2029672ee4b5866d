use bevy::{math::DVec3, prelude::*};

use super::{
    collect_candidates, execute,
    executor::{ensure_swap_allowed, swap_world},
    select_nearest, TeleportContext, TeleportError, TransitionRecord, TravelerState,
};
use crate::{
    config::TransitConfig,
    plugins::portal::{Generation, PortalGeometry, WorldId},
};

/// Drives crossing detection for every tracked observer on one side.
///
/// The host calls [`TeleportEngine::begin_tick`] once per simulation tick and
/// [`TeleportEngine::begin_pass`] before each evaluation pass (ticks and frames alike).
/// Animated portals must be advanced with the new pass generation before the first
/// observer of that pass is evaluated.
#[derive(Debug, Clone, Resource)]
pub struct TeleportEngine {
    config: TransitConfig,
    tick: u64,
    pass: u64,
}

impl TeleportEngine {
    pub fn new(config: TransitConfig) -> Self {
        TeleportEngine {
            config,
            tick: 0,
            pass: 0,
        }
    }

    pub fn config(&self) -> &TransitConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn generation(&self) -> Generation {
        Generation(self.pass)
    }

    pub fn begin_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn begin_pass(&mut self) -> Generation {
        self.pass += 1;
        self.generation()
    }

    /// Checks the move `prev -> curr` of the traveler's eye against nearby portals and
    /// commits every crossing found, up to the combo limit. Returns the last transition.
    ///
    /// The rate limit is read once, as it stood before this call. After each commit
    /// the search restarts from the destination side of the crossing, pushed off the
    /// destination plane so the portal just used is not detected again.
    ///
    /// When a chained crossing is refused after an earlier one went through, the error
    /// is [`TeleportError::Interrupted`] and `last_eye_pos` is set to the start of the
    /// refused segment so a later evaluation picks it up again.
    pub fn evaluate(
        &self,
        traveler: &mut TravelerState,
        prev: DVec3,
        curr: DVec3,
        ctx: &mut TeleportContext<'_>,
    ) -> Result<Option<TransitionRecord>, TeleportError> {
        let throttle = traveler.throttle;
        if throttle.is_limited(self.tick) {
            debug!("Teleportation of {:?} is throttled", traveler.id);
            return Ok(None);
        }

        let generation = self.generation();
        let mut prev = prev;
        let mut curr = curr;
        let mut last: Option<TransitionRecord> = None;

        for combo in 0..self.config.combo_limit {
            let candidates = collect_candidates(
                traveler,
                prev,
                curr,
                ctx.portals,
                ctx.policy,
                &*ctx.worlds,
                generation,
                &self.config,
            );
            let candidate = match select_nearest(candidates, prev) {
                Some(candidate) => candidate,
                None => break,
            };
            let executed = execute(
                traveler,
                &candidate,
                &throttle,
                self.tick,
                self.pass,
                ctx,
                &self.config,
            );
            let record = match (executed, last.take()) {
                (Ok(Some(record)), _) => record,
                (Ok(None), previous) => {
                    last = previous;
                    break;
                }
                (Err(cause), Some(committed)) => {
                    traveler.last_eye_pos = Some(prev);
                    return Err(TeleportError::Interrupted {
                        committed: Box::new(committed),
                        cause: Box::new(cause),
                    });
                }
                (Err(cause), None) => return Err(cause),
            };
            if combo > 0 {
                info!("Traveler {:?} made a combo teleport", traveler.id);
            }

            prev = candidate.checkpoint
                + candidate.portal.dest_content_direction() * self.nudge(&candidate.portal);
            curr = candidate.new_frame_point;
            last = Some(record);
        }

        Ok(last)
    }

    /// Evaluates the move from the remembered eye position to the current one, then
    /// remembers the current one. The first call only records a position.
    ///
    /// A refused evaluation keeps the remembered position, so the crossing is detected
    /// again by the next call made in an allowed phase.
    pub fn track(
        &self,
        traveler: &mut TravelerState,
        ctx: &mut TeleportContext<'_>,
    ) -> Result<Option<TransitionRecord>, TeleportError> {
        let prev = match traveler.last_eye_pos {
            Some(prev) => prev,
            None => {
                traveler.last_eye_pos = Some(traveler.eye_pos);
                return Ok(None);
            }
        };
        let curr = traveler.eye_pos;
        let record = self.evaluate(traveler, prev, curr, ctx)?;
        traveler.last_eye_pos = Some(traveler.eye_pos);
        Ok(record)
    }

    /// Places the traveler's eye at `dest_point` in `dest_world` without any crossing
    /// detection. The vehicle keeps its offset to the rider.
    pub fn force_transition(
        &self,
        traveler: &mut TravelerState,
        dest_world: WorldId,
        dest_point: DVec3,
        ctx: &mut TeleportContext<'_>,
    ) -> Result<(), TeleportError> {
        info!(
            "Force teleporting {:?} to {:?} {}",
            traveler.id, dest_world, dest_point
        );
        if dest_world != traveler.world {
            ensure_swap_allowed(traveler, ctx.phase)?;
            if !ctx.worlds.has_world(dest_world) {
                return Err(TeleportError::UnknownWorld(dest_world));
            }
            swap_world(traveler, dest_world, ctx);
        }

        let offset = dest_point - traveler.eye_pos;
        traveler.eye_pos = dest_point;
        traveler.last_tick_eye_pos = dest_point;
        if let Some(vehicle) = traveler.vehicle.as_mut() {
            vehicle.position += offset;
        }

        traveler.last_eye_pos = None;
        traveler
            .throttle
            .disable_for(self.tick, self.config.forced_cooldown_ticks);
        ctx.render.invalidate_render_state();
        Ok(())
    }

    pub fn disable_for(&self, traveler: &mut TravelerState, ticks: u64) {
        traveler.throttle.disable_for(self.tick, ticks);
    }

    /// Session teardown: keep the traveler from teleporting against stale worlds.
    pub fn on_cleanup(&self, traveler: &mut TravelerState) {
        self.disable_for(traveler, self.config.cleanup_cooldown_ticks);
    }

    pub fn is_teleporting_frequently(&self, traveler: &TravelerState) -> bool {
        traveler
            .throttle
            .is_teleporting_frequently(self.tick, self.config.frequent_teleport_window)
    }

    /// Authoritative world/position from the remote side. Unless `force` is set it is
    /// ignored right after teleports and for freshly spawned travelers, whose local
    /// state is more recent. Returns whether a transition happened.
    pub fn accept_sync(
        &self,
        traveler: &mut TravelerState,
        world: WorldId,
        position: DVec3,
        force: bool,
        ctx: &mut TeleportContext<'_>,
    ) -> Result<bool, TeleportError> {
        if !force
            && (self.is_teleporting_frequently(traveler) || traveler.age < self.config.sync_grace_age)
        {
            debug!("Ignoring position sync for {:?}", traveler.id);
            return Ok(false);
        }
        if traveler.world == world {
            return Ok(false);
        }
        self.force_transition(traveler, world, position, ctx)?;
        Ok(true)
    }

    /// Speeds up (or, past a speed threshold, slows down) a traveler touching a portal
    /// with a motion affinity.
    pub fn apply_motion_affinity(traveler: &mut TravelerState, colliding: Option<&PortalGeometry>) {
        const NEGATIVE_AFFINITY_MIN_SPEED: f64 = 0.7;

        if let Some(portal) = colliding {
            let affinity = portal.motion_affinity;
            if affinity > 0.
                || (affinity < 0. && traveler.velocity.length() > NEGATIVE_AFFINITY_MIN_SPEED)
            {
                traveler.velocity *= 1. + affinity;
            }
        }
    }

    fn nudge(&self, portal: &PortalGeometry) -> f64 {
        if portal.overlapping_allowed {
            -self.config.plane_epsilon
        } else {
            self.config.plane_epsilon
        }
    }
}

impl Default for TeleportEngine {
    fn default() -> Self {
        TeleportEngine::new(TransitConfig::default())
    }
}
