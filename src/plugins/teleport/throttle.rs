/// Per-entity teleport rate limiting, in simulation ticks.
///
/// Only the transition executor and explicit `disable_for` calls write to it;
/// evaluations read it once, on entry, as a veto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleState {
    last_teleport_tick: Option<u64>,
    limit_tick: Option<u64>,
}

impl ThrottleState {
    /// Suppress teleportation until at least `now + ticks`. Never shortens an active
    /// cooldown.
    pub fn disable_for(&mut self, now: u64, ticks: u64) {
        let deadline = now.saturating_add(ticks);
        self.limit_tick = Some(self.limit_tick.map_or(deadline, |limit| limit.max(deadline)));
    }

    pub fn is_limited(&self, now: u64) -> bool {
        self.limit_tick.map_or(false, |limit| now <= limit)
    }

    /// Records a committed transition and starts its cooldown. Evaluations gate on
    /// the state from before their first commit, so the cooldown only applies to later
    /// evaluations.
    pub fn record_teleport(&mut self, now: u64, cooldown: u64) {
        self.last_teleport_tick = Some(now);
        if cooldown > 0 {
            self.disable_for(now, cooldown);
        }
    }

    pub fn last_teleport_tick(&self) -> Option<u64> {
        self.last_teleport_tick
    }

    pub fn limit_tick(&self) -> Option<u64> {
        self.limit_tick
    }

    /// True right after a teleport or while limited. Used to distrust position syncs.
    pub fn is_teleporting_frequently(&self, now: u64, window: u64) -> bool {
        let recent = self
            .last_teleport_tick
            .map_or(false, |last| now.saturating_sub(last) <= window);
        recent || self.is_limited(now)
    }
}
