use bevy::{math::DVec3, prelude::*};

use super::{AnimatedPortalState, AnimationDriver, Generation, PortalGeometry, PortalId, WorldId};

/// A portal as seen by one evaluation: its resident geometry plus the animated
/// snapshots, when it moves.
#[derive(Debug, Clone, Copy)]
pub struct PortalEntry<'a> {
    pub geometry: &'a PortalGeometry,
    pub animation: Option<&'a AnimatedPortalState>,
}

/// Spatial lookup of portals, consumed by crossing detection and raycasts.
///
/// Enumeration order must be stable between calls: it breaks ties when two
/// candidates are equally close.
pub trait PortalIndex {
    /// Ordinary portals of `world` whose aperture comes within `radius` of `point`.
    fn nearby_portals(&self, world: WorldId, point: DVec3, radius: f64) -> Vec<PortalEntry<'_>>;

    /// Portals of `world` that ignore range limits.
    fn global_portals(&self, world: WorldId) -> Vec<PortalEntry<'_>>;

    fn portal(&self, id: PortalId) -> Option<PortalEntry<'_>>;
}

#[derive(Debug, Clone)]
struct RegisteredPortal {
    base: PortalGeometry,
    geometry: PortalGeometry,
    animation: Option<AnimatedPortalState>,
    driver: Option<AnimationDriver>,
    global: bool,
    registered_tick: u64,
}

/// In-memory [`PortalIndex`] owning every portal, grouped by world in insertion order.
#[derive(Debug, Default, Resource)]
pub struct PortalRegistry {
    portals: Vec<RegisteredPortal>,
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a static portal.
    pub fn insert(&mut self, geometry: PortalGeometry) {
        self.insert_with(geometry, None, false, 0);
    }

    pub fn insert_global(&mut self, geometry: PortalGeometry) {
        self.insert_with(geometry, None, true, 0);
    }

    /// Adds a portal moved every tick by `driver`, starting from `geometry` at `tick`.
    pub fn insert_animated(&mut self, geometry: PortalGeometry, driver: AnimationDriver, tick: u64) {
        self.insert_with(geometry, Some(driver), false, tick);
    }

    fn insert_with(
        &mut self,
        geometry: PortalGeometry,
        driver: Option<AnimationDriver>,
        global: bool,
        tick: u64,
    ) {
        let registered = RegisteredPortal {
            base: geometry.clone(),
            animation: driver
                .map(|_| AnimatedPortalState::new(geometry.clone(), tick, Generation::default())),
            geometry,
            driver,
            global,
            registered_tick: tick,
        };
        match self
            .portals
            .iter_mut()
            .find(|p| p.geometry.id == registered.geometry.id)
        {
            Some(existing) => *existing = registered,
            None => self.portals.push(registered),
        }
    }

    pub fn remove(&mut self, id: PortalId) -> Option<PortalGeometry> {
        let index = self.portals.iter().position(|p| p.geometry.id == id)?;
        Some(self.portals.remove(index).geometry)
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortalGeometry> {
        self.portals.iter().map(|p| &p.geometry)
    }

    /// Moves every animated portal to its pose for `tick` and tags the snapshot pair
    /// with `generation`. Call once per tick before any observer is evaluated.
    pub fn advance_animations(&mut self, tick: u64, generation: Generation) {
        for portal in self.portals.iter_mut() {
            if let (Some(driver), Some(animation)) = (portal.driver, portal.animation.as_mut()) {
                let elapsed = tick.saturating_sub(portal.registered_tick);
                let next = driver.sample(&portal.base, elapsed);
                animation.advance(next.clone(), tick, generation);
                portal.geometry = next;
            }
        }
    }

    fn entry(portal: &RegisteredPortal) -> PortalEntry<'_> {
        PortalEntry {
            geometry: &portal.geometry,
            animation: portal.animation.as_ref(),
        }
    }
}

impl PortalIndex for PortalRegistry {
    fn nearby_portals(&self, world: WorldId, point: DVec3, radius: f64) -> Vec<PortalEntry<'_>> {
        self.portals
            .iter()
            .filter(|p| !p.global && p.geometry.world == world)
            .filter(|p| {
                // Animated portals may sweep further than their current pose
                let sweep = p
                    .animation
                    .as_ref()
                    .map(|a| a.previous().geometry.origin.distance(p.geometry.origin))
                    .unwrap_or(0.);
                p.geometry.origin.distance(point) - p.geometry.bounding_radius() - sweep <= radius
            })
            .map(Self::entry)
            .collect()
    }

    fn global_portals(&self, world: WorldId) -> Vec<PortalEntry<'_>> {
        self.portals
            .iter()
            .filter(|p| p.global && p.geometry.world == world)
            .map(Self::entry)
            .collect()
    }

    fn portal(&self, id: PortalId) -> Option<PortalEntry<'_>> {
        self.portals
            .iter()
            .find(|p| p.geometry.id == id)
            .map(Self::entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::portal::PortalShape;

    fn portal_at(id: u64, world: u32, origin: DVec3) -> PortalGeometry {
        PortalGeometry::new(
            PortalId(id),
            WorldId(world),
            origin,
            DVec3::X,
            DVec3::Y,
            PortalShape::rectangle(2., 2.),
        )
        .unwrap()
    }

    #[test]
    fn nearby_respects_world_and_radius() {
        let mut registry = PortalRegistry::new();
        registry.insert(portal_at(1, 0, DVec3::new(5., 0., 0.)));
        registry.insert(portal_at(2, 0, DVec3::new(500., 0., 0.)));
        registry.insert(portal_at(3, 1, DVec3::ZERO));
        registry.insert_global(portal_at(4, 0, DVec3::new(9000., 0., 0.)));

        let ids: Vec<_> = registry
            .nearby_portals(WorldId(0), DVec3::ZERO, 10.)
            .iter()
            .map(|e| e.geometry.id)
            .collect();
        assert_eq!(ids, vec![PortalId(1)]);

        let globals = registry.global_portals(WorldId(0));
        assert_eq!(globals.len(), 1);
        assert_eq!(globals[0].geometry.id, PortalId(4));
    }

    #[test]
    fn insert_replaces_same_id_in_place() {
        let mut registry = PortalRegistry::new();
        registry.insert(portal_at(1, 0, DVec3::ZERO));
        registry.insert(portal_at(2, 0, DVec3::ZERO));
        registry.insert(portal_at(1, 0, DVec3::X));
        assert_eq!(registry.len(), 2);
        let first = registry.iter().next().unwrap();
        assert_eq!(first.id, PortalId(1));
        assert_eq!(first.origin, DVec3::X);
    }

    #[test]
    fn advancing_moves_animated_portals_only() {
        let mut registry = PortalRegistry::new();
        registry.insert(portal_at(1, 0, DVec3::ZERO));
        registry.insert_animated(
            portal_at(2, 0, DVec3::ZERO),
            AnimationDriver::Translate {
                velocity: DVec3::new(0., 0., 0.5),
            },
            10,
        );
        registry.advance_animations(12, Generation(5));

        let moved = registry.portal(PortalId(2)).unwrap();
        assert_eq!(moved.geometry.origin, DVec3::new(0., 0., 1.));
        let (start, end) = moved.animation.unwrap().pair_for(Generation(5)).unwrap();
        assert_eq!(start.origin, DVec3::ZERO);
        assert_eq!(end.origin, DVec3::new(0., 0., 1.));

        let still = registry.portal(PortalId(1)).unwrap();
        assert!(still.animation.is_none());
        assert_eq!(still.geometry.origin, DVec3::ZERO);
    }
}
