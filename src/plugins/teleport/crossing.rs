use bevy::math::{DVec2, DVec3};

use crate::plugins::portal::PortalGeometry;

/// Where a swept point went through a portal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingPoint {
    /// Fraction of the segment (and of the portal motion) at the crossing.
    pub t: f64,
    /// World position of the crossing on the portal plane at `t`.
    pub point: DVec3,
    /// Crossing position in shape coordinates.
    pub local: DVec2,
}

/// Swept test of the segment `prev -> curr` against a portal.
///
/// With only `start` the portal is static and this is a plain segment/plane
/// intersection. With `end` the portal moves from `start` to `end` over the same
/// interval: both endpoints are expressed in the portal frame of their own instant,
/// which turns the moving plane into the fixed plane `z = 0` and the observer path
/// into a straight local segment.
///
/// Only front to back crossings count. Grazing paths that cross the plane outside the
/// aperture and degenerate input never produce a crossing.
pub fn test_crossing(
    prev: DVec3,
    curr: DVec3,
    start: &PortalGeometry,
    end: Option<&PortalGeometry>,
) -> Option<CrossingPoint> {
    if !prev.is_finite() || !curr.is_finite() || start.is_degenerate() {
        return None;
    }
    if let Some(end) = end {
        if end.is_degenerate() {
            return None;
        }
    }

    let local_prev = start.to_local(prev);
    let local_curr = end.unwrap_or(start).to_local(curr);
    if local_prev == local_curr {
        return None;
    }

    let t = plane_parameter(local_prev.z, local_curr.z)?;
    let local = local_prev.lerp(local_curr, t);

    match end {
        None => {
            if !start.shape.contains(local.truncate()) {
                return None;
            }
            Some(CrossingPoint {
                t,
                point: prev.lerp(curr, t),
                local: local.truncate(),
            })
        }
        Some(end) => {
            let at = PortalGeometry::interpolate(start, end, t);
            if !at.shape.contains(local.truncate()) {
                return None;
            }
            let on_plane = DVec3::new(local.x, local.y, 0.);
            Some(CrossingPoint {
                t,
                point: at.from_local(on_plane),
                local: local.truncate(),
            })
        }
    }
}

/// Parameter where a signed distance going from `d0` to `d1` reaches the plane, for a
/// front to back move only.
fn plane_parameter(d0: f64, d1: f64) -> Option<f64> {
    if !(d0 >= 0. && d1 < 0.) {
        return None;
    }
    let t = d0 / (d0 - d1);
    t.is_finite().then(|| t.clamp(0., 1.))
}

/// Portal struck by a ray, see [`test_ray`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCrossing {
    pub distance: f64,
    pub point: DVec3,
}

/// Ray cast against a static portal: `direction` must be unit length, hits beyond
/// `max_distance` are ignored.
pub fn test_ray(
    portal: &PortalGeometry,
    origin: DVec3,
    direction: DVec3,
    max_distance: f64,
) -> Option<RayCrossing> {
    if !(max_distance > 0.) {
        return None;
    }
    let crossing = test_crossing(origin, origin + direction * max_distance, portal, None)?;
    Some(RayCrossing {
        distance: crossing.t * max_distance,
        point: crossing.point,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use bevy::math::DQuat;
    use proptest::prelude::*;

    use super::*;
    use crate::plugins::portal::{PortalId, PortalShape, WorldId};

    fn floor_portal() -> PortalGeometry {
        PortalGeometry::new(
            PortalId(1),
            WorldId(0),
            DVec3::ZERO,
            DVec3::X,
            DVec3::Y,
            PortalShape::rectangle(4., 4.),
        )
        .unwrap()
    }

    #[test]
    fn straight_crossing_through_center() {
        let crossing = test_crossing(
            DVec3::new(0., 0., 5.),
            DVec3::new(0., 0., -5.),
            &floor_portal(),
            None,
        )
        .unwrap();
        assert_abs_diff_eq!(crossing.t, 0.5, epsilon = 1e-12);
        assert!(crossing.point.abs_diff_eq(DVec3::ZERO, 1e-12));
    }

    #[test]
    fn back_to_front_is_not_a_crossing() {
        let crossing = test_crossing(
            DVec3::new(0., 0., -5.),
            DVec3::new(0., 0., 5.),
            &floor_portal(),
            None,
        );
        assert!(crossing.is_none());
    }

    #[test]
    fn grazing_miss_is_rejected() {
        let crossing = test_crossing(
            DVec3::new(2.5, 0., 1.),
            DVec3::new(2.5, 0., -1.),
            &floor_portal(),
            None,
        );
        assert!(crossing.is_none());
    }

    #[test]
    fn degenerate_input_never_crosses() {
        let portal = floor_portal();
        let p = DVec3::new(0., 0., 1.);
        assert!(test_crossing(p, p, &portal, None).is_none());
        assert!(test_crossing(DVec3::NAN, p, &portal, None).is_none());

        let mut broken = portal.clone();
        broken.orientation = DQuat::from_xyzw(0., 0., 0., 0.);
        assert!(test_crossing(p, -p, &broken, None).is_none());

        let mut hollow = portal;
        hollow.shape = PortalShape::Polygon { vertices: vec![] };
        assert!(test_crossing(p, -p, &hollow, None).is_none());
    }

    #[test]
    fn landing_on_the_plane_does_not_cross_but_leaving_it_does() {
        let portal = floor_portal();
        assert!(test_crossing(DVec3::Z, DVec3::ZERO, &portal, None).is_none());
        let crossing = test_crossing(DVec3::ZERO, DVec3::NEG_Z, &portal, None).unwrap();
        assert_eq!(crossing.t, 0.);
    }

    #[test]
    fn portal_sweeping_over_a_resting_observer() {
        // Observer stands still at z = -0.5, the portal moves from z = 0 to z = -1.
        let start = floor_portal();
        let mut end = start.clone();
        end.origin = DVec3::new(0., 0., -1.);
        let observer = DVec3::new(0.5, 0.5, -0.5);

        assert!(test_crossing(observer, observer, &start, None).is_none());
        let crossing = test_crossing(observer, observer, &start, Some(&end));
        // The observer starts behind the portal, so the plane passing it is a back crossing
        assert!(crossing.is_none());

        let observer = DVec3::new(0.5, 0.5, 0.5);
        let mut end = start.clone();
        end.origin = DVec3::new(0., 0., 1.);
        let crossing = test_crossing(observer, observer, &start, Some(&end)).unwrap();
        assert_abs_diff_eq!(crossing.t, 0.5, epsilon = 1e-12);
        assert!(crossing.point.abs_diff_eq(observer, 1e-12));
    }

    #[test]
    fn moving_portal_grazing_miss() {
        let start = floor_portal();
        let mut end = start.clone();
        end.origin = DVec3::new(10., 0., 0.);
        // Static test would hit, but at t = 0.5 the aperture has moved away
        let crossing = test_crossing(
            DVec3::new(0., 0., 1.),
            DVec3::new(0., 0., -1.),
            &start,
            Some(&end),
        );
        assert!(crossing.is_none());
    }

    #[test]
    fn ray_distance_is_measured_along_direction() {
        let hit = test_ray(
            &floor_portal(),
            DVec3::new(1., 1., 3.),
            DVec3::NEG_Z,
            10.,
        )
        .unwrap();
        assert_abs_diff_eq!(hit.distance, 3., epsilon = 1e-12);
        assert!(test_ray(&floor_portal(), DVec3::new(1., 1., 3.), DVec3::NEG_Z, 2.).is_none());
    }

    proptest! {
        #[test]
        fn static_crossing_matches_analytic_intersection(
            x in -1.9f64..1.9,
            y in -1.9f64..1.9,
            dx in -3.0f64..3.0,
            dy in -3.0f64..3.0,
            above in 0.01f64..50.0,
            below in 0.01f64..50.0,
        ) {
            let portal = floor_portal();
            let hit = DVec3::new(x, y, 0.);
            let dir = DVec3::new(dx, dy, -1.);
            let prev = hit - dir * above;
            let curr = hit + dir * below;

            let crossing = test_crossing(prev, curr, &portal, None);
            prop_assert!(crossing.is_some());
            let crossing = crossing.unwrap();
            prop_assert!(crossing.point.distance(hit) < 1e-6);
        }

        #[test]
        fn one_sided_segments_never_cross(
            a in prop::array::uniform3(-20.0f64..20.0),
            b in prop::array::uniform3(-20.0f64..20.0),
            front in any::<bool>(),
        ) {
            let portal = floor_portal();
            let side = if front { 1. } else { -1. };
            let prev = DVec3::new(a[0], a[1], side * (a[2].abs() + 0.001));
            let curr = DVec3::new(b[0], b[1], side * (b[2].abs() + 0.001));
            prop_assert!(test_crossing(prev, curr, &portal, None).is_none());
        }
    }
}
