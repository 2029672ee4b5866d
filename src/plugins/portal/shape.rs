use bevy::math::DVec2;
use serde::{Deserialize, Serialize};

use super::GeometryError;

/// Bounded aperture of a portal, expressed in portal-local (width axis, height axis)
/// coordinates centered on the portal origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalShape {
    Rectangle { half_width: f64, half_height: f64 },
    Ellipse { half_width: f64, half_height: f64 },
    /// Simple polygon, either winding order. Concave outlines are fine.
    Polygon { vertices: Vec<DVec2> },
}

impl PortalShape {
    pub fn rectangle(width: f64, height: f64) -> Self {
        PortalShape::Rectangle {
            half_width: width / 2.,
            half_height: height / 2.,
        }
    }

    pub fn ellipse(width: f64, height: f64) -> Self {
        PortalShape::Ellipse {
            half_width: width / 2.,
            half_height: height / 2.,
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            PortalShape::Rectangle {
                half_width,
                half_height,
            }
            | PortalShape::Ellipse {
                half_width,
                half_height,
            } => {
                if !(half_width.is_finite() && half_height.is_finite())
                    || *half_width <= 0.
                    || *half_height <= 0.
                {
                    return Err(GeometryError::EmptyShape);
                }
            }
            PortalShape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(GeometryError::InvalidPolygon(vertices.len()));
                }
                if vertices.iter().any(|v| !v.is_finite()) {
                    return Err(GeometryError::EmptyShape);
                }
            }
        }
        Ok(())
    }

    /// Point-in-shape test. Points on the boundary count as inside.
    pub fn contains(&self, local: DVec2) -> bool {
        if !local.is_finite() {
            return false;
        }
        match self {
            PortalShape::Rectangle {
                half_width,
                half_height,
            } => local.x.abs() <= *half_width && local.y.abs() <= *half_height,
            PortalShape::Ellipse {
                half_width,
                half_height,
            } => {
                let x = local.x / half_width;
                let y = local.y / half_height;
                x * x + y * y <= 1.
            }
            PortalShape::Polygon { vertices } => polygon_contains(vertices, local),
        }
    }

    /// True when every corner of the local box lies within the shape.
    pub fn contains_box(&self, min: DVec2, max: DVec2) -> bool {
        [
            min,
            DVec2::new(max.x, min.y),
            DVec2::new(min.x, max.y),
            max,
        ]
        .into_iter()
        .all(|corner| self.contains(corner))
    }

    /// Radius of the smallest origin-centered circle enclosing the shape.
    pub fn bounding_radius(&self) -> f64 {
        match self {
            PortalShape::Rectangle {
                half_width,
                half_height,
            } => DVec2::new(*half_width, *half_height).length(),
            PortalShape::Ellipse {
                half_width,
                half_height,
            } => half_width.max(*half_height),
            PortalShape::Polygon { vertices } => vertices
                .iter()
                .map(|v| v.length())
                .fold(0., f64::max),
        }
    }

    /// Blend two shapes. Matching rectangles and ellipses interpolate their extents,
    /// anything else snaps to the nearer endpoint.
    pub fn lerp(&self, other: &PortalShape, t: f64) -> PortalShape {
        match (self, other) {
            (
                PortalShape::Rectangle {
                    half_width: w0,
                    half_height: h0,
                },
                PortalShape::Rectangle {
                    half_width: w1,
                    half_height: h1,
                },
            ) => PortalShape::Rectangle {
                half_width: w0 + (w1 - w0) * t,
                half_height: h0 + (h1 - h0) * t,
            },
            (
                PortalShape::Ellipse {
                    half_width: w0,
                    half_height: h0,
                },
                PortalShape::Ellipse {
                    half_width: w1,
                    half_height: h1,
                },
            ) => PortalShape::Ellipse {
                half_width: w0 + (w1 - w0) * t,
                half_height: h0 + (h1 - h0) * t,
            },
            _ if t < 0.5 => self.clone(),
            _ => other.clone(),
        }
    }
}

fn polygon_contains(vertices: &[DVec2], p: DVec2) -> bool {
    const EDGE_TOLERANCE: f64 = 1e-12;

    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[j];

        // Boundary points are inside
        let edge = b - a;
        let to_p = p - a;
        let along = to_p.dot(edge);
        if edge.perp_dot(to_p).abs() <= EDGE_TOLERANCE * edge.length().max(1.)
            && along >= 0.
            && along <= edge.length_squared()
        {
            return true;
        }

        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
