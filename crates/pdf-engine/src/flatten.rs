//! Curve flattening into page-space polylines
//!
//! Quadratic and cubic segments are sampled at a fixed step of `t = 0.1`
//! rather than adaptively, so output size is predictable per command.

use doc_model::{CommandStream, PathError, PathSegment, Point};

/// Quadratics skip `t = 0`, giving this many samples
const QUAD_STEPS: usize = 10;
/// Cubics include both ends, giving one sample more than this
const CUBIC_STEPS: usize = 10;

pub type Polyline = Vec<Point>;

/// Placement of a path's local coordinates on a page
///
/// The path's smallest corner lands on `(left, top)` in screen convention;
/// the y axis is then flipped against `page_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlattenTransform {
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub page_height: f64,
}

impl FlattenTransform {
    pub fn identity() -> Self {
        Self { left: 0.0, top: 0.0, scale_x: 1.0, scale_y: 1.0, page_height: 0.0 }
    }

    fn validate(&self) -> Result<(), PathError> {
        let fields = [
            ("left", self.left),
            ("top", self.top),
            ("scale_x", self.scale_x),
            ("scale_y", self.scale_y),
            ("page_height", self.page_height),
        ];
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((field, _)) => Err(PathError::InvalidTransform { field: *field }),
            None => Ok(()),
        }
    }

    fn map(&self, point: Point, origin: Point) -> Point {
        Point::new(
            self.left + (point.x - origin.x) * self.scale_x,
            self.page_height - (self.top + (point.y - origin.y) * self.scale_y),
        )
    }
}

/// Expand a command stream into polylines of at least two points each
pub fn flatten(stream: &CommandStream, transform: &FlattenTransform) -> Result<Vec<Polyline>, PathError> {
    transform.validate()?;

    let Some(origin) = stream.min_point() else {
        return Ok(Vec::new());
    };
    let map = |point: Point| transform.map(point, origin);

    let mut polylines = Vec::new();
    let mut current: Polyline = Vec::new();

    for segment in stream.segments() {
        match segment {
            PathSegment::MoveTo(to) => {
                flush(&mut polylines, &mut current);
                current.push(map(to));
            }
            PathSegment::LineTo(to) => current.push(map(to)),
            PathSegment::QuadTo { ctrl, to } => {
                let ctrl = map(ctrl);
                let start = current.last().copied().unwrap_or(ctrl);
                let end = map(to);
                current.extend((1..=QUAD_STEPS).map(|i| {
                    quadratic(start, ctrl, end, i as f64 / QUAD_STEPS as f64)
                }));
            }
            PathSegment::CubicTo { ctrl1, ctrl2, to } => {
                let ctrl1 = map(ctrl1);
                let ctrl2 = map(ctrl2);
                let start = current.last().copied().unwrap_or(ctrl1);
                let end = map(to);
                current.extend((0..=CUBIC_STEPS).map(|i| {
                    cubic(start, ctrl1, ctrl2, end, i as f64 / CUBIC_STEPS as f64)
                }));
            }
            PathSegment::Close => {
                if let Some(first) = current.first().copied() {
                    current.push(first);
                }
            }
            PathSegment::Unsupported(_) => {}
        }
    }
    flush(&mut polylines, &mut current);

    Ok(polylines)
}

fn flush(polylines: &mut Vec<Polyline>, current: &mut Polyline) {
    let segment = std::mem::take(current);
    if segment.len() >= 2 {
        polylines.push(segment);
    }
}

fn quadratic(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
    let mt = 1.0 - t;
    let (a, b, c) = (mt * mt, 2.0 * mt * t, t * t);
    Point::new(a * p0.x + b * p1.x + c * p2.x, a * p0.y + b * p1.y + c * p2.y)
}

fn cubic(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let mt = 1.0 - t;
    let (a, b, c, d) = (mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t);
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}
