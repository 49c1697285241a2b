//! Geometric consistency of circular interpolation blocks.
//!
//! Center-offset arcs are checked by comparing the start and end radii about
//! the programmed center. Radius-form arcs are checked against the chord
//! between start and end: no circle of radius `|R|` passes through two points
//! further apart than `2|R|`.
//!
//! The in-plane axes follow the active plane: X/Y with I/J under G17, Z/X
//! with K/I under G18, Y/Z with J/K under G19.

use crate::finding::{Finding, FindingCode};
use crate::modal::{ModalState, Plane};
use crate::tokenizer::ParsedLine;

/// In-plane coordinate words and center-offset words of one line.
struct PlaneWords {
    end: (Option<f64>, Option<f64>),
    offset: (Option<f64>, Option<f64>),
    names: (char, char),
}

fn plane_words(line: &ParsedLine, plane: Plane) -> PlaneWords {
    match plane {
        Plane::Xy => PlaneWords { end: (line.x, line.y), offset: (line.i, line.j), names: ('I', 'J') },
        Plane::Zx => PlaneWords { end: (line.z, line.x), offset: (line.k, line.i), names: ('K', 'I') },
        Plane::Yz => PlaneWords { end: (line.y, line.z), offset: (line.j, line.k), names: ('J', 'K') },
    }
}

/// False when the line gives no usable arc: no in-plane center offset and
/// no R, or an R of zero length.
pub fn has_arc_definition(line: &ParsedLine, plane: Plane, tolerance: f64) -> bool {
    let words = plane_words(line, plane);
    if words.offset.0.is_some() || words.offset.1.is_some() {
        return true;
    }
    line.r.is_some_and(|r| r.abs() > tolerance)
}

pub fn check_arc(
    line: &ParsedLine,
    before: &ModalState,
    after: &ModalState,
    tolerance: f64,
    out: &mut Vec<Finding>,
) {
    let Some(motion) = after.motion_block(line) else { return };
    if !motion.is_arc() {
        return;
    }

    let words = plane_words(line, after.plane);
    let has_center = words.offset.0.is_some() || words.offset.1.is_some();
    if !has_center && line.r.is_none() {
        out.push(Finding::new(
            line.line,
            FindingCode::ArcNoCenter,
            format!("arc needs {}/{} center offsets or an R radius", words.names.0, words.names.1),
        ));
        return;
    }

    let has_endpoint = words.end.0.is_some() || words.end.1.is_some();
    if !has_endpoint {
        out.push(Finding::new(
            line.line,
            FindingCode::ArcFullCircle,
            "arc has no endpoint and will cut a full circle",
        ));
    }

    if !has_center {
        if let Some(r) = line.r {
            if r.abs() <= tolerance {
                out.push(Finding::new(line.line, FindingCode::ArcZeroRadius, format!("arc radius R{r} is zero")));
                return;
            }
        }
    }

    let (Some(sx), Some(sy)) = before.position.in_plane(after.plane) else { return };
    let (Some(ex), Some(ey)) = after.position.in_plane(after.plane) else { return };

    if has_center {
        let cx = sx + words.offset.0.unwrap_or(0.0);
        let cy = sy + words.offset.1.unwrap_or(0.0);
        let start_radius = (sx - cx).hypot(sy - cy);
        if start_radius <= tolerance {
            out.push(Finding::new(
                line.line,
                FindingCode::ArcZeroRadius,
                format!("arc center ({cx:.4}, {cy:.4}) coincides with the start point"),
            ));
            return;
        }
        let end_radius = (ex - cx).hypot(ey - cy);
        if (start_radius - end_radius).abs() > tolerance {
            out.push(Finding::new(
                line.line,
                FindingCode::ArcRadiusMismatch,
                format!(
                    "start radius {start_radius:.4} differs from end radius {end_radius:.4} by {:.4}",
                    (start_radius - end_radius).abs()
                ),
            ));
        }
    } else if let Some(r) = line.r {
        if !has_endpoint {
            return;
        }
        let chord = (ex - sx).hypot(ey - sy);
        if r.abs() < chord / 2.0 - tolerance {
            out.push(Finding::new(
                line.line,
                FindingCode::ArcRadiusTooSmall,
                format!("R{r} is smaller than half the chord length {chord:.4}"),
            ));
        }
    }
}
