// Staff and system layout: the spatial reference frame for interpretation.
//
// Layout detection runs before interpretation and is consumed here as a
// fixed contract: every system knows its staves, every staff knows its
// interline (the vertical distance between two staff lines, the unit all
// geometric thresholds are expressed in) and can convert between page
// ordinates and staff-relative pitch positions.
//
// Pitch positions follow engraving convention: 0 on the middle line,
// positive downward, one unit per line-or-space step (so adjacent line and
// space differ by 1, adjacent lines by 2).

use crate::types::{StaffId, SystemId};
use quaver_geom::Point;
use serde::{Deserialize, Serialize};

/// One staff: a band of equally spaced horizontal lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    /// Number of lines (5 for standard staves, 1 for percussion).
    pub line_count: u32,
    /// Vertical distance between adjacent lines, in pixels.
    pub interline: f64,
    /// Ordinate of the top line.
    pub top: f64,
    /// Abscissa range covered by the staff.
    pub left: f64,
    pub right: f64,
}

impl Staff {
    /// Ordinate of the bottom line.
    pub fn bottom(&self) -> f64 {
        self.top + (self.line_count.saturating_sub(1)) as f64 * self.interline
    }

    /// Ordinate of the middle line (pitch position 0).
    pub fn mid_y(&self) -> f64 {
        (self.top + self.bottom()) / 2.0
    }

    /// Staff-relative pitch position of an ordinate: 0 on the middle line,
    /// positive downward, 1 per half interline.
    pub fn pitch_position(&self, y: f64) -> f64 {
        2.0 * (y - self.mid_y()) / self.interline
    }

    /// Ordinate of a pitch position.
    pub fn y_at_pitch(&self, pitch: f64) -> f64 {
        self.mid_y() + pitch * self.interline / 2.0
    }

    /// Vertical distance from a point to the staff band, 0 inside it.
    pub fn vertical_distance(&self, p: Point) -> f64 {
        if p.y < self.top {
            self.top - p.y
        } else if p.y > self.bottom() {
            p.y - self.bottom()
        } else {
            0.0
        }
    }
}

/// One system: the staves of a horizontal band of the page, in top-to-bottom
/// order. The interpretation graph for a system only ever consults its own
/// layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemLayout {
    pub id: SystemId,
    /// Staves in top-to-bottom order; `StaffId` values index this list.
    pub staves: Vec<Staff>,
}

impl SystemLayout {
    /// A single-staff system, the common case in tests and simple scores.
    pub fn single(id: SystemId, interline: f64, top: f64, left: f64, right: f64) -> Self {
        Self {
            id,
            staves: vec![Staff {
                id: StaffId(0),
                line_count: 5,
                interline,
                top,
                left,
                right,
            }],
        }
    }

    pub fn staff(&self, id: StaffId) -> &Staff {
        &self.staves[id.index()]
    }

    /// Staff closest to a point by vertical distance. Ties resolve to the
    /// upper staff, so repeated calls always agree.
    pub fn closest_staff(&self, p: Point) -> &Staff {
        let mut best = &self.staves[0];
        let mut best_distance = best.vertical_distance(p);
        for staff in &self.staves[1..] {
            let distance = staff.vertical_distance(p);
            if distance < best_distance {
                best = staff;
                best_distance = distance;
            }
        }
        best
    }

    /// Local interline value at a point (from the closest staff).
    pub fn interline_at(&self, p: Point) -> f64 {
        self.closest_staff(p).interline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> Staff {
        Staff {
            id: StaffId(0),
            line_count: 5,
            interline: 20.0,
            top: 100.0,
            left: 0.0,
            right: 1000.0,
        }
    }

    #[test]
    fn pitch_conversion_round_trips() {
        let s = staff();
        assert_eq!(s.bottom(), 180.0);
        assert_eq!(s.mid_y(), 140.0);
        assert_eq!(s.pitch_position(140.0), 0.0);
        // One line down = pitch +2.
        assert_eq!(s.pitch_position(160.0), 2.0);
        assert_eq!(s.y_at_pitch(-1.0), 130.0);
        let y = 147.5;
        assert!((s.y_at_pitch(s.pitch_position(y)) - y).abs() < 1e-9);
    }

    #[test]
    fn vertical_distance_zero_inside_band() {
        let s = staff();
        assert_eq!(s.vertical_distance(Point::new(0.0, 150.0)), 0.0);
        assert_eq!(s.vertical_distance(Point::new(0.0, 90.0)), 10.0);
        assert_eq!(s.vertical_distance(Point::new(0.0, 200.0)), 20.0);
    }

    #[test]
    fn closest_staff_prefers_upper_on_ties() {
        let mut layout = SystemLayout::single(SystemId(0), 20.0, 100.0, 0.0, 1000.0);
        layout.staves.push(Staff {
            id: StaffId(1),
            line_count: 5,
            interline: 16.0,
            top: 300.0,
            left: 0.0,
            right: 1000.0,
        });
        // Equidistant between staff 0 bottom (180) and staff 1 top (300).
        let midpoint = Point::new(0.0, 240.0);
        assert_eq!(layout.closest_staff(midpoint).id, StaffId(0));
        assert_eq!(layout.interline_at(Point::new(0.0, 310.0)), 16.0);
    }
}
