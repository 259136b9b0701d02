// Test-only system fixtures for end-to-end interpretation tests.
//
// Wraps a real `SystemGraph` and `SystemLayout` (from
// `quaver_interpret`) behind shape placement helpers, so scenario tests
// read as score fragments: a head here, its stem there, a barline with
// repeat dots at the measure end. All linking, grading, reduction and
// editing goes through the same code paths as a live recognition run —
// the only test-specific code is the placement arithmetic.
//
// Geometry convention: every helper takes top-left coordinates in pixels,
// on a single five-line staff with a 20 px interline (so a staff starting
// at `top` ends at `top + 80` and has its middle line at `top + 40`).
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use quaver_geom::{LineSeg, Point, Rect};
use quaver_interpret::candidate::Geometry;
use quaver_interpret::config::InterpretConfig;
use quaver_interpret::graph::SystemGraph;
use quaver_interpret::pipeline::{self, System};
use quaver_interpret::staff::SystemLayout;
use quaver_interpret::types::{CandidateId, Profile, Shape, SystemId};

/// Interline used by every fixture staff, in pixels.
pub const INTERLINE: f64 = 20.0;

/// Horizontal staff extent used by every fixture.
pub const STAFF_RIGHT: f64 = 1200.0;

/// One system under construction: a real layout and a real graph.
pub struct SystemFixture {
    pub layout: SystemLayout,
    pub graph: SystemGraph,
    pub staff_top: f64,
}

impl SystemFixture {
    /// A fixture system with one five-line staff starting at `staff_top`.
    pub fn new(id: u32, staff_top: f64) -> Self {
        let system = SystemId(id);
        Self {
            layout: SystemLayout::single(system, INTERLINE, staff_top, 0.0, STAFF_RIGHT),
            graph: SystemGraph::new(system),
            staff_top,
        }
    }

    /// Ordinate of the middle staff line.
    pub fn mid_line(&self) -> f64 {
        self.staff_top + 2.0 * INTERLINE
    }

    /// Any box-defined candidate, verbatim.
    pub fn boxed(&mut self, shape: Shape, rect: Rect, grade: f64) -> CandidateId {
        self.graph.insert(shape, Geometry::Box(rect), grade)
    }

    /// A black note head, 12 x 10 px.
    pub fn head(&mut self, x: f64, y: f64, grade: f64) -> CandidateId {
        self.boxed(Shape::NoteheadBlack, Rect::new(x, y, 12.0, 10.0), grade)
    }

    /// A vertical stem as a median line of width 2.
    pub fn stem(&mut self, x: f64, top: f64, bottom: f64) -> CandidateId {
        self.graph.insert(
            Shape::Stem,
            Geometry::Median {
                line: LineSeg::new(Point::new(x, top), Point::new(x, bottom)),
                width: 2.0,
            },
            0.6,
        )
    }

    /// A flag of the given shape, 12 x 18 px.
    pub fn flag(&mut self, shape: Shape, x: f64, y: f64) -> CandidateId {
        self.boxed(shape, Rect::new(x, y, 12.0, 18.0), 0.6)
    }

    /// A sharp sign, 8 x 22 px.
    pub fn sharp(&mut self, x: f64, y: f64) -> CandidateId {
        self.boxed(Shape::Sharp, Rect::new(x, y, 8.0, 22.0), 0.65)
    }

    /// A thin barline spanning the staff.
    pub fn barline(&mut self, x: f64) -> CandidateId {
        let top = self.staff_top;
        self.boxed(
            Shape::BarlineThin,
            Rect::new(x, top, 3.0, 4.0 * INTERLINE),
            0.8,
        )
    }

    /// A repeat dot, 6 x 6 px, centered on `center_y`.
    pub fn repeat_dot(&mut self, x: f64, center_y: f64) -> CandidateId {
        self.boxed(
            Shape::RepeatDot,
            Rect::new(x, center_y - 3.0, 6.0, 6.0),
            0.6,
        )
    }

    /// A slur, by bounding box.
    pub fn slur(&mut self, rect: Rect) -> CandidateId {
        self.boxed(Shape::Slur, rect, 0.7)
    }

    /// Run the full single-system pass (link, exclude, purge) in place.
    /// Returns the purged candidates.
    pub fn interpret(&mut self, config: &InterpretConfig, profile: Profile) -> Vec<CandidateId> {
        pipeline::interpret_system(&mut self.graph, &self.layout, config, profile)
    }

    pub fn into_system(self) -> System {
        System {
            layout: self.layout,
            graph: self.graph,
        }
    }
}

/// A complete measure cell: head, stem, flag, sharp, and a barline with a
/// repeat-dot pair, everything placed to link under the strict profile.
/// Returns ids in that order.
pub fn standard_measure(fix: &mut SystemFixture) -> [CandidateId; 7] {
    let top = fix.staff_top;
    let mid = fix.mid_line();
    let head = fix.head(100.0, top + 100.0, 0.7);
    let stem = fix.stem(113.0, top + 50.0, top + 109.0);
    let flag = fix.flag(Shape::FlagUp1, 113.0, top + 50.0);
    let sharp = fix.sharp(82.0, top + 97.0);
    let low_dot = fix.repeat_dot(288.0, mid + INTERLINE / 2.0);
    let high_dot = fix.repeat_dot(288.0, mid - INTERLINE / 2.0);
    let barline = fix.barline(300.0);
    [head, stem, flag, sharp, low_dot, high_dot, barline]
}
