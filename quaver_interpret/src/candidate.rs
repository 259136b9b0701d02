// Candidate interpretations: the nodes of the system graph.
//
// A candidate is one proposed reading of a page region as one symbol shape,
// with a confidence grade. Candidates are owned by their system graph and
// addressed by arena id; everything relational (edges, ensemble membership
// maintenance, abnormal bookkeeping) happens in `graph.rs` — this module
// owns the per-node state: shape, defining geometry with a lazily cached
// bounding box, grades, and the lifecycle flags.
//
// The bounds cache is transient: it is skipped by serde and rebuilt on
// first use after deserialization, and any geometry mutation clears it in
// the same call. Nothing outside this module can leave it stale.

use crate::config::GradeParams;
use crate::grade;
use crate::types::{CandidateId, Shape, StaffId, SystemId};
use quaver_geom::{HorizontalSide, LineSeg, Point, Rect};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// The defining geometry of a candidate, as delivered by detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// An explicit box (most compact symbols).
    Box(Rect),
    /// A median line plus thickness — stems, barlines, beams.
    Median { line: LineSeg, width: f64 },
    /// A point cloud (free-form symbols like slurs).
    Points(Vec<Point>),
}

impl Geometry {
    fn compute_bounds(&self) -> Rect {
        match self {
            Geometry::Box(r) => *r,
            Geometry::Median { line, width } => {
                let r = line.bounds();
                // Grow across the median's dominant axis only.
                if r.h >= r.w {
                    r.grown(width / 2.0, 0.0)
                } else {
                    r.grown(0.0, width / 2.0)
                }
            }
            Geometry::Points(points) => Rect::bounding(points).unwrap_or_default(),
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Geometry::Box(r) => *r = r.translated(dx, dy),
            Geometry::Median { line, .. } => {
                *line = LineSeg::new(line.p1.translated(dx, dy), line.p2.translated(dx, dy));
            }
            Geometry::Points(points) => {
                for p in points.iter_mut() {
                    *p = p.translated(dx, dy);
                }
            }
        }
    }
}

/// Cross-system continuation of a curve (a slur running past the system
/// break). Lives outside the graph: edges never span two systems.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalLink {
    /// Which end of this candidate continues elsewhere.
    pub side: HorizontalSide,
    pub system: SystemId,
    pub candidate: CandidateId,
}

/// One candidate interpretation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub shape: Shape,
    geometry: Geometry,
    #[serde(skip)]
    bounds_cache: Cell<Option<Rect>>,
    /// Classifier confidence after intrinsic scaling. Set once at
    /// construction; changed only through `increase`/`decrease`.
    intrinsic: f64,
    /// Derived from committed support relations; `None` until the graph
    /// first contextualizes this candidate.
    pub contextual: Option<f64>,
    /// Missing a mandatory partner. Maintained by the graph.
    pub abnormal: bool,
    /// Removed from its graph. A removed candidate is invisible to search.
    pub removed: bool,
    /// User-confirmed; immune to automatic purges.
    pub frozen: bool,
    pub staff: Option<StaffId>,
    /// Owning ensemble, if this candidate is a member of one.
    pub ensemble: Option<CandidateId>,
    /// Alternate reading of the same glyph in another voice (a shared head).
    pub mirror: Option<CandidateId>,
    pub external_link: Option<ExternalLink>,
}

impl Candidate {
    /// New detached candidate. `intrinsic` must already be scaled into
    /// [0, intrinsic_ratio]; out-of-range values are clamped to [0, 1].
    pub fn new(id: CandidateId, shape: Shape, geometry: Geometry, intrinsic: f64) -> Self {
        Self {
            id,
            shape,
            geometry,
            bounds_cache: Cell::new(None),
            intrinsic: grade::clamp(intrinsic),
            contextual: None,
            abnormal: false,
            removed: false,
            frozen: false,
            staff: None,
            ensemble: None,
            mirror: None,
            external_link: None,
        }
    }

    // -- geometry ----------------------------------------------------------

    /// Bounding box, computed on first use and cached until the next
    /// geometry mutation.
    pub fn bounds(&self) -> Rect {
        if let Some(cached) = self.bounds_cache.get() {
            return cached;
        }
        let computed = self.geometry.compute_bounds();
        self.bounds_cache.set(Some(computed));
        computed
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replace the defining geometry. Clears the bounds cache.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        self.bounds_cache.set(None);
    }

    /// Shift the candidate by (dx, dy). Clears the bounds cache.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.geometry.translate(dx, dy);
        self.bounds_cache.set(None);
    }

    /// Median line for vertical symbols (stems, barlines). Falls back to
    /// the vertical midline of the bounds for box-defined candidates.
    pub fn vertical_median(&self) -> LineSeg {
        match &self.geometry {
            Geometry::Median { line, .. } => *line,
            _ => {
                let b = self.bounds();
                LineSeg::new(
                    Point::new(b.center().x, b.top()),
                    Point::new(b.center().x, b.bottom()),
                )
            }
        }
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    // -- grades ------------------------------------------------------------

    pub fn intrinsic(&self) -> f64 {
        self.intrinsic
    }

    /// Contextual grade if computed, else intrinsic.
    pub fn best_grade(&self) -> f64 {
        self.contextual.unwrap_or(self.intrinsic)
    }

    /// Explicitly raise the intrinsic grade toward the intrinsic ceiling.
    pub fn increase(&mut self, ratio: f64, params: &GradeParams) {
        self.intrinsic = grade::increase(self.intrinsic, ratio, params);
    }

    /// Explicitly lower the intrinsic grade toward zero.
    pub fn decrease(&mut self, ratio: f64) {
        self.intrinsic = grade::decrease(self.intrinsic, ratio);
    }

    pub fn is_good(&self, params: &GradeParams) -> bool {
        self.intrinsic >= params.good_grade()
    }

    pub fn is_contextually_good(&self, params: &GradeParams) -> bool {
        self.best_grade() >= params.min_contextual_grade
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

// Manual PartialEq: the bounds cache is transient state and must not
// affect equality (a deserialized graph equals its source).
impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.shape == other.shape
            && self.geometry == other.geometry
            && self.intrinsic == other.intrinsic
            && self.contextual == other.contextual
            && self.abnormal == other.abnormal
            && self.removed == other.removed
            && self.frozen == other.frozen
            && self.staff == other.staff
            && self.ensemble == other.ensemble
            && self.mirror == other.mirror
            && self.external_link == other.external_link
    }
}
