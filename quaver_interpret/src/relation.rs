// Typed relations: the edges of the interpretation graph.
//
// A relation is a directed, kind-tagged edge between two candidates. The
// geometric kinds carry the measured horizontal/vertical gaps (in interline
// fractions) and a grade derived from them; `Containment` (ensemble
// membership) and `Exclusion` (mutually incompatible readings) are
// structural and grade-free.
//
// Kind-specific geometry — which anchor points, which maxima — lives in the
// linker modules; this module only defines the edge payloads and the shared
// monotonic gap-to-grade function.

use quaver_geom::HorizontalSide;
use serde::{Deserialize, Serialize};

/// The closed set of relation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    /// Note head to its stem. Source = head, target = stem.
    HeadStem,
    /// Flag hanging on a stem end. Source = flag, target = stem.
    FlagStem,
    /// Beam or beam hook crossing a stem. Source = beam, target = stem.
    BeamStem,
    /// Accidental altering a head. Source = accidental, target = head.
    AccidHead,
    /// Arpeggiato sign left of a head chord. Source = sign, target = chord.
    ArpeggiatoChord,
    ArticulationChord,
    OrnamentChord,
    /// Grace note (or slashed grace) to the chord it ornaments.
    GraceChord,
    PluckingChord,
    TupletChord,
    PedalChord,
    DynamicsChord,
    /// Coda/segno marker to its barline.
    MarkerBarline,
    /// Repeat dot to its barline.
    RepeatDotBarline,
    /// Repeat dot to the sibling dot of the pair.
    RepeatDotPair,
    /// Measure-count number above a multiple rest.
    MeasureCountRest,
    /// Head chord to its stem (committed when the chord adopts the stem its
    /// member heads agree on).
    ChordStem,
    /// Ensemble membership: source = ensemble, target = member.
    Containment,
    /// Incompatible readings of overlapping page area. Stored directed
    /// (lower id to higher id) but symmetric in meaning.
    Exclusion,
}

impl RelationKind {
    /// True for kinds that participate in contextual-grade propagation.
    pub fn is_support(self) -> bool {
        !matches!(self, RelationKind::Containment | RelationKind::Exclusion)
    }

    /// Kinds with no inherent direction. The graph stores them lowest id
    /// first so the same pair never yields two edges.
    pub fn is_symmetric(self) -> bool {
        matches!(self, RelationKind::Exclusion | RelationKind::RepeatDotPair)
    }
}

/// Measured gaps between the two anchor points of a relation, as
/// non-negative interline fractions.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct GapPair {
    pub dx: f64,
    pub dy: f64,
}

impl GapPair {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self {
            dx: dx.abs(),
            dy: dy.abs(),
        }
    }
}

/// Shared gap-to-grade function: the product of the normalized slacks on
/// each axis.
///
/// 1.0 at zero gap, 0.0 at (or beyond) either maximum, strictly decreasing
/// in each gap in between. Axes with a non-positive maximum contribute no
/// slack and force 0.
pub fn gap_grade(gaps: GapPair, dx_max: f64, dy_max: f64) -> f64 {
    if dx_max <= 0.0 || dy_max <= 0.0 {
        return 0.0;
    }
    let x_slack = (1.0 - gaps.dx / dx_max).max(0.0);
    let y_slack = (1.0 - gaps.dy / dy_max).max(0.0);
    x_slack * y_slack
}

/// Which portion of a stem an attachment sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StemPortion {
    Top,
    Middle,
    Bottom,
}

/// Kind-specific payload beyond gaps and grade.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum RelationExtra {
    #[default]
    None,
    /// HeadStem: which side of the head the stem runs on, and where on the
    /// stem the head sits. Drives stem-direction inference.
    HeadStem {
        head_side: HorizontalSide,
        portion: StemPortion,
    },
}

/// A committed (or proposed) edge payload. Endpoints live in the graph's
/// edge record, not here, so one `Relation` can travel inside a `Link`
/// before commitment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub gaps: GapPair,
    pub grade: f64,
    pub extra: RelationExtra,
}

impl Relation {
    /// A geometric support relation.
    pub fn support(kind: RelationKind, gaps: GapPair, grade: f64) -> Self {
        debug_assert!(kind.is_support());
        Self {
            kind,
            gaps,
            grade,
            extra: RelationExtra::None,
        }
    }

    /// A head-stem relation with its side/portion payload.
    pub fn head_stem(
        gaps: GapPair,
        grade: f64,
        head_side: HorizontalSide,
        portion: StemPortion,
    ) -> Self {
        Self {
            kind: RelationKind::HeadStem,
            gaps,
            grade,
            extra: RelationExtra::HeadStem { head_side, portion },
        }
    }

    /// An ensemble-membership edge.
    pub fn containment() -> Self {
        Self {
            kind: RelationKind::Containment,
            gaps: GapPair::default(),
            grade: 1.0,
            extra: RelationExtra::None,
        }
    }

    /// An incompatibility edge.
    pub fn exclusion() -> Self {
        Self {
            kind: RelationKind::Exclusion,
            gaps: GapPair::default(),
            grade: 1.0,
            extra: RelationExtra::None,
        }
    }
}
