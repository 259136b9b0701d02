// Stem-centric linkers: heads, flags and beams finding their stem, a stem
// finding its heads, and the direction inference they all feed.
//
// Head-stem geometry is the tightest fit in the system and is shared by
// the two directions of search: `HeadStemLinker` (a head looking for one
// stem) and `StemHeadLinker` (a stem collecting every head that fits).
// Both measure from the head's anchor point, so the committed relation is
// identical whichever side initiated it.
//
// See also: `search.rs` for the driving template, `relation.rs` for the
// side/portion payload the direction inference reads back.

use quaver_geom::{HorizontalSide, LineSeg, Point, Rect, VerticalSide};

use crate::candidate::{Candidate, Geometry};
use crate::config::HeadStemParams;
use crate::graph::SystemGraph;
use crate::relation::{GapPair, Relation, RelationExtra, RelationKind, StemPortion, gap_grade};
use crate::search::{Link, Linker, Scored, SearchCtx};
use crate::types::{CandidateId, Profile, RelationId, Shape, ShapeFamily};

// ---------------------------------------------------------------------------
// Shared head-stem geometry
// ---------------------------------------------------------------------------

/// Fit of one stem against one head, measured from the head's side.
struct StemFit {
    gaps: GapPair,
    grade: f64,
    portion: StemPortion,
}

/// Stem contact point on a head: on the given edge, past the midline in
/// the direction the stem leaves from (below center on the right for up
/// stems, above center on the left for down stems).
fn head_anchor(head: &Candidate, side: HorizontalSide, anchor_ratio: f64) -> Point {
    let bounds = head.bounds();
    let edge = bounds.side_point(side);
    Point::new(edge.x, edge.y + side.direction() * anchor_ratio * bounds.h)
}

/// Which side of the head the stem runs on, by abscissa at head height.
fn stem_side(head: &Candidate, stem_seg: &LineSeg) -> HorizontalSide {
    if stem_seg.x_at_y(head.center().y) >= head.center().x {
        HorizontalSide::Right
    } else {
        HorizontalSide::Left
    }
}

/// Where along the stem an ordinate falls, in thirds.
fn portion_at(stem_seg: &LineSeg, y: f64) -> StemPortion {
    let span = (stem_seg.bottom().y - stem_seg.top().y).max(f64::EPSILON);
    let t = ((y - stem_seg.top().y) / span).clamp(0.0, 1.0);
    if t < 1.0 / 3.0 {
        StemPortion::Top
    } else if t > 2.0 / 3.0 {
        StemPortion::Bottom
    } else {
        StemPortion::Middle
    }
}

/// Measure a head-stem fit. Overlap past the head edge and daylight away
/// from it carry separate maxima; the vertical gap is zero while the stem
/// spans the anchor's ordinate and is otherwise the distance to the
/// nearest stem end.
fn head_stem_fit(
    params: &HeadStemParams,
    profile: Profile,
    interline: f64,
    head: &Candidate,
    side: HorizontalSide,
    stem_seg: &LineSeg,
) -> Option<StemFit> {
    let anchor = head_anchor(head, side, params.anchor_height_ratio);
    let stem_x = stem_seg.x_at_y(anchor.y);

    // Positive = daylight outside the head edge, negative = the stem runs
    // inside the head box.
    let raw = (stem_x - anchor.x) * side.direction();
    let (dx_frac, dx_max) = if raw >= 0.0 {
        (raw / interline, params.x_out_gap_max.fraction(profile))
    } else {
        (-raw / interline, params.x_in_gap_max.fraction(profile))
    };
    if dx_frac > dx_max {
        return None;
    }

    let dy = if anchor.y >= stem_seg.top().y && anchor.y <= stem_seg.bottom().y {
        0.0
    } else if anchor.y < stem_seg.top().y {
        stem_seg.top().y - anchor.y
    } else {
        anchor.y - stem_seg.bottom().y
    };
    let dy_frac = dy / interline;
    let y_max = params.y_gap_max.fraction(profile);
    if dy_frac > y_max {
        return None;
    }

    let gaps = GapPair::new(dx_frac, dy_frac);
    Some(StemFit {
        gaps,
        grade: gap_grade(gaps, dx_max, y_max),
        portion: portion_at(stem_seg, anchor.y),
    })
}

fn head_stem_link(head: &Candidate, stem_seg: &LineSeg, fit: &StemFit, partner: CandidateId, outgoing: bool) -> Scored {
    let side = stem_side(head, stem_seg);
    Scored {
        link: Link::new(
            partner,
            Relation::head_stem(fit.gaps, fit.grade, side, fit.portion),
            outgoing,
        ),
        cost: 1.0 - fit.grade,
    }
}

// ---------------------------------------------------------------------------
// Head -> stem
// ---------------------------------------------------------------------------

/// A head looking for the one stem it hangs on.
pub struct HeadStemLinker;

impl Linker for HeadStemLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::HeadStem
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Stem
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.head_stem;
        Some(ctx.subject().bounds().grown(
            params.x_out_gap_max.pixels(ctx.profile, ctx.interline),
            params.y_gap_max.pixels(ctx.profile, ctx.interline),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let head = ctx.subject();
        let stem_seg = ctx.graph.candidate(partner).vertical_median();
        let side = stem_side(head, &stem_seg);
        let fit = head_stem_fit(
            &ctx.config.head_stem,
            ctx.profile,
            ctx.interline,
            head,
            side,
            &stem_seg,
        )?;
        Some(head_stem_link(head, &stem_seg, &fit, partner, true))
    }
}

// ---------------------------------------------------------------------------
// Stem -> heads
// ---------------------------------------------------------------------------

/// A stem collecting every head that fits it; the reverse of
/// `HeadStemLinker`, committed with the head as relation source either
/// way.
pub struct StemHeadLinker;

impl Linker for StemHeadLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::HeadStem
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Head
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.head_stem;
        Some(ctx.subject().bounds().grown(
            params.x_out_gap_max.pixels(ctx.profile, ctx.interline),
            params.y_gap_max.pixels(ctx.profile, ctx.interline),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let head = ctx.graph.candidate(partner);
        let stem_seg = ctx.subject().vertical_median();
        let side = stem_side(head, &stem_seg);
        let fit = head_stem_fit(
            &ctx.config.head_stem,
            ctx.profile,
            ctx.interline,
            head,
            side,
            &stem_seg,
        )?;
        Some(head_stem_link(head, &stem_seg, &fit, partner, false))
    }

    fn keep_all(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Flag -> stem
// ---------------------------------------------------------------------------

/// A flag hanging on the stem end matching its up/down variant. Rejects
/// stems whose inferred direction contradicts the flag's orientation.
pub struct FlagStemLinker;

impl FlagStemLinker {
    /// The flag's attachment corner: its left edge at the end matching the
    /// stem end it hooks onto.
    fn anchor(flag: &Candidate) -> (Point, VerticalSide) {
        let bounds = flag.bounds();
        let attach = flag.shape.flag_attachment();
        let y = match attach {
            VerticalSide::Top => bounds.top(),
            VerticalSide::Bottom => bounds.bottom(),
        };
        (Point::new(bounds.left(), y), attach)
    }
}

impl Linker for FlagStemLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::FlagStem
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Stem
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.flag_stem;
        let (anchor, _) = Self::anchor(ctx.subject());
        let x_out = params.x_out_gap_max.pixels(ctx.profile, ctx.interline);
        let x_in = params.x_in_gap_max.pixels(ctx.profile, ctx.interline);
        let y = params.y_gap_max.pixels(ctx.profile, ctx.interline);
        Some(Rect::from_corners(
            Point::new(anchor.x - x_out, anchor.y - y),
            Point::new(anchor.x + x_in, anchor.y + y),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = &ctx.config.flag_stem;
        let (anchor, attach) = Self::anchor(ctx.subject());
        let required = match attach {
            VerticalSide::Top => -1,
            VerticalSide::Bottom => 1,
        };
        let direction = stem_direction(ctx.graph, partner);
        if direction != 0 && direction != required {
            return None;
        }

        let stem_seg = ctx.graph.candidate(partner).vertical_median();
        let stem_x = stem_seg.x_at_y(anchor.y);
        // The flag sits right of the stem: daylight means the stem is left
        // of the flag's edge, overlap means it runs inside the flag box.
        let raw = anchor.x - stem_x;
        let (dx_frac, dx_max) = if raw >= 0.0 {
            (raw / ctx.interline, params.x_out_gap_max.fraction(ctx.profile))
        } else {
            (-raw / ctx.interline, params.x_in_gap_max.fraction(ctx.profile))
        };
        if dx_frac > dx_max {
            return None;
        }

        let end = stem_seg.end(attach);
        let dy_frac = (end.y - anchor.y).abs() / ctx.interline;
        let y_max = params.y_gap_max.fraction(ctx.profile);
        if dy_frac > y_max {
            return None;
        }

        let gaps = GapPair::new(dx_frac, dy_frac);
        let grade = gap_grade(gaps, dx_max, y_max);
        Some(Scored {
            link: Link::new(
                partner,
                Relation::support(RelationKind::FlagStem, gaps, grade),
                true,
            ),
            cost: 1.0 - grade,
        })
    }
}

// ---------------------------------------------------------------------------
// Beam -> stems
// ---------------------------------------------------------------------------

/// A beam crossing its stems, or a hook picking the single stem it
/// belongs to. Selection (for hooks) is by distance to the stem segment.
pub struct BeamStemLinker {
    keep_all: bool,
}

impl BeamStemLinker {
    pub fn for_shape(shape: Shape) -> Self {
        Self {
            keep_all: shape == Shape::Beam,
        }
    }
}

/// Median line of a beam; horizontal midline of the bounds when the beam
/// was detected as a plain box.
fn beam_median(beam: &Candidate) -> LineSeg {
    match beam.geometry() {
        Geometry::Median { line, .. } => *line,
        _ => {
            let b = beam.bounds();
            LineSeg::new(b.center_left(), b.center_right())
        }
    }
}

impl Linker for BeamStemLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::BeamStem
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Stem
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.beam_stem;
        Some(ctx.subject().bounds().grown(
            params.x_gap_max.pixels(ctx.profile, ctx.interline),
            params.y_gap_max.pixels(ctx.profile, ctx.interline),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = &ctx.config.beam_stem;
        let beam = ctx.subject();
        let beam_seg = beam_median(beam);
        let stem_seg = ctx.graph.candidate(partner).vertical_median();
        let stem_x = stem_seg.x_at_y(beam_seg.y_at_x(stem_seg.midpoint().x));

        let bounds = beam.bounds();
        let dx = if stem_x < bounds.left() {
            bounds.left() - stem_x
        } else if stem_x > bounds.right() {
            stem_x - bounds.right()
        } else {
            0.0
        };
        let dx_frac = dx / ctx.interline;
        let x_max = params.x_gap_max.fraction(ctx.profile);
        if dx_frac > x_max {
            return None;
        }

        // Vertical slack: zero when the beam line crosses the stem's span,
        // else the distance from the line to the nearest stem end.
        let beam_y = beam_seg.y_at_x(stem_x);
        let dy = if beam_y >= stem_seg.top().y && beam_y <= stem_seg.bottom().y {
            0.0
        } else {
            (beam_y - stem_seg.top().y)
                .abs()
                .min((beam_y - stem_seg.bottom().y).abs())
        };
        let dy_frac = dy / ctx.interline;
        let y_max = params.y_gap_max.fraction(ctx.profile);
        if dy_frac > y_max {
            return None;
        }

        let gaps = GapPair::new(dx_frac, dy_frac);
        let grade = gap_grade(gaps, x_max, y_max);
        let distance = beam_seg
            .distance_to(stem_seg.top())
            .min(beam_seg.distance_to(stem_seg.bottom()));
        Some(Scored {
            link: Link::new(
                partner,
                Relation::support(RelationKind::BeamStem, gaps, grade),
                true,
            ),
            cost: distance,
        })
    }

    fn keep_all(&self) -> bool {
        self.keep_all
    }
}

// ---------------------------------------------------------------------------
// Stem direction
// ---------------------------------------------------------------------------

/// Inferred vertical direction of a stem: -1 pointing up (heads at the
/// bottom, flags and beams at the top), +1 pointing down, 0 undecidable.
///
/// Committed head, beam and flag relations vote in descending grade order
/// (edge id breaks ties); the first decisive vote wins.
pub fn stem_direction(graph: &SystemGraph, stem: CandidateId) -> i32 {
    let mut edges: Vec<(f64, RelationId)> = graph
        .relations_of(
            stem,
            &[
                RelationKind::HeadStem,
                RelationKind::BeamStem,
                RelationKind::FlagStem,
            ],
        )
        .into_iter()
        .map(|e| (graph.edge(e).relation.grade, e))
        .collect();
    edges.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let stem_seg = graph.candidate(stem).vertical_median();
    let mid_y = stem_seg.midpoint().y;
    for (_, edge) in edges {
        let record = graph.edge(edge);
        let partner = graph.opposite_of(stem, edge);
        let vote = match record.relation.kind {
            RelationKind::HeadStem => match record.relation.extra {
                RelationExtra::HeadStem { portion, head_side } => match portion {
                    StemPortion::Bottom => -1,
                    StemPortion::Top => 1,
                    StemPortion::Middle => match head_side {
                        HorizontalSide::Right => -1,
                        HorizontalSide::Left => 1,
                    },
                },
                RelationExtra::None => 0,
            },
            RelationKind::FlagStem => match graph.candidate(partner).shape.flag_attachment() {
                VerticalSide::Top => -1,
                VerticalSide::Bottom => 1,
            },
            RelationKind::BeamStem => {
                let beam_y = graph.candidate(partner).center().y;
                if beam_y < mid_y {
                    -1
                } else if beam_y > mid_y {
                    1
                } else {
                    0
                }
            }
            _ => 0,
        };
        if vote != 0 {
            return vote;
        }
    }
    0
}

// ---------------------------------------------------------------------------
