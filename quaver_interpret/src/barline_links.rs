// Linkers anchored on the staff reference frame rather than on another
// glyph's box alone: repeat dots (which only exist at fixed pitch
// positions around the middle line) and measure-count numbers over
// multiple rests.
//
// Repeat dots run two searches: one to their barline, one to the sibling
// dot of the pair. The pitch sanity check gates both, so a stray dot on
// the middle line never proposes anything.
//
// See also: `search.rs` for the driving template, `staff.rs` for pitch
// positions.

use quaver_geom::{Point, Rect};

use crate::relation::{GapPair, Relation, RelationKind, gap_grade};
use crate::search::{Link, Linker, Scored, SearchCtx};
use crate::types::{CandidateId, ShapeFamily};

/// Tolerated deviation, in pitch steps, between a dot's measured pitch
/// position and the configured repeat-dot pitch.
const PITCH_SLACK: f64 = 0.5;

/// A repeat dot's pitch position, if it sits close enough to either of
/// the two expected positions around the middle line.
fn dot_pitch(ctx: &SearchCtx) -> Option<f64> {
    let center = ctx.subject().center();
    let pitch = ctx.layout.closest_staff(center).pitch_position(center.y);
    let expected = ctx.config.repeat_dot.pitch as f64;
    if (pitch.abs() - expected).abs() <= PITCH_SLACK {
        Some(pitch)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Repeat dot -> barline
// ---------------------------------------------------------------------------

/// A repeat dot looking sideways for its barline; the closest one by
/// abscissa wins.
pub struct RepeatDotBarlineLinker;

impl Linker for RepeatDotBarlineLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::RepeatDotBarline
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Barline
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        dot_pitch(ctx)?;
        let params = &ctx.config.repeat_dot;
        Some(ctx.subject().bounds().grown(
            params.x_gap_max.pixels(ctx.profile, ctx.interline),
            params.y_gap_max.pixels(ctx.profile, ctx.interline),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = &ctx.config.repeat_dot;
        let dot_bounds = ctx.subject().bounds();
        let barline_bounds = ctx.graph.candidate(partner).bounds();

        let dx = (-dot_bounds.x_overlap(&barline_bounds)).max(0.0);
        let dx_frac = dx / ctx.interline;
        let x_max = params.x_gap_max.fraction(ctx.profile);
        if dx_frac > x_max {
            return None;
        }

        let dy = (-dot_bounds.y_overlap(&barline_bounds)).max(0.0);
        let dy_frac = dy / ctx.interline;
        let y_max = params.y_gap_max.fraction(ctx.profile);
        if dy_frac > y_max {
            return None;
        }

        let gaps = GapPair::new(dx_frac, dy_frac);
        let grade = gap_grade(gaps, x_max, y_max);
        Some(Scored {
            link: Link::new(
                partner,
                Relation::support(RelationKind::RepeatDotBarline, gaps, grade),
                true,
            ),
            cost: dx,
        })
    }
}

// ---------------------------------------------------------------------------
// Repeat dot -> sibling dot
// ---------------------------------------------------------------------------

/// A repeat dot looking for the second dot of the pair: same abscissa,
/// mirrored pitch, one interline apart.
pub struct RepeatDotPairLinker;

impl Linker for RepeatDotPairLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::RepeatDotPair
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Dot
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let pitch = dot_pitch(ctx)?;
        let params = &ctx.config.repeat_dot;
        let bounds = ctx.subject().bounds();
        let center = ctx.subject().center();
        let expected_y = if pitch > 0.0 {
            center.y - ctx.interline
        } else {
            center.y + ctx.interline
        };
        let half_w = bounds.w / 2.0 + params.pair_x_gap_max.pixels(ctx.profile, ctx.interline);
        let half_h = bounds.h / 2.0 + params.pair_y_dev_max.pixels(ctx.profile, ctx.interline);
        Some(Rect::from_corners(
            Point::new(center.x - half_w, expected_y - half_h),
            Point::new(center.x + half_w, expected_y + half_h),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let pitch = dot_pitch(ctx)?;
        let params = &ctx.config.repeat_dot;
        let center = ctx.subject().center();
        let sibling = ctx.graph.candidate(partner).center();

        // The sibling sits on the other side of the middle line.
        let diff = sibling.y - center.y;
        if (pitch > 0.0 && diff >= 0.0) || (pitch < 0.0 && diff <= 0.0) {
            return None;
        }

        let dx = (sibling.x - center.x).abs();
        let dx_frac = dx / ctx.interline;
        let x_max = params.pair_x_gap_max.fraction(ctx.profile);
        if dx_frac > x_max {
            return None;
        }

        let deviation = (diff.abs() - ctx.interline).abs();
        let dev_frac = deviation / ctx.interline;
        let dev_max = params.pair_y_dev_max.fraction(ctx.profile);
        if dev_frac > dev_max {
            return None;
        }

        let gaps = GapPair::new(dx_frac, dev_frac);
        let grade = gap_grade(gaps, x_max, dev_max);
        Some(Scored {
            link: Link::new(
                partner,
                Relation::support(RelationKind::RepeatDotPair, gaps, grade),
                true,
            ),
            cost: dx + deviation,
        })
    }
}

// ---------------------------------------------------------------------------
// Measure number -> multiple rest
// ---------------------------------------------------------------------------

/// A measure-count number over a multiple rest. Horizontal fit is
/// containment of the number's center in the rest's margin-grown x-range;
/// only the vertical gap is graded.
pub struct MeasureNumberLinker;

impl Linker for MeasureNumberLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::MeasureCountRest
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Rest
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.measure_number;
        let bounds = ctx.subject().bounds();
        let cx = ctx.subject().center().x;
        let margin = params.x_margin.pixels(ctx.profile, ctx.interline);
        Some(Rect::from_corners(
            Point::new(cx - margin, bounds.top()),
            Point::new(
                cx + margin,
                bounds.bottom() + params.y_gap_max.pixels(ctx.profile, ctx.interline),
            ),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = &ctx.config.measure_number;
        let number = ctx.subject();
        let rest = ctx.graph.candidate(partner);
        if number.center().y >= rest.center().y {
            return None;
        }

        let rest_bounds = rest.bounds();
        let cx = number.center().x;
        let margin = params.x_margin.pixels(ctx.profile, ctx.interline);
        if cx < rest_bounds.left() - margin || cx > rest_bounds.right() + margin {
            return None;
        }

        let dy = (rest_bounds.top() - number.bounds().bottom()).max(0.0);
        let dy_frac = dy / ctx.interline;
        let y_max = params.y_gap_max.fraction(ctx.profile);
        if dy_frac > y_max {
            return None;
        }

        let gaps = GapPair::new(0.0, dy_frac);
        let grade = gap_grade(gaps, 1.0, y_max);
        Some(Scored {
            link: Link::new(
                partner,
                Relation::support(RelationKind::MeasureCountRest, gaps, grade),
                true,
            ),
            cost: (cx - rest_bounds.center().x).abs(),
        })
    }
}

// ---------------------------------------------------------------------------
