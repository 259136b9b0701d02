// Linkers reaching a head or a head chord from its left: accidentals
// altering a head, and arpeggiato signs rolling a chord.
//
// Accidentals select by vertical offset alone, not by composite grade: the
// head nearest the accidental's reference height is the one it alters,
// however close a wrong-height head may sit. A selected head shared by two
// voices (a mirror pair) gets the alteration on both twins, so whichever
// twin survives later pruning keeps its accidental.
//
// See also: `search.rs` for the driving template, `stem_links.rs` for the
// mirror-producing head/stem geometry.

use quaver_geom::{Point, Rect};

use crate::relation::{GapPair, Relation, RelationKind, gap_grade};
use crate::search::{Link, Linker, Scored, SearchCtx};
use crate::types::{CandidateId, Shape, ShapeFamily};

// ---------------------------------------------------------------------------
// Accidental -> head
// ---------------------------------------------------------------------------

/// An accidental looking right for the head it alters.
pub struct AccidHeadLinker;

impl AccidHeadLinker {
    /// Reference point on the accidental: its right edge, at mid-height
    /// for most shapes and lower for flats, whose loop
    /// sits at the altered pitch while the ascender reaches high above it.
    fn reference(ctx: &SearchCtx) -> Point {
        let subject = ctx.subject();
        let bounds = subject.bounds();
        let ratio = match subject.shape {
            Shape::Flat | Shape::DoubleFlat => ctx.config.accidental.flat_reference_ratio,
            _ => 0.5,
        };
        Point::new(bounds.right(), bounds.top() + ratio * bounds.h)
    }
}

impl Linker for AccidHeadLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::AccidHead
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Head
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.accidental;
        let reference = Self::reference(ctx);
        let x = params.x_gap_max.pixels(ctx.profile, ctx.interline);
        let y = params.y_gap_max.pixels(ctx.profile, ctx.interline);
        Some(Rect::from_corners(
            Point::new(reference.x, reference.y - y),
            Point::new(reference.x + x, reference.y + y),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = &ctx.config.accidental;
        let reference = Self::reference(ctx);
        let head = ctx.graph.candidate(partner);

        // Slight overlap with the head box is free.
        let dx = (head.bounds().left() - reference.x).max(0.0);
        let dx_frac = dx / ctx.interline;
        let x_max = params.x_gap_max.fraction(ctx.profile);
        if dx_frac > x_max {
            return None;
        }

        let dy = (head.center().y - reference.y).abs();
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
                Relation::support(RelationKind::AccidHead, gaps, grade),
                true,
            ),
            cost: dy,
        })
    }

    /// Duplicate the alteration onto the selected head's live mirror.
    fn expand(&self, ctx: &SearchCtx, mut links: Vec<Link>) -> Vec<Link> {
        let mut twins = Vec::new();
        for link in &links {
            if let Some(mirror) = ctx.graph.candidate(link.partner).mirror
                && ctx.graph.is_live(mirror)
            {
                twins.push(Link::new(mirror, link.relation, link.outgoing));
            }
        }
        links.extend(twins);
        links
    }
}

// ---------------------------------------------------------------------------
// Arpeggiato -> chord
// ---------------------------------------------------------------------------

/// An arpeggiato sign looking right for the chord it rolls. Vertical fit
/// is a hard floor on overlap rather than a graded gap: the sign must run
/// along a fair share of the chord.
pub struct ArpeggiatoChordLinker;

impl Linker for ArpeggiatoChordLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::ArpeggiatoChord
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Chord
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        let params = &ctx.config.arpeggiato;
        Some(ctx.subject().bounds().grown(
            params.x_gap_max.pixels(ctx.profile, ctx.interline),
            params.y_gap_max.pixels(ctx.profile, ctx.interline),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = &ctx.config.arpeggiato;
        let sign = ctx.subject();
        let chord = ctx.graph.candidate(partner);
        if chord.center().x < sign.center().x {
            return None;
        }

        let sign_bounds = sign.bounds();
        let chord_bounds = chord.bounds();
        let overlap = sign_bounds.y_overlap(&chord_bounds);
        let shorter = sign_bounds.h.min(chord_bounds.h).max(f64::EPSILON);
        if overlap / shorter < params.min_overlap_ratio {
            return None;
        }

        let dx = (chord_bounds.left() - sign_bounds.right()).max(0.0);
        let dx_frac = dx / ctx.interline;
        let x_max = params.x_gap_max.fraction(ctx.profile);
        if dx_frac > x_max {
            return None;
        }

        let gaps = GapPair::new(dx_frac, 0.0);
        let grade = gap_grade(gaps, x_max, params.y_gap_max.fraction(ctx.profile));
        Some(Scored {
            link: Link::new(
                partner,
                Relation::support(RelationKind::ArpeggiatoChord, gaps, grade),
                true,
            ),
            cost: dx,
        })
    }
}

// ---------------------------------------------------------------------------
