// Linkers for signs that attach to a whole chord rather than to one head:
// articulations, ornaments, grace chords, pluckings, tuplets, pedals and
// dynamics. All share one box-gap geometry, parameterized per relation
// kind from the attachment table; dynamics add a deferral rule for chords
// carrying a mirror twin. Route markers (coda, segno) reuse the same
// geometry against barlines.
//
// See also: `search.rs` for the driving template, `config.rs` for the
// per-kind attachment table.

use quaver_geom::Rect;

use crate::candidate::Candidate;
use crate::config::AttachmentParams;
use crate::relation::{GapPair, Relation, RelationKind, gap_grade};
use crate::search::{Link, Linker, Scored, SearchCtx};
use crate::types::{CandidateId, ShapeFamily};

// ---------------------------------------------------------------------------
// Shared box-gap geometry
// ---------------------------------------------------------------------------

/// Horizontal distance from the sign's center to the partner's x-range;
/// zero while the center is inside it.
fn abscissa_gap(sign: &Candidate, partner_bounds: &Rect) -> f64 {
    let cx = sign.center().x;
    if cx < partner_bounds.left() {
        partner_bounds.left() - cx
    } else if cx > partner_bounds.right() {
        cx - partner_bounds.right()
    } else {
        0.0
    }
}

/// Box-gap fit of an attached sign against a partner, scored by the sum of
/// the two raw gaps.
fn attachment_fit(
    ctx: &SearchCtx,
    params: &AttachmentParams,
    kind: RelationKind,
    partner: CandidateId,
) -> Option<Scored> {
    let sign = ctx.subject();
    let partner_bounds = ctx.graph.candidate(partner).bounds();

    let dx = abscissa_gap(sign, &partner_bounds);
    let dx_frac = dx / ctx.interline;
    let x_max = params.x_gap_max.fraction(ctx.profile);
    if dx_frac > x_max {
        return None;
    }

    let dy = (-sign.bounds().y_overlap(&partner_bounds)).max(0.0);
    let dy_frac = dy / ctx.interline;
    let y_max = params.y_gap_max.fraction(ctx.profile);
    if dy_frac > y_max {
        return None;
    }

    let gaps = GapPair::new(dx_frac, dy_frac);
    let grade = gap_grade(gaps, x_max, y_max);
    Some(Scored {
        link: Link::new(partner, Relation::support(kind, gaps, grade), true),
        cost: dx + dy,
    })
}

fn attachment_lookup(ctx: &SearchCtx, params: &AttachmentParams) -> Rect {
    ctx.subject().bounds().grown(
        params.x_gap_max.pixels(ctx.profile, ctx.interline),
        params.y_gap_max.pixels(ctx.profile, ctx.interline),
    )
}

// ---------------------------------------------------------------------------
// Sign -> chord
// ---------------------------------------------------------------------------

/// One linker for every plain chord-attached sign family; the relation
/// kind selects its parameter row.
pub struct AttachmentLinker {
    kind: RelationKind,
}

impl AttachmentLinker {
    pub fn new(kind: RelationKind) -> Self {
        Self { kind }
    }
}

impl Linker for AttachmentLinker {
    fn kind(&self) -> RelationKind {
        self.kind
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Chord
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        Some(attachment_lookup(ctx, ctx.config.attachment(self.kind)))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        attachment_fit(ctx, ctx.config.attachment(self.kind), self.kind, partner)
    }
}

// ---------------------------------------------------------------------------
// Dynamics -> chord
// ---------------------------------------------------------------------------

/// Dynamics use the shared attachment geometry but step aside when the
/// chord's mirror twin sits vertically closer to the mark: the mark then
/// belongs to the other voice's reading and must not tie both down.
pub struct DynamicsChordLinker;

impl Linker for DynamicsChordLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::DynamicsChord
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Chord
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        Some(attachment_lookup(
            ctx,
            ctx.config.attachment(RelationKind::DynamicsChord),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let chord = ctx.graph.candidate(partner);
        if let Some(twin) = chord.mirror
            && ctx.graph.is_live(twin)
        {
            let mark_y = ctx.subject().center().y;
            let own = (chord.center().y - mark_y).abs();
            let other = (ctx.graph.candidate(twin).center().y - mark_y).abs();
            if other < own {
                return None;
            }
        }
        attachment_fit(
            ctx,
            ctx.config.attachment(RelationKind::DynamicsChord),
            RelationKind::DynamicsChord,
            partner,
        )
    }
}

// ---------------------------------------------------------------------------
// Marker -> barline
// ---------------------------------------------------------------------------

/// Coda and segno marks hang over a barline; the nearest barline by
/// abscissa wins.
pub struct MarkerBarlineLinker;

impl Linker for MarkerBarlineLinker {
    fn kind(&self) -> RelationKind {
        RelationKind::MarkerBarline
    }

    fn partner_family(&self) -> ShapeFamily {
        ShapeFamily::Barline
    }

    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect> {
        Some(attachment_lookup(
            ctx,
            ctx.config.attachment(RelationKind::MarkerBarline),
        ))
    }

    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored> {
        let params = ctx.config.attachment(RelationKind::MarkerBarline);
        let scored = attachment_fit(ctx, params, RelationKind::MarkerBarline, partner)?;
        let barline = ctx.graph.candidate(partner);
        Some(Scored {
            cost: (ctx.subject().center().x - barline.center().x).abs(),
            ..scored
        })
    }
}

// ---------------------------------------------------------------------------
