// The geometric link-search engine: one driver, many linkers.
//
// Every linker runs the same seven steps, and only steps 1, 4 and 5 are
// kind-specific:
//   1. anchor point(s) from the searching candidate's geometry;
//   2. a lookup box from the configured gap maxima, in interline fractions
//      scaled by the local interline and the search profile;
//   3. a bounded sweep over the abscissa-sorted partner list;
//   4. per-partner gap measurement and the kind's monotonic gap-to-grade
//      function, with below-minimum partners dropped;
//   5. kind-specific validity filters (stem direction, vertical overlap,
//      pitch sanity, mirror preference);
//   6. selection of the smallest kind-specific cost, ties resolved to the
//      earliest partner in sweep order;
//   7. `Link` values returned unapplied; committing them is the caller's
//      move, so searches stay pure.
//
// A mandatory search that finds nothing is not an error: the candidate
// keeps (or regains) its abnormal flag and the result is simply empty.
//
// See also: `stem_links.rs`, `head_links.rs`, `chord_links.rs` and
// `barline_links.rs` for the concrete linkers, and `edit.rs` for the
// transactions that run search after geometry changes.
//
// **Critical constraint: determinism.** Partner order comes from the
// graph's sorted views, selection breaks ties by sweep position, and no
// linker may consult anything but the ctx it is handed. Repeated calls on
// an unchanged graph return identical links in identical order.

use quaver_geom::Rect;

use crate::candidate::Candidate;
use crate::config::InterpretConfig;
use crate::graph::SystemGraph;
use crate::relation::{Relation, RelationKind};
use crate::staff::SystemLayout;
use crate::types::{CandidateId, Profile, RelationId, Shape, ShapeFamily};

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// A would-be relation discovered by a search: the partner plus the fully
/// graded payload, not yet committed to any graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub partner: CandidateId,
    pub relation: Relation,
    /// True when the searching candidate is the relation source.
    pub outgoing: bool,
}

impl Link {
    pub fn new(partner: CandidateId, relation: Relation, outgoing: bool) -> Self {
        Self {
            partner,
            relation,
            outgoing,
        }
    }

    /// Commit this link into the graph on behalf of `subject`.
    pub fn apply(
        &self,
        graph: &mut SystemGraph,
        config: &InterpretConfig,
        subject: CandidateId,
    ) -> RelationId {
        if self.outgoing {
            graph.add_relation(config, subject, self.partner, self.relation)
        } else {
            graph.add_relation(config, self.partner, subject, self.relation)
        }
    }
}

/// A link plus the scalar its linker minimizes during selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scored {
    pub link: Link,
    pub cost: f64,
}

// ---------------------------------------------------------------------------
// The linker template
// ---------------------------------------------------------------------------

/// Search state shared by driver and linker: the graph under search, the
/// layout frame, config, profile, and the searching candidate.
pub struct SearchCtx<'a> {
    pub graph: &'a SystemGraph,
    pub layout: &'a SystemLayout,
    pub config: &'a InterpretConfig,
    pub profile: Profile,
    pub subject: CandidateId,
    /// Local interline at the subject's center, in pixels.
    pub interline: f64,
}

impl SearchCtx<'_> {
    pub fn subject(&self) -> &Candidate {
        self.graph.candidate(self.subject)
    }
}

/// One family-specific link search. Implementations provide the anchor
/// geometry and per-partner scoring; the driver owns sweeping, minimum
/// grade filtering and selection.
pub trait Linker {
    /// The relation kind this linker commits.
    fn kind(&self) -> RelationKind;

    /// Shape family of the partners to sweep.
    fn partner_family(&self) -> ShapeFamily;

    /// Lookup box in pixels, already profile-relaxed. `None` when the
    /// subject offers no usable anchor (off-staff, degenerate geometry).
    fn lookup_area(&self, ctx: &SearchCtx) -> Option<Rect>;

    /// Measure, filter and grade one partner. `None` drops it.
    fn evaluate(&self, ctx: &SearchCtx, partner: CandidateId) -> Option<Scored>;

    /// Keep every acceptable partner instead of one winner. Linkers whose
    /// relation is one-to-many (a stem's heads, a beam's stems) opt in.
    fn keep_all(&self) -> bool {
        false
    }

    /// Post-selection fan-out, e.g. duplicating a link onto the winner's
    /// mirror.
    fn expand(&self, _ctx: &SearchCtx, links: Vec<Link>) -> Vec<Link> {
        links
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// All links the subject's shape can search for, over all its linkers.
pub fn search_links(
    graph: &SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    subject: CandidateId,
) -> Vec<Link> {
    let mut links = Vec::new();
    for linker in linkers_for(graph.candidate(subject).shape) {
        links.extend(run_linker(
            graph,
            layout,
            config,
            profile,
            subject,
            linker.as_ref(),
        ));
    }
    links
}

/// Run a single linker through the shared seven-step drive.
pub fn run_linker(
    graph: &SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    subject: CandidateId,
    linker: &dyn Linker,
) -> Vec<Link> {
    if !graph.is_live(subject) {
        return Vec::new();
    }
    let ctx = SearchCtx {
        graph,
        layout,
        config,
        profile,
        subject,
        interline: layout.interline_at(graph.candidate(subject).center()),
    };
    let Some(area) = linker.lookup_area(&ctx) else {
        return Vec::new();
    };

    let sorted = graph.candidates_of(linker.partner_family());
    let mirror = graph.candidate(subject).mirror;
    let mut found: Vec<Scored> = Vec::new();
    for partner in graph.intersected(&sorted, &area) {
        if partner == subject || mirror == Some(partner) {
            continue;
        }
        if let Some(scored) = linker.evaluate(&ctx, partner)
            && scored.link.relation.grade >= config.relation_min_grade
        {
            found.push(scored);
        }
    }

    let selected: Vec<Link> = if linker.keep_all() {
        found.into_iter().map(|s| s.link).collect()
    } else {
        // Strictly-smaller comparison keeps the earliest partner on ties.
        let mut best: Option<Scored> = None;
        for scored in found {
            let better = match &best {
                Some(current) => scored.cost < current.cost,
                None => true,
            };
            if better {
                best = Some(scored);
            }
        }
        best.map(|s| vec![s.link]).unwrap_or_default()
    };

    linker.expand(&ctx, selected)
}

/// Committed relations of the given kinds that a fresh search would no
/// longer produce, under the subject's current geometry. Returned in
/// ascending edge order for removal by the caller.
pub fn search_unlinks(
    graph: &SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    subject: CandidateId,
    kinds: &[RelationKind],
) -> Vec<RelationId> {
    let fresh = search_links(graph, layout, config, profile, subject);
    obsolete_edges(graph, subject, kinds, &fresh)
}

/// Edges of `kinds` incident to `subject` with no counterpart in `fresh`.
fn obsolete_edges(
    graph: &SystemGraph,
    subject: CandidateId,
    kinds: &[RelationKind],
    fresh: &[Link],
) -> Vec<RelationId> {
    graph
        .relations_of(subject, kinds)
        .into_iter()
        .filter(|&edge| {
            let record = graph.edge(edge);
            let partner = graph.opposite_of(subject, edge);
            !fresh
                .iter()
                .any(|link| link.partner == partner && link.relation.kind == record.relation.kind)
        })
        .collect()
}

/// The linkers a shape runs when it appears or moves. Shapes that are
/// searched *for* rather than searching (barlines, rests, chords) return
/// none.
pub fn linkers_for(shape: Shape) -> Vec<Box<dyn Linker>> {
    use crate::{barline_links, chord_links, head_links, stem_links};
    match shape.family() {
        ShapeFamily::Head => vec![Box::new(stem_links::HeadStemLinker)],
        ShapeFamily::Stem => vec![Box::new(stem_links::StemHeadLinker)],
        ShapeFamily::Flag => vec![Box::new(stem_links::FlagStemLinker)],
        ShapeFamily::Beam => vec![Box::new(stem_links::BeamStemLinker::for_shape(shape))],
        ShapeFamily::Accidental => vec![Box::new(head_links::AccidHeadLinker)],
        ShapeFamily::Arpeggiato => vec![Box::new(head_links::ArpeggiatoChordLinker)],
        ShapeFamily::Articulation => attachment(RelationKind::ArticulationChord),
        ShapeFamily::Ornament => attachment(RelationKind::OrnamentChord),
        ShapeFamily::Grace => attachment(RelationKind::GraceChord),
        ShapeFamily::Plucking => attachment(RelationKind::PluckingChord),
        ShapeFamily::Tuplet => attachment(RelationKind::TupletChord),
        ShapeFamily::Pedal => attachment(RelationKind::PedalChord),
        ShapeFamily::Dynamics => vec![Box::new(chord_links::DynamicsChordLinker)],
        ShapeFamily::Marker => vec![Box::new(chord_links::MarkerBarlineLinker)],
        ShapeFamily::Dot => vec![
            Box::new(barline_links::RepeatDotBarlineLinker),
            Box::new(barline_links::RepeatDotPairLinker),
        ],
        ShapeFamily::Number => vec![Box::new(barline_links::MeasureNumberLinker)],
        _ => Vec::new(),
    }
}

fn attachment(kind: RelationKind) -> Vec<Box<dyn Linker>> {
    vec![Box::new(crate::chord_links::AttachmentLinker::new(kind))]
}

// ---------------------------------------------------------------------------
