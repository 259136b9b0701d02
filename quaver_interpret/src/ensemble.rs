// Ensembles: candidates containing other candidates.
//
// An ensemble is itself a candidate (it has a shape, bounds, grades) whose
// members hang off `Containment` relations. Member order is a property of
// the ensemble shape: chords stack bottom-up, sentences read left-to-right,
// time pairs put the numerator above the denominator.
//
// Derived values (bounds union, rational value of a time pair, the mean
// member grade that serves as the ensemble's contextual grade) are always
// computed from the current members, so membership changes can never leave
// them stale. The mean-grade upkeep itself lives in `graph.rs`, which
// treats container shapes specially when refreshing contextual grades.
//
// Fixed-arity ensembles (time pairs, fermatas) are built already populated
// through the constructors below; incremental ensembles (chords, sentences)
// grow one member at a time.

use crate::config::InterpretConfig;
use crate::graph::SystemGraph;
use crate::relation::{Relation, RelationKind};
use crate::types::{CandidateId, Rational, RelationId, Shape};
use quaver_geom::Rect;

/// Member count required by a fixed-arity ensemble shape, if any.
pub fn fixed_arity(shape: Shape) -> Option<usize> {
    match shape {
        Shape::TimePair | Shape::Fermata => Some(2),
        _ => None,
    }
}

/// Add a member to an ensemble. Idempotent: re-adding an existing member
/// changes nothing. A member already owned by another ensemble is adopted
/// (the previous containment edge goes away).
pub fn add_member(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    ensemble: CandidateId,
    member: CandidateId,
) -> RelationId {
    debug_assert!(graph.candidate(ensemble).shape.is_container());
    graph.add_relation(config, ensemble, member, Relation::containment())
}

/// Remove a member from an ensemble. Idempotent: absent membership is a
/// no-op.
pub fn remove_member(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    ensemble: CandidateId,
    member: CandidateId,
) {
    if let Some(edge) = graph.relation_between(ensemble, member, RelationKind::Containment) {
        graph.remove_relation(config, edge);
    }
}

/// Members of an ensemble in the shape's canonical order. Empty if the
/// ensemble is removed or has no members.
pub fn members(graph: &SystemGraph, ensemble: CandidateId) -> Vec<CandidateId> {
    if !graph.is_live(ensemble) {
        return Vec::new();
    }
    let mut ids: Vec<CandidateId> = graph
        .relations_of(ensemble, &[RelationKind::Containment])
        .into_iter()
        .filter(|e| graph.edge(*e).source == ensemble)
        .map(|e| graph.edge(e).target)
        .collect();
    let shape = graph.candidate(ensemble).shape;
    ids.sort_by(|a, b| {
        let ca = graph.candidate(*a).center();
        let cb = graph.candidate(*b).center();
        match shape {
            // Bottom-up: the lowest head is the chord's first member.
            Shape::HeadChord => cb.y.total_cmp(&ca.y).then_with(|| a.cmp(b)),
            // Reading order.
            Shape::Sentence => ca.x.total_cmp(&cb.x).then_with(|| a.cmp(b)),
            // Numerator above denominator; fermata arc above its dot.
            _ => ca.y.total_cmp(&cb.y).then_with(|| a.cmp(b)),
        }
    });
    ids
}

/// Mean of the members' best grades — the ensemble's combined confidence.
pub fn mean_grade(graph: &SystemGraph, ensemble: CandidateId) -> f64 {
    let grades: Vec<f64> = members(graph, ensemble)
        .into_iter()
        .map(|m| graph.candidate(m).best_grade())
        .collect();
    crate::grade::mean(&grades)
}

/// Union of member bounds. None for a memberless ensemble.
pub fn ensemble_bounds(graph: &SystemGraph, ensemble: CandidateId) -> Option<Rect> {
    let mut rect: Option<Rect> = None;
    for member in members(graph, ensemble) {
        let b = graph.candidate(member).bounds();
        rect = Some(match rect {
            Some(r) => r.union(&b),
            None => b,
        });
    }
    rect
}

// ---------------------------------------------------------------------------
// Concrete ensembles
// ---------------------------------------------------------------------------

/// Build a head chord over the given heads. The chord's intrinsic grade is
/// the mean of the member grades at construction time; afterwards the graph
/// keeps its contextual grade at the member mean.
pub fn build_head_chord(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    heads: &[CandidateId],
) -> CandidateId {
    debug_assert!(!heads.is_empty());
    let grades: Vec<f64> = heads
        .iter()
        .map(|h| graph.candidate(*h).best_grade())
        .collect();
    let bounds = heads
        .iter()
        .map(|h| graph.candidate(*h).bounds())
        .reduce(|a, b| a.union(&b))
        .unwrap_or_default();
    let chord = graph.insert(
        Shape::HeadChord,
        crate::candidate::Geometry::Box(bounds),
        crate::grade::mean(&grades),
    );
    for &head in heads {
        add_member(graph, config, chord, head);
    }
    chord
}

/// Attach a stem to a chord (the stem its member heads agree on).
pub fn adopt_stem(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    chord: CandidateId,
    stem: CandidateId,
) -> RelationId {
    graph.add_relation(
        config,
        chord,
        stem,
        Relation::support(RelationKind::ChordStem, Default::default(), 1.0),
    )
}

/// Build a sentence over the given words, in any order.
pub fn build_sentence(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    words: &[CandidateId],
) -> CandidateId {
    debug_assert!(!words.is_empty());
    let grades: Vec<f64> = words
        .iter()
        .map(|w| graph.candidate(*w).best_grade())
        .collect();
    let bounds = words
        .iter()
        .map(|w| graph.candidate(*w).bounds())
        .reduce(|a, b| a.union(&b))
        .unwrap_or_default();
    let sentence = graph.insert(
        Shape::Sentence,
        crate::candidate::Geometry::Box(bounds),
        crate::grade::mean(&grades),
    );
    for &word in words {
        add_member(graph, config, sentence, word);
    }
    sentence
}

/// Build a time-signature pair from a numerator and a denominator digit.
/// The pair is fixed-arity: it is born with exactly these two members.
pub fn build_time_pair(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    numerator: CandidateId,
    denominator: CandidateId,
) -> CandidateId {
    let bounds = graph
        .candidate(numerator)
        .bounds()
        .union(&graph.candidate(denominator).bounds());
    let grade = crate::grade::mean(&[
        graph.candidate(numerator).best_grade(),
        graph.candidate(denominator).best_grade(),
    ]);
    let pair = graph.insert(Shape::TimePair, crate::candidate::Geometry::Box(bounds), grade);
    add_member(graph, config, pair, numerator);
    add_member(graph, config, pair, denominator);
    pair
}

/// Rational value of a time pair: numerator digit over denominator digit.
///
/// Panics if the pair does not hold exactly two digit members — arity is a
/// construction invariant, and a digit without a numeric mapping is a
/// missing table entry.
pub fn time_pair_value(graph: &SystemGraph, pair: CandidateId) -> Rational {
    let members = members(graph, pair);
    assert_eq!(
        members.len(),
        2,
        "time pair {pair} must hold exactly two members"
    );
    let num = graph.candidate(members[0]).shape.time_digit_value();
    let den = graph.candidate(members[1]).shape.time_digit_value();
    Rational::new(num, den)
}

/// Build a fermata from its arc and dot parts.
pub fn build_fermata(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    arc: CandidateId,
    dot: CandidateId,
) -> CandidateId {
    let bounds = graph
        .candidate(arc)
        .bounds()
        .union(&graph.candidate(dot).bounds());
    let grade = crate::grade::mean(&[
        graph.candidate(arc).best_grade(),
        graph.candidate(dot).best_grade(),
    ]);
    let fermata = graph.insert(Shape::Fermata, crate::candidate::Geometry::Box(bounds), grade);
    add_member(graph, config, fermata, arc);
    add_member(graph, config, fermata, dot);
    fermata
}
