// Consistency maintenance over a system graph.
//
// Three concerns live here, all driven by the same mandatory-relation
// table:
//   - abnormal flags: a candidate whose shape requires a relation it does
//     not currently have is flagged for review, never deleted;
//   - removal closures: deleting a candidate drags its dependents along
//     (members of a deleted container, containers left empty, chords left
//     on a deleted stem) as one all-or-nothing plan;
//   - reduction: exclusion edges between competing readings of one glyph,
//     and the purge that resolves them and drops weak survivors.
//
// See also: `graph.rs`, which consults `initially_abnormal` and
// `compute_abnormal` on every insert, undelete and refresh, and `edit.rs`,
// which turns removal plans into user-facing transactions.
//
// **Critical constraint: determinism.** Closure growth iterates sorted id
// sets, exclusion resolution walks edges in arena order, and every
// tie-break is by id. Identical graphs purge identically.

use std::collections::BTreeSet;

use quaver_geom::Rect;

use crate::config::InterpretConfig;
use crate::ensemble;
use crate::graph::SystemGraph;
use crate::relation::{Relation, RelationKind};
use crate::types::{CandidateId, RelationId, Shape, ShapeFamily};

// ---------------------------------------------------------------------------
// Mandatory relations and the abnormal flag
// ---------------------------------------------------------------------------

/// Relation kinds a candidate of this shape must carry to stand on its
/// own. Empty for self-sufficient shapes.
pub fn mandatory_kinds(shape: Shape) -> &'static [RelationKind] {
    use RelationKind::*;
    use Shape::*;
    match shape {
        // Whole heads stand alone; black and void heads need a stem, and
        // a stem needs at least one head.
        NoteheadBlack | NoteheadVoid | Stem => &[HeadStem],
        Beam | BeamHook => &[BeamStem],
        FlagUp1 | FlagUp2 | FlagUp3 | FlagDown1 | FlagDown2 | FlagDown3 => &[FlagStem],
        Flat | Natural | Sharp | DoubleFlat | DoubleSharp => &[AccidHead],
        Arpeggiato => &[ArpeggiatoChord],
        Accent | Staccato | Tenuto | Staccatissimo | Marcato => &[ArticulationChord],
        Trill | Turn | Mordent | MordentInverted => &[OrnamentChord],
        GraceNote | GraceNoteSlashed => &[GraceChord],
        PluckP | PluckI | PluckM | PluckA => &[PluckingChord],
        Tuplet3 | Tuplet6 => &[TupletChord],
        RepeatDot => &[RepeatDotBarline],
        MeasureNumber => &[MeasureCountRest],
        // Part shapes only make sense inside their assembled whole.
        FermataArc | FermataDot | Word => &[Containment],
        Time0 | Time1 | Time2 | Time3 | Time4 | Time5 | Time6 | Time7 | Time8 | Time9 => {
            &[Containment]
        }
        _ => &[],
    }
}

/// Whether a freshly inserted (or undeleted) candidate starts out
/// abnormal, before any relation has been searched for it.
pub fn initially_abnormal(shape: Shape) -> bool {
    !mandatory_kinds(shape).is_empty() || shape.is_container()
}

/// Recompute whether the candidate currently lacks something mandatory.
///
/// Removed candidates are never abnormal. A container is abnormal while
/// it holds no live member, on top of its own table entry.
pub fn compute_abnormal(graph: &SystemGraph, id: CandidateId) -> bool {
    let candidate = graph.candidate(id);
    if candidate.removed {
        return false;
    }
    if candidate.shape.is_container() && ensemble::members(graph, id).is_empty() {
        return true;
    }
    mandatory_kinds(candidate.shape)
        .iter()
        .any(|kind| !graph.has_relation(id, *kind))
}

// ---------------------------------------------------------------------------
// Removal closures
// ---------------------------------------------------------------------------

/// An all-or-nothing removal plan: the seeds plus every dependent the
/// graph cannot keep without them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemovalPlan {
    /// Candidates to remove, ascending id order. Includes the seeds.
    pub closure: Vec<CandidateId>,
    /// Set when the plan would tear a member out of a fixed-arity
    /// container without taking the container too. A cancelled plan must
    /// not be applied.
    pub cancelled: bool,
}

impl RemovalPlan {
    pub fn contains(&self, id: CandidateId) -> bool {
        self.closure.binary_search(&id).is_ok()
    }
}

/// Removal closure seeded at a single candidate.
pub fn pre_remove(graph: &SystemGraph, seed: CandidateId) -> RemovalPlan {
    pre_remove_many(graph, &[seed])
}

/// Removal closure over several seeds at once.
///
/// Growth rules, applied to a fixpoint:
///   - a removed container drags all its members, and a removed chord its
///     stem;
///   - a removed member whose container keeps no other live member drags
///     the container;
///   - a removed stem drags any attached chord left with no members.
///
/// Mirrors are never dragged: keeping one reading of a glyph and
/// dropping the other is the normal way ambiguity resolves.
pub fn pre_remove_many(graph: &SystemGraph, seeds: &[CandidateId]) -> RemovalPlan {
    let mut closure: BTreeSet<CandidateId> = seeds
        .iter()
        .copied()
        .filter(|&id| graph.is_live(id))
        .collect();

    loop {
        let mut grew = false;
        for id in closure.iter().copied().collect::<Vec<_>>() {
            let candidate = graph.candidate(id);

            if candidate.shape.is_container() {
                for member in ensemble::members(graph, id) {
                    grew |= closure.insert(member);
                }
            }
            if candidate.shape == Shape::HeadChord {
                for edge in graph.relations_of(id, &[RelationKind::ChordStem]) {
                    grew |= closure.insert(graph.opposite_of(id, edge));
                }
            }

            if let Some(owner) = candidate.ensemble
                && graph.is_live(owner)
                && !closure.contains(&owner)
                && ensemble::members(graph, owner)
                    .iter()
                    .all(|m| closure.contains(m))
            {
                closure.insert(owner);
                grew = true;
            }

            if candidate.shape == Shape::Stem {
                for edge in graph.relations_of(id, &[RelationKind::ChordStem]) {
                    let chord = graph.opposite_of(id, edge);
                    if graph.is_live(chord)
                        && !closure.contains(&chord)
                        && ensemble::members(graph, chord)
                            .iter()
                            .all(|m| closure.contains(m))
                    {
                        closure.insert(chord);
                        grew = true;
                    }
                }
            }
        }
        if !grew {
            break;
        }
    }

    // A fixed-arity container cannot survive the loss of part of its
    // members, and the closure did not grow to take it whole: veto.
    let cancelled = closure.iter().any(|&id| match graph.candidate(id).ensemble {
        Some(owner) if graph.is_live(owner) && !closure.contains(&owner) => {
            ensemble::fixed_arity(graph.candidate(owner).shape).is_some()
        }
        _ => false,
    });

    RemovalPlan {
        closure: closure.into_iter().collect(),
        cancelled,
    }
}

/// Apply a removal plan, tombstoning every closure member and its edges.
pub fn apply_removal(graph: &mut SystemGraph, config: &InterpretConfig, plan: &RemovalPlan) {
    debug_assert!(!plan.cancelled, "applying a cancelled removal plan");
    for &id in &plan.closure {
        graph.remove_candidate(config, id);
    }
}

// ---------------------------------------------------------------------------
// Reduction: exclusions and the weak purge
// ---------------------------------------------------------------------------

/// Insert exclusion edges between same-family candidates whose bounds
/// overlap enough to be competing readings of one glyph.
///
/// Declared mirror pairs and pairs already joined by any live edge are
/// left alone. Returns the number of edges added.
pub fn insert_exclusions(graph: &mut SystemGraph, config: &InterpretConfig) -> usize {
    let families: BTreeSet<ShapeFamily> = graph.iter_live().map(|c| c.shape.family()).collect();

    let mut added = 0;
    for family in families {
        let ids = graph.candidates_of(family);
        for (i, &a) in ids.iter().enumerate() {
            let a_bounds = graph.candidate(a).bounds();
            for &b in &ids[i + 1..] {
                let b_bounds = graph.candidate(b).bounds();
                if b_bounds.left() > a_bounds.right() {
                    break;
                }
                if graph.candidate(a).mirror == Some(b) || graph.related(a, b) {
                    continue;
                }
                if !competing(&a_bounds, &b_bounds, config.exclusion_overlap_ratio) {
                    continue;
                }
                graph.add_relation(config, a, b, Relation::exclusion());
                added += 1;
            }
        }
    }
    added
}

fn competing(a: &Rect, b: &Rect, ratio: f64) -> bool {
    let dx = a.x_overlap(b);
    let dy = a.y_overlap(b);
    if dx <= 0.0 || dy <= 0.0 {
        return false;
    }
    let smaller = a.area().min(b.area());
    smaller > 0.0 && dx * dy / smaller >= ratio
}

/// Resolve exclusions in favor of the better-graded reading, then drop
/// candidates too weak to keep.
///
/// Frozen candidates always survive, and a plan whose closure touches a
/// frozen candidate (or would break a fixed-arity container) is skipped
/// rather than half-applied. Returns the removed ids, ascending.
pub fn purge_weak(graph: &mut SystemGraph, config: &InterpretConfig) -> Vec<CandidateId> {
    let mut removed: BTreeSet<CandidateId> = BTreeSet::new();

    // Exclusions first, in edge arena order.
    let exclusions: Vec<(RelationId, CandidateId, CandidateId)> = graph
        .live_edges()
        .filter(|e| e.relation.kind == RelationKind::Exclusion)
        .map(|e| (e.id, e.source, e.target))
        .collect();
    for (edge, a, b) in exclusions {
        if graph.edge(edge).removed || !graph.is_live(a) || !graph.is_live(b) {
            continue;
        }
        let loser = match (graph.candidate(a).frozen, graph.candidate(b).frozen) {
            (true, true) => continue,
            (true, false) => b,
            (false, true) => a,
            (false, false) => {
                let grade_a = graph.candidate(a).best_grade();
                let grade_b = graph.candidate(b).best_grade();
                // Equal grades keep the earlier candidate.
                if grade_a >= grade_b { b } else { a }
            }
        };
        try_purge(graph, config, loser, &mut removed);
    }

    // Then whatever is left below the keep thresholds.
    let weak: Vec<CandidateId> = graph
        .iter_live()
        .filter(|c| !c.frozen)
        .filter(|c| {
            c.best_grade() < config.grades.min_contextual_grade
                || c.intrinsic() < config.grades.min_grade()
        })
        .map(|c| c.id)
        .collect();
    for id in weak {
        try_purge(graph, config, id, &mut removed);
    }

    removed.into_iter().collect()
}

fn try_purge(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    seed: CandidateId,
    removed: &mut BTreeSet<CandidateId>,
) {
    if !graph.is_live(seed) {
        return;
    }
    let plan = pre_remove(graph, seed);
    if plan.cancelled
        || plan
            .closure
            .iter()
            .any(|&id| graph.candidate(id).frozen)
    {
        return;
    }
    apply_removal(graph, config, &plan);
    removed.extend(plan.closure);
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Geometry;
    use crate::relation::{GapPair, StemPortion};
    use crate::types::SystemId;
    use quaver_geom::{HorizontalSide, LineSeg, Point};

    fn test_config() -> InterpretConfig {
        InterpretConfig::default()
    }

    fn head_at(graph: &mut SystemGraph, x: f64, y: f64, grade: f64) -> CandidateId {
        graph.insert(
            Shape::NoteheadBlack,
            Geometry::Box(Rect::new(x, y, 12.0, 10.0)),
            grade,
        )
    }

    fn stem_at(graph: &mut SystemGraph, x: f64, top: f64, bottom: f64) -> CandidateId {
        graph.insert(
            Shape::Stem,
            Geometry::Median {
                line: LineSeg::new(Point::new(x, top), Point::new(x, bottom)),
                width: 2.0,
            },
            0.6,
        )
    }

    fn head_stem_relation() -> Relation {
        Relation::head_stem(
            GapPair::new(0.05, 0.1),
            0.8,
            HorizontalSide::Right,
            StemPortion::Bottom,
        )
    }

    /// One chord holding two heads on one stem.
    fn chord_fixture() -> (
        SystemGraph,
        CandidateId,
        CandidateId,
        CandidateId,
        CandidateId,
    ) {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let low = head_at(&mut graph, 100.0, 220.0, 0.7);
        let high = head_at(&mut graph, 100.0, 200.0, 0.6);
        let stem = stem_at(&mut graph, 112.0, 140.0, 225.0);
        graph.add_relation(&config, low, stem, head_stem_relation());
        graph.add_relation(&config, high, stem, head_stem_relation());
        let chord = ensemble::build_head_chord(&mut graph, &config, &[low, high]);
        ensemble::adopt_stem(&mut graph, &config, chord, stem);
        (graph, low, high, stem, chord)
    }

    #[test]
    fn mandatory_table_spot_checks() {
        assert_eq!(
            mandatory_kinds(Shape::NoteheadBlack),
            &[RelationKind::HeadStem]
        );
        assert_eq!(mandatory_kinds(Shape::Stem), &[RelationKind::HeadStem]);
        assert_eq!(mandatory_kinds(Shape::FlagUp2), &[RelationKind::FlagStem]);
        assert_eq!(mandatory_kinds(Shape::Time6), &[RelationKind::Containment]);
        assert!(mandatory_kinds(Shape::NoteheadWhole).is_empty());
        assert!(mandatory_kinds(Shape::MultipleRest).is_empty());
        assert!(mandatory_kinds(Shape::BarlineThin).is_empty());
        // Containers start abnormal through membership, not the table.
        assert!(mandatory_kinds(Shape::HeadChord).is_empty());
        assert!(initially_abnormal(Shape::HeadChord));
        assert!(!initially_abnormal(Shape::MultipleRest));
    }

    #[test]
    fn abnormal_follows_mandatory_relation_presence() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let head = head_at(&mut graph, 100.0, 200.0, 0.6);
        let stem = stem_at(&mut graph, 112.0, 140.0, 205.0);
        assert!(compute_abnormal(&graph, head));

        let edge = graph.add_relation(&config, head, stem, head_stem_relation());
        assert!(!compute_abnormal(&graph, head));
        assert!(!compute_abnormal(&graph, stem));

        graph.remove_relation(&config, edge);
        assert!(compute_abnormal(&graph, head));
        assert!(graph.candidate(head).abnormal);
    }

    #[test]
    fn memberless_container_is_abnormal() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let word = graph.insert(
            Shape::Word,
            Geometry::Box(Rect::new(50.0, 300.0, 40.0, 12.0)),
            0.8,
        );
        let sentence = ensemble::build_sentence(&mut graph, &config, &[word]);
        assert!(!compute_abnormal(&graph, sentence));

        ensemble::remove_member(&mut graph, &config, sentence, word);
        assert!(compute_abnormal(&graph, sentence));
        assert!(graph.candidate(sentence).abnormal);
    }

    #[test]
    fn stem_removal_spares_chord_with_remaining_members() {
        let (graph, low, high, stem, chord) = chord_fixture();
        let plan = pre_remove(&graph, stem);
        assert_eq!(plan.closure, vec![stem]);
        assert!(!plan.cancelled);
        assert!(!plan.contains(chord));
        assert!(!plan.contains(low));
        assert!(!plan.contains(high));
    }

    #[test]
    fn last_head_drags_chord_and_stem() {
        let config = test_config();
        let (mut graph, low, high, stem, chord) = chord_fixture();

        let first = pre_remove(&graph, low);
        assert_eq!(first.closure, vec![low]);
        apply_removal(&mut graph, &config, &first);

        // `high` is now the last member: the chord goes, and the chord
        // takes its stem.
        let second = pre_remove(&graph, high);
        assert_eq!(second.closure, vec![high, stem, chord]);
        assert!(!second.cancelled);
        apply_removal(&mut graph, &config, &second);
        assert!(!graph.is_live(chord));
        assert!(!graph.is_live(stem));
    }

    #[test]
    fn chord_removal_drags_members_and_stem() {
        let (graph, low, high, stem, chord) = chord_fixture();
        let plan = pre_remove(&graph, chord);
        assert_eq!(plan.closure, vec![low, high, stem, chord]);
        assert!(!plan.cancelled);
    }

    #[test]
    fn partial_time_pair_removal_is_cancelled() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let num = graph.insert(
            Shape::Time4,
            Geometry::Box(Rect::new(300.0, 180.0, 10.0, 14.0)),
            0.6,
        );
        let den = graph.insert(
            Shape::Time4,
            Geometry::Box(Rect::new(300.0, 196.0, 10.0, 14.0)),
            0.6,
        );
        let pair = ensemble::build_time_pair(&mut graph, &config, num, den);

        let partial = pre_remove(&graph, num);
        assert!(partial.cancelled);
        assert!(partial.contains(num));

        // Taking the whole pair is fine and drags both digits.
        let whole = pre_remove(&graph, pair);
        assert!(!whole.cancelled);
        assert_eq!(whole.closure, vec![num, den, pair]);

        // Seeding both digits at once also resolves to the whole pair.
        let both = pre_remove_many(&graph, &[num, den]);
        assert!(!both.cancelled);
        assert_eq!(both.closure, vec![num, den, pair]);
    }

    #[test]
    fn exclusions_link_overlapping_same_family_readings() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let a = head_at(&mut graph, 100.0, 200.0, 0.7);
        // Shifted by a couple of pixels: same ink, two readings.
        let b = head_at(&mut graph, 102.0, 201.0, 0.5);
        // Far away, same family: no exclusion.
        let far = head_at(&mut graph, 400.0, 200.0, 0.6);
        // Overlapping but family differs.
        let flat = graph.insert(
            Shape::Flat,
            Geometry::Box(Rect::new(101.0, 198.0, 8.0, 18.0)),
            0.6,
        );

        let added = insert_exclusions(&mut graph, &config);
        assert_eq!(added, 1);
        assert!(graph.has_relation(a, RelationKind::Exclusion));
        assert!(graph.has_relation(b, RelationKind::Exclusion));
        assert!(!graph.has_relation(far, RelationKind::Exclusion));
        assert!(!graph.has_relation(flat, RelationKind::Exclusion));

        // Idempotent: the existing edge suppresses a duplicate.
        assert_eq!(insert_exclusions(&mut graph, &config), 0);
    }

    #[test]
    fn mirror_pairs_are_never_excluded() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let a = head_at(&mut graph, 100.0, 200.0, 0.7);
        let b = head_at(&mut graph, 100.0, 200.0, 0.7);
        graph.set_mirrors(a, b);
        assert_eq!(insert_exclusions(&mut graph, &config), 0);
    }

    #[test]
    fn purge_keeps_the_better_reading() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let strong = head_at(&mut graph, 100.0, 200.0, 0.7);
        let weak = head_at(&mut graph, 102.0, 201.0, 0.55);
        // Keep both above the weak thresholds so only the exclusion acts.
        let stem = stem_at(&mut graph, 112.0, 140.0, 205.0);
        graph.add_relation(&config, strong, stem, head_stem_relation());
        graph.add_relation(&config, weak, stem, head_stem_relation());
        insert_exclusions(&mut graph, &config);

        let removed = purge_weak(&mut graph, &config);
        assert_eq!(removed, vec![weak]);
        assert!(graph.is_live(strong));
        assert!(graph.is_live(stem));
    }

    #[test]
    fn frozen_candidates_survive_purge() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let strong = head_at(&mut graph, 100.0, 200.0, 0.7);
        let weak = head_at(&mut graph, 102.0, 201.0, 0.55);
        let stem = stem_at(&mut graph, 112.0, 140.0, 205.0);
        graph.add_relation(&config, strong, stem, head_stem_relation());
        graph.add_relation(&config, weak, stem, head_stem_relation());
        insert_exclusions(&mut graph, &config);

        // The user pinned the weaker reading: the stronger one loses.
        graph.candidate_mut(weak).freeze();
        let removed = purge_weak(&mut graph, &config);
        assert_eq!(removed, vec![strong]);
        assert!(graph.is_live(weak));
    }

    #[test]
    fn purge_drops_unsupported_weak_candidates() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        // An articulation sign with nothing to attach to and a grade
        // below the contextual floor.
        let stray = graph.insert(
            Shape::Accent,
            Geometry::Box(Rect::new(150.0, 180.0, 10.0, 6.0)),
            0.3,
        );
        // A decent standalone rest stays.
        let rest = graph.insert(
            Shape::MultipleRest,
            Geometry::Box(Rect::new(200.0, 200.0, 80.0, 10.0)),
            0.7,
        );

        let removed = purge_weak(&mut graph, &config);
        assert_eq!(removed, vec![stray]);
        assert!(graph.is_live(rest));

        // Frozen, the same stray would have survived.
        let pinned = graph.insert(
            Shape::Accent,
            Geometry::Box(Rect::new(150.0, 180.0, 10.0, 6.0)),
            0.3,
        );
        graph.candidate_mut(pinned).freeze();
        assert!(purge_weak(&mut graph, &config).is_empty());
        assert!(graph.is_live(pinned));
    }
}
