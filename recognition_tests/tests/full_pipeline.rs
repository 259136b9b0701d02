// End-to-end scenarios for the interpretation pipeline.
//
// Each test lays out a score fragment from real candidates (via
// SystemFixture), runs the same link/exclude/purge path as a live
// recognition run, and verifies the resulting graph: which relations got
// committed, who survived reduction, and what editing transactions do to
// the neighborhood afterwards. Serialization and determinism round-trips
// close the file.

use quaver_geom::{HorizontalSide, LineSeg, Point, Rect};
use quaver_interpret::candidate::{ExternalLink, Geometry};
use quaver_interpret::config::InterpretConfig;
use quaver_interpret::edit;
use quaver_interpret::ensemble;
use quaver_interpret::graph::SystemGraph;
use quaver_interpret::pipeline::{self, System};
use quaver_interpret::relation::RelationKind;
use quaver_interpret::search;
use quaver_interpret::types::{Profile, Rational, Shape, SystemId};
use recognition_tests::{SystemFixture, standard_measure};

fn beside_the_head() -> Geometry {
    Geometry::Median {
        line: LineSeg::new(Point::new(113.0, 150.0), Point::new(113.0, 209.0)),
        width: 2.0,
    }
}

// ---------------------------------------------------------------------------
// Linking scenarios
// ---------------------------------------------------------------------------

/// A head with stem, flag and sharp, plus a repeat-dotted barline, all
/// link up and survive reduction; every committed relation clears the
/// grade floor and no (source, target, kind) triple repeats.
#[test]
fn measure_interprets_end_to_end() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let [head, stem, flag, sharp, low_dot, high_dot, barline] = standard_measure(&mut fix);

    let removed = fix.interpret(&config, Profile::STRICT);
    assert!(removed.is_empty());

    let g = &fix.graph;
    assert!(g.relation_between(head, stem, RelationKind::HeadStem).is_some());
    assert!(g.relation_between(flag, stem, RelationKind::FlagStem).is_some());
    assert!(g.relation_between(sharp, head, RelationKind::AccidHead).is_some());
    assert!(
        g.relation_between(low_dot, barline, RelationKind::RepeatDotBarline)
            .is_some()
    );
    assert!(
        g.relation_between(high_dot, barline, RelationKind::RepeatDotBarline)
            .is_some()
    );
    assert!(
        g.relation_between(low_dot, high_dot, RelationKind::RepeatDotPair)
            .is_some()
    );
    for candidate in g.iter_live() {
        assert!(!candidate.abnormal, "{} should be settled", candidate.id);
    }

    for edge in g.live_edges() {
        assert!(edge.relation.grade >= config.relation_min_grade);
    }
    let mut triples: Vec<_> = g
        .live_edges()
        .map(|e| (e.source, e.target, e.relation.kind))
        .collect();
    let committed = triples.len();
    triples.sort();
    triples.dedup();
    assert_eq!(triples.len(), committed);
}

/// A flag links its stem only when the stem's inferred direction agrees
/// with the flag's orientation: a down flag at the foot of an up stem is
/// geometrically perfect and still rejected.
#[test]
fn flag_needs_an_agreeing_stem_direction() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let _head = fix.head(100.0, 200.0, 0.7);
    let stem = fix.stem(113.0, 150.0, 209.0);
    let wrong = fix.flag(Shape::FlagDown1, 113.0, 191.0);

    fix.interpret(&config, Profile::STRICT);

    let g = &fix.graph;
    assert!(g.relation_between(wrong, stem, RelationKind::FlagStem).is_none());
    assert!(g.is_live(wrong));
    assert!(g.candidate(wrong).abnormal);
}

/// An accidental left of a mirrored head reaches both twins in one
/// search: the selected link is doubled onto the live mirror, and both
/// relations survive reduction (mirrors never exclude each other).
#[test]
fn mirrored_head_shares_one_accidental() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let up_voice = fix.head(100.0, 195.0, 0.7);
    let down_voice = fix.boxed(
        Shape::NoteheadVoid,
        Rect::new(100.0, 195.0, 12.0, 10.0),
        0.7,
    );
    fix.graph.set_mirrors(up_voice, down_voice);
    let sharp = fix.sharp(82.0, 192.0);

    let links = search::search_links(&fix.graph, &fix.layout, &config, Profile::STRICT, sharp);
    assert_eq!(links.len(), 2);

    fix.interpret(&config, Profile::STRICT);

    let g = &fix.graph;
    assert!(g.relation_between(sharp, up_voice, RelationKind::AccidHead).is_some());
    assert!(
        g.relation_between(sharp, down_voice, RelationKind::AccidHead)
            .is_some()
    );
    assert!(g.is_live(up_voice) && g.is_live(down_voice));
}

// ---------------------------------------------------------------------------
// Ensembles and editing
// ---------------------------------------------------------------------------

/// Removing one of two chord heads leaves the chord and stem in place;
/// removing the last head drags the chord and its stem along in one plan.
#[test]
fn chord_cascade_respects_remaining_members() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let low = fix.head(100.0, 190.0, 0.7);
    let high = fix.head(100.0, 170.0, 0.7);
    let stem = fix.stem(113.0, 130.0, 209.0);
    fix.interpret(&config, Profile::STRICT);

    let chord = ensemble::build_head_chord(&mut fix.graph, &config, &[low, high]);
    ensemble::adopt_stem(&mut fix.graph, &config, chord, stem);

    let removed = edit::remove(&mut fix.graph, &config, low).unwrap();
    assert_eq!(removed, vec![low]);
    assert!(fix.graph.is_live(chord));
    assert!(fix.graph.is_live(stem));
    assert_eq!(ensemble::members(&fix.graph, chord), vec![high]);

    let removed = edit::remove(&mut fix.graph, &config, high).unwrap();
    assert_eq!(removed, vec![high, stem, chord]);
    assert_eq!(fix.graph.live_count(), 0);
}

/// A time-signature pair assembled from two '4' digits reads 4/4 and
/// takes the mean of its member grades.
#[test]
fn time_pair_reads_its_digits() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let numerator = fix.boxed(Shape::Time4, Rect::new(60.0, 100.0, 14.0, 40.0), 0.8);
    let denominator = fix.boxed(Shape::Time4, Rect::new(60.0, 140.0, 14.0, 40.0), 0.6);

    let pair = ensemble::build_time_pair(&mut fix.graph, &config, numerator, denominator);

    assert_eq!(
        ensemble::time_pair_value(&fix.graph, pair),
        Rational::new(4, 4)
    );
    assert!((fix.graph.candidate(pair).intrinsic() - 0.7).abs() < 1e-9);
    assert!(!fix.graph.candidate(numerator).abnormal);
    assert!(!fix.graph.candidate(pair).abnormal);
}

/// The abnormal flag follows mandatory relations through editing: a lone
/// head is flagged, a created stem beside it clears the flag, removing
/// the stem raises it again.
#[test]
fn abnormal_follows_mandatory_relations() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let head = fix.head(100.0, 200.0, 0.7);
    fix.interpret(&config, Profile::STRICT);
    assert!(fix.graph.candidate(head).abnormal);

    let stem = edit::create_valid_added(
        &mut fix.graph,
        &fix.layout,
        &config,
        Profile::STRICT,
        Shape::Stem,
        beside_the_head(),
        0.6,
    )
    .expect("a stem beside a head must be kept");
    assert!(!fix.graph.candidate(head).abnormal);

    edit::remove(&mut fix.graph, &config, stem).unwrap();
    assert!(fix.graph.candidate(head).abnormal);
}

/// Undeleting brings a candidate back bare: live again, flagged for
/// review, none of its old relations restored.
#[test]
fn undelete_restores_a_bare_candidate() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let [head, stem, ..] = standard_measure(&mut fix);
    fix.interpret(&config, Profile::STRICT);

    edit::remove(&mut fix.graph, &config, head).unwrap();
    assert!(!fix.graph.is_live(head));

    fix.graph.undelete(head);
    let g = &fix.graph;
    assert!(g.is_live(head));
    assert!(g.candidate(head).abnormal);
    assert!(
        g.relations_of(head, &[RelationKind::HeadStem, RelationKind::AccidHead])
            .is_empty()
    );
    // The stem lost its only head and stays flagged until a search runs.
    assert!(g.candidate(stem).abnormal);
}

// ---------------------------------------------------------------------------
// Reduction
// ---------------------------------------------------------------------------

/// A frozen candidate survives reduction even when an exclusion pits it
/// against a better-graded competitor; the competitor goes instead.
#[test]
fn frozen_candidates_survive_the_purge() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let confirmed = fix.head(100.0, 140.0, 0.3);
    let competitor = fix.head(102.0, 141.0, 0.75);
    fix.graph.candidate_mut(confirmed).frozen = true;

    let removed = fix.interpret(&config, Profile::STRICT);
    assert_eq!(removed, vec![competitor]);
    assert!(fix.graph.is_live(confirmed));
}

/// Exclusion resolution compares contextual grades, not raw classifier
/// ones: a weaker-classified head with a stem beats a stronger loner.
#[test]
fn exclusion_resolution_prefers_support() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let supported = fix.head(100.0, 195.0, 0.55);
    let loner = fix.boxed(
        Shape::NoteheadBlack,
        Rect::new(96.0, 196.0, 12.0, 10.0),
        0.6,
    );
    let stem = fix.stem(113.0, 150.0, 209.0);

    let removed = fix.interpret(&config, Profile::STRICT);
    assert_eq!(removed, vec![loner]);
    assert!(fix.graph.is_live(supported));
    assert!(fix.graph.is_live(stem));
}

/// A committed support raises the partner's contextual grade; removing
/// it drops the grade back to the intrinsic value.
#[test]
fn contextual_grade_rises_and_falls() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let head = fix.head(100.0, 200.0, 0.5);
    fix.interpret(&config, Profile::STRICT);
    let lonely = fix.graph.candidate(head).best_grade();
    assert!((lonely - 0.5).abs() < 1e-12);

    let stem = edit::create_valid_added(
        &mut fix.graph,
        &fix.layout,
        &config,
        Profile::STRICT,
        Shape::Stem,
        beside_the_head(),
        0.6,
    )
    .expect("a stem beside a head must be kept");
    let supported = fix.graph.candidate(head).best_grade();
    assert!(supported > lonely);

    edit::remove(&mut fix.graph, &config, stem).unwrap();
    let back = fix.graph.candidate(head).best_grade();
    assert!((back - 0.5).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Stability and round-trips
// ---------------------------------------------------------------------------

/// Re-running every live candidate's searches against an interpreted
/// graph commits nothing new and reports nothing stale: the graph is a
/// fixpoint of its own searches.
#[test]
fn interpreted_graph_is_a_search_fixpoint() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    standard_measure(&mut fix);
    fix.interpret(&config, Profile::STRICT);

    let snapshot = fix.graph.clone();
    let ids: Vec<_> = fix.graph.iter_live().map(|c| c.id).collect();
    for id in ids {
        let links = search::search_links(&fix.graph, &fix.layout, &config, Profile::STRICT, id);
        for link in &links {
            link.apply(&mut fix.graph, &config, id);
        }
        let shape = fix.graph.candidate(id).shape;
        let kinds: Vec<RelationKind> = search::linkers_for(shape)
            .iter()
            .map(|linker| linker.kind())
            .collect();
        assert!(
            search::search_unlinks(&fix.graph, &fix.layout, &config, Profile::STRICT, id, &kinds)
                .is_empty()
        );
    }
    assert_eq!(fix.graph, snapshot);
}

/// A full page pass is deterministic: interpreting clones on the rayon
/// pool yields identical graphs, cross-break continuations included.
#[test]
fn page_interpretation_is_deterministic() {
    let config = InterpretConfig::default();
    let mut slurs = Vec::new();
    let mut page: Vec<System> = (0..4)
        .map(|i| {
            let mut fix = SystemFixture::new(i, 100.0 + 220.0 * f64::from(i));
            standard_measure(&mut fix);
            let top = fix.staff_top;
            let right = fix.slur(Rect::new(1160.0, top + 10.0, 38.0, 16.0));
            let left = fix.slur(Rect::new(1.0, top + 12.0, 30.0, 16.0));
            slurs.push((right, left));
            fix.into_system()
        })
        .collect();
    let mut replay = page.clone();

    pipeline::interpret_page(&mut page, &config, Profile::STRICT);
    pipeline::interpret_page(&mut replay, &config, Profile::STRICT);

    for (a, b) in page.iter().zip(&replay) {
        assert_eq!(a.graph, b.graph);
    }
    assert_eq!(
        page[0].graph.candidate(slurs[0].0).external_link,
        Some(ExternalLink {
            side: HorizontalSide::Right,
            system: SystemId(1),
            candidate: slurs[1].1,
        })
    );
}

/// A graph snapshot survives bincode: deserializing and rebuilding the
/// derived index yields an equal graph that still answers queries.
#[test]
fn snapshot_round_trips_through_bincode() {
    let config = InterpretConfig::default();
    let mut fix = SystemFixture::new(0, 100.0);
    let [head, stem, ..] = standard_measure(&mut fix);
    fix.interpret(&config, Profile::STRICT);

    let bytes = bincode::serialize(&fix.graph).unwrap();
    let mut restored: SystemGraph = bincode::deserialize(&bytes).unwrap();
    restored.rebuild_indexes();

    assert_eq!(restored, fix.graph);
    assert!(
        restored
            .relation_between(head, stem, RelationKind::HeadStem)
            .is_some()
    );
}

/// The whole parameter set round-trips through JSON unchanged, presets
/// included.
#[test]
fn config_round_trips_through_json() {
    for config in [InterpretConfig::default(), InterpretConfig::handwritten()] {
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: InterpretConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
