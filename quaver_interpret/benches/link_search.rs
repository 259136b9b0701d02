// Link-search benchmarks: per-system linking and full interpretation over
// synthetic systems of growing measure counts, plus the single-subject
// search that editing hits on every move.
//
// Systems are built from a repeated measure cell (head, stem, flag,
// accidental, repeat dots, barline) so the sweep always has near and far
// partners to reject.

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use quaver_geom::{LineSeg, Point, Rect};
use quaver_interpret::candidate::Geometry;
use quaver_interpret::config::InterpretConfig;
use quaver_interpret::graph::SystemGraph;
use quaver_interpret::pipeline;
use quaver_interpret::search;
use quaver_interpret::staff::SystemLayout;
use quaver_interpret::types::{CandidateId, Profile, Shape, SystemId};

const MEASURE_WIDTH: f64 = 150.0;

fn seeded_system(measures: u32) -> (SystemLayout, SystemGraph) {
    let right = 100.0 + MEASURE_WIDTH * f64::from(measures);
    let layout = SystemLayout::single(SystemId(0), 20.0, 100.0, 0.0, right);
    let mut graph = SystemGraph::new(SystemId(0));
    for k in 0..measures {
        let x0 = 60.0 + MEASURE_WIDTH * f64::from(k);
        graph.insert(
            Shape::NoteheadBlack,
            Geometry::Box(Rect::new(x0, 200.0, 12.0, 10.0)),
            0.7,
        );
        graph.insert(
            Shape::Stem,
            Geometry::Median {
                line: LineSeg::new(Point::new(x0 + 13.0, 150.0), Point::new(x0 + 13.0, 209.0)),
                width: 2.0,
            },
            0.6,
        );
        graph.insert(
            Shape::FlagUp1,
            Geometry::Box(Rect::new(x0 + 13.0, 150.0, 12.0, 18.0)),
            0.6,
        );
        graph.insert(
            Shape::Sharp,
            Geometry::Box(Rect::new(x0 - 18.0, 197.0, 8.0, 22.0)),
            0.65,
        );
        graph.insert(
            Shape::RepeatDot,
            Geometry::Box(Rect::new(x0 + 80.0, 147.0, 6.0, 6.0)),
            0.6,
        );
        graph.insert(
            Shape::RepeatDot,
            Geometry::Box(Rect::new(x0 + 80.0, 127.0, 6.0, 6.0)),
            0.6,
        );
        graph.insert(
            Shape::BarlineThin,
            Geometry::Box(Rect::new(x0 + 90.0, 100.0, 3.0, 80.0)),
            0.8,
        );
    }
    (layout, graph)
}

fn bench_link_pass(c: &mut Criterion) {
    let config = InterpretConfig::default();
    let mut group = c.benchmark_group("link_pass");
    for measures in [8u32, 32, 128] {
        let (layout, graph) = seeded_system(measures);
        group.throughput(Throughput::Elements(graph.live_count() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(measures),
            &(&layout, &graph),
            |b, (layout, graph)| {
                b.iter_batched(
                    || (*graph).clone(),
                    |mut g| pipeline::link_pass(&mut g, layout, &config, Profile::STRICT),
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_interpret_system(c: &mut Criterion) {
    let config = InterpretConfig::default();
    let mut group = c.benchmark_group("interpret_system");
    for measures in [8u32, 32, 128] {
        let (layout, graph) = seeded_system(measures);
        group.throughput(Throughput::Elements(graph.live_count() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(measures),
            &(&layout, &graph),
            |b, (layout, graph)| {
                b.iter_batched(
                    || (*graph).clone(),
                    |mut g| {
                        black_box(pipeline::interpret_system(
                            &mut g,
                            layout,
                            &config,
                            Profile::STRICT,
                        ))
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_single_subject(c: &mut Criterion) {
    let config = InterpretConfig::default();
    let (layout, mut graph) = seeded_system(128);
    pipeline::link_pass(&mut graph, &layout, &config, Profile::STRICT);
    // A head mid-system, as an editing relink would search it.
    let subject = CandidateId(7 * 64);

    c.bench_function("single_subject_search", |b| {
        b.iter(|| {
            black_box(search::search_links(
                &graph,
                &layout,
                &config,
                Profile::STRICT,
                subject,
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_link_pass,
    bench_interpret_system,
    bench_single_subject
);
criterion_main!(benches);
