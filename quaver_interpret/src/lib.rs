// quaver_interpret — symbol interpretation for optical music recognition.
//
// This crate takes the uncertain symbol candidates produced by a
// classifier (each a shape, a geometry and a recognition grade) and turns
// them into a consistent reading of a music page. Candidates live in one
// Symbol Interpretation Graph per system; typed, graded relations record
// how candidates support or exclude one another; geometric link searches
// propose those relations; contextual grades let well-connected readings
// rise and isolated ones fall until reduction settles what survives.
// The crate is pure interpretation logic: no image processing, no
// classifier, no UI.
//
// Module overview:
// - `types.rs`:         Ids, shapes, shape families, the STRICT/RELAXED profile.
// - `config.rs`:        InterpretConfig — every gap window, grade floor and support coefficient.
// - `grade.rs`:         Grade algebra — intrinsic scaling, gap grading, contextual combination.
// - `staff.rs`:         Staff and SystemLayout — interline geometry and pitch positions.
// - `relation.rs`:      Relation and RelationKind — the typed, graded edge payloads.
// - `event.rs`:         EventLog — journal of graph changes for incremental consumers.
// - `candidate.rs`:     Candidate — shape + geometry + grades + flags, the graph vertex.
// - `graph.rs`:         SystemGraph — candidate and edge arenas, one graph per system.
// - `ensemble.rs`:      Containers (head chords, time pairs) and their membership.
// - `consistency.rs`:   Abnormal upkeep, removal closures, exclusions, the weak purge.
// - `search.rs`:        The linker template and the search driver.
// - `stem_links.rs`:    Heads, flags and beams around stems; stem direction inference.
// - `head_links.rs`:    Accidentals finding heads, arpeggiato signs finding chords.
// - `chord_links.rs`:   Chord-seeking marks, from articulations to dynamics and markers.
// - `barline_links.rs`: Repeat dots at barlines and in pairs, measure numbers over rests.
// - `edit.rs`:          Editing transactions — create, move, reshape, remove.
// - `pipeline.rs`:      Page drive — parallel per-system pass, then slur reconciliation.
// - `geom`:             Re-exported from `quaver_geom` — points, rects, line segments, sides.
//
// The companion crate `quaver_geom` holds the plain geometry this crate
// measures with; it knows nothing about music. Everything downstream of a
// classifier and upstream of score export goes through here.
//
// **Critical constraint: determinism.** Interpreting the same candidates
// with the same config and profile must produce the same graph, whatever
// the thread count. Every selection is id-ordered or cost-ordered with an
// id tie-break, hash maps are point lookups only (never iterated), and
// the parallel page pass shares no state between systems.

pub mod barline_links;
pub mod candidate;
pub mod chord_links;
pub mod config;
pub mod consistency;
pub mod edit;
pub mod ensemble;
pub mod event;
pub use quaver_geom as geom;
pub mod grade;
pub mod graph;
pub mod head_links;
pub mod pipeline;
pub mod relation;
pub mod search;
pub mod staff;
pub mod stem_links;
pub mod types;
