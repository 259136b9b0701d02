// The per-system interpretation graph.
//
// One `SystemGraph` owns every candidate and relation inside one system (a
// horizontal band of staves). Candidates and edges live in `Vec` arenas
// indexed by `CandidateId`/`RelationId`; removal tombstones the slot so ids
// stay stable across the whole lifetime of the graph. Incident edges are
// kept per candidate in small inline vectors.
//
// All iteration that can influence results is over arenas or explicitly
// sorted views. The only hash map is the (source, target, kind) uniqueness
// index, which is consulted point-wise and never iterated.
//
// See also: `consistency.rs` for the abnormal table, removal closures and
// the purge pass, `search.rs` for how sorted partner views feed the link
// engines, `event.rs` for the journal every mutation writes to.
//
// **Critical constraint: determinism.** Ids are allocation order; sorted
// views tie-break on id; edge lists are insertion-ordered and filtered,
// never hashed. Two identical command sequences produce identical graphs,
// event for event.

use crate::candidate::{Candidate, Geometry};
use crate::config::InterpretConfig;
use crate::consistency;
use crate::event::{EventLog, GraphEvent};
use crate::grade;
use crate::relation::{Relation, RelationKind};
use crate::staff::SystemLayout;
use crate::types::{CandidateId, RelationId, Shape, ShapeFamily, SystemId};
use quaver_geom::Rect;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A stored edge: endpoints plus the relation payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub id: RelationId,
    pub source: CandidateId,
    pub target: CandidateId,
    pub relation: Relation,
    pub removed: bool,
}

type IncidentList = SmallVec<[RelationId; 4]>;

/// The symbol interpretation graph of one system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemGraph {
    pub system: SystemId,
    candidates: Vec<Candidate>,
    edges: Vec<RelationEdge>,
    /// Incident edge ids (both directions) per candidate slot.
    incident: Vec<IncidentList>,
    /// Uniqueness index over live edges. Rebuilt after deserialization;
    /// never iterated.
    #[serde(skip)]
    pair_index: FxHashMap<(CandidateId, CandidateId, RelationKind), RelationId>,
    pub events: EventLog,
}

// Manual PartialEq: the uniqueness index is derived from the edge arena
// and must not affect equality (a deserialized graph equals its source).
impl PartialEq for SystemGraph {
    fn eq(&self, other: &Self) -> bool {
        self.system == other.system
            && self.candidates == other.candidates
            && self.edges == other.edges
            && self.incident == other.incident
            && self.events == other.events
    }
}

impl SystemGraph {
    pub fn new(system: SystemId) -> Self {
        Self {
            system,
            candidates: Vec::new(),
            edges: Vec::new(),
            incident: Vec::new(),
            pair_index: FxHashMap::default(),
            events: EventLog::default(),
        }
    }

    /// Rebuild the transient uniqueness index. Must be called once after
    /// deserializing a graph, before any mutation.
    pub fn rebuild_indexes(&mut self) {
        self.pair_index.clear();
        for edge in &self.edges {
            if !edge.removed {
                self.pair_index
                    .insert((edge.source, edge.target, edge.relation.kind), edge.id);
            }
        }
    }

    // -- candidates --------------------------------------------------------

    /// Insert a new candidate and run its insertion effects: shapes whose
    /// mandatory partner is still missing start out abnormal.
    pub fn insert(&mut self, shape: Shape, geometry: Geometry, intrinsic: f64) -> CandidateId {
        let id = CandidateId(self.candidates.len() as u32);
        let mut candidate = Candidate::new(id, shape, geometry, intrinsic);
        candidate.abnormal = consistency::initially_abnormal(shape);
        self.candidates.push(candidate);
        self.incident.push(IncidentList::new());
        self.events.push(GraphEvent::CandidateAdded { id, shape });
        id
    }

    pub fn candidate(&self, id: CandidateId) -> &Candidate {
        &self.candidates[id.index()]
    }

    pub fn candidate_mut(&mut self, id: CandidateId) -> &mut Candidate {
        &mut self.candidates[id.index()]
    }

    /// True if the id names a candidate that is present (not removed).
    pub fn is_live(&self, id: CandidateId) -> bool {
        self.candidates
            .get(id.index())
            .is_some_and(|c| !c.removed)
    }

    pub fn live_count(&self) -> usize {
        self.candidates.iter().filter(|c| !c.removed).count()
    }

    /// All live candidates in id order.
    pub fn iter_live(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| !c.removed)
    }

    /// Assign the candidate to the staff closest to its center.
    pub fn assign_staff(&mut self, id: CandidateId, layout: &SystemLayout) {
        let center = self.candidates[id.index()].center();
        let staff = layout.closest_staff(center).id;
        self.candidates[id.index()].staff = Some(staff);
    }

    /// Declare two candidates mirrors of each other (two readings of one
    /// glyph, e.g. a head shared between voices).
    pub fn set_mirrors(&mut self, a: CandidateId, b: CandidateId) {
        self.candidates[a.index()].mirror = Some(b);
        self.candidates[b.index()].mirror = Some(a);
    }

    /// Remove a candidate together with all its incident relations.
    ///
    /// This is the primitive removal: it takes one candidate out and leaves
    /// partners revalidated. Closure-aware removal (chords pulling their
    /// stem, emptied ensembles) is planned by `consistency::pre_remove` and
    /// executed by `consistency::apply_removal`.
    pub fn remove_candidate(&mut self, config: &InterpretConfig, id: CandidateId) {
        if self.candidates[id.index()].removed {
            return;
        }
        let incident: Vec<RelationId> = self.live_incident(id).collect();
        for edge_id in incident {
            self.remove_relation(config, edge_id);
        }
        let shape = self.candidates[id.index()].shape;
        self.candidates[id.index()].removed = true;
        self.events.push(GraphEvent::CandidateRemoved { id, shape });
    }

    /// Restore a removed candidate. Its relations are gone for good; the
    /// caller re-links through search.
    pub fn undelete(&mut self, id: CandidateId) {
        let candidate = &mut self.candidates[id.index()];
        if !candidate.removed {
            return;
        }
        candidate.removed = false;
        candidate.abnormal = consistency::initially_abnormal(candidate.shape);
        self.events.push(GraphEvent::CandidateUndeleted { id });
    }

    // -- typed, sorted views ----------------------------------------------

    /// Live candidates of one shape family, sorted by abscissa (left edge)
    /// with id as tie-break. This is the partner list every search sweeps.
    pub fn candidates_of(&self, family: ShapeFamily) -> Vec<CandidateId> {
        let mut ids: Vec<CandidateId> = self
            .candidates
            .iter()
            .filter(|c| !c.removed && c.shape.family() == family)
            .map(|c| c.id)
            .collect();
        ids.sort_by(|a, b| {
            let ax = self.candidates[a.index()].bounds().x;
            let bx = self.candidates[b.index()].bounds().x;
            ax.total_cmp(&bx).then_with(|| a.cmp(b))
        });
        ids
    }

    /// Members of `sorted` (abscissa-sorted) whose bounds intersect the
    /// box. The scan stops at the first candidate starting right of the
    /// box, so the cost is bounded by the box, not the system width.
    pub fn intersected(&self, sorted: &[CandidateId], lookup: &Rect) -> Vec<CandidateId> {
        let mut hits = Vec::new();
        for &id in sorted {
            let bounds = self.candidates[id.index()].bounds();
            if bounds.left() > lookup.right() {
                break;
            }
            if bounds.intersects(lookup) {
                hits.push(id);
            }
        }
        hits
    }

    // -- relations ---------------------------------------------------------

    /// Commit a relation between two live candidates.
    ///
    /// Idempotent: if an equal-kind relation already exists for the ordered
    /// pair, the existing id is returned and nothing changes. Symmetric
    /// kinds are normalized to run from the lower id to the higher one
    /// before the idempotence check. Both endpoints are re-contextualized
    /// and their abnormal flags recomputed.
    pub fn add_relation(
        &mut self,
        config: &InterpretConfig,
        source: CandidateId,
        target: CandidateId,
        relation: Relation,
    ) -> RelationId {
        let (source, target) = if relation.kind.is_symmetric() && target < source {
            (target, source)
        } else {
            (source, target)
        };
        debug_assert!(self.is_live(source) && self.is_live(target));

        if let Some(&existing) = self.pair_index.get(&(source, target, relation.kind)) {
            return existing;
        }

        let id = RelationId(self.edges.len() as u32);
        self.edges.push(RelationEdge {
            id,
            source,
            target,
            relation,
            removed: false,
        });
        self.incident[source.index()].push(id);
        self.incident[target.index()].push(id);
        self.pair_index.insert((source, target, relation.kind), id);
        self.events.push(GraphEvent::RelationAdded {
            id,
            kind: relation.kind,
            source,
            target,
        });

        if relation.kind == RelationKind::Containment {
            self.adopt_member(config, source, target);
        }

        self.refresh(config, source);
        self.refresh(config, target);
        id
    }

    /// Containment bookkeeping: point the member at its ensemble, evicting
    /// it from a previous ensemble first (a member has at most one owner).
    fn adopt_member(&mut self, config: &InterpretConfig, ensemble: CandidateId, member: CandidateId) {
        if let Some(previous) = self.candidates[member.index()].ensemble
            && previous != ensemble
            && let Some(old_edge) = self.relation_between(previous, member, RelationKind::Containment)
        {
            self.remove_relation(config, old_edge);
        }
        self.candidates[member.index()].ensemble = Some(ensemble);
    }

    /// Remove a relation edge. Both endpoints are re-contextualized and
    /// their abnormal flags recomputed. Removing an already-removed edge is
    /// a no-op.
    pub fn remove_relation(&mut self, config: &InterpretConfig, id: RelationId) {
        let edge = &mut self.edges[id.index()];
        if edge.removed {
            return;
        }
        edge.removed = true;
        let (source, target, kind) = (edge.source, edge.target, edge.relation.kind);
        self.pair_index.remove(&(source, target, kind));
        self.incident[source.index()].retain(|e| *e != id);
        self.incident[target.index()].retain(|e| *e != id);
        self.events.push(GraphEvent::RelationRemoved {
            id,
            kind,
            source,
            target,
        });

        if kind == RelationKind::Containment
            && self.candidates[target.index()].ensemble == Some(source)
        {
            self.candidates[target.index()].ensemble = None;
        }

        self.refresh(config, source);
        self.refresh(config, target);
    }

    pub fn edge(&self, id: RelationId) -> &RelationEdge {
        &self.edges[id.index()]
    }

    /// Live incident edge ids of a candidate, in ascending id order.
    pub fn live_incident(&self, id: CandidateId) -> impl Iterator<Item = RelationId> + '_ {
        let mut ids: Vec<RelationId> = self.incident[id.index()].to_vec();
        ids.sort();
        ids.into_iter()
    }

    /// Incident relations filtered by kind, ascending id order.
    pub fn relations_of(&self, id: CandidateId, kinds: &[RelationKind]) -> Vec<RelationId> {
        self.live_incident(id)
            .filter(|e| kinds.contains(&self.edges[e.index()].relation.kind))
            .collect()
    }

    pub fn has_relation(&self, id: CandidateId, kind: RelationKind) -> bool {
        self.live_incident(id)
            .any(|e| self.edges[e.index()].relation.kind == kind)
    }

    /// The other endpoint of an edge relative to `id`.
    pub fn opposite_of(&self, id: CandidateId, edge: RelationId) -> CandidateId {
        let record = &self.edges[edge.index()];
        if record.source == id {
            record.target
        } else {
            debug_assert_eq!(record.target, id);
            record.source
        }
    }

    /// The live edge of the given kind between the ordered pair, if any.
    pub fn relation_between(
        &self,
        source: CandidateId,
        target: CandidateId,
        kind: RelationKind,
    ) -> Option<RelationId> {
        let (source, target) = if kind.is_symmetric() && target < source {
            (target, source)
        } else {
            (source, target)
        };
        self.pair_index.get(&(source, target, kind)).copied()
    }

    /// True if any live edge of any kind joins the two candidates.
    pub fn related(&self, a: CandidateId, b: CandidateId) -> bool {
        self.live_incident(a).any(|e| self.opposite_of(a, e) == b)
    }

    /// All live edges in ascending id order.
    pub fn live_edges(&self) -> impl Iterator<Item = &RelationEdge> {
        self.edges.iter().filter(|e| !e.removed)
    }

    // -- contextual grades and abnormal upkeep ----------------------------

    /// Recompute the contextual grade of a candidate from its live support
    /// relations, then recompute its abnormal flag. Called by every edge
    /// mutation for both endpoints. A member refresh ripples up to its
    /// owning ensemble, whose grade is the member mean.
    pub fn refresh(&mut self, config: &InterpretConfig, id: CandidateId) {
        if self.candidates[id.index()].removed {
            return;
        }
        let contextual = self.compute_contextual(config, id);
        self.candidates[id.index()].contextual = contextual;
        let abnormal = consistency::compute_abnormal(self, id);
        self.set_abnormal(id, abnormal);
        if let Some(ensemble) = self.candidates[id.index()].ensemble
            && self.is_live(ensemble)
        {
            let mean = self.compute_contextual(config, ensemble);
            self.candidates[ensemble.index()].contextual = mean;
        }
    }

    fn compute_contextual(&self, config: &InterpretConfig, id: CandidateId) -> Option<f64> {
        if self.candidates[id.index()].shape.is_container() {
            let grades: Vec<f64> = self
                .live_incident(id)
                .filter(|e| {
                    let edge = &self.edges[e.index()];
                    edge.relation.kind == RelationKind::Containment && edge.source == id
                })
                .map(|e| self.candidate(self.edges[e.index()].target).best_grade())
                .collect();
            return if grades.is_empty() {
                None
            } else {
                Some(grade::mean(&grades))
            };
        }
        let mut contributions: Vec<f64> = Vec::new();
        for edge_id in self.live_incident(id) {
            let edge = &self.edges[edge_id.index()];
            if !edge.relation.kind.is_support() {
                continue;
            }
            let coeffs = config.support_coeffs(edge.relation.kind);
            let coeff = if edge.source == id {
                coeffs.source
            } else {
                coeffs.target
            };
            if coeff <= 0.0 {
                continue;
            }
            let partner = self.candidate(self.opposite_of(id, edge_id));
            let ratio = grade::support_ratio(coeff, edge.relation.grade);
            contributions.push(grade::contribution(partner.best_grade(), ratio));
        }
        if contributions.is_empty() {
            None
        } else {
            Some(grade::contextual(
                self.candidates[id.index()].intrinsic(),
                &contributions,
            ))
        }
    }

    /// Set the abnormal flag, journaling actual changes only.
    pub(crate) fn set_abnormal(&mut self, id: CandidateId, abnormal: bool) {
        let candidate = &mut self.candidates[id.index()];
        if candidate.abnormal != abnormal {
            candidate.abnormal = abnormal;
            self.events.push(GraphEvent::AbnormalChanged { id, abnormal });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::GapPair;
    use quaver_geom::{LineSeg, Point};

    fn test_config() -> InterpretConfig {
        InterpretConfig::default()
    }

    fn graph_with_head_and_stem() -> (SystemGraph, CandidateId, CandidateId) {
        let mut graph = SystemGraph::new(SystemId(0));
        let head = graph.insert(
            Shape::NoteheadBlack,
            Geometry::Box(Rect::new(100.0, 200.0, 12.0, 10.0)),
            0.6,
        );
        let stem = graph.insert(
            Shape::Stem,
            Geometry::Median {
                line: LineSeg::new(Point::new(112.0, 140.0), Point::new(112.0, 205.0)),
                width: 2.0,
            },
            0.5,
        );
        (graph, head, stem)
    }

    fn head_stem_relation() -> Relation {
        Relation::head_stem(
            GapPair::new(0.05, 0.1),
            0.8,
            quaver_geom::HorizontalSide::Right,
            crate::relation::StemPortion::Bottom,
        )
    }

    #[test]
    fn insert_marks_mandatory_shapes_abnormal() {
        let (graph, head, stem) = graph_with_head_and_stem();
        assert!(graph.candidate(head).abnormal);
        assert!(graph.candidate(stem).abnormal);
        let mut graph = graph;
        let rest = graph.insert(
            Shape::MultipleRest,
            Geometry::Box(Rect::new(0.0, 0.0, 80.0, 10.0)),
            0.7,
        );
        assert!(!graph.candidate(rest).abnormal);
    }

    #[test]
    fn add_relation_clears_abnormal_and_contextualizes() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        graph.events.drain();

        let edge = graph.add_relation(&config, head, stem, head_stem_relation());
        assert!(!graph.candidate(head).abnormal);
        assert!(!graph.candidate(stem).abnormal);
        // Both endpoints got contextual boosts above their intrinsics.
        assert!(graph.candidate(head).best_grade() > 0.6);
        assert!(graph.candidate(stem).best_grade() > 0.5);
        // The stem's boost (coeff 10) dominates the head's (coeff 4).
        let head_gain = graph.candidate(head).best_grade() - 0.6;
        let stem_gain = graph.candidate(stem).best_grade() - 0.5;
        assert!(stem_gain > head_gain);

        let events = graph.events.drain();
        assert!(events.contains(&GraphEvent::RelationAdded {
            id: edge,
            kind: RelationKind::HeadStem,
            source: head,
            target: stem,
        }));
        assert!(events.contains(&GraphEvent::AbnormalChanged {
            id: head,
            abnormal: false,
        }));
    }

    #[test]
    fn add_relation_is_idempotent() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        let first = graph.add_relation(&config, head, stem, head_stem_relation());
        let events_after_first = graph.events.len();
        let second = graph.add_relation(&config, head, stem, head_stem_relation());
        assert_eq!(first, second);
        assert_eq!(graph.events.len(), events_after_first);
        assert_eq!(graph.relations_of(head, &[RelationKind::HeadStem]).len(), 1);
    }

    #[test]
    fn remove_relation_restores_abnormal() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        let edge = graph.add_relation(&config, head, stem, head_stem_relation());
        graph.remove_relation(&config, edge);
        assert!(graph.candidate(head).abnormal);
        assert!(graph.candidate(head).contextual.is_none());
        assert!(!graph.has_relation(head, RelationKind::HeadStem));
        // Removing again is a no-op.
        let events = graph.events.len();
        graph.remove_relation(&config, edge);
        assert_eq!(graph.events.len(), events);
    }

    #[test]
    fn exclusions_normalize_direction() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        let edge = graph.add_relation(&config, stem, head, Relation::exclusion());
        let record = graph.edge(edge);
        assert_eq!(record.source, head);
        assert_eq!(record.target, stem);
        // Same pair in either order is the same edge.
        let again = graph.add_relation(&config, head, stem, Relation::exclusion());
        assert_eq!(edge, again);
    }

    #[test]
    fn remove_candidate_detaches_relations() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        graph.add_relation(&config, head, stem, head_stem_relation());
        graph.remove_candidate(&config, stem);
        assert!(!graph.is_live(stem));
        assert!(graph.candidate(head).abnormal);
        assert!(graph.relations_of(head, &[RelationKind::HeadStem]).is_empty());
        assert_eq!(graph.live_count(), 1);
    }

    #[test]
    fn undelete_restores_membership_without_relations() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        graph.add_relation(&config, head, stem, head_stem_relation());
        graph.remove_candidate(&config, stem);
        graph.undelete(stem);
        assert!(graph.is_live(stem));
        assert!(graph.candidate(stem).abnormal);
        assert!(!graph.has_relation(stem, RelationKind::HeadStem));
    }

    #[test]
    fn sorted_views_and_sweep() {
        let mut graph = SystemGraph::new(SystemId(0));
        let right = graph.insert(
            Shape::NoteheadBlack,
            Geometry::Box(Rect::new(300.0, 0.0, 12.0, 10.0)),
            0.5,
        );
        let left = graph.insert(
            Shape::NoteheadBlack,
            Geometry::Box(Rect::new(100.0, 0.0, 12.0, 10.0)),
            0.5,
        );
        let _stem = graph.insert(
            Shape::Stem,
            Geometry::Median {
                line: LineSeg::new(Point::new(10.0, 0.0), Point::new(10.0, 50.0)),
                width: 2.0,
            },
            0.5,
        );
        let heads = graph.candidates_of(ShapeFamily::Head);
        assert_eq!(heads, vec![left, right]);

        let lookup = Rect::new(90.0, -5.0, 30.0, 30.0);
        assert_eq!(graph.intersected(&heads, &lookup), vec![left]);

        let everything = Rect::new(0.0, -5.0, 1000.0, 30.0);
        assert_eq!(graph.intersected(&heads, &everything), vec![left, right]);
    }

    #[test]
    fn containment_maintains_ensemble_pointer() {
        let config = test_config();
        let mut graph = SystemGraph::new(SystemId(0));
        let chord_a = graph.insert(
            Shape::HeadChord,
            Geometry::Box(Rect::new(0.0, 0.0, 12.0, 40.0)),
            0.5,
        );
        let chord_b = graph.insert(
            Shape::HeadChord,
            Geometry::Box(Rect::new(40.0, 0.0, 12.0, 40.0)),
            0.5,
        );
        let head = graph.insert(
            Shape::NoteheadBlack,
            Geometry::Box(Rect::new(0.0, 30.0, 12.0, 10.0)),
            0.6,
        );
        graph.add_relation(&config, chord_a, head, Relation::containment());
        assert_eq!(graph.candidate(head).ensemble, Some(chord_a));
        // Adoption by another ensemble evicts the old membership.
        graph.add_relation(&config, chord_b, head, Relation::containment());
        assert_eq!(graph.candidate(head).ensemble, Some(chord_b));
        assert!(graph.relation_between(chord_a, head, RelationKind::Containment).is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_graph() {
        let config = test_config();
        let (mut graph, head, stem) = graph_with_head_and_stem();
        graph.add_relation(&config, head, stem, head_stem_relation());

        let bytes = bincode::serialize(&graph).unwrap();
        let mut restored: SystemGraph = bincode::deserialize(&bytes).unwrap();
        restored.rebuild_indexes();
        assert_eq!(graph, restored);
        // The rebuilt index answers pair queries.
        assert!(restored
            .relation_between(head, stem, RelationKind::HeadStem)
            .is_some());
    }
}
