// Editing transactions over a system graph.
//
// Interactive corrections are multi-step: create a candidate and link it,
// move or resize one and relink it, remove one with its cascade. Every
// transaction validates what it will touch before the first mutation and
// then applies in full; a cascade that would tear open a fixed-arity
// ensemble surfaces as an error with the graph untouched.
//
// A search that finds no partner is not an error here: the candidate
// stays, flagged abnormal, and the edit reports success.
//
// See also: `search.rs` for link searches, `consistency.rs` for removal
// closures.

use thiserror::Error;

use crate::candidate::Geometry;
use crate::config::InterpretConfig;
use crate::consistency;
use crate::graph::SystemGraph;
use crate::relation::RelationKind;
use crate::search;
use crate::staff::SystemLayout;
use crate::types::{CandidateId, Profile, Shape};

/// Why an edit refused to run. The graph is untouched in every case.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// The removal cascade would tear a member out of a fixed-arity
    /// ensemble without taking the ensemble too.
    #[error("removal cascade would break a fixed-arity ensemble")]
    Cancelled,
    /// The edit names a candidate that is not live.
    #[error("candidate {0} is removed")]
    RemovedCandidate(CandidateId),
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Insert a candidate, link it, and keep it only if its freshly linked
/// grade clears the minimum. Returns `None`, with the live set unchanged,
/// when it does not.
///
/// Finding no partner is not a failure: a shape with a mandatory relation
/// simply stays abnormal.
pub fn create_valid_added(
    graph: &mut SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    shape: Shape,
    geometry: Geometry,
    intrinsic: f64,
) -> Option<CandidateId> {
    let id = graph.insert(shape, geometry, intrinsic);
    graph.assign_staff(id, layout);
    let links = search::search_links(graph, layout, config, profile, id);
    for link in &links {
        link.apply(graph, config, id);
    }
    if graph.candidate(id).best_grade() < config.grades.min_grade() {
        graph.remove_candidate(config, id);
        return None;
    }
    Some(id)
}

// ---------------------------------------------------------------------------
// Geometry edits
// ---------------------------------------------------------------------------

/// Move a candidate and relink it.
pub fn translate(
    graph: &mut SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    id: CandidateId,
    dx: f64,
    dy: f64,
) -> Result<(), EditError> {
    if !graph.is_live(id) {
        return Err(EditError::RemovedCandidate(id));
    }
    graph.candidate_mut(id).translate(dx, dy);
    graph.assign_staff(id, layout);
    relink(graph, layout, config, profile, id);
    Ok(())
}

/// Replace a candidate's geometry and relink it.
pub fn reshape(
    graph: &mut SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    id: CandidateId,
    geometry: Geometry,
) -> Result<(), EditError> {
    if !graph.is_live(id) {
        return Err(EditError::RemovedCandidate(id));
    }
    graph.candidate_mut(id).set_geometry(geometry);
    graph.assign_staff(id, layout);
    relink(graph, layout, config, profile, id);
    Ok(())
}

/// Re-run the subject's searches after a geometry change. Both the fresh
/// links and the stale edges are computed up front, then committed: stale
/// edges go, fresh links come.
fn relink(
    graph: &mut SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
    id: CandidateId,
) {
    let kinds: Vec<RelationKind> = search::linkers_for(graph.candidate(id).shape)
        .iter()
        .map(|linker| linker.kind())
        .collect();
    let fresh = search::search_links(graph, layout, config, profile, id);
    let stale = search::search_unlinks(graph, layout, config, profile, id, &kinds);
    for edge in stale {
        graph.remove_relation(config, edge);
    }
    for link in &fresh {
        link.apply(graph, config, id);
    }
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Remove a candidate together with its closure. The whole cascade is
/// validated before the first mutation.
pub fn remove(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    id: CandidateId,
) -> Result<Vec<CandidateId>, EditError> {
    remove_many(graph, config, &[id])
}

/// Remove several candidates in one transaction. Seeds that belong to one
/// cascade resolve together, so removing both digits of a time signature
/// succeeds where removing either alone cancels.
pub fn remove_many(
    graph: &mut SystemGraph,
    config: &InterpretConfig,
    ids: &[CandidateId],
) -> Result<Vec<CandidateId>, EditError> {
    for &id in ids {
        if !graph.is_live(id) {
            return Err(EditError::RemovedCandidate(id));
        }
    }
    let plan = consistency::pre_remove_many(graph, ids);
    if plan.cancelled {
        return Err(EditError::Cancelled);
    }
    consistency::apply_removal(graph, config, &plan);
    Ok(plan.closure)
}

// ---------------------------------------------------------------------------
