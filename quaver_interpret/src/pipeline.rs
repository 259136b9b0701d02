// The page-level interpretation pass: one worker per system, then a
// sequential reconciliation of what crosses system breaks.
//
// Each system graph is mutated only by its owning worker, so the parallel
// pass needs no locking; exclusion is by construction. Within a system,
// work runs in candidate id order and newly committed links are visible
// to later subjects, so direction-dependent searches (flags) already see
// the head links committed just before them.
//
// Slur continuations are the one cross-system concern. They run after the
// barrier, on one thread, in system order, and touch only the
// external-link slots; the graphs' edge arenas never span systems.
//
// See also: `search.rs` for the per-candidate searches, `consistency.rs`
// for exclusions and the weak purge.
//
// **Critical constraint: determinism.** The parallel pass must produce
// the same page as a sequential one: systems share no state, and every
// per-system loop is id-ordered.

use rayon::prelude::*;

use quaver_geom::HorizontalSide;

use crate::candidate::ExternalLink;
use crate::config::InterpretConfig;
use crate::consistency;
use crate::graph::SystemGraph;
use crate::search;
use crate::staff::SystemLayout;
use crate::types::{CandidateId, Profile, Shape};

/// One system of the page: the layout contract and the interpretation
/// graph built over it.
#[derive(Clone, Debug)]
pub struct System {
    pub layout: SystemLayout,
    pub graph: SystemGraph,
}

// ---------------------------------------------------------------------------
// Per-system passes
// ---------------------------------------------------------------------------

/// Run every live candidate's link searches and commit the results, in id
/// order. Also assigns each candidate to its closest staff.
pub fn link_pass(
    graph: &mut SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
) {
    let ids: Vec<CandidateId> = graph.iter_live().map(|c| c.id).collect();
    for id in ids {
        graph.assign_staff(id, layout);
        let links = search::search_links(graph, layout, config, profile, id);
        for link in &links {
            link.apply(graph, config, id);
        }
    }
}

/// Insert exclusions over the linked graph, then purge what lost them and
/// what never reached a keepable grade. Returns the purged candidates.
pub fn reduce_pass(graph: &mut SystemGraph, config: &InterpretConfig) -> Vec<CandidateId> {
    consistency::insert_exclusions(graph, config);
    consistency::purge_weak(graph, config)
}

/// Full single-system interpretation: link, exclude, purge.
pub fn interpret_system(
    graph: &mut SystemGraph,
    layout: &SystemLayout,
    config: &InterpretConfig,
    profile: Profile,
) -> Vec<CandidateId> {
    link_pass(graph, layout, config, profile);
    reduce_pass(graph, config)
}

// ---------------------------------------------------------------------------
// Page drive
// ---------------------------------------------------------------------------

/// Interpret every system of a page in parallel, then reconcile slur
/// continuations across the breaks.
pub fn interpret_page(systems: &mut [System], config: &InterpretConfig, profile: Profile) {
    systems.par_iter_mut().for_each(|system| {
        interpret_system(&mut system.graph, &system.layout, config, profile);
    });
    reconcile_slurs(systems, config, profile);
}

// ---------------------------------------------------------------------------
// Slur continuations
// ---------------------------------------------------------------------------

/// Pair the right-margin slur orphans of each system with the left-margin
/// orphans of the next, top to bottom, and record the continuations in
/// the external-link slots. Every stale continuation is dropped first, so
/// the slots always reflect the current geometry.
pub fn reconcile_slurs(systems: &mut [System], config: &InterpretConfig, profile: Profile) {
    for system in systems.iter_mut() {
        let slurs: Vec<CandidateId> = system
            .graph
            .iter_live()
            .filter(|c| c.shape == Shape::Slur)
            .map(|c| c.id)
            .collect();
        for id in slurs {
            system.graph.candidate_mut(id).external_link = None;
        }
    }

    for i in 0..systems.len().saturating_sub(1) {
        let rights = margin_orphans(&systems[i], config, profile, HorizontalSide::Right);
        let lefts = margin_orphans(&systems[i + 1], config, profile, HorizontalSide::Left);
        let upper_system = systems[i].layout.id;
        let lower_system = systems[i + 1].layout.id;
        for (upper, lower) in rights.into_iter().zip(lefts) {
            systems[i].graph.candidate_mut(upper).external_link = Some(ExternalLink {
                side: HorizontalSide::Right,
                system: lower_system,
                candidate: lower,
            });
            systems[i + 1].graph.candidate_mut(lower).external_link = Some(ExternalLink {
                side: HorizontalSide::Left,
                system: upper_system,
                candidate: upper,
            });
        }
    }
}

/// Live slurs whose given end comes close enough to that margin of their
/// staff, ordered top to bottom (id as tie-break) for pairing.
fn margin_orphans(
    system: &System,
    config: &InterpretConfig,
    profile: Profile,
    side: HorizontalSide,
) -> Vec<CandidateId> {
    let mut orphans: Vec<(f64, CandidateId)> = Vec::new();
    for candidate in system.graph.iter_live() {
        if candidate.shape != Shape::Slur {
            continue;
        }
        let bounds = candidate.bounds();
        let staff = system.layout.closest_staff(candidate.center());
        let gap_max = config.slur.end_gap_max.pixels(profile, staff.interline);
        let reaches = match side {
            HorizontalSide::Left => bounds.left() - staff.left <= gap_max,
            HorizontalSide::Right => staff.right - bounds.right() <= gap_max,
        };
        if reaches {
            orphans.push((candidate.center().y, candidate.id));
        }
    }
    orphans.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    orphans.into_iter().map(|(_, id)| id).collect()
}

// ---------------------------------------------------------------------------
