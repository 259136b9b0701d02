// Graph events: the observability surface of the interpretation core.
//
// Every structural mutation of a system graph appends one typed record to
// the graph's event log. What the original-style design did through
// implicit added()/removed() virtual hooks is explicit here: callers (the
// editing UI, later pipeline stages, tests) drain the log and react. There
// is no logging side channel; the event log is the narrative of what the
// engine did and why the graph looks the way it does.
//
// Events carry ids only. Consumers that need shapes or grades look them up
// in the graph while the ids are still live, or rely on the shape snapshot
// included in add/remove records.

use crate::relation::RelationKind;
use crate::types::{CandidateId, RelationId, Shape};
use serde::{Deserialize, Serialize};

/// One structural mutation of a system graph.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    CandidateAdded {
        id: CandidateId,
        shape: Shape,
    },
    CandidateRemoved {
        id: CandidateId,
        shape: Shape,
    },
    CandidateUndeleted {
        id: CandidateId,
    },
    RelationAdded {
        id: RelationId,
        kind: RelationKind,
        source: CandidateId,
        target: CandidateId,
    },
    RelationRemoved {
        id: RelationId,
        kind: RelationKind,
        source: CandidateId,
        target: CandidateId,
    },
    /// The abnormal flag changed value (true = missing a mandatory partner).
    AbnormalChanged {
        id: CandidateId,
        abnormal: bool,
    },
    /// A geometry edit invalidated the candidate's cached bounds.
    GeometryInvalidated {
        id: CandidateId,
    },
}

/// Append-only event log, drained by the caller after each operation batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<GraphEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: GraphEvent) {
        self.events.push(event);
    }

    /// Take all pending events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
