//! Plans: an agent's day as a start marker, alternating activities and
//! trips, and an end marker — and the flattening of a plan into the
//! instruction-pair stream the simulator consumes.

pub mod io;

use crate::network::{EdgeId, NodeId};

pub type AgentId = u64;

/// An activity kind. MATSim plans in the wild use arbitrary strings; this
/// crate keeps the two kinds spec.md names explicitly (`h`/`w`) plus an
/// escape hatch for anything else loaded from XML.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Home,
    Work,
    Other(String),
}

impl ActivityKind {
    pub fn from_matsim_code(code: &str) -> Self {
        match code {
            "h" => ActivityKind::Home,
            "w" => ActivityKind::Work,
            other => ActivityKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Home => "h",
            ActivityKind::Work => "w",
            ActivityKind::Other(s) => s.as_str(),
        }
    }
}

/// A stationary stay of `duration` seconds at `location`. `duration` may
/// only be `None` for an agent's final activity (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub location: NodeId,
    pub duration: Option<u32>,
}

impl Activity {
    pub fn new(kind: ActivityKind, location: NodeId, duration: Option<u32>) -> Self {
        Activity { kind, location, duration }
    }
}

/// One edge of a routed trip, carrying both the planner's expected
/// duration and the edge's physical minimum duration (spec.md §3, §4.H).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEdge {
    pub edge: EdgeId,
    pub expected_duration: f64,
    pub min_duration: u32,
}

/// A routed movement between two nodes. `route` and `expected_duration`
/// are filled in by the planner/router; an unrouted trip has an empty
/// route and zero expected duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub origin: NodeId,
    pub destination: NodeId,
    pub expected_duration: f64,
    pub route: Vec<RouteEdge>,
}

impl Trip {
    pub fn unrouted(origin: NodeId, destination: NodeId) -> Self {
        Trip {
            origin,
            destination,
            expected_duration: 0.0,
            route: Vec::new(),
        }
    }
}

/// One element of a plan's interior: an alternating sequence of these,
/// bookended by a start/end marker, forms the whole day (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub enum PlanElement {
    Activity(Activity),
    Trip(Trip),
}

/// An agent's whole day: SOS, alternating activities/trips (activity at
/// both interior ends), EOS.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub elements: Vec<PlanElement>,
}

impl Plan {
    pub fn new() -> Self {
        Plan { elements: Vec::new() }
    }

    pub fn with_elements(elements: Vec<PlanElement>) -> Self {
        Plan { elements }
    }

    pub fn push_activity(&mut self, activity: Activity) {
        self.elements.push(PlanElement::Activity(activity));
    }

    pub fn push_trip(&mut self, trip: Trip) {
        self.elements.push(PlanElement::Trip(trip));
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.elements.iter().filter_map(|e| match e {
            PlanElement::Activity(a) => Some(a),
            PlanElement::Trip(_) => None,
        })
    }

    pub fn trips_mut(&mut self) -> impl Iterator<Item = &mut Trip> {
        self.elements.iter_mut().filter_map(|e| match e {
            PlanElement::Trip(t) => Some(t),
            PlanElement::Activity(_) => None,
        })
    }

    /// Flattens the plan into its instruction stream: SOS, then for each
    /// component (EnterActivity, ExitActivity) or the routed edges of a
    /// trip as (EnterLink, ExitLink) pairs, then EOS (spec.md §4.B).
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut out = Vec::with_capacity(self.elements.len() * 2 + 2);
        out.push(Instruction::sos());
        for element in &self.elements {
            match element {
                PlanElement::Activity(activity) => {
                    let duration = activity.duration.unwrap_or(0);
                    out.push(Instruction::enter_activity(activity.kind.clone(), activity.location, duration));
                    out.push(Instruction::exit_activity(activity.kind.clone(), activity.location));
                }
                PlanElement::Trip(trip) => {
                    for route_edge in &trip.route {
                        out.push(Instruction::enter_link(route_edge.edge, route_edge.min_duration));
                        out.push(Instruction::exit_link(route_edge.edge));
                    }
                }
            }
        }
        out.push(Instruction::eos());
        out
    }

    /// Partitions the instruction stream into non-overlapping (exit, enter)
    /// transition pairs, as the Simulator consumes them (spec.md §4.B):
    /// `(SOS, Enter_0)`, `(Exit_0, Enter_1)`, ..., `(Exit_n, EOS)`. The
    /// dwell between an element's own enter and exit is not a separate
    /// pair — it is the scheduling gap the Simulator inserts between
    /// consuming one transition pair and the next, keyed off the just-
    /// entered instruction's `min_duration`. Chunking (rather than a
    /// sliding window) is what keeps every instruction logged exactly
    /// once.
    pub fn instruction_pairs(&self) -> Vec<(Instruction, Instruction)> {
        let instructions = self.instructions();
        instructions
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::new()
    }
}

/// What asset an instruction refers to: a node (activities) or an edge
/// (link transitions). SOS/EOS carry no asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Asset {
    Node(NodeId),
    Edge(EdgeId),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Sos,
    EnterActivity,
    ExitActivity,
    EnterLink,
    ExitLink,
    Eos,
}

/// A single instruction in the flattened plan stream (spec.md §3). `aux`
/// carries the activity kind for activity instructions; `asset` is the
/// node or edge the instruction pertains to; `min_duration` is the dwell
/// mandated once the agent is admitted to this instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub aux: Option<ActivityKind>,
    pub asset: Asset,
    pub min_duration: u32,
}

impl Instruction {
    pub fn sos() -> Self {
        Instruction { kind: InstructionKind::Sos, aux: None, asset: Asset::None, min_duration: 0 }
    }

    pub fn eos() -> Self {
        Instruction { kind: InstructionKind::Eos, aux: None, asset: Asset::None, min_duration: 0 }
    }

    pub fn enter_activity(kind: ActivityKind, location: NodeId, duration: u32) -> Self {
        Instruction {
            kind: InstructionKind::EnterActivity,
            aux: Some(kind),
            asset: Asset::Node(location),
            min_duration: duration,
        }
    }

    pub fn exit_activity(kind: ActivityKind, location: NodeId) -> Self {
        Instruction {
            kind: InstructionKind::ExitActivity,
            aux: Some(kind),
            asset: Asset::Node(location),
            min_duration: 0,
        }
    }

    pub fn enter_link(edge: EdgeId, min_duration: u32) -> Self {
        Instruction {
            kind: InstructionKind::EnterLink,
            aux: None,
            asset: Asset::Edge(edge),
            min_duration,
        }
    }

    pub fn exit_link(edge: EdgeId) -> Self {
        Instruction { kind: InstructionKind::ExitLink, aux: None, asset: Asset::Edge(edge), min_duration: 0 }
    }

    pub fn edge(&self) -> Option<EdgeId> {
        match self.asset {
            Asset::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self.asset {
            Asset::Node(n) => Some(n),
            _ => None,
        }
    }
}

/// A population: every agent's plan, keyed by agent id.
#[derive(Debug, Clone, Default)]
pub struct Population {
    pub plans: std::collections::HashMap<AgentId, Plan>,
}

impl Population {
    pub fn new() -> Self {
        Population::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_flatten_sos_activity_trip_eos() {
        let mut plan = Plan::new();
        plan.push_activity(Activity::new(ActivityKind::Home, NodeId(0), Some(10)));
        let mut trip = Trip::unrouted(NodeId(0), NodeId(1));
        trip.route.push(RouteEdge { edge: EdgeId(0), expected_duration: 5.0, min_duration: 5 });
        plan.push_trip(trip);
        plan.push_activity(Activity::new(ActivityKind::Work, NodeId(1), None));

        let instructions = plan.instructions();
        assert_eq!(instructions.first().unwrap().kind, InstructionKind::Sos);
        assert_eq!(instructions.last().unwrap().kind, InstructionKind::Eos);
        assert_eq!(instructions.len(), 2 + 2 + 2 + 2);
    }

    #[test]
    fn empty_route_emits_no_link_instructions() {
        let mut plan = Plan::new();
        plan.push_activity(Activity::new(ActivityKind::Home, NodeId(0), Some(10)));
        plan.push_trip(Trip::unrouted(NodeId(0), NodeId(0)));
        plan.push_activity(Activity::new(ActivityKind::Work, NodeId(0), None));

        let instructions = plan.instructions();
        assert!(instructions.iter().all(|i| !matches!(i.kind, InstructionKind::EnterLink | InstructionKind::ExitLink)));
    }

    #[test]
    fn instruction_pairs_partition_without_overlap() {
        let mut plan = Plan::new();
        plan.push_activity(Activity::new(ActivityKind::Home, NodeId(0), Some(10)));
        plan.push_activity(Activity::new(ActivityKind::Work, NodeId(0), None));
        let pairs = plan.instruction_pairs();
        // (SOS, EnterAct0), (ExitAct0, EnterAct1), (ExitAct1, EOS)
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0.kind, InstructionKind::Sos);
        assert_eq!(pairs[0].1.kind, InstructionKind::EnterActivity);
        assert_eq!(pairs[1].0.kind, InstructionKind::ExitActivity);
        assert_eq!(pairs[1].1.kind, InstructionKind::EnterActivity);
        assert_eq!(pairs.last().unwrap().0.kind, InstructionKind::ExitActivity);
        assert_eq!(pairs.last().unwrap().1.kind, InstructionKind::Eos);

        // every instruction appears in exactly one pair
        let total_instructions: usize = pairs.len() * 2;
        assert_eq!(total_instructions, plan.instructions().len());
    }
}
