//! The discrete-event network loader: a global min-heap of
//! `(eligible_time, agent_id)` driving each agent through successive
//! (exit, enter) instruction-pair transitions (spec.md §4.D).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use nohash_hasher::IntMap;
use tracing::trace;

use crate::network::{EdgeId, Network};
use crate::plan::{AgentId, Instruction, InstructionKind, Population};
use crate::sim::events::EventListener;
use crate::sim::link::SimLink;

/// Fixed vehicle size used for every agent's storage footprint (spec.md
/// §4.D).
pub const VEH_SIZE: f64 = 4.0;

#[derive(Debug, Clone)]
struct HeapEntry {
    time: u32,
    agent: AgentId,
    pair: (Instruction, Instruction),
}

// Reversed so `BinaryHeap` (a max-heap) pops the smallest `(time, agent)`
// first, matching spec.md's tie-break discipline: "ties on (time,
// agent_id) are broken ... agent_id ascending so runs are reproducible."
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.cmp(&self.time).then_with(|| other.agent.cmp(&self.agent))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.agent == other.agent
    }
}

impl Eq for HeapEntry {}

/// Owns the per-link queue state and the event log for the duration of a
/// run. Plans and the Network are read-only inputs.
pub struct Simulator {
    sim_links: IntMap<EdgeId, SimLink>,
    instructions: HashMap<AgentId, Vec<(Instruction, Instruction)>>,
    cursor: HashMap<AgentId, usize>,
    queue: BinaryHeap<HeapEntry>,
    clock: u32,
}

impl Simulator {
    pub fn new() -> Self {
        Simulator {
            sim_links: IntMap::default(),
            instructions: HashMap::new(),
            cursor: HashMap::new(),
            queue: BinaryHeap::new(),
            clock: 0,
        }
    }

    /// Builds fresh per-edge SimLinks from `network` and seeds the heap
    /// with every agent's first instruction pair (spec.md §4.D
    /// "Initialization").
    pub fn set(&mut self, network: &Network, population: &Population, events: &mut EventListener) {
        self.sim_links = network.edges().map(|(id, attrs)| (*id, SimLink::from_attrs(attrs))).collect();
        self.instructions.clear();
        self.cursor.clear();
        self.queue.clear();
        self.clock = 0;
        events.reset();

        let mut agent_ids: Vec<_> = population.plans.keys().copied().collect();
        agent_ids.sort_unstable();

        for agent_id in agent_ids {
            let plan = &population.plans[&agent_id];
            let pairs = plan.instruction_pairs();
            if pairs.is_empty() {
                continue;
            }
            let (a0, b0) = pairs[0].clone();
            let first_time = a0.min_duration;
            self.queue.push(HeapEntry { time: first_time, agent: agent_id, pair: (a0, b0) });
            self.instructions.insert(agent_id, pairs);
            self.cursor.insert(agent_id, 1);
        }
    }

    /// Advances the simulation, appending to `events`, until the heap
    /// empties or the next entry's eligible time reaches `horizon` (spec.md
    /// §4.D "Run"). Peeking rather than checking `self.clock` matters: the
    /// clock only updates inside `step`, so a stale-clock guard would pop
    /// and commit an entry scheduled at `time >= horizon` before noticing.
    /// In-flight agents at horizon exhaustion are simply dropped (spec.md
    /// §5 "Cancellation and timeouts") — left unpopped in the heap rather
    /// than committed.
    pub fn run(&mut self, horizon: u32, events: &mut EventListener) {
        while let Some(entry) = self.queue.peek() {
            if entry.time >= horizon {
                break;
            }
            self.step(events);
        }
    }

    fn step(&mut self, events: &mut EventListener) {
        let entry = self.queue.pop().expect("loop guarantees a non-empty heap");
        let HeapEntry { time, agent, pair: (a, b) } = entry;
        self.clock = time;

        if !self.can_exit(&a, time) {
            trace!(agent, time, "exit gate blocked, one-tick backoff");
            self.queue.push(HeapEntry { time: time + 1, agent, pair: (a, b) });
            return;
        }
        if !self.can_enter(&b) {
            trace!(agent, time, "enter gate blocked, one-tick backoff");
            self.queue.push(HeapEntry { time: time + 1, agent, pair: (a, b) });
            return;
        }

        if a.kind == InstructionKind::ExitLink {
            let edge = a.edge().expect("ExitLink instruction always carries an edge");
            self.sim_links.get_mut(&edge).expect("edge exists in sim_links").exit(time);
        }
        if b.kind == InstructionKind::EnterLink {
            let edge = b.edge().expect("EnterLink instruction always carries an edge");
            self.sim_links.get_mut(&edge).expect("edge exists in sim_links").enter(agent, VEH_SIZE, time);
        }

        events.add(time, agent, a);
        events.add(time, agent, b.clone());

        if b.kind == InstructionKind::Eos {
            return;
        }

        let cursor = self.cursor.get_mut(&agent).expect("agent has a cursor once scheduled");
        let pairs = self.instructions.get(&agent).expect("agent has instructions once scheduled");
        if *cursor >= pairs.len() {
            // malformed plan: ran out of instructions without reaching EOS.
            // Drop the agent rather than panic (spec.md §7).
            return;
        }
        let (c, d) = pairs[*cursor].clone();
        *cursor += 1;
        // The next transition pair is only eligible once `b` (what this
        // pair just entered) has dwelled for its own min_duration — the
        // matching exit instruction always carries min_duration 0, so the
        // gap must come from `b`, not from `c`.
        self.queue.push(HeapEntry { time: time + b.min_duration, agent, pair: (c, d) });
    }

    fn can_exit(&self, instruction: &Instruction, time: u32) -> bool {
        match instruction.kind {
            InstructionKind::ExitLink => {
                let edge = instruction.edge().expect("ExitLink instruction always carries an edge");
                self.sim_links.get(&edge).map(|link| link.can_exit(time)).unwrap_or(false)
            }
            _ => true,
        }
    }

    fn can_enter(&self, instruction: &Instruction) -> bool {
        match instruction.kind {
            InstructionKind::EnterLink => {
                let edge = instruction.edge().expect("EnterLink instruction always carries an edge");
                self.sim_links.get(&edge).map(|link| link.can_enter(VEH_SIZE)).unwrap_or(false)
            }
            _ => true,
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Simulator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeId;
    use crate::plan::{Activity, ActivityKind, Plan, RouteEdge, Trip};

    fn single_agent_linear_plan(network: &Network, size: u32) -> Plan {
        let mut plan = Plan::new();
        plan.push_activity(Activity::new(ActivityKind::Home, NodeId(0), Some(0)));
        let mut trip = Trip::unrouted(NodeId(0), NodeId(size as u64));
        for i in 0..size {
            let edge = network.edge_between(NodeId(i as u64), NodeId((i + 1) as u64)).unwrap();
            let attrs = network.edge_attrs(edge).unwrap();
            trip.route.push(RouteEdge { edge, expected_duration: attrs.min_duration as f64, min_duration: attrs.min_duration });
        }
        plan.push_trip(trip);
        plan.push_activity(Activity::new(ActivityKind::Work, NodeId(size as u64), None));
        plan
    }

    #[test]
    fn s1_linear_single_agent_three_links() {
        let network = Network::linear(3, 50.0, 1, 10.0, 0.25).unwrap();
        let mut population = Population::new();
        population.plans.insert(0, single_agent_linear_plan(&network, 3));

        let mut sim = Simulator::new();
        let mut events = EventListener::new();
        sim.set(&network, &population, &mut events);
        sim.run(86400, &mut events);

        let enter_links = events.log().iter().filter(|e| e.instruction.kind == InstructionKind::EnterLink).count();
        let exit_links = events.log().iter().filter(|e| e.instruction.kind == InstructionKind::ExitLink).count();
        assert_eq!(enter_links, 3);
        assert_eq!(exit_links, 3);

        let first_exit_activity_time = events
            .log()
            .iter()
            .find(|e| e.instruction.kind == InstructionKind::ExitActivity)
            .unwrap()
            .time;
        let first_enter_activity_time = events
            .log()
            .iter()
            .rev()
            .find(|e| e.instruction.kind == InstructionKind::EnterActivity)
            .unwrap()
            .time;
        assert_eq!(first_enter_activity_time - first_exit_activity_time, 15);
    }

    #[test]
    fn s4_storage_blocks_second_agent_until_first_exits() {
        let network = Network::linear(1, 4.0, 1, 10.0, 1000.0).unwrap();
        let mut population = Population::new();
        population.plans.insert(0, single_agent_linear_plan(&network, 1));
        population.plans.insert(1, single_agent_linear_plan(&network, 1));

        let mut sim = Simulator::new();
        let mut events = EventListener::new();
        sim.set(&network, &population, &mut events);
        sim.run(86400, &mut events);

        let enter_times: Vec<_> = events
            .log()
            .iter()
            .filter(|e| e.instruction.kind == InstructionKind::EnterLink)
            .map(|e| (e.agent, e.time))
            .collect();
        let exit_times: Vec<_> = events
            .log()
            .iter()
            .filter(|e| e.instruction.kind == InstructionKind::ExitLink)
            .map(|e| (e.agent, e.time))
            .collect();

        let first_exit = exit_times.iter().find(|(a, _)| *a == 0).unwrap().1;
        let second_enter = enter_times.iter().find(|(a, _)| *a == 1).unwrap().1;
        assert!(second_enter >= first_exit);
    }

    #[test]
    fn s6_empty_route_emits_no_link_events() {
        let network = Network::linear(1, 50.0, 1, 10.0, 0.25).unwrap();
        let mut plan = Plan::new();
        plan.push_activity(Activity::new(ActivityKind::Home, NodeId(0), Some(10)));
        plan.push_trip(Trip::unrouted(NodeId(0), NodeId(0)));
        plan.push_activity(Activity::new(ActivityKind::Work, NodeId(0), None));

        let mut population = Population::new();
        population.plans.insert(0, plan);

        let mut sim = Simulator::new();
        let mut events = EventListener::new();
        sim.set(&network, &population, &mut events);
        sim.run(86400, &mut events);

        assert!(events.log().iter().all(|e| !matches!(e.instruction.kind, InstructionKind::EnterLink | InstructionKind::ExitLink)));
        assert!(events.log().iter().any(|e| e.instruction.kind == InstructionKind::ExitActivity));
    }
}
