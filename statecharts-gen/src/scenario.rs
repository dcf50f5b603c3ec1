//! Synthesizes a bounded, deterministic test suite from the state graph.
//!
//! Four scenario families, emitted in a fixed order:
//!
//! 1. the reset scenario (always present, always first);
//! 2. simple cycles up to `max_cycle_len`, each reached through the
//!    shortest event prefix from reset and replayed once;
//! 3. simple paths from reset to a final pseudo-state or sink, up to
//!    `max_path_len`;
//! 4. guard-hold scenarios: fire an event whose transitions are all
//!    guarded with every guard pinned false and expect the state to hold.
//!
//! Guards cannot be evaluated statically, so walks track *assumptions*:
//! the guard outcomes a scenario needs, which the emitter turns into stub
//! hook overrides. Only guards on event-triggered edges are assumable;
//! completion-edge guards stay live at runtime (pinning one true would
//! wedge the generated machine in its drain loop), so expectations that
//! depend on them are widened to the set of states the machine can settle
//! in. Iteration follows declaration order everywhere, which makes two
//! runs over the same input byte-identical.

use statecharts_core::{EdgeId, StateGraph, StateId, StateKind, Transition};
use tracing::debug;

/// Bounds for the enumeration. `None` picks the built-in defaults:
/// cycles up to the vertex count, paths up to twice the vertex count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioConfig {
    pub max_cycle_len: Option<usize>,
    pub max_path_len: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    Initial,
    Cycle,
    Path,
    GuardHold,
}

/// A guard outcome a scenario requires, keyed by the guard's verbatim
/// fragment text (the emitter deduplicates hooks by the same key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardAssumption {
    pub guard: String,
    pub value: bool,
}

/// One synthesized test case: fire `steps` in order after reset (with the
/// assumed guard outcomes stubbed in) and expect the machine to end in
/// one of `expected`.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub kind: ScenarioKind,
    pub steps: Vec<String>,
    pub assumptions: Vec<GuardAssumption>,
    pub expected: Vec<StateId>,
}

/// Enumerate the scenario suite for a verified graph.
pub fn synthesize(graph: &StateGraph, config: &ScenarioConfig) -> Vec<Scenario> {
    let Some(initial) = graph.initial() else {
        return Vec::new();
    };
    let n = graph.state_count();
    let max_cycle = config.max_cycle_len.unwrap_or(n);
    let max_path = config.max_path_len.unwrap_or(2 * n);

    let mut scenarios = vec![Scenario {
        name: "reset".to_string(),
        kind: ScenarioKind::Initial,
        steps: Vec::new(),
        assumptions: Vec::new(),
        expected: settle_set(graph, initial),
    }];

    scenarios.extend(cycle_scenarios(graph, initial, max_cycle));
    scenarios.extend(path_scenarios(graph, initial, max_path));
    scenarios.extend(hold_scenarios(graph, initial));

    debug!(scenarios = scenarios.len(), "synthesized test scenarios");
    scenarios
}

/// Render the suite as a stable one-line-per-scenario listing.
pub fn describe(graph: &StateGraph, scenarios: &[Scenario]) -> String {
    let mut out = String::new();
    for s in scenarios {
        out.push_str(&s.name);
        out.push_str(": events [");
        out.push_str(&s.steps.join(", "));
        out.push_str("]");
        if !s.assumptions.is_empty() {
            out.push_str(" assuming [");
            for (i, a) in s.assumptions.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("`{}`={}", a.guard, a.value));
            }
            out.push_str("]");
        }
        out.push_str(" expect {");
        for (i, &id) in s.expected.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(graph.state(id).label());
        }
        out.push_str("}\n");
    }
    out
}

// ---------- walk machinery ----------

/// An edge is shadowed when an earlier declaration on the same trigger is
/// unguarded: dispatch never reaches it.
fn shadowed(graph: &StateGraph, edge: EdgeId, t: &Transition) -> bool {
    graph
        .outgoing(t.source)
        .take_while(|(id, _)| *id != edge)
        .any(|(_, prior)| prior.trigger() == t.trigger() && !prior.is_guarded())
}

/// A state can sit still only while no unguarded completion transition
/// forces it onward.
fn restable(graph: &StateGraph, id: StateId) -> bool {
    !graph
        .outgoing(id)
        .any(|(_, t)| t.is_completion() && !t.is_guarded())
}

/// Whether a static walk may traverse this edge. Event edges additionally
/// need a source the machine can actually rest in to receive the event.
fn walkable(graph: &StateGraph, edge: EdgeId, t: &Transition) -> bool {
    if shadowed(graph, edge, t) {
        return false;
    }
    if t.event.is_some() {
        restable(graph, t.source)
    } else {
        true
    }
}

/// Guard outcomes needed to drive dispatch down this event edge: every
/// earlier-declared guarded competitor rejects, this edge's guard accepts.
fn event_assumptions(graph: &StateGraph, edge: EdgeId, t: &Transition) -> Vec<GuardAssumption> {
    let mut out = Vec::new();
    if t.event.is_none() {
        return out;
    }
    for (id, prior) in graph.outgoing(t.source) {
        if id == edge {
            break;
        }
        if prior.trigger() == t.trigger() && prior.is_guarded() {
            out.push(GuardAssumption {
                guard: prior.guard.as_str().to_string(),
                value: false,
            });
        }
    }
    if t.is_guarded() {
        out.push(GuardAssumption {
            guard: t.guard.as_str().to_string(),
            value: true,
        });
    }
    out
}

/// Merge new assumptions in; `false` means the walk contradicts itself
/// (one guard required both true and false) and must be discarded.
fn merge_assumptions(into: &mut Vec<GuardAssumption>, add: &[GuardAssumption]) -> bool {
    for a in add {
        match into.iter().find(|have| have.guard == a.guard) {
            Some(have) if have.value != a.value => return false,
            Some(_) => {}
            None => into.push(a.clone()),
        }
    }
    true
}

/// The set of states the machine can come to rest in after arriving at
/// `from`, following completion transitions. A guarded hop is a
/// possibility, an unguarded hop is mandatory and cuts off later
/// alternatives. The initial pseudo-state is never a resting place.
fn settle_set(graph: &StateGraph, from: StateId) -> Vec<StateId> {
    let mut out = Vec::new();
    let mut on_stack = vec![false; graph.state_count()];
    settle_walk(graph, from, &mut out, &mut on_stack);
    out
}

fn settle_walk(graph: &StateGraph, v: StateId, out: &mut Vec<StateId>, on_stack: &mut Vec<bool>) {
    if on_stack[v] {
        return;
    }
    on_stack[v] = true;
    let mut can_rest = true;
    for (edge, t) in graph.outgoing(v) {
        if !t.is_completion() || shadowed(graph, edge, t) {
            continue;
        }
        settle_walk(graph, t.target, out, on_stack);
        if !t.is_guarded() {
            can_rest = false;
            break;
        }
    }
    if can_rest && graph.state(v).kind != StateKind::Initial && !out.contains(&v) {
        out.push(v);
    }
    on_stack[v] = false;
}

/// Shortest walk (by edge count) from `from` to `to` over walkable edges.
/// Returns the event steps fired and the guard assumptions accumulated.
fn shortest_walk(
    graph: &StateGraph,
    from: StateId,
    to: StateId,
) -> Option<(Vec<String>, Vec<GuardAssumption>)> {
    if from == to {
        return Some((Vec::new(), Vec::new()));
    }
    let mut prev: Vec<Option<EdgeId>> = vec![None; graph.state_count()];
    let mut seen = vec![false; graph.state_count()];
    let mut queue = std::collections::VecDeque::new();
    seen[from] = true;
    queue.push_back(from);
    'search: while let Some(v) = queue.pop_front() {
        for (edge, t) in graph.outgoing(v) {
            if !walkable(graph, edge, t) || seen[t.target] {
                continue;
            }
            seen[t.target] = true;
            prev[t.target] = Some(edge);
            if t.target == to {
                break 'search;
            }
            queue.push_back(t.target);
        }
    }
    if !seen[to] {
        return None;
    }
    let mut edges = Vec::new();
    let mut at = to;
    while at != from {
        let edge = prev[at]?;
        edges.push(edge);
        at = graph.transition(edge).source;
    }
    edges.reverse();
    let mut steps = Vec::new();
    let mut assumptions = Vec::new();
    for edge in edges {
        let t = graph.transition(edge);
        if let Some(event) = &t.event {
            steps.push(event.name.clone());
        }
        if !merge_assumptions(&mut assumptions, &event_assumptions(graph, edge, t)) {
            return None;
        }
    }
    Some((steps, assumptions))
}

// ---------- cycles ----------

struct CycleWalk {
    edges: Vec<EdgeId>,
    anchor: StateId,
}

fn cycle_scenarios(graph: &StateGraph, initial: StateId, max_len: usize) -> Vec<Scenario> {
    let mut cycles = Vec::new();
    for anchor in 0..graph.state_count() {
        let mut path = Vec::new();
        let mut on_path = vec![false; graph.state_count()];
        cycle_dfs(graph, anchor, anchor, max_len, &mut path, &mut on_path, &mut cycles);
    }

    let mut out = Vec::new();
    for cycle in cycles {
        let mut assumptions = Vec::new();
        let mut steps = Vec::new();
        let mut ok = true;
        for &edge in &cycle.edges {
            let t = graph.transition(edge);
            if let Some(event) = &t.event {
                steps.push(event.name.clone());
            }
            if !merge_assumptions(&mut assumptions, &event_assumptions(graph, edge, t)) {
                ok = false;
                break;
            }
        }
        if !ok {
            continue;
        }
        let Some((prefix_steps, prefix_assumptions)) = shortest_walk(graph, initial, cycle.anchor)
        else {
            continue;
        };
        let mut all = prefix_assumptions;
        if !merge_assumptions(&mut all, &assumptions) {
            continue;
        }
        let mut events = prefix_steps;
        events.extend(steps);
        out.push((
            cycle.edges.len(),
            Scenario {
                name: String::new(),
                kind: ScenarioKind::Cycle,
                steps: events,
                assumptions: all,
                expected: settle_set(graph, cycle.anchor),
            },
        ));
    }

    order_and_name(out, "cycle")
}

fn cycle_dfs(
    graph: &StateGraph,
    anchor: StateId,
    current: StateId,
    max_len: usize,
    path: &mut Vec<EdgeId>,
    on_path: &mut Vec<bool>,
    cycles: &mut Vec<CycleWalk>,
) {
    on_path[current] = true;
    for (edge, t) in graph.outgoing(current) {
        if !walkable(graph, edge, t) {
            continue;
        }
        if t.target == anchor {
            if path.len() < max_len {
                let mut edges = path.clone();
                edges.push(edge);
                cycles.push(CycleWalk { edges, anchor });
            }
        } else if t.target > anchor && !on_path[t.target] && path.len() + 1 < max_len {
            // Anchoring each cycle at its smallest vertex finds it once.
            path.push(edge);
            cycle_dfs(graph, anchor, t.target, max_len, path, on_path, cycles);
            path.pop();
        }
    }
    on_path[current] = false;
}

// ---------- paths ----------

fn path_scenarios(graph: &StateGraph, initial: StateId, max_len: usize) -> Vec<Scenario> {
    let mut out = Vec::new();
    let mut on_path = vec![false; graph.state_count()];
    let mut walk = PathWalk {
        edges: Vec::new(),
        steps: Vec::new(),
        assumptions: Vec::new(),
    };
    path_dfs(graph, initial, max_len, &mut walk, &mut on_path, &mut out);
    order_and_name(out, "path")
}

struct PathWalk {
    edges: Vec<EdgeId>,
    steps: Vec<String>,
    assumptions: Vec<GuardAssumption>,
}

/// A path ends at the final pseudo-state or at a sink: a state with no
/// outgoing edge other than self-loops.
fn is_terminal(graph: &StateGraph, id: StateId) -> bool {
    graph.state(id).kind == StateKind::Final
        || graph.outgoing(id).all(|(_, t)| t.target == id)
}

fn path_dfs(
    graph: &StateGraph,
    current: StateId,
    max_len: usize,
    walk: &mut PathWalk,
    on_path: &mut Vec<bool>,
    out: &mut Vec<(usize, Scenario)>,
) {
    if !walk.edges.is_empty() && is_terminal(graph, current) {
        out.push((
            walk.edges.len(),
            Scenario {
                name: String::new(),
                kind: ScenarioKind::Path,
                steps: walk.steps.clone(),
                assumptions: walk.assumptions.clone(),
                expected: settle_set(graph, current),
            },
        ));
        return;
    }
    if walk.edges.len() == max_len {
        return;
    }
    on_path[current] = true;
    for (edge, t) in graph.outgoing(current) {
        if !walkable(graph, edge, t) || on_path[t.target] {
            continue;
        }
        let added = event_assumptions(graph, edge, t);
        let saved = walk.assumptions.clone();
        if !merge_assumptions(&mut walk.assumptions, &added) {
            continue;
        }
        walk.edges.push(edge);
        if let Some(event) = &t.event {
            walk.steps.push(event.name.clone());
        }
        path_dfs(graph, t.target, max_len, walk, on_path, out);
        if t.event.is_some() {
            walk.steps.pop();
        }
        walk.edges.pop();
        walk.assumptions = saved;
    }
    on_path[current] = false;
}

// ---------- guard holds ----------

fn hold_scenarios(graph: &StateGraph, initial: StateId) -> Vec<Scenario> {
    let mut out = Vec::new();
    for (id, state) in graph.states() {
        if state.kind != StateKind::Normal {
            continue;
        }
        // The hold expectation is exact, which needs a state that neither
        // drifts on completion nor dispatches unguarded.
        if graph.outgoing(id).any(|(_, t)| t.is_completion()) {
            continue;
        }
        let mut triggers: Vec<&str> = Vec::new();
        for (_, t) in graph.outgoing(id) {
            if let Some(event) = &t.event {
                if !triggers.contains(&event.name.as_str()) {
                    triggers.push(&event.name);
                }
            }
        }
        for trigger in triggers {
            let group: Vec<&Transition> = graph
                .outgoing(id)
                .filter(|(_, t)| t.trigger() == trigger)
                .map(|(_, t)| t)
                .collect();
            if !group.iter().all(|t| t.is_guarded()) {
                continue;
            }
            let Some((mut steps, mut assumptions)) = shortest_walk(graph, initial, id) else {
                continue;
            };
            let pins: Vec<GuardAssumption> = group
                .iter()
                .map(|t| GuardAssumption {
                    guard: t.guard.as_str().to_string(),
                    value: false,
                })
                .collect();
            if !merge_assumptions(&mut assumptions, &pins) {
                continue;
            }
            steps.push(trigger.to_string());
            out.push(Scenario {
                name: format!("hold_{}_{}", state.name, trigger),
                kind: ScenarioKind::GuardHold,
                steps,
                assumptions,
                expected: vec![id],
            });
        }
    }
    out
}

// ---------- ordering ----------

/// Sort by (walk length, lexicographic event sequence), drop duplicates,
/// then hand out stable numbered names.
fn order_and_name(mut raw: Vec<(usize, Scenario)>, stem: &str) -> Vec<Scenario> {
    raw.sort_by(|(la, a), (lb, b)| la.cmp(lb).then_with(|| a.steps.cmp(&b.steps)));
    let mut out: Vec<Scenario> = Vec::new();
    for (_, s) in raw {
        let duplicate = out.iter().any(|have| {
            have.steps == s.steps && have.assumptions == s.assumptions && have.expected == s.expected
        });
        if duplicate {
            continue;
        }
        out.push(s);
    }
    for (i, s) in out.iter_mut().enumerate() {
        s.name = format!("{}_{:02}", stem, i + 1);
    }
    out
}
