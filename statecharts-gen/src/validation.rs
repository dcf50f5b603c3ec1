//! Structural verification of a built state graph.
//!
//! The verifier runs every check and collects every finding; the pipeline
//! aborts before scenario synthesis and emission when any finding is an
//! error. Checks, in order:
//!
//! 1. an initial pseudo-state exists and has at least one outgoing edge;
//! 2. every state is reachable from the initial pseudo-state;
//! 3. non-final states can always make progress (warnings);
//! 4. completion-transition cycles (unguarded: error, guarded: warning);
//! 5. at most one unguarded transition per (state, trigger) pair;
//! 6. state and event names fit target-language identifier syntax;
//! 7. the initial pseudo-state has no incoming edges and its outgoing
//!    transitions carry no event.
//!
//! Guard bodies are opaque; nothing here attempts to prove that two
//! guards exclude each other.

use statecharts_core::{Diagnostic, StateGraph, StateId, StateKind, TransitionKind};
use tracing::debug;

/// Run every structural check and return all findings.
pub fn verify(graph: &StateGraph) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    let initial = check_initial_present(graph, &mut diags);
    if let Some(initial) = initial {
        check_reachability(graph, initial, &mut diags);
        check_initial_constraints(graph, initial, &mut diags);
    }
    check_sinks(graph, &mut diags);
    check_completion_cycles(graph, &mut diags);
    check_determinism(graph, &mut diags);
    check_identifiers(graph, &mut diags);

    let errors = diags.iter().filter(|d| d.is_error()).count();
    debug!(
        findings = diags.len(),
        errors,
        warnings = diags.len() - errors,
        "verified state graph"
    );
    diags
}

/// True when any finding in the list is an error.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

fn check_initial_present(graph: &StateGraph, diags: &mut Vec<Diagnostic>) -> Option<StateId> {
    match graph.initial() {
        Some(initial) if graph.outgoing(initial).next().is_some() => Some(initial),
        Some(initial) => {
            diags.push(Diagnostic::error(
                "initial pseudo-state has no outgoing transition",
            ));
            Some(initial)
        }
        None => {
            diags.push(Diagnostic::error(
                "missing initial state: no `[*] --> ...` transition declared",
            ));
            None
        }
    }
}

fn check_reachability(graph: &StateGraph, initial: StateId, diags: &mut Vec<Diagnostic>) {
    let mut seen = vec![false; graph.state_count()];
    let mut queue = vec![initial];
    seen[initial] = true;
    while let Some(id) = queue.pop() {
        for (_, t) in graph.outgoing(id) {
            if !seen[t.target] {
                seen[t.target] = true;
                queue.push(t.target);
            }
        }
    }
    for (id, state) in graph.states() {
        if !seen[id] {
            diags.push(Diagnostic::error(format!(
                "unreachable state `{}`",
                state.label()
            )));
        }
    }
}

fn check_initial_constraints(graph: &StateGraph, initial: StateId, diags: &mut Vec<Diagnostic>) {
    if graph.incoming(initial).next().is_some() {
        diags.push(Diagnostic::error(
            "initial pseudo-state must not have incoming transitions",
        ));
    }
    for (_, t) in graph.outgoing(initial) {
        if let Some(event) = &t.event {
            diags.push(
                Diagnostic::error(format!(
                    "transition from `[*]` must not carry an event (found `{}`)",
                    event.name
                ))
                .at(t.pos),
            );
        }
    }
}

/// Rule 3: a non-final state with no way out deadlocks the machine; one
/// whose every exit is guarded may deadlock depending on guard values.
fn check_sinks(graph: &StateGraph, diags: &mut Vec<Diagnostic>) {
    for (id, state) in graph.states() {
        if state.kind != StateKind::Normal {
            continue;
        }
        let mut outgoing = graph.outgoing(id).peekable();
        if outgoing.peek().is_none() {
            diags.push(Diagnostic::warning(format!(
                "state `{}` has no outgoing transition (machine cannot leave it)",
                state.name
            )));
        } else if outgoing.all(|(_, t)| t.is_guarded()) {
            diags.push(Diagnostic::warning(format!(
                "every outgoing transition of `{}` is guarded (possible deadlock)",
                state.name
            )));
        }
    }
}

/// Rule 4: a simple cycle of completion transitions never waits for an
/// event, so with no guards it spins forever at runtime.
fn check_completion_cycles(graph: &StateGraph, diags: &mut Vec<Diagnostic>) {
    for cycle in completion_cycles(graph) {
        let all_unguarded = cycle
            .iter()
            .all(|&e| !graph.transition(e).is_guarded());
        let route = cycle_route(graph, &cycle);
        if all_unguarded {
            diags.push(
                Diagnostic::error(format!(
                    "unguarded completion cycle `{route}` loops forever at runtime"
                ))
                .at(graph.transition(cycle[0]).pos),
            );
        } else {
            diags.push(
                Diagnostic::warning(format!(
                    "completion cycle `{route}` may loop forever depending on guards"
                ))
                .at(graph.transition(cycle[0]).pos),
            );
        }
    }
}

fn cycle_route(graph: &StateGraph, cycle: &[usize]) -> String {
    let mut route = String::new();
    for &e in cycle {
        let t = graph.transition(e);
        if route.is_empty() {
            route.push_str(graph.state(t.source).label());
        }
        route.push_str(" -> ");
        route.push_str(graph.state(t.target).label());
    }
    route
}

/// Enumerate simple cycles in the completion-edge subgraph. Each cycle is
/// reported once, anchored at its smallest vertex, as a list of edge ids.
fn completion_cycles(graph: &StateGraph) -> Vec<Vec<usize>> {
    let mut cycles = Vec::new();
    for anchor in 0..graph.state_count() {
        let mut path = Vec::new();
        let mut on_path = vec![false; graph.state_count()];
        dfs_completion(graph, anchor, anchor, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

fn dfs_completion(
    graph: &StateGraph,
    anchor: StateId,
    current: StateId,
    path: &mut Vec<usize>,
    on_path: &mut Vec<bool>,
    cycles: &mut Vec<Vec<usize>>,
) {
    on_path[current] = true;
    for (edge, t) in graph.outgoing(current) {
        if t.kind != TransitionKind::Completion {
            continue;
        }
        if t.target == anchor {
            path.push(edge);
            cycles.push(path.clone());
            path.pop();
        } else if t.target > anchor && !on_path[t.target] {
            // Only visit vertices above the anchor so each cycle is found
            // exactly once, from its smallest vertex.
            path.push(edge);
            dfs_completion(graph, anchor, t.target, path, on_path, cycles);
            path.pop();
        }
    }
    on_path[current] = false;
}

/// Rule 5: for one (state, trigger) pair, all but at most one transition
/// must be guarded; two unguarded ones make dispatch ambiguous. Internal
/// reactions join their event's group.
fn check_determinism(graph: &StateGraph, diags: &mut Vec<Diagnostic>) {
    for (id, state) in graph.states() {
        // trigger -> number of unguarded alternatives, insertion-ordered.
        let mut groups: Vec<(String, u32)> = Vec::new();
        let mut bump = |trigger: &str, unguarded: bool| {
            if !unguarded {
                return;
            }
            match groups.iter_mut().find(|(t, _)| t == trigger) {
                Some((_, n)) => *n += 1,
                None => groups.push((trigger.to_string(), 1)),
            }
        };
        for (_, t) in graph.outgoing(id) {
            bump(t.trigger(), !t.is_guarded());
        }
        for reaction in &state.reactions {
            bump(&reaction.event.name, reaction.guard.is_empty());
        }
        for (trigger, unguarded) in groups {
            if unguarded > 1 {
                let trigger = if trigger.is_empty() {
                    "<completion>".to_string()
                } else {
                    format!("`{trigger}`")
                };
                diags.push(Diagnostic::error(format!(
                    "state `{}` has {unguarded} unguarded transitions on {trigger}; dispatch is ambiguous",
                    state.label()
                )));
            }
        }
    }
}

/// Rule 6: names that do not fit identifier syntax are warnings, since
/// the backend may still be able to escape them.
fn check_identifiers(graph: &StateGraph, diags: &mut Vec<Diagnostic>) {
    for (_, state) in graph.normal_states() {
        if !is_identifier(&state.name) {
            diags.push(Diagnostic::warning(format!(
                "state name `{}` is not a valid identifier",
                state.name
            )));
        }
    }
    for name in graph.event_names() {
        if !is_identifier(name) {
            diags.push(Diagnostic::warning(format!(
                "event name `{name}` is not a valid identifier"
            )));
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph, parser};
    use statecharts_core::Severity;

    fn verify_source(source: &str) -> Vec<Diagnostic> {
        let decls = parser::parse(source).expect("source should parse");
        let graph = graph::build("Fixture", &decls).expect("graph should build");
        verify(&graph)
    }

    fn messages(diags: &[Diagnostic], severity: Severity) -> Vec<String> {
        diags
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.message.clone())
            .collect()
    }

    #[test]
    fn clean_machine_verifies_quietly() {
        let diags = verify_source(
            "[*] --> Idle :\n\
             Idle --> Running : start\n\
             Running --> Idle : stop",
        );
        assert!(diags.is_empty(), "unexpected findings: {diags:?}");
    }

    #[test]
    fn missing_initial_state_is_an_error() {
        let diags = verify_source("A --> B : go\nB --> A : back");
        assert!(has_errors(&diags));
        assert!(messages(&diags, Severity::Error)[0].contains("missing initial state"));
    }

    #[test]
    fn unreachable_state_is_an_error() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> A : tick\n\
             Orphan --> A : go",
        );
        // Orphan has no path from [*]; it also gives A two `go`... no, one.
        let errors = messages(&diags, Severity::Error);
        assert!(errors.iter().any(|m| m.contains("unreachable state `Orphan`")));
    }

    #[test]
    fn unguarded_completion_cycle_is_an_error() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> B :\n\
             B --> A :",
        );
        let errors = messages(&diags, Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unguarded completion cycle"));
        assert!(errors[0].contains("A -> B -> A"));
    }

    #[test]
    fn guarded_completion_cycle_is_a_warning() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> B : [ ready ]\n\
             B --> A : [ !ready ]",
        );
        assert!(!has_errors(&diags));
        assert!(
            messages(&diags, Severity::Warning)
                .iter()
                .any(|m| m.contains("may loop forever"))
        );
    }

    #[test]
    fn two_unguarded_switches_are_ambiguous() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> B :\n\
             A --> C :\n\
             B --> A : back\n\
             C --> A : back",
        );
        let errors = messages(&diags, Severity::Error);
        assert!(errors.iter().any(|m| m.contains("dispatch is ambiguous")));
    }

    #[test]
    fn one_unguarded_default_among_guarded_is_fine() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> B : go [ fast ]\n\
             A --> C : go\n\
             B --> A : back\n\
             C --> A : back",
        );
        assert!(!has_errors(&diags));
    }

    #[test]
    fn initial_must_not_take_events_or_arrivals() {
        let diags = verify_source(
            "[*] --> A : boot\n\
             A --> [*] : quit",
        );
        let errors = messages(&diags, Severity::Error);
        assert!(errors.iter().any(|m| m.contains("must not carry an event")));
    }

    #[test]
    fn dead_end_state_is_a_warning() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> Dead : go",
        );
        assert!(!has_errors(&diags));
        assert!(
            messages(&diags, Severity::Warning)
                .iter()
                .any(|m| m.contains("cannot leave"))
        );
    }

    #[test]
    fn fully_guarded_state_is_a_warning() {
        let diags = verify_source(
            "[*] --> A :\n\
             A --> B : go [ ok ]\n\
             B --> A : back",
        );
        assert!(
            messages(&diags, Severity::Warning)
                .iter()
                .any(|m| m.contains("possible deadlock"))
        );
    }

    #[test]
    fn odd_names_warn_but_do_not_abort() {
        let diags = verify_source(
            "[*] --> Ok :\n\
             Ok --> 2nd : go-fast\n\
             2nd --> Ok : back",
        );
        assert!(!has_errors(&diags));
        let warnings = messages(&diags, Severity::Warning);
        assert!(warnings.iter().any(|m| m.contains("state name `2nd`")));
        assert!(warnings.iter().any(|m| m.contains("event name `go-fast`")));
    }
}
