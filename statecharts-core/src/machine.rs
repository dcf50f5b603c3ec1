//! The state-graph representation every stage after parsing works on.
//!
//! A [`StateGraph`] is a directed multigraph: states are vertices interned
//! in first-mention order, transitions are edges stored in declaration
//! order and addressed by index. Guard expressions, action bodies, and
//! entry/exit hooks are opaque [`Fragment`]s of target-language text; the
//! core never looks inside them.
//!
//! The graph is built once, frozen before verification, and read-only for
//! the scenario synthesizer and the emitter. All collections iterate in
//! insertion order so downstream output is byte-stable across runs.

use std::collections::HashMap;

use crate::diagnostics::{ShapeError, SourcePos};

/// Vertex handle into a [`StateGraph`].
pub type StateId = usize;

/// Edge handle into a [`StateGraph`].
pub type EdgeId = usize;

/// An opaque snippet of target-language text.
///
/// Guards, actions, and entry/exit bodies all use this shape. `Empty`
/// means "absent": an empty guard is always true, an empty action is a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fragment {
    #[default]
    Empty,
    Text(String),
}

impl Fragment {
    /// Wrap raw text, collapsing whitespace-only input to `Empty`.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Fragment::Empty
        } else {
            Fragment::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Fragment::Empty)
    }

    /// The contained text, or `""` when empty.
    pub fn as_str(&self) -> &str {
        match self {
            Fragment::Empty => "",
            Fragment::Text(text) => text,
        }
    }

    /// Append another body, preserving declaration order line by line.
    pub fn append(&mut self, more: &str) {
        let more = more.trim();
        if more.is_empty() {
            return;
        }
        match self {
            Fragment::Empty => *self = Fragment::Text(more.to_string()),
            Fragment::Text(text) => {
                text.push('\n');
                text.push_str(more);
            }
        }
    }
}

/// A named trigger, with its raw parameter list when one was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub params: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: None,
        }
    }
}

/// Which of the three vertex flavors a state is.
///
/// The pseudo-states are explicit variants rather than magic identifier
/// strings: `[*]` on the source side of an arrow is `Initial`, on the
/// destination side it is `Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Initial,
    Final,
    Normal,
}

/// A state-scoped reaction: handle an event without leaving the state and
/// without re-running entry/exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalReaction {
    pub event: Event,
    pub guard: Fragment,
    pub action: Fragment,
}

/// One vertex of the machine.
#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub kind: StateKind,
    pub entry: Fragment,
    pub exit: Fragment,
    pub comment: Option<String>,
    pub reactions: Vec<InternalReaction>,
}

impl State {
    fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            entry: Fragment::Empty,
            exit: Fragment::Empty,
            comment: None,
            reactions: Vec::new(),
        }
    }

    pub fn is_pseudo(&self) -> bool {
        self.kind != StateKind::Normal
    }

    /// Human-readable label used in diagnostics.
    pub fn label(&self) -> &str {
        match self.kind {
            StateKind::Initial => "[*] (initial)",
            StateKind::Final => "[*] (final)",
            StateKind::Normal => &self.name,
        }
    }
}

/// How an edge behaves at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Event-triggered move between two states (or an event self-loop).
    External,
    /// Event-triggered self-loop that must not re-run entry/exit.
    Internal,
    /// No event: taken as soon as the source state's entry completes.
    Completion,
}

/// One edge of the machine.
#[derive(Debug, Clone)]
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    pub event: Option<Event>,
    pub guard: Fragment,
    pub action: Fragment,
    pub kind: TransitionKind,
    pub pos: Option<SourcePos>,
}

impl Transition {
    /// The dispatch key: the event name, or `""` for completion edges.
    pub fn trigger(&self) -> &str {
        self.event.as_ref().map(|e| e.name.as_str()).unwrap_or("")
    }

    pub fn is_completion(&self) -> bool {
        self.kind == TransitionKind::Completion
    }

    pub fn is_guarded(&self) -> bool {
        !self.guard.is_empty()
    }
}

/// Verbatim user code captured from `'[tag]` directives, injected into
/// documented insertion points of the emitted artifact.
#[derive(Debug, Clone, Default)]
pub struct CodeSlots {
    /// Class documentation line.
    pub brief: Option<String>,
    /// Lines above the generated type.
    pub header: Vec<String>,
    /// Lines below the generated type.
    pub footer: Vec<String>,
    /// Constructor parameters, one per directive, comma-joined on emit.
    pub params: Vec<String>,
    /// Constructor initializer-list entries.
    pub cons: Vec<String>,
    /// Statements run in the constructor and in `reset()`.
    pub init: Vec<String>,
    /// Additional members pasted into the class body.
    pub code: Vec<String>,
    /// Additional content pasted into the generated test suite.
    pub test: Vec<String>,
}

/// The machine: interned states, ordered transitions, code slots.
#[derive(Debug, Clone)]
pub struct StateGraph {
    pub name: String,
    states: Vec<State>,
    index: HashMap<String, StateId>,
    transitions: Vec<Transition>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    initial: Option<StateId>,
    terminal: Option<StateId>,
    pub slots: CodeSlots,
}

impl StateGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            index: HashMap::new(),
            transitions: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            initial: None,
            terminal: None,
            slots: CodeSlots::default(),
        }
    }

    fn push_state(&mut self, state: State) -> StateId {
        let id = self.states.len();
        self.states.push(state);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    /// Look up a named state, creating it on first mention.
    pub fn intern(&mut self, name: &str) -> StateId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.push_state(State::new(name, StateKind::Normal));
        self.index.insert(name.to_string(), id);
        id
    }

    /// The initial pseudo-state, created on first use.
    pub fn ensure_initial(&mut self) -> StateId {
        match self.initial {
            Some(id) => id,
            None => {
                let id = self.push_state(State::new("[*]", StateKind::Initial));
                self.initial = Some(id);
                id
            }
        }
    }

    /// The final pseudo-state, created on first use. At most one exists.
    pub fn ensure_final(&mut self) -> StateId {
        match self.terminal {
            Some(id) => id,
            None => {
                let id = self.push_state(State::new("[*]", StateKind::Final));
                self.terminal = Some(id);
                id
            }
        }
    }

    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn terminal(&self) -> Option<StateId> {
        self.terminal
    }

    pub fn lookup(&self, name: &str) -> Option<StateId> {
        self.index.get(name).copied()
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id]
    }

    /// All states in first-mention order (pseudo-states included).
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states.iter().enumerate()
    }

    /// Named states only, in first-mention order.
    pub fn normal_states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states()
            .filter(|(_, s)| s.kind == StateKind::Normal)
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition(&self, id: EdgeId) -> &Transition {
        &self.transitions[id]
    }

    /// Outgoing edges of a state, in declaration order.
    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = (EdgeId, &Transition)> {
        self.outgoing[id].iter().map(|&e| (e, &self.transitions[e]))
    }

    /// Incoming edges of a state, in declaration order.
    pub fn incoming(&self, id: StateId) -> impl Iterator<Item = (EdgeId, &Transition)> {
        self.incoming[id].iter().map(|&e| (e, &self.transitions[e]))
    }

    /// Append an edge, rejecting a duplicate (source, target, trigger)
    /// triple. Parallel edges with distinct triggers are fine; a true
    /// duplicate would make event dispatch ambiguous.
    pub fn add_transition(&mut self, transition: Transition) -> Result<EdgeId, ShapeError> {
        let duplicate = self.outgoing[transition.source].iter().any(|&e| {
            let existing = &self.transitions[e];
            existing.target == transition.target && existing.trigger() == transition.trigger()
        });
        if duplicate {
            let trigger = transition.trigger();
            return Err(ShapeError::DuplicateEdge {
                from: self.states[transition.source].label().to_string(),
                to: self.states[transition.target].label().to_string(),
                trigger: if trigger.is_empty() {
                    "<completion>".to_string()
                } else {
                    trigger.to_string()
                },
                pos: transition.pos,
            });
        }
        let id = self.transitions.len();
        self.outgoing[transition.source].push(id);
        self.incoming[transition.target].push(id);
        self.transitions.push(transition);
        Ok(id)
    }

    /// Distinct external event names in first-declaration order, internal
    /// reactions included.
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for t in &self.transitions {
            if let Some(event) = &t.event {
                if !names.contains(&event.name.as_str()) {
                    names.push(&event.name);
                }
            }
        }
        for state in &self.states {
            for reaction in &state.reactions {
                if !names.contains(&reaction.event.name.as_str()) {
                    names.push(&reaction.event.name);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: StateId, target: StateId, event: Option<&str>) -> Transition {
        Transition {
            source,
            target,
            event: event.map(Event::new),
            guard: Fragment::Empty,
            action: Fragment::Empty,
            kind: if event.is_some() {
                TransitionKind::External
            } else {
                TransitionKind::Completion
            },
            pos: None,
        }
    }

    #[test]
    fn interning_preserves_first_mention_order() {
        let mut graph = StateGraph::new("Order");
        let a = graph.intern("Armed");
        let b = graph.intern("Busy");
        assert_eq!(graph.intern("Armed"), a);
        let names: Vec<_> = graph.normal_states().map(|(_, s)| s.name.clone()).collect();
        assert_eq!(names, ["Armed", "Busy"]);
        assert_eq!(graph.lookup("Busy"), Some(b));
        assert_eq!(graph.lookup("Missing"), None);
    }

    #[test]
    fn duplicate_triple_is_rejected() {
        let mut graph = StateGraph::new("Dup");
        let a = graph.intern("A");
        let b = graph.intern("B");
        graph.add_transition(edge(a, b, Some("go"))).unwrap();
        // Same pair, different trigger: still a multigraph, accepted.
        graph.add_transition(edge(a, b, Some("leave"))).unwrap();
        graph.add_transition(edge(a, b, None)).unwrap();
        let err = graph.add_transition(edge(a, b, Some("go"))).unwrap_err();
        assert!(matches!(err, ShapeError::DuplicateEdge { .. }));
    }

    #[test]
    fn fragment_append_keeps_declaration_order() {
        let mut entry = Fragment::Empty;
        entry.append("openValve();");
        entry.append("startPump();");
        assert_eq!(entry.as_str(), "openValve();\nstartPump();");
    }

    #[test]
    fn pseudo_states_are_singletons() {
        let mut graph = StateGraph::new("Pseudo");
        let init = graph.ensure_initial();
        assert_eq!(graph.ensure_initial(), init);
        let done = graph.ensure_final();
        assert_eq!(graph.ensure_final(), done);
        assert_eq!(graph.state(init).kind, StateKind::Initial);
        assert_eq!(graph.state(done).kind, StateKind::Final);
        assert_eq!(graph.normal_states().count(), 0);
    }

    #[test]
    fn event_names_are_deduplicated_in_order() {
        let mut graph = StateGraph::new("Events");
        let a = graph.intern("A");
        let b = graph.intern("B");
        graph.add_transition(edge(a, b, Some("go"))).unwrap();
        graph.add_transition(edge(b, a, Some("back"))).unwrap();
        graph.add_transition(edge(a, a, Some("go"))).unwrap();
        assert_eq!(graph.event_names(), ["go", "back"]);
    }
}
