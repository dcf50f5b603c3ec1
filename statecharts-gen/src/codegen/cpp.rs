//! C++ backend: renders the machine as a single self-contained class.
//!
//! The generated class follows the table-driven execution model:
//!
//! - a scoped `State` enum with the reserved `MAX_STATES`,
//!   `IGNORING_EVENT`, and `CANNOT_HAPPEN` markers (plus `FINAL_STATE`
//!   when the chart declares a final pseudo-state);
//! - per-event static lookup tables from the current state to a
//!   `Transition` record, all dispatched through one driver;
//! - entry/exit hooks in a fixed-size table indexed by state;
//! - guards and actions as numbered `virtual` methods, so the generated
//!   test suite can subclass the machine and pin guard outcomes;
//! - a 16-deep FIFO of pending transition records that serializes
//!   completion transitions fired from inside entry/exit/action bodies;
//!   overflowing it aborts as an infinite loop.
//!
//! `hpp` output is the header-only form; `cpp` output is the same class
//! as a standalone translation unit.

use statecharts_core::{EmitError, Fragment, StateGraph, StateId, StateKind};

use super::utils;
use super::{Artifact, ArtifactRole, Backend, EmitOptions, OutputKind};
use crate::scenario::Scenario;

pub struct CppBackend;

/// Enumerators the generated machine reserves for itself.
const RESERVED: &[&str] = &["MAX_STATES", "IGNORING_EVENT", "CANNOT_HAPPEN", "FINAL_STATE"];

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "asm", "auto", "bool", "break", "case", "catch", "char", "class",
    "const", "constexpr", "continue", "default", "delete", "do", "double", "else", "enum",
    "explicit", "export", "extern", "false", "float", "for", "friend", "goto", "if", "inline",
    "int", "long", "mutable", "namespace", "new", "noexcept", "nullptr", "operator", "private",
    "protected", "public", "register", "return", "short", "signed", "sizeof", "static", "struct",
    "switch", "template", "this", "throw", "true", "try", "typedef", "typename", "union",
    "unsigned", "using", "virtual", "void", "volatile", "while",
];

impl Backend for CppBackend {
    fn name(&self) -> &'static str {
        "cpp"
    }

    fn extension(&self, output: OutputKind) -> &'static str {
        match output {
            OutputKind::Source => "cpp",
            OutputKind::Header => "hpp",
        }
    }

    fn escape_ident(&self, raw: &str) -> Result<String, EmitError> {
        let escaped = utils::sanitize_ident(raw);
        if KEYWORDS.contains(&escaped.as_str()) {
            Ok(format!("{escaped}_"))
        } else {
            Ok(escaped)
        }
    }

    fn emit(
        &self,
        graph: &StateGraph,
        scenarios: &[Scenario],
        options: &EmitOptions,
    ) -> Result<Vec<Artifact>, EmitError> {
        let plan = Plan::build(self, graph, options)?;
        Ok(vec![
            plan.render_machine(graph, options),
            plan.render_tests(graph, scenarios),
        ])
    }
}

/// One dispatch alternative for a (state, trigger) pair.
struct Candidate {
    dest: String,
    guard: Option<usize>,
    action: Option<usize>,
}

struct EventPlan {
    method: String,
    raw_name: String,
    params: Option<String>,
    /// Candidates per enum-order state, declaration order within a state.
    rows: Vec<Vec<Candidate>>,
}

/// Everything both artifacts agree on, computed once so guard/action
/// numbering stays consistent between the machine and its tests.
struct Plan {
    type_name: String,
    machine_file: String,
    test_file: String,
    /// Enum declaration order: normal states, then the final pseudo-state.
    enum_order: Vec<StateId>,
    /// StateId → enumerator (None only for the initial pseudo-state).
    enumerant: Vec<Option<String>>,
    /// Deduplicated guard fragments; index N renders as `onGuard{N+1}`.
    guards: Vec<String>,
    /// Deduplicated action fragments; index N renders as `onTransition{N+1}`.
    actions: Vec<String>,
    events: Vec<EventPlan>,
    /// States with completion transitions, with their candidate lists.
    completions: Vec<(StateId, Vec<Candidate>)>,
    /// Candidates out of the initial pseudo-state, declaration order.
    initial: Vec<Candidate>,
}

impl Plan {
    fn build(backend: &CppBackend, graph: &StateGraph, options: &EmitOptions) -> Result<Self, EmitError> {
        let type_name = options.type_name();
        let ext = backend.extension(options.output);

        let mut enum_order = Vec::new();
        let mut enumerant: Vec<Option<String>> = vec![None; graph.state_count()];
        for (id, state) in graph.normal_states() {
            let name = backend.escape_ident(&state.name)?;
            if RESERVED.contains(&name.as_str()) {
                return Err(EmitError::ReservedStateName {
                    name: state.name.clone(),
                    reserved: RESERVED[RESERVED.iter().position(|r| *r == name).unwrap_or(0)],
                });
            }
            enumerant[id] = Some(name);
            enum_order.push(id);
        }
        if let Some(terminal) = graph.terminal() {
            enumerant[terminal] = Some("FINAL_STATE".to_string());
            enum_order.push(terminal);
        }

        // Guard and action hooks are numbered by first appearance:
        // transitions in declaration order, then state reactions.
        let mut guards: Vec<String> = Vec::new();
        let mut actions: Vec<String> = Vec::new();
        fn collect(
            guards: &mut Vec<String>,
            actions: &mut Vec<String>,
            guard: &Fragment,
            action: &Fragment,
        ) {
            if let Fragment::Text(text) = guard {
                if !guards.iter().any(|g| g == text) {
                    guards.push(text.clone());
                }
            }
            if let Fragment::Text(text) = action {
                if !actions.iter().any(|a| a == text) {
                    actions.push(text.clone());
                }
            }
        }
        for t in graph.transitions() {
            collect(&mut guards, &mut actions, &t.guard, &t.action);
        }
        for (_, state) in graph.states() {
            for reaction in &state.reactions {
                collect(&mut guards, &mut actions, &reaction.guard, &reaction.action);
            }
        }
        let guard_index = |fragment: &Fragment| -> Option<usize> {
            guards.iter().position(|g| g == fragment.as_str())
        };
        let action_index = |fragment: &Fragment| -> Option<usize> {
            actions.iter().position(|a| a == fragment.as_str())
        };

        let mut events = Vec::new();
        for raw_name in graph.event_names() {
            let mut params = None;
            let mut rows = Vec::new();
            for &sid in &enum_order {
                let mut row = Vec::new();
                for (_, t) in graph.outgoing(sid) {
                    let Some(event) = &t.event else { continue };
                    if event.name != raw_name {
                        continue;
                    }
                    if params.is_none() {
                        params = event.params.clone();
                    }
                    row.push(Candidate {
                        dest: enumerant[t.target]
                            .clone()
                            .unwrap_or_else(|| "CANNOT_HAPPEN".to_string()),
                        guard: guard_index(&t.guard),
                        action: action_index(&t.action),
                    });
                }
                // Internal reactions dispatch after arrow transitions on
                // the same trigger; the self destination keeps entry and
                // exit hooks quiet in the driver.
                for reaction in &graph.state(sid).reactions {
                    if reaction.event.name != raw_name {
                        continue;
                    }
                    row.push(Candidate {
                        dest: enumerant[sid]
                            .clone()
                            .unwrap_or_else(|| "CANNOT_HAPPEN".to_string()),
                        guard: guard_index(&reaction.guard),
                        action: action_index(&reaction.action),
                    });
                }
                rows.push(row);
            }
            events.push(EventPlan {
                method: backend.escape_ident(raw_name)?,
                raw_name: raw_name.to_string(),
                params,
                rows,
            });
        }

        let mut completions = Vec::new();
        for &sid in &enum_order {
            let row: Vec<Candidate> = graph
                .outgoing(sid)
                .filter(|(_, t)| t.is_completion())
                .map(|(_, t)| Candidate {
                    dest: enumerant[t.target]
                        .clone()
                        .unwrap_or_else(|| "CANNOT_HAPPEN".to_string()),
                    guard: guard_index(&t.guard),
                    action: action_index(&t.action),
                })
                .collect();
            if !row.is_empty() {
                completions.push((sid, row));
            }
        }

        let initial = match graph.initial() {
            Some(init) => graph
                .outgoing(init)
                .map(|(_, t)| Candidate {
                    dest: enumerant[t.target]
                        .clone()
                        .unwrap_or_else(|| "CANNOT_HAPPEN".to_string()),
                    guard: guard_index(&t.guard),
                    action: action_index(&t.action),
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            machine_file: format!("{type_name}.{ext}"),
            test_file: format!("{type_name}Tests.cpp"),
            type_name,
            enum_order,
            enumerant,
            guards,
            actions,
            events,
            completions,
            initial,
        })
    }

    fn guard_hook(&self, index: usize) -> String {
        format!("onGuard{}", index + 1)
    }

    fn action_hook(&self, index: usize) -> String {
        format!("onTransition{}", index + 1)
    }

    fn guard_call(&self, candidate: &Candidate) -> Option<String> {
        candidate.guard.map(|g| format!("{}()", self.guard_hook(g)))
    }

    fn record(&self, candidate: &Candidate, inline_guard: bool) -> String {
        let ty = &self.type_name;
        let guard = match candidate.guard {
            Some(g) if !inline_guard => format!("&{ty}::{}", self.guard_hook(g)),
            _ => "nullptr".to_string(),
        };
        let action = match candidate.action {
            Some(a) => format!("&{ty}::{}", self.action_hook(a)),
            None => "nullptr".to_string(),
        };
        format!("Transition{{State::{}, {guard}, {action}}}", candidate.dest)
    }

    // ---------- machine artifact ----------

    fn render_machine(&self, graph: &StateGraph, options: &EmitOptions) -> Artifact {
        let ty = &self.type_name;
        let mut out = String::new();

        out.push_str(&format!(
            "// {ty} state machine, generated from `{}`; do not edit by hand.\n",
            options.stem
        ));
        if options.output == OutputKind::Header {
            out.push_str("#pragma once\n");
        }
        out.push_str("\n#include <array>\n#include <cstdint>\n#include <cstdio>\n#include <cstdlib>\n");
        out.push_str("#if defined(STATECHART_THREAD_SAFE)\n#include <mutex>\n#endif\n");
        for line in &graph.slots.header {
            out.push('\n');
            out.push_str(line);
        }
        out.push('\n');

        out.push('\n');
        if let Some(brief) = &graph.slots.brief {
            out.push_str(&format!("/// {brief}\n"));
        }
        out.push_str(&format!("class {ty}\n{{\npublic:\n"));

        self.render_enum(graph, &mut out);
        self.render_constructor(graph, &mut out);
        self.render_reset(graph, &mut out);
        out.push_str(
            "    /// Current state of the machine.\n    State state() const\n    {\n        return m_state;\n    }\n\n",
        );
        self.render_state_name(graph, &mut out);
        for event in &self.events {
            self.render_event(event, &mut out);
        }

        out.push_str("protected:\n");
        self.render_driver(&mut out);
        self.render_completions(&mut out);
        self.render_guard_hooks(&mut out);
        self.render_action_hooks(&mut out);
        self.render_state_hooks(graph, &mut out);
        if !graph.slots.code.is_empty() {
            out.push_str("    // User-provided members.\n");
            for line in &graph.slots.code {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }

        out.push_str("private:\n");
        out.push_str(&format!(
            "    static constexpr std::size_t kMaxNesting = 16U;\n\n\
             \x20   State m_state;\n\
             \x20   std::array<Transition, kMaxNesting> m_queue;\n\
             \x20   std::uint8_t m_head;\n\
             \x20   std::uint8_t m_tail;\n\
             \x20   std::uint8_t m_count;\n\
             \x20   bool m_processing;\n\
             #if defined(STATECHART_THREAD_SAFE)\n\
             \x20   std::recursive_mutex m_mutex;\n\
             #endif\n\
             }};\n"
        ));
        for line in &graph.slots.footer {
            out.push_str(line);
            out.push('\n');
        }

        Artifact {
            file_name: self.machine_file.clone(),
            role: ArtifactRole::Machine,
            contents: out,
        }
    }

    fn render_enum(&self, graph: &StateGraph, out: &mut String) {
        out.push_str("    /// States of the machine, plus the reserved markers.\n");
        out.push_str("    enum class State : std::uint8_t\n    {\n");
        for &sid in &self.enum_order {
            let state = graph.state(sid);
            let name = self.enumerant[sid].as_deref().unwrap_or("CANNOT_HAPPEN");
            match (&state.comment, state.kind) {
                (Some(comment), _) => {
                    out.push_str(&format!("        {name}, ///< {comment}\n"));
                }
                (None, StateKind::Final) => {
                    out.push_str(&format!("        {name}, ///< Reaching this state halts the machine.\n"));
                }
                _ => out.push_str(&format!("        {name},\n")),
            }
        }
        out.push_str("        MAX_STATES,\n        IGNORING_EVENT,\n        CANNOT_HAPPEN\n    };\n\n");
        out.push_str(
            "    static constexpr std::size_t kStateCount = static_cast<std::size_t>(State::MAX_STATES);\n\n",
        );
    }

    fn render_constructor(&self, graph: &StateGraph, out: &mut String) {
        let ty = &self.type_name;
        let params = graph.slots.params.join(", ");
        out.push_str(&format!("    explicit {ty}({params})\n"));
        if !graph.slots.cons.is_empty() {
            out.push_str(&format!("        : {}\n", graph.slots.cons.join(", ")));
        }
        out.push_str("    {\n        reset();\n    }\n\n");
        out.push_str(&format!("    virtual ~{ty}() = default;\n\n"));
    }

    fn render_reset(&self, graph: &StateGraph, out: &mut String) {
        out.push_str(
            "    /// Return to the reset configuration: clear the pending queue,\n\
             \x20   /// then take the first accepting initial transition.\n\
             \x20   void reset()\n    {\n",
        );
        self.render_lock(out);
        out.push_str(
            "        m_head = 0U;\n        m_tail = 0U;\n        m_count = 0U;\n\
             \x20       m_processing = false;\n        m_state = State::CANNOT_HAPPEN;\n",
        );
        for line in &graph.slots.init {
            out.push_str("        ");
            out.push_str(line);
            out.push('\n');
        }
        for candidate in &self.initial {
            match self.guard_call(candidate) {
                Some(call) => {
                    out.push_str(&format!(
                        "        if ({call})\n        {{\n            dispatch({});\n            return;\n        }}\n",
                        self.record(candidate, true)
                    ));
                }
                None => {
                    out.push_str(&format!(
                        "        dispatch({});\n        return;\n",
                        self.record(candidate, true)
                    ));
                    break;
                }
            }
        }
        out.push_str("    }\n\n");
    }

    fn render_state_name(&self, graph: &StateGraph, out: &mut String) {
        out.push_str("    /// Printable name of a state.\n");
        out.push_str("    static char const* stateName(State state)\n    {\n        switch (state)\n        {\n");
        for &sid in &self.enum_order {
            let name = self.enumerant[sid].as_deref().unwrap_or("CANNOT_HAPPEN");
            let label = match graph.state(sid).kind {
                StateKind::Final => "[*]",
                _ => graph.state(sid).name.as_str(),
            };
            out.push_str(&format!(
                "            case State::{name}: return \"{label}\";\n"
            ));
        }
        out.push_str(
            "            default: return \"?\";\n        }\n    }\n\n",
        );
    }

    fn render_event(&self, event: &EventPlan, out: &mut String) {
        match &event.params {
            Some(params) => out.push_str(&format!(
                "    /// External event `{}` (declared parameters, unused by dispatch: `{params}`).\n",
                event.raw_name
            )),
            None => out.push_str(&format!("    /// External event `{}`.\n", event.raw_name)),
        }
        out.push_str(&format!("    void {}()\n    {{\n", event.method));
        self.render_lock(out);
        out.push_str(
            "        if (m_state >= State::MAX_STATES)\n        {\n            dispatch(Transition{State::CANNOT_HAPPEN, nullptr, nullptr});\n            return;\n        }\n",
        );

        // States with several alternatives resolve their guard chain in
        // declaration order before touching the table.
        let chained: Vec<(usize, &Vec<Candidate>)> = event
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.len() > 1)
            .collect();
        if !chained.is_empty() {
            out.push_str("        switch (m_state)\n        {\n");
            for (row_index, row) in &chained {
                let state_name = self.enumerant[self.enum_order[*row_index]]
                    .as_deref()
                    .unwrap_or("CANNOT_HAPPEN");
                out.push_str(&format!("            case State::{state_name}:\n"));
                let mut first = true;
                for candidate in row.iter() {
                    let keyword = if first { "if" } else { "else if" };
                    match self.guard_call(candidate) {
                        Some(call) => out.push_str(&format!(
                            "                {keyword} ({call}) {{ dispatch({}); }}\n",
                            self.record(candidate, true)
                        )),
                        None if first => {
                            out.push_str(&format!(
                                "                dispatch({});\n",
                                self.record(candidate, true)
                            ));
                            break;
                        }
                        None => {
                            out.push_str(&format!(
                                "                else {{ dispatch({}); }}\n",
                                self.record(candidate, true)
                            ));
                            break;
                        }
                    }
                    first = false;
                }
                out.push_str("                return;\n");
            }
            out.push_str("            default:\n                break;\n        }\n");
        }

        out.push_str("        static std::array<Transition, kStateCount> const table{{\n");
        for (row_index, row) in event.rows.iter().enumerate() {
            let state_name = self.enumerant[self.enum_order[row_index]]
                .as_deref()
                .unwrap_or("CANNOT_HAPPEN");
            let record = match row.len() {
                1 => self.record(&row[0], false),
                _ => "Transition{State::IGNORING_EVENT, nullptr, nullptr}".to_string(),
            };
            out.push_str(&format!("            {record}, // {state_name}\n"));
        }
        out.push_str("        }};\n");
        out.push_str("        dispatch(table[static_cast<std::size_t>(m_state)]);\n    }\n\n");
    }

    fn render_lock(&self, out: &mut String) {
        out.push_str(
            "#if defined(STATECHART_THREAD_SAFE)\n        std::lock_guard<std::recursive_mutex> lock(m_mutex);\n#endif\n",
        );
    }

    fn render_driver(&self, out: &mut String) {
        let ty = &self.type_name;
        out.push_str(&format!(
            "    /// A row of the dispatch tables.\n\
             \x20   struct Transition\n    {{\n\
             \x20       State destination;\n\
             \x20       bool ({ty}::*guard)();\n\
             \x20       void ({ty}::*action)();\n\
             \x20   }};\n\n"
        ));
        out.push_str(
            "    /// The driver: queue the record, then drain until quiescent.\n\
             \x20   /// Re-entrant calls (from entry/exit/action bodies) only queue;\n\
             \x20   /// the outermost call runs the drain loop.\n\
             \x20   void dispatch(Transition const& transition)\n    {\n\
             \x20       enqueue(transition);\n\
             \x20       if (m_processing)\n        {\n            return;\n        }\n\
             \x20       m_processing = true;\n\
             \x20       while (m_count != 0U)\n        {\n\
             \x20           Transition const pending = m_queue[m_head];\n\
             \x20           m_head = static_cast<std::uint8_t>((m_head + 1U) % kMaxNesting);\n\
             \x20           --m_count;\n\
             \x20           step(pending);\n\
             \x20       }\n\
             \x20       m_processing = false;\n    }\n\n",
        );
        out.push_str(&format!(
            "    void step(Transition const& transition)\n    {{\n\
             \x20       if (transition.destination == State::CANNOT_HAPPEN)\n        {{\n\
             \x20           std::fprintf(stderr, \"{ty}: forbidden transition from %s\\n\", stateName(m_state));\n\
             \x20           std::abort();\n\
             \x20       }}\n\
             \x20       if (transition.destination == State::IGNORING_EVENT)\n        {{\n\
             \x20           return;\n\
             \x20       }}\n\
             \x20       if ((transition.guard != nullptr) && !(this->*transition.guard)())\n        {{\n\
             \x20           return; // guard rejected: hold the current state\n\
             \x20       }}\n\
             \x20       State const previous = m_state;\n\
             \x20       m_state = transition.destination;\n\
             \x20       if (transition.action != nullptr)\n        {{\n\
             \x20           (this->*transition.action)();\n\
             \x20       }}\n\
             \x20       if (previous != transition.destination)\n        {{\n\
             \x20           if (previous < State::MAX_STATES)\n            {{\n\
             \x20               StateHooks const& from = hooks(previous);\n\
             \x20               if (from.exit != nullptr)\n                {{\n\
             \x20                   (this->*from.exit)();\n\
             \x20               }}\n\
             \x20           }}\n\
             \x20           StateHooks const& to = hooks(transition.destination);\n\
             \x20           if (to.entry != nullptr)\n            {{\n\
             \x20               (this->*to.entry)();\n\
             \x20           }}\n\
             \x20       }}\n\
             \x20       queueCompletions(transition.destination);\n    }}\n\n"
        ));
        out.push_str(&format!(
            "    void enqueue(Transition const& transition)\n    {{\n\
             \x20       if (m_count == kMaxNesting)\n        {{\n\
             \x20           std::fprintf(stderr, \"{ty}: completion queue overflow (infinite loop?)\\n\");\n\
             \x20           std::abort();\n\
             \x20       }}\n\
             \x20       m_queue[m_tail] = transition;\n\
             \x20       m_tail = static_cast<std::uint8_t>((m_tail + 1U) % kMaxNesting);\n\
             \x20       ++m_count;\n    }}\n\n"
        ));
    }

    fn render_completions(&self, out: &mut String) {
        out.push_str(
            "    /// Queue the completion transition of the entered state, if any.\n\
             \x20   /// Guards are evaluated in declaration order; the first to accept wins.\n\
             \x20   void queueCompletions(State from)\n    {\n",
        );
        if self.completions.is_empty() {
            out.push_str("        (void)from;\n    }\n\n");
            return;
        }
        out.push_str("        switch (from)\n        {\n");
        for (sid, row) in &self.completions {
            let name = self.enumerant[*sid].as_deref().unwrap_or("CANNOT_HAPPEN");
            out.push_str(&format!("            case State::{name}:\n            {{\n"));
            for candidate in row {
                match self.guard_call(candidate) {
                    Some(call) => out.push_str(&format!(
                        "                if ({call})\n                {{\n                    enqueue({});\n                    return;\n                }}\n",
                        self.record(candidate, true)
                    )),
                    None => {
                        out.push_str(&format!(
                            "                enqueue({});\n                return;\n",
                            self.record(candidate, true)
                        ));
                        break;
                    }
                }
            }
            out.push_str("                return;\n            }\n");
        }
        out.push_str("            default:\n                return;\n        }\n    }\n\n");
    }

    fn render_guard_hooks(&self, out: &mut String) {
        for (i, text) in self.guards.iter().enumerate() {
            out.push_str(&format!(
                "    /// Guard: `{text}`\n    virtual bool {}()\n    {{\n        return ({text});\n    }}\n\n",
                self.guard_hook(i)
            ));
        }
    }

    fn render_action_hooks(&self, out: &mut String) {
        for (i, text) in self.actions.iter().enumerate() {
            out.push_str(&format!(
                "    /// Action: `{text}`\n    virtual void {}()\n    {{\n        {}\n    }}\n\n",
                self.action_hook(i),
                statement(text)
            ));
        }
    }

    fn render_state_hooks(&self, graph: &StateGraph, out: &mut String) {
        // Hook methods first, then the table tying them to states.
        for &sid in &self.enum_order {
            let state = graph.state(sid);
            let Some(name) = self.enumerant[sid].as_deref() else { continue };
            if let Fragment::Text(body) = &state.entry {
                out.push_str(&format!(
                    "    /// Entry hook of `{}`.\n    virtual void onEntering{}()\n    {{\n",
                    state.name,
                    utils::capitalized(name)
                ));
                for line in body.lines() {
                    out.push_str(&format!("        {}\n", statement(line)));
                }
                out.push_str("    }\n\n");
            }
            if let Fragment::Text(body) = &state.exit {
                out.push_str(&format!(
                    "    /// Exit hook of `{}`.\n    virtual void onLeaving{}()\n    {{\n",
                    state.name,
                    utils::capitalized(name)
                ));
                for line in body.lines() {
                    out.push_str(&format!("        {}\n", statement(line)));
                }
                out.push_str("    }\n\n");
            }
        }

        let ty = &self.type_name;
        out.push_str(&format!(
            "    struct StateHooks\n    {{\n        void ({ty}::*entry)();\n        void ({ty}::*exit)();\n    }};\n\n"
        ));
        out.push_str(
            "    /// Entry/exit hooks, indexed by state enumerator.\n\
             \x20   StateHooks const& hooks(State state) const\n    {\n\
             \x20       static std::array<StateHooks, kStateCount> const table{{\n",
        );
        for &sid in &self.enum_order {
            let state = graph.state(sid);
            let name = self.enumerant[sid].as_deref().unwrap_or("CANNOT_HAPPEN");
            let entry = match &state.entry {
                Fragment::Text(_) => format!("&{ty}::onEntering{}", utils::capitalized(name)),
                Fragment::Empty => "nullptr".to_string(),
            };
            let exit = match &state.exit {
                Fragment::Text(_) => format!("&{ty}::onLeaving{}", utils::capitalized(name)),
                Fragment::Empty => "nullptr".to_string(),
            };
            out.push_str(&format!(
                "            StateHooks{{{entry}, {exit}}}, // {name}\n"
            ));
        }
        out.push_str("        }};\n        return table[static_cast<std::size_t>(state)];\n    }\n\n");
    }

    // ---------- test artifact ----------

    fn render_tests(&self, graph: &StateGraph, scenarios: &[Scenario]) -> Artifact {
        let ty = &self.type_name;
        let mut out = String::new();

        out.push_str(&format!(
            "// Generated test scenarios for the {ty} state machine; do not edit by hand.\n"
        ));
        out.push_str(&format!("#include \"{}\"\n\n#include <cstdio>\n#include <cstdlib>\n\n", self.machine_file));
        for line in &graph.slots.test {
            out.push_str(line);
            out.push('\n');
        }
        if !graph.slots.test.is_empty() {
            out.push('\n');
        }
        out.push_str(
            "// Constructor arguments for the machine under test; override from\n\
             // the build line or the `'[test]` slot when the chart takes params.\n\
             #ifndef STATECHART_CTOR_ARGS\n#define STATECHART_CTOR_ARGS\n#endif\n\n",
        );
        out.push_str(
            "static int g_failures = 0;\n\n\
             #define CHECK(cond)                                                     \\\n\
             \x20   do                                                                  \\\n\
             \x20   {                                                                   \\\n\
             \x20       if (!(cond))                                                    \\\n\
             \x20       {                                                               \\\n\
             \x20           std::printf(\"FAIL %s:%d: %s\\n\", __FILE__, __LINE__, #cond); \\\n\
             \x20           ++g_failures;                                               \\\n\
             \x20       }                                                               \\\n\
             \x20   } while (0)\n\n",
        );

        let mut test_names = Vec::new();
        for scenario in scenarios {
            let test_name = utils::sanitize_ident(&scenario.name);
            let fixture = self.render_fixture(&test_name, scenario, &mut out);
            self.render_test_fn(graph, &test_name, &fixture, scenario, &mut out);
            test_names.push(test_name);
        }

        out.push_str("int main()\n{\n");
        for name in &test_names {
            out.push_str(&format!("    test_{name}();\n"));
        }
        out.push_str(&format!(
            "    if (g_failures != 0)\n    {{\n        std::printf(\"%d scenario(s) failed\\n\", g_failures);\n        return EXIT_FAILURE;\n    }}\n    std::printf(\"{} scenario(s) passed\\n\");\n    return EXIT_SUCCESS;\n}}\n",
            test_names.len()
        ));

        Artifact {
            file_name: self.test_file.clone(),
            role: ArtifactRole::Tests,
            contents: out,
        }
    }

    /// Emit a subclass pinning the scenario's guard assumptions, when it
    /// has any. Returns the type to instantiate in the test body.
    fn render_fixture(&self, test_name: &str, scenario: &Scenario, out: &mut String) -> String {
        let ty = &self.type_name;
        if scenario.assumptions.is_empty() {
            return ty.clone();
        }
        let fixture = format!("Fixture_{test_name}");
        out.push_str(&format!(
            "struct {fixture} : {ty}\n{{\n    using {ty}::{ty};\n"
        ));
        for assumption in &scenario.assumptions {
            if let Some(index) = self.guards.iter().position(|g| *g == assumption.guard) {
                out.push_str(&format!(
                    "    bool {}() override\n    {{\n        return {}; // `{}`\n    }}\n",
                    self.guard_hook(index),
                    assumption.value,
                    assumption.guard
                ));
            }
        }
        out.push_str("};\n\n");
        fixture
    }

    fn render_test_fn(
        &self,
        graph: &StateGraph,
        test_name: &str,
        fixture: &str,
        scenario: &Scenario,
        out: &mut String,
    ) {
        let ty = &self.type_name;
        let expected_labels: Vec<&str> = scenario
            .expected
            .iter()
            .map(|&id| graph.state(id).label())
            .collect();
        out.push_str(&format!(
            "// {}: fire [{}]; expect {{{}}}.\n",
            scenario.name,
            scenario.steps.join(", "),
            expected_labels.join(", ")
        ));
        out.push_str(&format!("static void test_{test_name}()\n{{\n"));
        out.push_str(&format!("    {fixture} machine{{STATECHART_CTOR_ARGS}};\n"));
        // Construction already reset the machine; pinned-guard fixtures
        // must not re-drain with the stubs active, so only the plain
        // scenarios exercise the public reset.
        if scenario.assumptions.is_empty() {
            out.push_str("    machine.reset();\n");
        }
        for step in &scenario.steps {
            let method = self
                .events
                .iter()
                .find(|e| e.raw_name == *step)
                .map(|e| e.method.clone())
                .unwrap_or_else(|| utils::sanitize_ident(step));
            out.push_str(&format!("    machine.{method}();\n"));
        }
        let clauses: Vec<String> = scenario
            .expected
            .iter()
            .filter_map(|&id| self.enumerant[id].clone())
            .map(|name| format!("(machine.state() == {ty}::State::{name})"))
            .collect();
        if clauses.is_empty() {
            out.push_str(&format!(
                "    CHECK(machine.state() < {ty}::State::MAX_STATES);\n"
            ));
        } else {
            out.push_str(&format!("    CHECK({});\n", clauses.join(" || ")));
        }
        out.push_str("}\n\n");
    }
}

/// Turn an opaque fragment line into a statement: verbatim, with a `;`
/// appended when the author left it off.
fn statement(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with(';') || trimmed.ends_with('}') || trimmed.ends_with('{') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{generate, BackendKind};
    use crate::scenario::{synthesize, ScenarioConfig};
    use crate::{graph as graph_builder, parser};

    const GUMBALL: &str = "\
'[brief] Dispenses gumballs until the hopper runs dry.
'[param] unsigned gumballs_
'[cons] gumballs(gumballs_)
'[code] unsigned gumballs;
[*] --> NoQuarter : [ gumballs > 0 ]
[*] --> OutOfGumballs : [ gumballs == 0 ]
NoQuarter --> HasQuarter : insertQuarter
HasQuarter --> GumballSold : turnCrank / --gumballs
GumballSold --> NoQuarter : [ gumballs > 0 ]
GumballSold --> OutOfGumballs : [ gumballs == 0 ]
";

    fn emit(source: &str, output: OutputKind) -> Vec<Artifact> {
        let decls = parser::parse(source).expect("source should parse");
        let graph = graph_builder::build("Fixture", &decls).expect("graph should build");
        let scenarios = synthesize(&graph, &ScenarioConfig::default());
        let options = EmitOptions {
            backend: BackendKind::Cpp,
            output,
            prefix: None,
            stem: "gumball".to_string(),
        };
        generate(&graph, &scenarios, &options).expect("emit should succeed")
    }

    #[test]
    fn machine_artifact_has_the_expected_skeleton() {
        let artifacts = emit(GUMBALL, OutputKind::Header);
        let machine = &artifacts[0];
        assert_eq!(machine.file_name, "Gumball.hpp");
        assert_eq!(machine.role, ArtifactRole::Machine);
        let text = &machine.contents;
        assert!(text.contains("#pragma once"));
        assert!(text.contains("class Gumball"));
        assert!(text.contains("enum class State : std::uint8_t"));
        assert!(text.contains("        NoQuarter,\n"));
        assert!(text.contains("MAX_STATES,\n        IGNORING_EVENT,\n        CANNOT_HAPPEN"));
        assert!(text.contains("void insertQuarter()"));
        assert!(text.contains("void turnCrank()"));
        assert!(text.contains("virtual bool onGuard1()"));
        assert!(text.contains("return (gumballs > 0);"));
        assert!(text.contains("virtual void onTransition1()"));
        assert!(text.contains("--gumballs;"));
        assert!(text.contains("kMaxNesting = 16U"));
        assert!(text.contains("/// Dispenses gumballs until the hopper runs dry."));
        assert!(text.contains("unsigned gumballs;"));
    }

    #[test]
    fn source_output_is_a_translation_unit() {
        let artifacts = emit(GUMBALL, OutputKind::Source);
        assert_eq!(artifacts[0].file_name, "Gumball.cpp");
        assert!(!artifacts[0].contents.contains("#pragma once"));
        // The test artifact includes whichever form the machine took.
        assert!(artifacts[1].contents.contains("#include \"Gumball.cpp\""));
    }

    #[test]
    fn test_artifact_walks_the_sell_cycle() {
        let artifacts = emit(GUMBALL, OutputKind::Header);
        let tests = &artifacts[1];
        assert_eq!(tests.file_name, "GumballTests.cpp");
        assert_eq!(tests.role, ArtifactRole::Tests);
        let text = &tests.contents;
        assert!(text.contains("int main()"));
        assert!(text.contains("test_reset();"));
        assert!(text.contains("machine.insertQuarter();"));
        assert!(text.contains("machine.turnCrank();"));
        assert!(text.contains("== Gumball::State::NoQuarter"));
        // The reset scenario is a set-membership check over both targets.
        assert!(text.contains("|| (machine.state() == Gumball::State::OutOfGumballs)"));
    }

    #[test]
    fn prefix_lands_on_type_and_files() {
        let decls = parser::parse(GUMBALL).unwrap();
        let graph = graph_builder::build("Fixture", &decls).unwrap();
        let scenarios = synthesize(&graph, &ScenarioConfig::default());
        let options = EmitOptions {
            backend: BackendKind::Cpp,
            output: OutputKind::Header,
            prefix: Some("Candy".to_string()),
            stem: "gumball".to_string(),
        };
        let artifacts = generate(&graph, &scenarios, &options).unwrap();
        assert_eq!(artifacts[0].file_name, "CandyGumball.hpp");
        assert_eq!(artifacts[1].file_name, "CandyGumballTests.cpp");
        assert!(artifacts[0].contents.contains("class CandyGumball"));
    }

    #[test]
    fn reserved_state_name_is_refused() {
        let decls = parser::parse("[*] --> MAX_STATES :\nMAX_STATES --> Ok : go\nOk --> MAX_STATES : back").unwrap();
        let graph = graph_builder::build("Fixture", &decls).unwrap();
        let options = EmitOptions {
            backend: BackendKind::Cpp,
            output: OutputKind::Header,
            prefix: None,
            stem: "bad".to_string(),
        };
        let err = generate(&graph, &[], &options).unwrap_err();
        assert!(matches!(err, EmitError::ReservedStateName { .. }));
    }

    #[test]
    fn emission_is_byte_deterministic() {
        let a = emit(GUMBALL, OutputKind::Header);
        let b = emit(GUMBALL, OutputKind::Header);
        assert_eq!(a[0].contents, b[0].contents);
        assert_eq!(a[1].contents, b[1].contents);
    }

    #[test]
    fn entry_and_exit_hooks_land_in_the_table() {
        let source = "\
[*] --> Idle :
Idle : entry / motorOff()
Idle : exit / motorPrime()
Idle --> Running : start
Running --> Idle : stop
";
        let decls = parser::parse(source).unwrap();
        let graph = graph_builder::build("Fixture", &decls).unwrap();
        let scenarios = synthesize(&graph, &ScenarioConfig::default());
        let options = EmitOptions {
            backend: BackendKind::Cpp,
            output: OutputKind::Header,
            prefix: None,
            stem: "motor".to_string(),
        };
        let artifacts = generate(&graph, &scenarios, &options).unwrap();
        let text = &artifacts[0].contents;
        assert!(text.contains("virtual void onEnteringIdle()"));
        assert!(text.contains("motorOff();"));
        assert!(text.contains("virtual void onLeavingIdle()"));
        assert!(text.contains("StateHooks{&Motor::onEnteringIdle, &Motor::onLeavingIdle}, // Idle"));
        assert!(text.contains("StateHooks{nullptr, nullptr}, // Running"));
    }
}
