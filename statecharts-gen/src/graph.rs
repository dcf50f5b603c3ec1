//! Folds the declaration list into a frozen [`StateGraph`].
//!
//! This is where the surface dialect is normalized away: arrow
//! orientation, the `[*]` pseudo-state literal, and the
//! `entering`/`leaving` aliases all disappear here, and every state is
//! interned on first mention so the graph iterates in source order.

use statecharts_core::{
    Event, Fragment, InternalReaction, ShapeError, StateGraph, StateId, Transition, TransitionKind,
};
use tracing::debug;

use crate::types::{Decl, EventDecl, Label, RawStateRef, SlotKind, StateAttr};

/// Build the machine named `name` from parsed declarations.
///
/// Aborts on the first shape error: a malformed machine is not worth
/// accumulating findings over, unlike the verifier's structural pass.
pub fn build(name: &str, decls: &[Decl]) -> Result<StateGraph, ShapeError> {
    let mut graph = StateGraph::new(name);

    for decl in decls {
        match decl {
            Decl::Transition {
                lhs,
                arrow,
                rhs,
                label,
                pos,
            } => {
                // `A <- B` is `B -> A`; glyph length carries no meaning.
                let (src_ref, dst_ref) = if arrow.points_right() {
                    (lhs, rhs)
                } else {
                    (rhs, lhs)
                };
                let (source, target) = resolve_endpoints(&mut graph, src_ref, dst_ref, *pos)?;
                let transition = make_transition(source, target, label, *pos);
                graph.add_transition(transition)?;
            }
            Decl::State { name, attr, pos } => {
                let id = graph.intern(name);
                apply_state_attr(&mut graph, id, attr, *pos)?;
            }
            Decl::Slot { kind, text, .. } => bind_slot(&mut graph, *kind, text),
        }
    }

    debug!(
        machine = %graph.name,
        states = graph.state_count(),
        transitions = graph.transitions().len(),
        "built state graph"
    );
    Ok(graph)
}

/// `[*]` is the initial pseudo-state on the source side and the final
/// pseudo-state on the destination side; a transition between the two
/// pseudo-states is meaningless.
fn resolve_endpoints(
    graph: &mut StateGraph,
    src: &RawStateRef,
    dst: &RawStateRef,
    pos: statecharts_core::SourcePos,
) -> Result<(StateId, StateId), ShapeError> {
    if matches!(src, RawStateRef::Star) && matches!(dst, RawStateRef::Star) {
        return Err(ShapeError::PseudoToPseudo { pos: Some(pos) });
    }
    let source = match src {
        RawStateRef::Star => graph.ensure_initial(),
        RawStateRef::Name(name) => graph.intern(name),
    };
    let target = match dst {
        RawStateRef::Star => graph.ensure_final(),
        RawStateRef::Name(name) => graph.intern(name),
    };
    Ok((source, target))
}

fn make_transition(
    source: StateId,
    target: StateId,
    label: &Label,
    pos: statecharts_core::SourcePos,
) -> Transition {
    let event = label.event.as_ref().map(to_event);
    let kind = match &event {
        None => TransitionKind::Completion,
        Some(_) if source == target => TransitionKind::Internal,
        Some(_) => TransitionKind::External,
    };
    Transition {
        source,
        target,
        event,
        guard: fragment(&label.guard),
        action: fragment(&label.action),
        kind,
        pos: Some(pos),
    }
}

fn to_event(decl: &EventDecl) -> Event {
    Event {
        name: decl.name.clone(),
        params: decl.params.clone(),
    }
}

fn fragment(text: &Option<String>) -> Fragment {
    match text {
        Some(text) => Fragment::from_text(text),
        None => Fragment::Empty,
    }
}

fn apply_state_attr(
    graph: &mut StateGraph,
    id: StateId,
    attr: &StateAttr,
    pos: statecharts_core::SourcePos,
) -> Result<(), ShapeError> {
    match attr {
        StateAttr::Body { keyword, body } => match keyword.as_str() {
            // `entering` and `leaving` are aliases; repeated declarations
            // concatenate in declaration order.
            "entry" | "entering" => graph.state_mut(id).entry.append(body),
            "exit" | "leaving" => graph.state_mut(id).exit.append(body),
            "comment" => {
                let state = graph.state_mut(id);
                match &mut state.comment {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(body.trim());
                    }
                    None => state.comment = Some(body.trim().to_string()),
                }
            }
            other => {
                return Err(ShapeError::UnknownStateKeyword {
                    keyword: other.to_string(),
                    pos: Some(pos),
                });
            }
        },
        StateAttr::Reaction {
            event,
            guard,
            action,
        } => {
            graph.state_mut(id).reactions.push(InternalReaction {
                event: to_event(event),
                guard: fragment(guard),
                action: Fragment::from_text(action),
            });
        }
    }
    Ok(())
}

fn bind_slot(graph: &mut StateGraph, kind: SlotKind, text: &str) {
    let slots = &mut graph.slots;
    match kind {
        SlotKind::Header => slots.header.push(text.to_string()),
        SlotKind::Footer => slots.footer.push(text.to_string()),
        SlotKind::Param => slots.params.push(text.trim().to_string()),
        SlotKind::Cons => slots.cons.push(text.trim().to_string()),
        SlotKind::Init => slots.init.push(text.to_string()),
        SlotKind::Code => slots.code.push(text.to_string()),
        SlotKind::Test => slots.test.push(text.to_string()),
        SlotKind::Brief => {
            if !text.trim().is_empty() {
                slots.brief = Some(text.trim().to_string());
            }
        }
    }
}
