//! Core types for the statecharts compiler.
//!
//! This crate holds everything the pipeline stages agree on and nothing
//! they disagree on: the frozen state-graph representation produced by the
//! graph builder ([`StateGraph`] and friends) and the diagnostics
//! vocabulary used to report problems ([`Diagnostic`], [`ParseError`],
//! [`ShapeError`], [`EmitError`], [`CompileError`]).
//!
//! Parsing, verification, scenario synthesis, and code emission live in
//! `statecharts-gen`; this crate has no I/O and no knowledge of any
//! concrete backend.

mod diagnostics;
mod machine;

pub use diagnostics::{
    CompileError, Diagnostic, EmitError, ParseError, ParseErrorKind, Severity, ShapeError,
    SourcePos,
};
pub use machine::{
    CodeSlots, EdgeId, Event, Fragment, InternalReaction, State, StateGraph, StateId, StateKind,
    Transition, TransitionKind,
};
