//! Facade over the statecharts compiler.
//!
//! Re-exports the public surface of `statecharts-core` (the frozen graph
//! representation and diagnostics) and `statecharts-gen` (the pipeline:
//! parse → build → verify → synthesize scenarios → emit). The `statecharts`
//! binary in this crate is the command-line front end.
//!
//! ```no_run
//! use statecharts::{compile, BackendKind, EmitOptions, OutputKind, ScenarioConfig};
//!
//! let source = std::fs::read_to_string("motor.puml")?;
//! let options = EmitOptions {
//!     backend: BackendKind::Cpp,
//!     output: OutputKind::Header,
//!     prefix: None,
//!     stem: "motor".to_string(),
//! };
//! let output = compile(&source, &ScenarioConfig::default(), &options)?;
//! for artifact in &output.artifacts {
//!     std::fs::write(&artifact.file_name, &artifact.contents)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core {
    pub use statecharts_core::*;
}

pub use statecharts_core::{
    CodeSlots, CompileError, Diagnostic, EmitError, Event, Fragment, InternalReaction, ParseError,
    ParseErrorKind, Severity, ShapeError, SourcePos, State, StateGraph, StateId, StateKind,
    Transition, TransitionKind,
};
pub use statecharts_gen::codegen::{
    Artifact, ArtifactRole, Backend, BackendKind, EmitOptions, OutputKind,
};
pub use statecharts_gen::scenario::{
    describe, synthesize, GuardAssumption, Scenario, ScenarioConfig, ScenarioKind,
};
pub use statecharts_gen::{analyze, compile, CompileOutput};
