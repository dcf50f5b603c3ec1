//! The statechart translation pipeline.
//!
//! This crate turns a PlantUML-subset statechart source into a verified
//! state graph, a synthesized scenario suite, and emitted target-language
//! artifacts.
//!
//! # Architecture
//!
//! The pipeline is split into one module per stage:
//!
//! - **types**: parse-level AST declarations
//! - **parser**: line-oriented source parsing with per-line recovery
//! - **graph**: folding declarations into the frozen `StateGraph`
//! - **validation**: structural verification, collected diagnostics
//! - **scenario**: bounded cycle/path/guard-hold test synthesis
//! - **codegen**: backend-parameterized emission (C++ required backend)
//!
//! [`analyze`] runs the front half (parse → build → verify); [`compile`]
//! runs everything and returns the emitted artifacts. Neither touches the
//! filesystem.

pub mod codegen;
pub mod graph;
pub mod parser;
pub mod scenario;
pub mod types;
pub mod validation;

use statecharts_core::{CompileError, Diagnostic, StateGraph};

use codegen::{Artifact, EmitOptions};
use scenario::{Scenario, ScenarioConfig};

/// Everything a successful pipeline run produces. `diagnostics` holds the
/// verifier's warnings (errors abort the run instead).
#[derive(Debug)]
pub struct CompileOutput {
    pub graph: StateGraph,
    pub diagnostics: Vec<Diagnostic>,
    pub scenarios: Vec<Scenario>,
    pub artifacts: Vec<Artifact>,
}

/// Parse, build, and verify: the front half of the pipeline.
///
/// Returns the frozen graph and the verifier's warnings. Any parse error,
/// shape error, or structural error aborts with [`CompileError`].
pub fn analyze(source: &str, machine_name: &str) -> Result<(StateGraph, Vec<Diagnostic>), CompileError> {
    let decls = parser::parse(source).map_err(|errors| CompileError::Parse { errors })?;
    let graph = graph::build(machine_name, &decls)?;
    let diagnostics = validation::verify(&graph);
    if validation::has_errors(&diagnostics) {
        return Err(CompileError::Structure { diagnostics });
    }
    Ok((graph, diagnostics))
}

/// The whole pipeline: analyze, synthesize scenarios, emit artifacts.
pub fn compile(
    source: &str,
    scenario_config: &ScenarioConfig,
    options: &EmitOptions,
) -> Result<CompileOutput, CompileError> {
    let (graph, diagnostics) = analyze(source, &options.type_name())?;
    let scenarios = scenario::synthesize(&graph, scenario_config);
    let artifacts = codegen::generate(&graph, &scenarios, options)?;
    Ok(CompileOutput {
        graph,
        diagnostics,
        scenarios,
        artifacts,
    })
}
