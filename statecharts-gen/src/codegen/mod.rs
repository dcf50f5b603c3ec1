//! Rendering the verified graph and its scenarios into target-language
//! source.
//!
//! Everything upstream is backend-agnostic; a [`Backend`] supplies
//! identifier escaping, file extensions, and the two artifact renderers
//! (machine and test suite). Adding a target language means adding one
//! module here and one [`BackendKind`] variant; nothing upstream changes.
//!
//! The emitter performs no filesystem I/O: artifacts come back as
//! in-memory records and the caller decides where they land.

pub mod cpp;
pub mod utils;

use statecharts_core::{EmitError, StateGraph};
use tracing::debug;

use crate::scenario::Scenario;

/// Whether the primary artifact is a translation unit or a header-only
/// form (the `cpp`/`hpp` CLI selector).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Source,
    Header,
}

/// Which backend renders the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpp,
}

/// What an artifact is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactRole {
    Machine,
    Tests,
}

/// One emitted file, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub role: ArtifactRole,
    pub contents: String,
}

/// Emission parameters derived from the CLI surface.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub backend: BackendKind,
    pub output: OutputKind,
    /// Optional name prefix applied to the machine type and file names.
    pub prefix: Option<String>,
    /// Stem of the input file; capitalized into the type base name.
    pub stem: String,
}

impl EmitOptions {
    /// `<Prefix?><Basename>`: the generated type name and file stem.
    pub fn type_name(&self) -> String {
        let base = utils::type_basename(&self.stem);
        match &self.prefix {
            Some(prefix) => format!("{prefix}{base}"),
            None => base,
        }
    }
}

/// A target-language renderer.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// File extension of the primary artifact for the chosen output kind.
    fn extension(&self, output: OutputKind) -> &'static str;

    /// Escape a source-level identifier into the target language.
    fn escape_ident(&self, raw: &str) -> Result<String, EmitError>;

    /// Render the machine and its test suite.
    fn emit(
        &self,
        graph: &StateGraph,
        scenarios: &[Scenario],
        options: &EmitOptions,
    ) -> Result<Vec<Artifact>, EmitError>;
}

/// Render through the backend selected in `options`.
pub fn generate(
    graph: &StateGraph,
    scenarios: &[Scenario],
    options: &EmitOptions,
) -> Result<Vec<Artifact>, EmitError> {
    let backend: &dyn Backend = match options.backend {
        BackendKind::Cpp => &cpp::CppBackend,
    };
    let artifacts = backend.emit(graph, scenarios, options)?;
    debug!(
        backend = backend.name(),
        artifacts = artifacts.len(),
        "emitted artifacts"
    );
    Ok(artifacts)
}
