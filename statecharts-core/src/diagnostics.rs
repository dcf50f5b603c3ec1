//! Diagnostics vocabulary shared by every pipeline stage.
//!
//! The compiler reports problems at four levels:
//! - [`ParseError`]: the source text violates the grammar; carries a position.
//! - [`ShapeError`]: the text parsed but the declarations do not form a
//!   well-shaped machine (unknown state keyword, duplicate parallel edge).
//! - [`Diagnostic`]: a structural finding from the verifier, warning or error.
//! - [`EmitError`]: the selected backend refuses to render the machine.
//!
//! [`CompileError`] folds all of these into the single failure type returned
//! by the pipeline entry points.

use std::fmt;

/// How serious a structural finding is.
///
/// Warnings never stop the pipeline; a single error aborts it before
/// scenario synthesis and emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A 1-based (line, column) position in the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// One structural finding reported by the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub pos: Option<SourcePos>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            pos: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            pos: None,
            message: message.into(),
        }
    }

    /// Attach a source position to the finding.
    pub fn at(mut self, pos: Option<SourcePos>) -> Self {
        self.pos = pos;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{}: {}: {}", pos, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// A grammar violation, recorded with its position.
///
/// The parser recovers by skipping to the next line, so a single run can
/// report every offending line at once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{pos}: {kind}")]
pub struct ParseError {
    pub pos: SourcePos,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(pos: SourcePos, kind: ParseErrorKind) -> Self {
        Self { pos, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unterminated `[` guard bracket")]
    UnterminatedBracket,
    #[error("unknown arrow `{0}`")]
    UnknownArrow(String),
    #[error("missing `:` before the transition label")]
    MissingLabel,
    #[error("missing event name after `on`")]
    MissingEventName,
    #[error("`on` reactions are only legal in a state declaration")]
    ReactionOnTransition,
    #[error("empty state name")]
    EmptyStateName,
    #[error("missing body after state declaration keyword")]
    MissingBody,
    #[error("`[*]` cannot carry a state declaration")]
    PseudoStateAttribute,
    #[error("stray tokens after guard bracket: `{0}`")]
    TrailingTokens(String),
}

/// The declarations parsed but do not assemble into a machine.
///
/// The graph builder aborts on the first shape error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("duplicate transition `{from}` -> `{to}` on `{trigger}`")]
    DuplicateEdge {
        from: String,
        to: String,
        trigger: String,
        pos: Option<SourcePos>,
    },
    #[error("unknown state declaration keyword `{keyword}`")]
    UnknownStateKeyword {
        keyword: String,
        pos: Option<SourcePos>,
    },
    #[error("`[*]` cannot be both source and destination of one transition")]
    PseudoToPseudo { pos: Option<SourcePos> },
}

impl ShapeError {
    pub fn pos(&self) -> Option<SourcePos> {
        match self {
            ShapeError::DuplicateEdge { pos, .. }
            | ShapeError::UnknownStateKeyword { pos, .. }
            | ShapeError::PseudoToPseudo { pos } => *pos,
        }
    }
}

/// The backend cannot render an otherwise valid machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("state `{name}` collides with the reserved `{reserved}` enumerator")]
    ReservedStateName { name: String, reserved: &'static str },
    #[error("backend `{backend}` cannot escape identifier `{name}`")]
    UnescapableIdentifier { backend: &'static str, name: String },
}

/// Umbrella failure type for the whole pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{} parse error(s)", .errors.len())]
    Parse { errors: Vec<ParseError> },
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("statechart failed structural verification")]
    Structure { diagnostics: Vec<Diagnostic> },
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl CompileError {
    /// Flatten the failure into printable diagnostics, one per finding.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CompileError::Parse { errors } => errors
                .iter()
                .map(|e| Diagnostic::error(e.kind.to_string()).at(Some(e.pos)))
                .collect(),
            CompileError::Shape(err) => {
                vec![Diagnostic::error(err.to_string()).at(err.pos())]
            }
            CompileError::Structure { diagnostics } => diagnostics.clone(),
            CompileError::Emit(err) => vec![Diagnostic::error(err.to_string())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_position() {
        let diag = Diagnostic::error("unreachable state `Limbo`").at(Some(SourcePos::new(4, 1)));
        assert_eq!(diag.to_string(), "4:1: error: unreachable state `Limbo`");
    }

    #[test]
    fn severity_orders_warning_below_error() {
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn compile_error_flattens_parse_errors() {
        let err = CompileError::Parse {
            errors: vec![ParseError::new(
                SourcePos::new(2, 7),
                ParseErrorKind::UnterminatedBracket,
            )],
        };
        let diags = err.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_error());
        assert_eq!(diags[0].pos, Some(SourcePos::new(2, 7)));
    }
}
