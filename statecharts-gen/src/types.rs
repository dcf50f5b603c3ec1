//! Parse-level AST for the statechart source dialect.
//!
//! The parser turns each source line into one [`Decl`]; the graph builder
//! folds the declaration list into a `StateGraph`. Nothing here is
//! normalized yet: arrows keep their written orientation, `[*]` is still
//! ambiguous, and `entering`/`leaving` aliases are untouched.

use statecharts_core::SourcePos;

/// The four accepted arrow glyphs. Glyph length carries no meaning; only
/// the direction matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    Right,
    RightLong,
    Left,
    LeftLong,
}

impl Arrow {
    /// Recognize an arrow token, if it is one of the four shapes.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "->" => Some(Arrow::Right),
            "-->" => Some(Arrow::RightLong),
            "<-" => Some(Arrow::Left),
            "<--" => Some(Arrow::LeftLong),
            _ => None,
        }
    }

    /// Whether a token is trying to be an arrow (so a malformed shape can
    /// be reported as `UnknownArrow` instead of a stray token).
    pub fn looks_like(token: &str) -> bool {
        token.len() >= 2
            && token.chars().all(|c| matches!(c, '-' | '<' | '>'))
            && token.contains('-')
    }

    /// True when the left-hand side of the arrow is the transition source.
    pub fn points_right(self) -> bool {
        matches!(self, Arrow::Right | Arrow::RightLong)
    }
}

/// A state token as written: either the `[*]` pseudo-state literal or a
/// name. Which pseudo-state `[*]` means is decided by the builder after
/// arrow normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawStateRef {
    Star,
    Name(String),
}

/// An event as written, with its raw parameter list when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecl {
    pub name: String,
    pub params: Option<String>,
}

/// The `event? [guard]? / action?` tail of a transition declaration.
/// An absent event makes the transition a completion transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub event: Option<EventDecl>,
    pub guard: Option<String>,
    pub action: Option<String>,
}

/// The attribute carried by a `STATE : kind / body` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateAttr {
    /// `entry`, `entering`, `exit`, `leaving`, `comment`, or an unknown
    /// keyword the builder will reject. The body is verbatim.
    Body { keyword: String, body: String },
    /// `on EVENT [guard]? / action`: an internal reaction.
    Reaction {
        event: EventDecl,
        guard: Option<String>,
        action: String,
    },
}

/// Which embedded-code slot a `'[tag]` directive feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Header,
    Footer,
    Param,
    Cons,
    Init,
    Code,
    Test,
    Brief,
}

impl SlotKind {
    /// Recognize a directive tag. Unknown tags make the line an ordinary
    /// comment, so this returns `None` rather than an error.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "header" => Some(SlotKind::Header),
            "footer" => Some(SlotKind::Footer),
            "param" => Some(SlotKind::Param),
            "cons" => Some(SlotKind::Cons),
            "init" => Some(SlotKind::Init),
            "code" => Some(SlotKind::Code),
            "test" => Some(SlotKind::Test),
            "brief" => Some(SlotKind::Brief),
            _ => None,
        }
    }
}

/// One parsed top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Transition {
        lhs: RawStateRef,
        arrow: Arrow,
        rhs: RawStateRef,
        label: Label,
        pos: SourcePos,
    },
    State {
        name: String,
        attr: StateAttr,
        pos: SourcePos,
    },
    Slot {
        kind: SlotKind,
        text: String,
        pos: SourcePos,
    },
}
