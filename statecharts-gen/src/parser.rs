//! Line-oriented parser for the statechart source dialect.
//!
//! Each source line is one top-level declaration: a transition, a state
//! attribute, an embedded-code directive, or a comment. The parser turns
//! a whole buffer into a declaration list, recovering from an error on one
//! line by skipping to the next so a single run reports every bad line.
//!
//! Tokenization is whitespace-sensitive on purpose: the separators `:`,
//! `[`, `]`, `/`, and the arrows are only recognized as standalone
//! whitespace-delimited tokens, which is what lets guard and action bodies
//! pass through verbatim even when they contain the same characters.

use statecharts_core::{ParseError, ParseErrorKind, SourcePos};
use tracing::debug;

use crate::types::{Arrow, Decl, EventDecl, Label, RawStateRef, SlotKind, StateAttr};

/// A whitespace-delimited token and its byte offset in the line.
#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    start: usize,
    text: &'a str,
}

impl<'a> Token<'a> {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, ch) in line.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token {
                    start: s,
                    text: &line[s..i],
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            start: s,
            text: &line[s..],
        });
    }
    tokens
}

fn pos_at(line: u32, offset: usize) -> SourcePos {
    SourcePos::new(line, offset as u32 + 1)
}

/// Parse a whole source buffer into declarations.
///
/// On failure, returns every [`ParseError`] collected across the buffer;
/// the caller decides how to surface them.
pub fn parse(source: &str) -> Result<Vec<Decl>, Vec<ParseError>> {
    let mut decls = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx as u32 + 1;
        match parse_line(line_no, raw) {
            Ok(Some(decl)) => decls.push(decl),
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        debug!(declarations = decls.len(), "parsed statechart source");
        Ok(decls)
    } else {
        debug!(errors = errors.len(), "statechart source failed to parse");
        Err(errors)
    }
}

/// Parse one line. `Ok(None)` means the line carries no declaration
/// (blank, `@startuml` framing, or a plain comment).
fn parse_line(line_no: u32, raw: &str) -> Result<Option<Decl>, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "@startuml" || trimmed == "@enduml" {
        return Ok(None);
    }
    if trimmed.starts_with('\'') {
        return Ok(parse_directive(line_no, raw));
    }
    parse_declaration(line_no, raw).map(Some)
}

/// Recognize a `'[tag] text` embedded-code directive. Any other quoted
/// line is a comment and is discarded.
fn parse_directive(line_no: u32, raw: &str) -> Option<Decl> {
    let quote = raw.find('\'')?;
    let rest = raw[quote + 1..].trim_start();
    let inner = rest.strip_prefix('[')?;
    let close = inner.find(']')?;
    let kind = SlotKind::from_tag(&inner[..close])?;
    let text = inner[close + 1..]
        .strip_prefix(' ')
        .unwrap_or(&inner[close + 1..]);
    Some(Decl::Slot {
        kind,
        text: text.to_string(),
        pos: pos_at(line_no, quote),
    })
}

fn parse_declaration(line_no: u32, raw: &str) -> Result<Decl, ParseError> {
    let tokens = tokenize(raw);

    // Split at the first standalone `:` token; everything after it is the
    // label (or the state attribute) and is sliced verbatim from the line.
    let colon = tokens.iter().position(|t| t.text == ":");
    let head = match colon {
        Some(i) => &tokens[..i],
        None => &tokens[..],
    };
    let (label_offset, label_src) = match colon {
        Some(i) => (tokens[i].end(), &raw[tokens[i].end()..]),
        None => (raw.len(), ""),
    };

    let arrow_at = head
        .iter()
        .position(|t| Arrow::from_token(t.text).is_some() || Arrow::looks_like(t.text));

    match arrow_at {
        Some(ai) => {
            let arrow_tok = head[ai];
            let arrow = Arrow::from_token(arrow_tok.text).ok_or_else(|| {
                ParseError::new(
                    pos_at(line_no, arrow_tok.start),
                    ParseErrorKind::UnknownArrow(arrow_tok.text.to_string()),
                )
            })?;
            if ai != 1 || head.len() < 3 {
                return Err(ParseError::new(
                    pos_at(line_no, arrow_tok.start),
                    ParseErrorKind::EmptyStateName,
                ));
            }
            if head.len() > 3 {
                return Err(ParseError::new(
                    pos_at(line_no, head[3].start),
                    ParseErrorKind::TrailingTokens(join_tokens(&head[3..])),
                ));
            }
            let label = parse_label(line_no, label_offset, label_src)?;
            Ok(Decl::Transition {
                lhs: state_ref(head[0].text),
                arrow,
                rhs: state_ref(head[2].text),
                label,
                pos: pos_at(line_no, head[0].start),
            })
        }
        None => {
            // No arrow: a `STATE : kind / body` declaration.
            if head.is_empty() {
                return Err(ParseError::new(
                    pos_at(line_no, 0),
                    ParseErrorKind::EmptyStateName,
                ));
            }
            if head.len() > 1 {
                return Err(ParseError::new(
                    pos_at(line_no, head[1].start),
                    ParseErrorKind::TrailingTokens(join_tokens(&head[1..])),
                ));
            }
            if colon.is_none() {
                return Err(ParseError::new(
                    pos_at(line_no, raw.len()),
                    ParseErrorKind::MissingLabel,
                ));
            }
            if head[0].text == "[*]" {
                return Err(ParseError::new(
                    pos_at(line_no, head[0].start),
                    ParseErrorKind::PseudoStateAttribute,
                ));
            }
            let attr = parse_state_attr(line_no, label_offset, label_src)?;
            Ok(Decl::State {
                name: head[0].text.to_string(),
                attr,
                pos: pos_at(line_no, head[0].start),
            })
        }
    }
}

fn state_ref(token: &str) -> RawStateRef {
    if token == "[*]" {
        RawStateRef::Star
    } else {
        RawStateRef::Name(token.to_string())
    }
}

fn join_tokens(tokens: &[Token<'_>]) -> String {
    tokens
        .iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a transition label: `event? ( [ guard ] )? ( / action )?`.
///
/// The literal sequence `\n--\n` inside the label is an alias for the `/`
/// action separator (multi-line diagram layout).
fn parse_label(line_no: u32, base: usize, src: &str) -> Result<Label, ParseError> {
    let owned = src.replace("\\n--\\n", " / ");
    let tokens = tokenize(&owned);
    let mut label = Label::default();
    let mut idx = 0;

    // Event part: anything that is not a separator opener.
    if idx < tokens.len() && tokens[idx].text != "[" && tokens[idx].text != "/" {
        if tokens[idx].text == "on" {
            return Err(ParseError::new(
                pos_at(line_no, base + tokens[idx].start),
                ParseErrorKind::ReactionOnTransition,
            ));
        }
        let (event, next) = parse_event(&tokens, idx);
        label.event = Some(event);
        idx = next;
    }

    let (guard, next) = parse_guard(line_no, base, &owned, &tokens, idx)?;
    label.guard = guard;
    idx = next;

    if idx < tokens.len() {
        if tokens[idx].text == "/" {
            let action = owned[tokens[idx].end()..].trim();
            if !action.is_empty() {
                label.action = Some(action.to_string());
            }
        } else {
            return Err(ParseError::new(
                pos_at(line_no, base + tokens[idx].start),
                ParseErrorKind::TrailingTokens(join_tokens(&tokens[idx..])),
            ));
        }
    }

    Ok(label)
}

/// Consume an event token, folding a parenthesized parameter list that
/// spans several tokens back into one declaration.
fn parse_event<'a>(tokens: &[Token<'a>], mut idx: usize) -> (EventDecl, usize) {
    let mut text = tokens[idx].text.to_string();
    idx += 1;
    if text.contains('(') && !text.contains(')') {
        while idx < tokens.len() {
            text.push(' ');
            text.push_str(tokens[idx].text);
            let closed = tokens[idx].text.contains(')');
            idx += 1;
            if closed {
                break;
            }
        }
    }
    let event = match text.find('(') {
        Some(open) => {
            let name = text[..open].to_string();
            let params = text[open + 1..].trim_end_matches(')').trim().to_string();
            EventDecl {
                name,
                params: if params.is_empty() { None } else { Some(params) },
            }
        }
        None => EventDecl {
            name: text,
            params: None,
        },
    };
    (event, idx)
}

/// Consume a bracketed guard if one starts at `idx`. The guard body is the
/// verbatim slice between the standalone `[` and `]` tokens.
fn parse_guard(
    line_no: u32,
    base: usize,
    src: &str,
    tokens: &[Token<'_>],
    idx: usize,
) -> Result<(Option<String>, usize), ParseError> {
    if idx >= tokens.len() || tokens[idx].text != "[" {
        return Ok((None, idx));
    }
    let close = tokens[idx + 1..]
        .iter()
        .position(|t| t.text == "]")
        .map(|j| idx + 1 + j)
        .ok_or_else(|| {
            ParseError::new(
                pos_at(line_no, base + tokens[idx].start),
                ParseErrorKind::UnterminatedBracket,
            )
        })?;
    let body = src[tokens[idx].end()..tokens[close].start].trim();
    let guard = if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    };
    Ok((guard, close + 1))
}

/// Parse the `kind / body` tail of a state declaration.
fn parse_state_attr(line_no: u32, base: usize, src: &str) -> Result<StateAttr, ParseError> {
    let tokens = tokenize(src);
    if tokens.is_empty() {
        return Err(ParseError::new(
            pos_at(line_no, base + src.len()),
            ParseErrorKind::MissingBody,
        ));
    }

    if tokens[0].text == "on" {
        let mut idx = 1;
        if idx >= tokens.len() || tokens[idx].text == "[" || tokens[idx].text == "/" {
            return Err(ParseError::new(
                pos_at(line_no, base + tokens[0].start),
                ParseErrorKind::MissingEventName,
            ));
        }
        let (event, next) = parse_event(&tokens, idx);
        idx = next;
        let (guard, next) = parse_guard(line_no, base, src, &tokens, idx)?;
        idx = next;
        if idx >= tokens.len() || tokens[idx].text != "/" {
            let at = tokens
                .get(idx)
                .map(|t| t.start)
                .unwrap_or_else(|| src.len());
            return Err(ParseError::new(
                pos_at(line_no, base + at),
                ParseErrorKind::MissingBody,
            ));
        }
        let action = src[tokens[idx].end()..].trim();
        if action.is_empty() {
            return Err(ParseError::new(
                pos_at(line_no, base + tokens[idx].start),
                ParseErrorKind::MissingBody,
            ));
        }
        return Ok(StateAttr::Reaction {
            event,
            guard,
            action: action.to_string(),
        });
    }

    // entry / entering / exit / leaving / comment, or an unknown keyword
    // the builder rejects as a shape error.
    if tokens.len() < 2 || tokens[1].text != "/" {
        let at = tokens.get(1).map(|t| t.start).unwrap_or_else(|| src.len());
        return Err(ParseError::new(
            pos_at(line_no, base + at),
            ParseErrorKind::MissingBody,
        ));
    }
    let body = src[tokens[1].end()..].trim().to_string();
    Ok(StateAttr::Body {
        keyword: tokens[0].text.to_string(),
        body,
    })
}
