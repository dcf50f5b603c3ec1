//! Identifier and naming helpers shared by backends.

/// Capitalize an input-file stem into a type base name.
///
/// Examples:
/// - `motor` → `Motor`
/// - `gumball_machine` → `GumballMachine`
/// - `traffic-light.v2` → `TrafficLightV2`
pub fn type_basename(stem: &str) -> String {
    let mut out = String::new();
    let mut upper_next = true;
    for ch in stem.chars() {
        if matches!(ch, '_' | '-' | '.' | ' ') {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Whether a name is already a plain identifier.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Force a name into identifier shape: non-identifier characters become
/// `_`, a leading digit gets a `_` prefix. Names that are already
/// identifiers pass through verbatim.
pub fn sanitize_ident(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, ch) in raw.chars().enumerate() {
        let ok = if i == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if i == 0 && ch.is_ascii_digit() {
            out.push('_');
            out.push(ch);
        } else if ok {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Uppercase the first character (used for hook method names, e.g.
/// `Idle` → `onEnteringIdle`).
pub fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
