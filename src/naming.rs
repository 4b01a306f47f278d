//! Identifier mangling, guard tokens and docstring literals.
//!
//! Everything here is a pure string function so the generated token set can be tested without a translation unit.

/// Turn a C++ name (qualified, possibly templated) into an identifier-safe token.
///
/// `::`, template brackets, commas and whitespace become single underscores; `*` and `&` become `ptr`/`ref`
/// words. Runs of underscores collapse and trailing underscores are dropped, so `ns::Tpl<int, 8>` becomes
/// `ns_Tpl_int_8`.
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let push_sep = |out: &mut String| {
        if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    };
    for ch in name.chars() {
        match ch {
            c if c.is_ascii_alphanumeric() => out.push(c),
            '_' => {
                if !out.ends_with('_') {
                    out.push('_');
                }
            }
            '*' => {
                push_sep(&mut out);
                out.push_str("ptr");
            }
            '&' => {
                push_sep(&mut out);
                out.push_str("ref");
            }
            _ => push_sep(&mut out),
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Host-side name of a class: its display name with template arguments folded in (`TemplateClass<int>` becomes
/// `TemplateClass_int`).
pub fn python_name(display_name: &str) -> String {
    mangle(display_name)
}

/// Preprocessor token that compiles out one member registration.
pub fn disable_guard(struct_name: &str, member: &str) -> String {
    format!("BINDWEAVE_DISABLE_{struct_name}_{member}")
}

/// Preprocessor token that compiles out one trampoline override.
pub fn override_guard(mark: &str) -> String {
    format!("BINDWEAVE_DISABLE_OVERRIDE_{mark}")
}

/// Embed `text` as a raw string literal whose delimiter does not occur in it.
pub fn raw_string_literal(text: &str) -> String {
    let mut tag = String::from("bw");
    let mut n = 0usize;
    while text.contains(&format!("){tag}\"")) {
        n += 1;
        tag = format!("bw{n}");
    }
    format!("R\"{tag}({text}){tag}\"")
}

/// Where a docstring goes in a binding statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocPlacement {
    /// The code is an argument list; add the literal as one more argument.
    Append,
    /// The code is a full call statement; add the literal before its closing parenthesis.
    LastArg,
}

/// Add a docstring to `code`. Returns `code` unchanged when there is no comment.
pub fn inject_docstring(code: &str, comment: Option<&str>, placement: DocPlacement) -> String {
    let Some(comment) = comment else {
        return code.to_string();
    };
    let literal = raw_string_literal(comment);
    match placement {
        DocPlacement::Append => format!("{code}, {literal}"),
        DocPlacement::LastArg => match code.rfind(')') {
            Some(pos) => format!("{}, {}{}", &code[..pos], literal, &code[pos..]),
            None => code.to_string(),
        },
    }
}

/// Replace whole identifiers of `spelling` that appear in `subs`.
pub fn substitute_identifiers(spelling: &str, subs: &[(String, String)]) -> String {
    if subs.is_empty() {
        return spelling.to_string();
    }
    let mut out = String::with_capacity(spelling.len());
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut String| {
        if word.is_empty() {
            return;
        }
        match subs.iter().find(|(from, _)| from.as_str() == word.as_str()) {
            Some((_, to)) => out.push_str(to),
            None => out.push_str(word),
        }
        word.clear();
    };
    for ch in spelling.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            flush(&mut word, &mut out);
            out.push(ch);
        }
    }
    flush(&mut word, &mut out);
    out
}
