//! Tcl word and list quoting
//!
//! The espresso machine parses profiles with a Tcl interpreter, so every
//! word is quoted the way Tk's own list builder quotes it.

/// Characters that force backslash escaping
fn is_magic(c: char) -> bool {
    matches!(c, '\\' | '{' | '}')
}

/// ASCII whitespace only; other Unicode spaces stay bare
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Quote a single word
///
/// - empty → `{}`
/// - contains `\`, `{` or `}` → backslash-escape those and all whitespace
/// - starts with `"` or contains whitespace → wrap in braces
/// - otherwise bare
pub fn stringify(value: &str) -> String {
    if value.is_empty() {
        return "{}".to_string();
    }

    if value.chars().any(is_magic) {
        let mut out = String::with_capacity(value.len() + 8);
        if value.starts_with('"') {
            out.push('\\');
        }
        for c in value.chars() {
            match c {
                c if is_magic(c) => {
                    out.push('\\');
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                c if is_space(c) => {
                    out.push('\\');
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out
    } else if value.starts_with('"') || value.chars().any(is_space) {
        format!("{{{}}}", value)
    } else {
        value.to_string()
    }
}

/// Quote a list of words as one Tcl list
pub fn stringify_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [single] => {
            let word = stringify(single.as_ref());
            if word.chars().any(is_magic) {
                format!("{{{}}}", word)
            } else {
                word
            }
        }
        _ => {
            let words: Vec<String> = items.iter().map(|i| stringify(i.as_ref())).collect();
            format!("{{{}}}", words.join(" "))
        }
    }
}
