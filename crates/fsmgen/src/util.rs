use std::fmt;

pub fn display_fn(f: impl Fn(&mut fmt::Formatter<'_>) -> fmt::Result) -> impl fmt::Display {
    DisplayFn(f)
}

struct DisplayFn<F>(F);
impl<F> fmt::Display for DisplayFn<F>
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.0)(formatter)
    }
}

/// Write `s` as a double-quoted literal, escaping quotes, backslashes and
/// control characters.
pub fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            ch if ch.is_control() => write!(f, "\\u{{{:x}}}", ch as u32)?,
            ch => write!(f, "{}", ch)?,
        }
    }
    f.write_str("\"")
}

/// Whether `s` is usable as a nonterminal or semantic action name.
pub fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || unicode_ident::is_xid_start(first))
        && chars.all(|ch| ch == '_' || unicode_ident::is_xid_continue(ch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        let quoted = display_fn(|f| write_quoted(f, "a\"b\\\n\u{7}")).to_string();
        assert_eq!(quoted, r#""a\"b\\\n\u{7}""#);
    }

    #[test]
    fn identifiers() {
        assert!(verify_ident("Expression"));
        assert!(verify_ident("_tmp1"));
        assert!(verify_ident("名前"));
        assert!(!verify_ident(""));
        assert!(!verify_ident("1abc"));
        assert!(!verify_ident("a-b"));
    }
}
