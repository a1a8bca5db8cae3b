//! Command argument splitting.

use serde::{Deserialize, Serialize};

/// How the text after a command name is cut into arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgSplit {
    /// Split on runs of whitespace.
    #[default]
    Whitespace,
    /// Like `Whitespace`, but a single- or double-quoted span is one argument.
    Quoted,
}

/// Splits `input` into arguments using `mode`.
pub fn split_args(input: &str, mode: ArgSplit) -> Vec<String> {
    match mode {
        ArgSplit::Whitespace => input.split_whitespace().map(str::to_string).collect(),
        ArgSplit::Quoted => quoted_split(input),
    }
}

/// Quote-aware splitting.
///
/// Handles:
/// - whitespace-separated arguments
/// - quoted spans (single and double quotes), kept together without the quotes
/// - backslash escapes inside double quotes
/// - `""` as an explicit empty argument
///
/// An unterminated quote runs to the end of the input.
fn quoted_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    // A quoted empty span still produces an argument.
    let mut pending = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => escape_next = true,
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                pending = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                pending = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if pending || !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => current.push(c),
        }
    }

    if pending || !current.is_empty() {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_split() {
        assert_eq!(
            split_args("  hello   big\tworld ", ArgSplit::Whitespace),
            vec!["hello", "big", "world"]
        );
        assert_eq!(
            split_args(r#"say "two words""#, ArgSplit::Whitespace),
            vec!["say", "\"two", "words\""]
        );
        assert!(split_args("", ArgSplit::Whitespace).is_empty());
    }

    #[test]
    fn test_quoted_split() {
        assert_eq!(
            split_args(r#"say "hello world" now"#, ArgSplit::Quoted),
            vec!["say", "hello world", "now"]
        );
        assert_eq!(
            split_args("'single quoted' x", ArgSplit::Quoted),
            vec!["single quoted", "x"]
        );
    }

    #[test]
    fn test_quoted_split_mixed_quotes_and_escapes() {
        assert_eq!(
            split_args(r#""double's quote" 'single"s quote'"#, ArgSplit::Quoted),
            vec!["double's quote", r#"single"s quote"#]
        );
        assert_eq!(
            split_args(r#""say \"hi\"""#, ArgSplit::Quoted),
            vec![r#"say "hi""#]
        );
    }

    #[test]
    fn test_quoted_split_empty_and_unterminated() {
        assert_eq!(split_args(r#"a "" b"#, ArgSplit::Quoted), vec!["a", "", "b"]);
        assert_eq!(
            split_args(r#"a "runs to end"#, ArgSplit::Quoted),
            vec!["a", "runs to end"]
        );
        assert!(split_args("   ", ArgSplit::Quoted).is_empty());
    }
}
