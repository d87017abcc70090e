//! Response template parsing.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` stand for literal
//! braces. Placeholder names are ASCII letters, digits and underscores.
//! The same parser backs registration-time validation and rendering, so a
//! template accepted by the store always renders with the same structure.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Split `template` into literal text and placeholders.
///
/// Returns a human-readable reason on malformed input.
pub fn parse(template: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(format!("unterminated placeholder '{{{name}'"));
                }
                if name.is_empty()
                    || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
                {
                    return Err(format!("invalid placeholder name '{name}'"));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            '}' => return Err("unmatched '}'".to_string()),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Placeholder names in order of appearance.
pub fn placeholders(segments: &[Segment]) -> impl Iterator<Item = &str> {
    segments.iter().filter_map(|s| match s {
        Segment::Placeholder(name) => Some(name.as_str()),
        Segment::Literal(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_literals_and_placeholders() {
        let segments = parse("Pods in {namespace}: {podNames}").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("Pods in ".into()),
                Segment::Placeholder("namespace".into()),
                Segment::Literal(": ".into()),
                Segment::Placeholder("podNames".into()),
            ]
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let segments = parse("{{not_a_field}} {x}").unwrap();
        assert_eq!(placeholders(&segments).collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(segments[0], Segment::Literal("{not_a_field} ".into()));
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(parse("Hello {name").unwrap_err().contains("unterminated"));
        assert!(parse("Hello name}").unwrap_err().contains("unmatched"));
        assert!(parse("Hello {}").unwrap_err().contains("invalid placeholder"));
        assert!(parse("{active_cluster[name]}")
            .unwrap_err()
            .contains("invalid placeholder"));
    }

    #[test]
    fn template_without_placeholders() {
        let segments = parse("Done.").unwrap();
        assert_eq!(placeholders(&segments).count(), 0);
    }
}
