use crate::ir::{Fragment, FragmentKind};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid fragment tree syntax: {0}")]
    Syntax(#[from] json5::Error),
    #[error("fragment tree has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("the root fragment must be a module, found '{kind}'")]
    NotAModule { kind: &'static str },
    #[error("a '{kind}' fragment cannot appear {place} (line {line})")]
    Misplaced {
        kind: &'static str,
        place: &'static str,
        line: usize,
    },
    #[error("the 'if' at line {line} has no parts")]
    EmptyIf { line: usize },
}

#[derive(Debug)]
pub struct ParseOutput {
    pub module: Fragment,
    /// Configuration overrides carried in the same document, applied on top
    /// of the configuration file.
    pub config: Option<Value>,
}

/// Reads a fragment tree written as JSON or JSON5. The document is either a
/// bare module fragment or an object with `module` and an optional `config`.
pub fn parse_fragment_tree(input: &str) -> Result<ParseOutput, ParseError> {
    let value = match serde_json::from_str::<Value>(input) {
        Ok(value) => value,
        Err(_) => json5::from_str::<Value>(input)?,
    };
    let (module, config) = split_envelope(value);
    let module: Fragment = serde_json::from_value(module)?;
    check_module(&module)?;
    tracing::debug!(
        items = module.suite.len(),
        has_config = config.is_some(),
        "fragment tree loaded"
    );
    Ok(ParseOutput { module, config })
}

fn split_envelope(value: Value) -> (Value, Option<Value>) {
    match value {
        Value::Object(mut map) if !map.contains_key("kind") && map.contains_key("module") => {
            let config = map.remove("config");
            let module = map.remove("module").unwrap_or(Value::Null);
            (module, config)
        }
        other => (other, None),
    }
}

fn check_module(module: &Fragment) -> Result<(), ParseError> {
    if module.kind != FragmentKind::Module {
        return Err(ParseError::NotAModule {
            kind: module.kind.name(),
        });
    }
    check_suite(&module.suite)
}

fn check_suite(suite: &[Fragment]) -> Result<(), ParseError> {
    for item in suite {
        match item.kind {
            FragmentKind::Module
            | FragmentKind::Decorator
            | FragmentKind::IfPart
            | FragmentKind::Except
            | FragmentKind::Else
            | FragmentKind::Finally => return Err(misplaced(item, "inside a suite")),
            _ => check_item(item)?,
        }
    }
    Ok(())
}

fn check_item(item: &Fragment) -> Result<(), ParseError> {
    let definition = matches!(item.kind, FragmentKind::Function | FragmentKind::Class);
    if !item.decorators.is_empty() && !definition {
        return Err(misplaced(&item.decorators[0], "outside a definition"));
    }
    expect_kind(&item.decorators, FragmentKind::Decorator, "among decorators")?;

    match item.kind {
        FragmentKind::If => {
            let Some((last, heads)) = item.parts.split_last() else {
                return Err(ParseError::EmptyIf {
                    line: item.range.begin_line,
                });
            };
            expect_kind(heads, FragmentKind::IfPart, "before the last if part")?;
            if !matches!(last.kind, FragmentKind::IfPart | FragmentKind::Else) {
                return Err(misplaced(last, "as the last if part"));
            }
            for part in &item.parts {
                check_suite(&part.suite)?;
            }
            return Ok(());
        }
        FragmentKind::Try => {
            expect_kind(&item.except_parts, FragmentKind::Except, "among except parts")?;
            for part in &item.except_parts {
                check_suite(&part.suite)?;
            }
            check_optional(item.finally_part.as_deref(), FragmentKind::Finally)?;
        }
        _ => {
            if let Some(part) = item.except_parts.first() {
                return Err(misplaced(part, "outside a try"));
            }
            if let Some(part) = &item.finally_part {
                return Err(misplaced(part, "outside a try"));
            }
        }
    }

    match item.kind {
        FragmentKind::For | FragmentKind::While | FragmentKind::Try => {
            check_optional(item.else_part.as_deref(), FragmentKind::Else)?;
        }
        _ => {
            if let Some(part) = &item.else_part {
                return Err(misplaced(part, "after this statement"));
            }
        }
    }
    if let Some(part) = item.parts.first() {
        return Err(misplaced(part, "outside an if"));
    }
    check_suite(&item.suite)
}

fn check_optional(part: Option<&Fragment>, kind: FragmentKind) -> Result<(), ParseError> {
    let Some(part) = part else {
        return Ok(());
    };
    if part.kind != kind {
        return Err(misplaced(part, "in this clause"));
    }
    check_suite(&part.suite)
}

fn expect_kind(
    items: &[Fragment],
    kind: FragmentKind,
    place: &'static str,
) -> Result<(), ParseError> {
    match items.iter().find(|item| item.kind != kind) {
        Some(item) => Err(misplaced(item, place)),
        None => Ok(()),
    }
}

fn misplaced(item: &Fragment, place: &'static str) -> ParseError {
    ParseError::Misplaced {
        kind: item.kind.name(),
        place,
        line: item.range.begin_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_module() {
        let output = parse_fragment_tree(
            r#"{"kind": "module", "suite": [
                {"kind": "code-block", "text": "x = 1", "range": {"beginLine": 1, "beginPos": 1, "endLine": 1, "endPos": 5}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(output.module.suite.len(), 1);
        assert_eq!(output.module.suite[0].range.end_pos, 5);
        assert!(output.config.is_none());
    }

    #[test]
    fn falls_back_to_json5() {
        let output = parse_fragment_tree(
            r#"{
                // generated by hand
                kind: 'module',
                suite: [
                    {kind: 'return', text: '1',},
                ],
            }"#,
        )
        .unwrap();
        assert_eq!(output.module.suite[0].kind, FragmentKind::Return);
    }

    #[test]
    fn envelope_carries_config_overrides() {
        let output = parse_fragment_tree(
            r#"{"config": {"flow": {"noImport": true}}, "module": {"kind": "module"}}"#,
        )
        .unwrap();
        assert_eq!(output.module.kind, FragmentKind::Module);
        let config = output.config.unwrap();
        assert_eq!(config["flow"]["noImport"], Value::Bool(true));
    }

    #[test]
    fn accepts_if_with_elif_and_else() {
        let output = parse_fragment_tree(
            r#"{"kind": "module", "suite": [{"kind": "if", "parts": [
                {"kind": "if-part", "text": "a", "suite": [{"kind": "break"}]},
                {"kind": "if-part", "text": "b"},
                {"kind": "else", "suite": [{"kind": "continue"}]}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(output.module.suite[0].parts.len(), 3);
    }

    #[test]
    fn rejects_a_non_module_root() {
        let err = parse_fragment_tree(r#"{"kind": "function"}"#).unwrap_err();
        assert!(matches!(err, ParseError::NotAModule { kind: "function" }));
    }

    #[test]
    fn rejects_parts_in_the_wrong_place() {
        let err = parse_fragment_tree(
            r#"{"kind": "module", "suite": [{"kind": "except", "range": {"beginLine": 4}}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "a 'except' fragment cannot appear inside a suite (line 4)"
        );

        let err = parse_fragment_tree(
            r#"{"kind": "module", "suite": [{"kind": "with", "elsePart": {"kind": "else"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Misplaced { kind: "else", .. }));

        let err = parse_fragment_tree(r#"{"kind": "module", "suite": [{"kind": "if"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::EmptyIf { .. }));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = parse_fragment_tree("{kind: ").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
        let err = parse_fragment_tree(r#"{"kind": "loop"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }
}
