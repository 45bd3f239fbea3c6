//! Structural validation of raw runbook documents.
//!
//! The schema is plain data: one `Rule` tree per document shape. Global
//! settings either sit at the top level or under `general`, and the only
//! difference between the two shapes is where those fields are attached.
use super::types::{Hdl, Simulator};
use crate::error::{RegmanError, ValidationStage};
use serde_json::Value;

/// Key of the optional nested global-settings section.
pub const GENERAL_KEY: &str = "general";

#[derive(Debug, Clone)]
pub enum Rule {
    Str {
        allowed: Option<Vec<&'static str>>,
        non_empty: bool,
    },
    Int,
    List {
        item: Box<Rule>,
        non_empty: bool,
    },
    Map {
        keys: KeyRule,
        values: Box<Rule>,
        non_empty: bool,
    },
    Record(Vec<Field>),
    /// Stage-argument value: scalar, list of strings, or table of scalars.
    Arg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    NonEmpty,
    Integer,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    pub rule: Rule,
}

fn field(name: &'static str, required: bool, rule: Rule) -> Field {
    Field {
        name,
        required,
        rule,
    }
}

fn non_empty_str() -> Rule {
    Rule::Str {
        allowed: None,
        non_empty: true,
    }
}

fn one_of(allowed: Vec<&'static str>) -> Rule {
    Rule::Str {
        allowed: Some(allowed),
        non_empty: true,
    }
}

fn list_of(item: Rule) -> Rule {
    Rule::List {
        item: Box::new(item),
        non_empty: true,
    }
}

fn stage_args() -> Rule {
    Rule::Map {
        keys: KeyRule::NonEmpty,
        values: Box::new(Rule::Arg),
        non_empty: false,
    }
}

fn general_fields() -> Vec<Field> {
    vec![
        field(
            "sim",
            true,
            one_of(Simulator::ALL.iter().map(|sim| sim.as_str()).collect()),
        ),
        field("title", false, non_empty_str()),
        field("build_args", false, stage_args()),
        field("test_args", false, stage_args()),
    ]
}

fn testbench_rule() -> Rule {
    Rule::Record(vec![
        field("path", true, non_empty_str()),
        field("tb_top", true, non_empty_str()),
        field(
            "hdl",
            true,
            one_of(Hdl::ALL.iter().map(|hdl| hdl.as_str()).collect()),
        ),
        field("rtl_top", false, non_empty_str()),
        field("srcs", false, list_of(Rule::Int)),
        field("tags", false, list_of(Rule::Str {
            allowed: None,
            non_empty: false,
        })),
        field("build_args", false, stage_args()),
        field("test_args", false, stage_args()),
    ])
}

/// Schema for one document shape.
pub fn runbook_schema(general_section: bool) -> Rule {
    let mut fields = vec![
        field(
            "srcs",
            false,
            Rule::Map {
                keys: KeyRule::Integer,
                values: Box::new(non_empty_str()),
                non_empty: true,
            },
        ),
        field(
            "tbs",
            true,
            Rule::Map {
                keys: KeyRule::NonEmpty,
                values: Box::new(testbench_rule()),
                non_empty: false,
            },
        ),
        field("include", false, list_of(non_empty_str())),
    ];
    if general_section {
        fields.push(field(GENERAL_KEY, true, Rule::Record(general_fields())));
    } else {
        fields.extend(general_fields());
    }
    Rule::Record(fields)
}

/// Validate a raw document, reporting every nonconforming field.
pub fn validate_document(doc: &Value) -> Result<(), RegmanError> {
    let general_section = doc
        .as_object()
        .is_some_and(|map| map.contains_key(GENERAL_KEY));
    let schema = runbook_schema(general_section);
    let mut errors = Vec::new();
    check(&schema, doc, "", &mut errors);
    if errors.is_empty() {
        return Ok(());
    }
    Err(RegmanError::validation(
        ValidationStage::Schema,
        "runbook schema validation failed",
        errors,
    ))
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn label(path: &str) -> &str {
    if path.is_empty() {
        "document"
    } else {
        path
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

fn check(rule: &Rule, value: &Value, path: &str, errors: &mut Vec<String>) {
    match rule {
        Rule::Str { allowed, non_empty } => {
            let Some(text) = value.as_str() else {
                errors.push(format!(
                    "{}: must be a string (got {})",
                    label(path),
                    type_name(value)
                ));
                return;
            };
            if *non_empty && text.is_empty() {
                errors.push(format!("{}: must not be empty", label(path)));
                return;
            }
            if let Some(allowed) = allowed {
                if !allowed.contains(&text) {
                    errors.push(format!(
                        "{}: unallowed value {text:?} (allowed: {})",
                        label(path),
                        allowed.join(", ")
                    ));
                }
            }
        }
        Rule::Int => {
            if !value.is_i64() {
                errors.push(format!(
                    "{}: must be an integer (got {})",
                    label(path),
                    type_name(value)
                ));
            }
        }
        Rule::List { item, non_empty } => {
            let Some(items) = value.as_array() else {
                errors.push(format!(
                    "{}: must be a list (got {})",
                    label(path),
                    type_name(value)
                ));
                return;
            };
            if *non_empty && items.is_empty() {
                errors.push(format!("{}: must not be empty", label(path)));
            }
            for (idx, entry) in items.iter().enumerate() {
                check(item, entry, &format!("{}[{idx}]", label(path)), errors);
            }
        }
        Rule::Map {
            keys,
            values,
            non_empty,
        } => {
            let Some(map) = value.as_object() else {
                errors.push(format!(
                    "{}: must be a mapping (got {})",
                    label(path),
                    type_name(value)
                ));
                return;
            };
            if *non_empty && map.is_empty() {
                errors.push(format!("{}: must not be empty", label(path)));
            }
            for (key, entry) in map {
                match keys {
                    KeyRule::Integer if key.parse::<i64>().is_err() => {
                        errors.push(format!(
                            "{}: key {key:?} must be an integer",
                            label(path)
                        ));
                    }
                    KeyRule::NonEmpty if key.is_empty() => {
                        errors.push(format!("{}: keys must not be empty", label(path)));
                    }
                    _ => {}
                }
                check(values, entry, &child(path, key), errors);
            }
        }
        Rule::Record(fields) => {
            let Some(map) = value.as_object() else {
                errors.push(format!(
                    "{}: must be a mapping (got {})",
                    label(path),
                    type_name(value)
                ));
                return;
            };
            for field in fields {
                match map.get(field.name) {
                    Some(entry) => check(&field.rule, entry, &child(path, field.name), errors),
                    None if field.required => {
                        errors.push(format!("{}: required field", child(path, field.name)));
                    }
                    None => {}
                }
            }
            for key in map.keys() {
                if !fields.iter().any(|field| field.name == key) {
                    errors.push(format!("{}: unknown field", child(path, key)));
                }
            }
        }
        Rule::Arg => check_arg_value(value, path, errors),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn check_arg_value(value: &Value, path: &str, errors: &mut Vec<String>) {
    let ok = match value {
        Value::Array(items) => items.iter().all(Value::is_string),
        Value::Object(entries) => entries.values().all(is_scalar),
        other => is_scalar(other),
    };
    if !ok {
        errors.push(format!(
            "{}: unsupported argument value (expected a scalar, a list of strings, or a mapping of scalars)",
            label(path)
        ));
    }
}
