use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Value {
    Nothing,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Sequence(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn from_literal(literal: &serde_json::Value) -> Self {
        match literal {
            serde_json::Value::Null => Self::Nothing,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.iter().map(Self::from_literal).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_literal(v)))
                    .collect(),
            ),
        }
    }

    pub fn readable(&self) -> String {
        match self {
            Self::Nothing => "nothing".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => r.to_string(),
            Self::Text(s) => format!("{s:?}"),
            Self::Sequence(items) => {
                let inner = items.iter().map(Self::readable).collect::<Vec<_>>();
                format!("[{}]", inner.join(", "))
            }
            Self::Map(entries) => {
                let inner = entries
                    .iter()
                    .map(|(k, v)| format!("{k:?}: {}", v.readable()))
                    .collect::<Vec<_>>();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionValue {
    pub message: String,
    #[serde(default)]
    pub stacktrace: String,
}

impl ExceptionValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stacktrace: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub result: bool,
    pub readable_expected: Option<String>,
    pub readable_actual: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_value_serializes_as_tagged_record() {
        let rendered = serde_json::to_value(Value::text("input-1")).expect("serialize");
        assert_eq!(rendered, json!({"type": "text", "data": "input-1"}));
    }

    #[test]
    fn nothing_serializes_without_data() {
        let rendered = serde_json::to_value(Value::Nothing).expect("serialize");
        assert_eq!(rendered, json!({"type": "nothing"}));
    }

    #[test]
    fn literals_convert_recursively() {
        let value = Value::from_literal(&json!({"a": [1, 2.5, "x", null, true]}));
        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        assert_eq!(
            entries.get("a"),
            Some(&Value::Sequence(vec![
                Value::Integer(1),
                Value::Real(2.5),
                Value::text("x"),
                Value::Nothing,
                Value::Boolean(true),
            ]))
        );
    }

    #[test]
    fn readable_form_quotes_text() {
        let value = Value::Sequence(vec![Value::text("a"), Value::Integer(3)]);
        assert_eq!(value.readable(), "[\"a\", 3]");
    }
}
