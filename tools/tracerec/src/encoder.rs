use crate::errors::RecorderError;
use crate::value::{EvaluationResult, ExceptionValue, Value};
use serde::Serialize;
use std::io::Write;

pub trait ValueEncoder: Send + Sync {
    fn write_value(&self, out: &mut dyn Write, value: &Value) -> Result<(), RecorderError>;
    fn write_exception(
        &self,
        out: &mut dyn Write,
        exception: &ExceptionValue,
    ) -> Result<(), RecorderError>;
    fn write_evaluated(
        &self,
        out: &mut dyn Write,
        evaluated: &EvaluationResult,
    ) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLineEncoder;

impl JsonLineEncoder {
    fn write_record<T: Serialize>(out: &mut dyn Write, record: &T) -> Result<(), RecorderError> {
        let line =
            serde_json::to_string(record).map_err(|e| RecorderError::Encode(e.to_string()))?;
        writeln!(out, "{line}").map_err(|e| RecorderError::Io(e.to_string()))
    }
}

impl ValueEncoder for JsonLineEncoder {
    fn write_value(&self, out: &mut dyn Write, value: &Value) -> Result<(), RecorderError> {
        Self::write_record(out, value)
    }

    fn write_exception(
        &self,
        out: &mut dyn Write,
        exception: &ExceptionValue,
    ) -> Result<(), RecorderError> {
        Self::write_record(out, exception)
    }

    fn write_evaluated(
        &self,
        out: &mut dyn Write,
        evaluated: &EvaluationResult,
    ) -> Result<(), RecorderError> {
        Self::write_record(out, evaluated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_record_is_one_json_line() {
        let mut out = Vec::new();
        JsonLineEncoder
            .write_value(&mut out, &Value::text("input-1"))
            .expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "{\"type\":\"text\",\"data\":\"input-1\"}\n"
        );
    }

    #[test]
    fn evaluated_record_keeps_caller_fields() {
        let mut out = Vec::new();
        JsonLineEncoder
            .write_evaluated(
                &mut out,
                &EvaluationResult {
                    result: false,
                    readable_expected: Some("1".to_string()),
                    readable_actual: Some("2".to_string()),
                    messages: vec!["off by one".to_string()],
                },
            )
            .expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let parsed: serde_json::Value = serde_json::from_str(text.trim()).expect("json");
        assert_eq!(parsed["result"], false);
        assert_eq!(parsed["messages"][0], "off by one");
    }
}
