use crate::subject::Subject;
use crate::value::{ExceptionValue, Value};

pub struct Echo;

impl Subject for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn call(&self, input: &Value) -> Result<Value, ExceptionValue> {
        Ok(input.clone())
    }
}

pub struct Raise;

impl Subject for Raise {
    fn name(&self) -> &str {
        "raise"
    }

    fn call(&self, input: &Value) -> Result<Value, ExceptionValue> {
        Err(ExceptionValue::new(input.readable()))
    }
}
