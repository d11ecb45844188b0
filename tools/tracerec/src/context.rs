use crate::channel::{Channel, ChannelSet, TracePaths};
use crate::encoder::ValueEncoder;
use crate::errors::RecorderError;
use crate::logging::JsonlLogger;
use crate::runtime::{Console, CreateMode, FileSystem};
use crate::separator::Separator;
use crate::subject::{self, Subject};
use crate::value::{EvaluationResult, ExceptionValue, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    Value,
    Specific,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub input: Value,
    pub mode: CaptureMode,
    pub expected: Option<Value>,
}

impl Invocation {
    pub fn value(input: Value) -> Self {
        Self {
            input,
            mode: CaptureMode::Value,
            expected: None,
        }
    }

    pub fn specific(input: Value, expected: Option<Value>) -> Self {
        Self {
            input,
            mode: CaptureMode::Specific,
            expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextScript {
    pub name: String,
    pub token: String,
    pub invocations: Vec<Invocation>,
}

#[derive(Clone)]
pub struct RunEnv {
    pub file_system: Arc<dyn FileSystem>,
    pub console: Arc<dyn Console>,
    pub encoder: Arc<dyn ValueEncoder>,
    pub logger: JsonlLogger,
    pub output_dir: PathBuf,
    pub create_mode: CreateMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordCounts {
    pub frames: usize,
    pub values: usize,
    pub exceptions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextOutcome {
    pub name: String,
    pub token: String,
    pub status: i32,
    pub counts: RecordCounts,
    pub paths: TracePaths,
}

pub struct Recorder {
    channels: ChannelSet,
    encoder: Arc<dyn ValueEncoder>,
    separator: Separator,
    counts: RecordCounts,
}

impl Recorder {
    pub fn new(channels: ChannelSet, encoder: Arc<dyn ValueEncoder>, separator: Separator) -> Self {
        Self {
            channels,
            encoder,
            separator,
            counts: RecordCounts::default(),
        }
    }

    pub fn write_separator(&mut self) -> Result<(), RecorderError> {
        self.separator.emit(&mut self.channels)?;
        self.counts.frames += 1;
        Ok(())
    }

    pub fn send_value(&mut self, value: &Value) -> Result<(), RecorderError> {
        self.encoder.write_value(self.channels.values()?, value)?;
        self.counts.values += 1;
        Ok(())
    }

    pub fn send_specific_value(&mut self, evaluated: &EvaluationResult) -> Result<(), RecorderError> {
        self.encoder
            .write_evaluated(self.channels.values()?, evaluated)?;
        self.counts.values += 1;
        Ok(())
    }

    pub fn send_exception(&mut self, exception: &ExceptionValue) -> Result<(), RecorderError> {
        self.encoder
            .write_exception(self.channels.exceptions()?, exception)?;
        self.counts.exceptions += 1;
        Ok(())
    }

    pub fn send_specific_exception(
        &mut self,
        evaluated: &EvaluationResult,
    ) -> Result<(), RecorderError> {
        self.encoder
            .write_evaluated(self.channels.exceptions()?, evaluated)?;
        self.counts.exceptions += 1;
        Ok(())
    }

    pub fn close(self) -> Result<RecordCounts, RecorderError> {
        let counts = self.counts;
        self.channels.close()?;
        Ok(counts)
    }
}

pub struct ContextRunner {
    script: ContextScript,
    subject: Arc<dyn Subject>,
    env: RunEnv,
}

impl ContextRunner {
    pub fn new(script: ContextScript, subject: Arc<dyn Subject>, env: RunEnv) -> Self {
        Self {
            script,
            subject,
            env,
        }
    }

    pub fn name(&self) -> &str {
        &self.script.name
    }

    pub fn token(&self) -> &str {
        &self.script.token
    }

    pub fn paths(&self) -> TracePaths {
        TracePaths::for_token(&self.env.output_dir, &self.script.token)
    }

    pub fn run(&self) -> Result<ContextOutcome, RecorderError> {
        let logger = &self.env.logger;
        logger.emit(
            "info",
            "context_started",
            json!({
                "context": self.script.name,
                "token": self.script.token,
                "subject": self.subject.name(),
                "invocations": self.script.invocations.len(),
            }),
        );

        // On a recording error the recorder is dropped, which releases both files.
        let result = self.open().and_then(|mut recorder| {
            self.record(&mut recorder)?;
            recorder.close()
        });

        match result {
            Ok(counts) => {
                let outcome = ContextOutcome {
                    name: self.script.name.clone(),
                    token: self.script.token.clone(),
                    status: 0,
                    counts,
                    paths: self.paths(),
                };
                logger.emit(
                    "info",
                    "context_finished",
                    serde_json::to_value(&outcome).unwrap_or_default(),
                );
                Ok(outcome)
            }
            Err(error) => {
                logger.emit(
                    "error",
                    "context_failed",
                    json!({"context": self.script.name, "error": error.to_string()}),
                );
                Err(error)
            }
        }
    }

    fn open(&self) -> Result<Recorder, RecorderError> {
        self.env.file_system.create_dir_all(&self.env.output_dir)?;
        let channels = ChannelSet::open(
            self.env.file_system.as_ref(),
            Arc::clone(&self.env.console),
            self.paths(),
            self.env.create_mode,
        )?;
        Ok(Recorder::new(
            channels,
            Arc::clone(&self.env.encoder),
            Separator::new(&self.script.token),
        ))
    }

    fn record(&self, recorder: &mut Recorder) -> Result<(), RecorderError> {
        recorder.write_separator()?;
        recorder.write_separator()?;

        for (index, invocation) in self.script.invocations.iter().enumerate() {
            recorder.write_separator()?;
            let outcome = subject::invoke(self.subject.as_ref(), &invocation.input);
            let channel = match (invocation.mode, outcome) {
                (CaptureMode::Value, Ok(value)) => {
                    recorder.send_value(&value)?;
                    Channel::Values
                }
                (CaptureMode::Value, Err(exception)) => {
                    recorder.send_exception(&exception)?;
                    Channel::Exceptions
                }
                (CaptureMode::Specific, Ok(value)) => {
                    recorder.send_specific_value(&evaluate_value(
                        invocation.expected.as_ref(),
                        &value,
                    ))?;
                    Channel::Values
                }
                (CaptureMode::Specific, Err(exception)) => {
                    recorder.send_specific_exception(&evaluate_exception(
                        invocation.expected.as_ref(),
                        &exception,
                    ))?;
                    Channel::Exceptions
                }
            };
            self.env.logger.emit(
                "info",
                "step_captured",
                json!({
                    "context": self.script.name,
                    "step": index + 1,
                    "mode": invocation.mode,
                    "channel": channel,
                }),
            );
        }
        Ok(())
    }
}

pub fn evaluate_value(expected: Option<&Value>, actual: &Value) -> EvaluationResult {
    let result = expected.map_or(true, |expected| expected == actual);
    let mut messages = Vec::new();
    if expected.is_none() {
        messages.push("no expected value; accepted".to_string());
    }
    EvaluationResult {
        result,
        readable_expected: expected.map(Value::readable),
        readable_actual: Some(actual.readable()),
        messages,
    }
}

pub fn evaluate_exception(expected: Option<&Value>, exception: &ExceptionValue) -> EvaluationResult {
    EvaluationResult {
        result: false,
        readable_expected: expected.map(Value::readable),
        readable_actual: None,
        messages: vec![format!("raised: {}", exception.message)],
    }
}
