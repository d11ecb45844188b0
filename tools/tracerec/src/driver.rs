use crate::config::{event_log_path, trace_dir, AppConfig};
use crate::context::{ContextOutcome, ContextRunner, ContextScript, Invocation, RunEnv};
use crate::encoder::JsonLineEncoder;
use crate::errors::RecorderError;
use crate::identity::{default_run_id, derive_token};
use crate::logging::JsonlLogger;
use crate::runtime::ProductionRuntime;
use crate::subject::registry::SubjectRegistry;
use crate::value::Value;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

pub struct RecordingPlan {
    pub run_id: String,
    pub trace_dir: PathBuf,
    pub runners: Vec<ContextRunner>,
    logger: JsonlLogger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: i32,
    pub contexts: Vec<ContextOutcome>,
}

pub fn build_plan(
    cfg: &AppConfig,
    registry: &SubjectRegistry,
    runtime: &ProductionRuntime,
) -> Result<RecordingPlan, RecorderError> {
    let run_id = cfg
        .recorder
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(runtime.clock.as_ref()));
    let trace_dir = trace_dir(cfg, &run_id);

    let mut logger = match event_log_path(cfg) {
        Some(path) => JsonlLogger::new(Arc::clone(&runtime.file_system), path),
        None => JsonlLogger::disabled(Arc::clone(&runtime.file_system)),
    };
    logger.max_payload_bytes = cfg.logging.max_payload_bytes;

    let env = RunEnv {
        file_system: Arc::clone(&runtime.file_system),
        console: Arc::clone(&runtime.console),
        encoder: Arc::new(JsonLineEncoder),
        logger: logger.clone(),
        output_dir: trace_dir.clone(),
        create_mode: cfg.recorder.collision.create_mode(),
    };

    let mut tokens = BTreeSet::new();
    let mut runners = Vec::with_capacity(cfg.contexts.len());
    for context in &cfg.contexts {
        let subject = registry.get(&context.subject).ok_or_else(|| {
            RecorderError::InvalidConfig(format!(
                "context `{}` uses unknown subject `{}` (known: {})",
                context.name,
                context.subject,
                registry.names().join(", ")
            ))
        })?;
        let token = context
            .token
            .clone()
            .unwrap_or_else(|| derive_token(&run_id, &context.name));
        if !tokens.insert(token.clone()) {
            return Err(RecorderError::InvalidConfig(format!(
                "context `{}` resolves to token `{token}` already used in this run",
                context.name
            )));
        }
        let invocations = context
            .steps
            .iter()
            .map(|step| Invocation {
                input: Value::from_literal(&step.input),
                mode: step.mode,
                expected: step.expected.as_ref().map(Value::from_literal),
            })
            .collect();
        runners.push(ContextRunner::new(
            ContextScript {
                name: context.name.clone(),
                token,
                invocations,
            },
            subject,
            env.clone(),
        ));
    }

    Ok(RecordingPlan {
        run_id,
        trace_dir,
        runners,
        logger,
    })
}

impl RecordingPlan {
    pub fn run_standalone(&self, name: &str) -> Result<RunSummary, RecorderError> {
        let runner = self
            .runners
            .iter()
            .find(|runner| runner.name() == name)
            .ok_or_else(|| {
                let known = self
                    .runners
                    .iter()
                    .map(ContextRunner::name)
                    .collect::<Vec<_>>();
                RecorderError::Cli(format!(
                    "unknown context `{name}` (known: {})",
                    known.join(", ")
                ))
            })?;
        self.finish(std::slice::from_ref(runner))
    }

    pub fn run_all(&self) -> Result<RunSummary, RecorderError> {
        self.finish(&self.runners)
    }

    fn finish(&self, runners: &[ContextRunner]) -> Result<RunSummary, RecorderError> {
        let mut contexts = Vec::with_capacity(runners.len());
        for runner in runners {
            match runner.run() {
                Ok(outcome) => contexts.push(outcome),
                Err(error) => {
                    self.logger.emit(
                        "error",
                        "run_finished",
                        json!({
                            "run_id": self.run_id,
                            "completed": contexts.len(),
                            "failed_context": runner.name(),
                            "error": error.to_string(),
                        }),
                    );
                    return Err(error);
                }
            }
        }
        let status = contexts
            .iter()
            .map(|outcome| outcome.status)
            .find(|status| *status != 0)
            .unwrap_or(0);
        let summary = RunSummary {
            run_id: self.run_id.clone(),
            status,
            contexts,
        };
        self.logger.emit(
            "info",
            "run_finished",
            serde_json::to_value(&summary).unwrap_or_default(),
        );
        Ok(summary)
    }
}
