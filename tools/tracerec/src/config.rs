use crate::context::CaptureMode;
use crate::errors::RecorderError;
use crate::identity::validate_token;
use crate::runtime::{CreateMode, FileSystem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DEMO_CONTEXT_NAME: &str = "0_0";
pub const DEMO_CONTEXT_TOKEN: &str = "zwljY2nKg";

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub collision: Option<CollisionPolicy>,
    pub run_id: Option<String>,
    pub log_file: Option<PathBuf>,
    pub no_log: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    #[default]
    Refuse,
    Overwrite,
    Namespace,
}

impl CollisionPolicy {
    pub fn create_mode(self) -> CreateMode {
        match self {
            Self::Overwrite => CreateMode::Truncate,
            Self::Refuse | Self::Namespace => CreateMode::Exclusive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
    pub contexts: Vec<ContextConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecorderConfig {
    pub output_dir: PathBuf,
    pub collision: CollisionPolicy,
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextConfig {
    pub name: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepConfig {
    pub input: serde_json::Value,
    #[serde(default)]
    pub mode: CaptureMode,
    #[serde(default)]
    pub expected: Option<serde_json::Value>,
}

fn default_subject() -> String {
    "echo".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recorder: RecorderConfig {
                output_dir: PathBuf::from("."),
                collision: CollisionPolicy::Refuse,
                run_id: None,
            },
            logging: LoggingConfig {
                enabled: true,
                path: None,
                max_payload_bytes: 4096,
            },
            contexts: Vec::new(),
        }
    }
}

pub fn demo_context() -> ContextConfig {
    ContextConfig {
        name: DEMO_CONTEXT_NAME.to_string(),
        token: Some(DEMO_CONTEXT_TOKEN.to_string()),
        subject: default_subject(),
        steps: ["input-1", "input-2"]
            .into_iter()
            .map(|input| StepConfig {
                input: serde_json::Value::String(input.to_string()),
                mode: CaptureMode::Value,
                expected: None,
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    recorder: Option<PartialRecorderConfig>,
    logging: Option<PartialLoggingConfig>,
    contexts: Option<Vec<ContextConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRecorderConfig {
    output_dir: Option<PathBuf>,
    collision: Option<CollisionPolicy>,
    run_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    enabled: Option<bool>,
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, RecorderError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(&absolutize_path(process_cwd, path))?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| RecorderError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);

    cfg.recorder.output_dir = absolutize_path(process_cwd, &cfg.recorder.output_dir);
    if let Some(path) = &cfg.logging.path {
        cfg.logging.path = Some(absolutize_path(process_cwd, path));
    }
    if cfg.contexts.is_empty() {
        cfg.contexts.push(demo_context());
    }

    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(recorder) = partial.recorder {
        if let Some(output_dir) = recorder.output_dir {
            cfg.recorder.output_dir = output_dir;
        }
        if let Some(collision) = recorder.collision {
            cfg.recorder.collision = collision;
        }
        if let Some(run_id) = recorder.run_id {
            cfg.recorder.run_id = Some(run_id);
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(enabled) = logging.enabled {
            cfg.logging.enabled = enabled;
        }
        if let Some(path) = logging.path {
            cfg.logging.path = Some(path);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }

    if let Some(contexts) = partial.contexts {
        cfg.contexts = contexts;
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(output_dir) = &overrides.output_dir {
        cfg.recorder.output_dir = output_dir.clone();
    }
    if let Some(collision) = overrides.collision {
        cfg.recorder.collision = collision;
    }
    if let Some(run_id) = &overrides.run_id {
        cfg.recorder.run_id = Some(run_id.clone());
    }
    if let Some(log_file) = &overrides.log_file {
        cfg.logging.path = Some(log_file.clone());
    }
    if overrides.no_log {
        cfg.logging.enabled = false;
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

pub fn trace_dir(cfg: &AppConfig, run_id: &str) -> PathBuf {
    match cfg.recorder.collision {
        CollisionPolicy::Namespace => cfg.recorder.output_dir.join(run_id),
        CollisionPolicy::Refuse | CollisionPolicy::Overwrite => cfg.recorder.output_dir.clone(),
    }
}

pub fn event_log_path(cfg: &AppConfig) -> Option<PathBuf> {
    if !cfg.logging.enabled {
        return None;
    }
    Some(
        cfg.logging
            .path
            .clone()
            .unwrap_or_else(|| cfg.recorder.output_dir.join(".tracerec/events.jsonl")),
    )
}

fn validate_config(cfg: &AppConfig) -> Result<(), RecorderError> {
    if let Some(run_id) = &cfg.recorder.run_id {
        validate_token(run_id).map_err(|_| {
            RecorderError::InvalidConfig(format!(
                "recorder.run_id `{run_id}` must be alphanumeric, `_` or `-`"
            ))
        })?;
    }

    if cfg.logging.max_payload_bytes == 0 {
        return Err(RecorderError::InvalidConfig(
            "logging.max_payload_bytes must be greater than zero".to_string(),
        ));
    }

    let mut names = BTreeSet::new();
    let mut tokens = BTreeSet::new();
    for context in &cfg.contexts {
        if context.name.trim().is_empty() {
            return Err(RecorderError::InvalidConfig(
                "context name must not be empty".to_string(),
            ));
        }
        if !names.insert(context.name.as_str()) {
            return Err(RecorderError::InvalidConfig(format!(
                "duplicate context name `{}`",
                context.name
            )));
        }
        if let Some(token) = &context.token {
            validate_token(token)?;
            if !tokens.insert(token.as_str()) {
                return Err(RecorderError::InvalidConfig(format!(
                    "duplicate context token `{token}` would overwrite another context's trace"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FakeFileSystem;

    fn load(text: &str) -> Result<AppConfig, RecorderError> {
        let fs = FakeFileSystem::with_file("/work/tracerec.toml", text);
        load_config(
            &CliOverrides {
                config_path: Some(PathBuf::from("tracerec.toml")),
                ..CliOverrides::default()
            },
            Path::new("/work"),
            &fs,
        )
    }

    #[test]
    fn empty_config_falls_back_to_demo_context() {
        let cfg = load("").expect("config");
        assert_eq!(cfg.contexts, vec![demo_context()]);
        assert_eq!(cfg.recorder.output_dir, Path::new("/work/."));
        assert_eq!(cfg.recorder.collision, CollisionPolicy::Refuse);
    }

    #[test]
    fn contexts_and_sections_merge_over_defaults() {
        let cfg = load(
            r#"
[recorder]
output_dir = "traces"
collision = "namespace"
run_id = "nightly-7"

[logging]
max_payload_bytes = 128

[[contexts]]
name = "1_0"
subject = "raise"

[[contexts.steps]]
input = 5

[[contexts.steps]]
input = "x"
mode = "specific"
expected = "x"
"#,
        )
        .expect("config");

        assert_eq!(cfg.recorder.output_dir, Path::new("/work/traces"));
        assert_eq!(cfg.recorder.collision, CollisionPolicy::Namespace);
        assert_eq!(cfg.logging.max_payload_bytes, 128);
        assert!(cfg.logging.enabled);
        let context = &cfg.contexts[0];
        assert_eq!(context.token, None);
        assert_eq!(context.subject, "raise");
        assert_eq!(context.steps[0].input, serde_json::json!(5));
        assert_eq!(context.steps[1].mode, CaptureMode::Specific);
        assert_eq!(trace_dir(&cfg, "nightly-7"), Path::new("/work/traces/nightly-7"));
        assert_eq!(
            event_log_path(&cfg),
            Some(PathBuf::from("/work/traces/.tracerec/events.jsonl"))
        );
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let fs = FakeFileSystem::with_file(
            "/c.toml",
            "[recorder]\ncollision = \"refuse\"\noutput_dir = \"/a\"\n",
        );
        let cfg = load_config(
            &CliOverrides {
                config_path: Some(PathBuf::from("/c.toml")),
                output_dir: Some(PathBuf::from("/b")),
                collision: Some(CollisionPolicy::Overwrite),
                no_log: true,
                ..CliOverrides::default()
            },
            Path::new("/"),
            &fs,
        )
        .expect("config");
        assert_eq!(cfg.recorder.output_dir, Path::new("/b"));
        assert_eq!(cfg.recorder.collision.create_mode(), CreateMode::Truncate);
        assert_eq!(event_log_path(&cfg), None);
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let err = load(
            r#"
[[contexts]]
name = "a"
token = "same"

[[contexts]]
name = "b"
token = "same"
"#,
        )
        .expect_err("duplicate");
        assert!(matches!(err, RecorderError::InvalidConfig(message) if message.contains("same")));
    }

    #[test]
    fn duplicate_names_and_bad_tokens_are_rejected() {
        assert!(load("[[contexts]]\nname = \"a\"\n[[contexts]]\nname = \"a\"\n").is_err());
        assert!(load("[[contexts]]\nname = \"a\"\ntoken = \"../up\"\n").is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = load("[recorder\n").expect_err("parse");
        assert!(matches!(err, RecorderError::ConfigParse(_)));
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let fs = FakeFileSystem::default();
        let err = load_config(
            &CliOverrides {
                config_path: Some(PathBuf::from("/nope.toml")),
                ..CliOverrides::default()
            },
            Path::new("/"),
            &fs,
        )
        .expect_err("missing");
        assert!(matches!(err, RecorderError::Io(_)));
    }
}
