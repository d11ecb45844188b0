pub mod channel;
pub mod config;
pub mod context;
pub mod driver;
pub mod encoder;
pub mod errors;
pub mod identity;
pub mod logging;
pub mod runtime;
pub mod separator;
pub mod subject;
pub mod value;

use clap::{error::ErrorKind, Parser, ValueEnum};
use config::{load_config, CliOverrides, CollisionPolicy};
use driver::build_plan;
use errors::RecorderError;
use runtime::ProductionRuntime;
use subject::registry::SubjectRegistry;

#[derive(Debug, Clone, Parser)]
#[command(name = "tracerec")]
#[command(about = "Record framed value and exception traces for test contexts")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long)]
    pub output_dir: Option<std::path::PathBuf>,
    /// Run only this context, as a standalone unit.
    #[arg(long)]
    pub context: Option<String>,
    #[arg(long, value_enum)]
    pub collision: Option<CliCollision>,
    #[arg(long)]
    pub run_id: Option<String>,
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = false)]
    pub no_log: bool,
    /// Print configured contexts and their tokens, then exit.
    #[arg(long, default_value_t = false)]
    pub list: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliCollision {
    Refuse,
    Overwrite,
    Namespace,
}

impl From<CliCollision> for CollisionPolicy {
    fn from(value: CliCollision) -> Self {
        match value {
            CliCollision::Refuse => CollisionPolicy::Refuse,
            CliCollision::Overwrite => CollisionPolicy::Overwrite,
            CliCollision::Namespace => CollisionPolicy::Namespace,
        }
    }
}

pub fn run() -> Result<i32, RecorderError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| RecorderError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &std::path::Path,
    runtime: &ProductionRuntime,
) -> Result<i32, RecorderError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(RecorderError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        output_dir: cli.output_dir.clone(),
        collision: cli.collision.map(Into::into),
        run_id: cli.run_id.clone(),
        log_file: cli.log_file.clone(),
        no_log: cli.no_log,
    };

    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;
    let registry = SubjectRegistry::with_defaults();
    let plan = build_plan(&cfg, &registry, runtime)?;

    if cli.list {
        for runner in &plan.runners {
            runtime
                .console
                .write_stdout(&format!("{} {}\n", runner.name(), runner.token()))?;
        }
        return Ok(0);
    }

    let summary = match cli.context.as_deref() {
        Some(name) => plan.run_standalone(name)?,
        None => plan.run_all()?,
    };
    Ok(summary.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{FakeClock, FakeConsole, FakeFileSystem, FileSystem};
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::Arc;

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("tracerec")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn fake_runtime(fs: &FakeFileSystem, console: &FakeConsole) -> ProductionRuntime {
        ProductionRuntime {
            clock: Arc::new(FakeClock::default()),
            file_system: Arc::new(fs.clone()),
            console: Arc::new(console.clone()),
        }
    }

    #[test]
    fn default_invocation_records_demo_context() {
        let fs = FakeFileSystem::default();
        let console = FakeConsole::default();
        let code = run_with_runtime(
            &args(&["--output-dir", "out"]),
            Path::new("/work"),
            &fake_runtime(&fs, &console),
        )
        .expect("run");
        assert_eq!(code, 0);
        assert!(fs.exists(Path::new("/work/out/zwljY2nKg_values.txt")));
        assert_eq!(console.stdout_text().matches("--zwljY2nKg-- SEP").count(), 4);
    }

    #[test]
    fn list_prints_contexts_without_recording() {
        let fs = FakeFileSystem::default();
        let console = FakeConsole::default();
        run_with_runtime(
            &args(&["--list", "--output-dir", "/work/out"]),
            Path::new("/work"),
            &fake_runtime(&fs, &console),
        )
        .expect("list");
        assert_eq!(console.stdout_text(), "0_0 zwljY2nKg\n");
        assert!(!fs.exists(Path::new("/work/out/zwljY2nKg_values.txt")));
    }

    #[test]
    fn unknown_flag_is_cli_error() {
        let fs = FakeFileSystem::default();
        let console = FakeConsole::default();
        let err = run_with_runtime(
            &args(&["--bogus"]),
            Path::new("/work"),
            &fake_runtime(&fs, &console),
        )
        .expect_err("cli error");
        assert!(matches!(err, RecorderError::Cli(_)));
    }
}
