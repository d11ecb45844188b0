use crate::errors::RecorderError;
use crate::runtime::{Console, CreateMode, FileSystem};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Values,
    Exceptions,
    Stdout,
    Stderr,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Values,
        Channel::Exceptions,
        Channel::Stdout,
        Channel::Stderr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Values => "values",
            Self::Exceptions => "exceptions",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

pub fn value_file_name(token: &str) -> String {
    format!("{token}_values.txt")
}

pub fn exception_file_name(token: &str) -> String {
    format!("{token}_exceptions.txt")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TracePaths {
    pub values: PathBuf,
    pub exceptions: PathBuf,
}

impl TracePaths {
    pub fn for_token(dir: &Path, token: &str) -> Self {
        Self {
            values: dir.join(value_file_name(token)),
            exceptions: dir.join(exception_file_name(token)),
        }
    }
}

type Handle = Box<dyn Write + Send>;

pub struct ChannelSet {
    values: Option<Handle>,
    exceptions: Option<Handle>,
    console: Arc<dyn Console>,
}

impl ChannelSet {
    /// Creates both trace files. With `CreateMode::Exclusive` both paths are
    /// checked before either is created, so a collision leaves nothing behind.
    pub fn open(
        fs: &dyn FileSystem,
        console: Arc<dyn Console>,
        paths: TracePaths,
        mode: CreateMode,
    ) -> Result<Self, RecorderError> {
        if mode == CreateMode::Exclusive {
            for path in [&paths.values, &paths.exceptions] {
                if fs.exists(path) {
                    return Err(RecorderError::Collision(format!(
                        "{} already exists",
                        path.display()
                    )));
                }
            }
        }
        let values = fs.create_file(&paths.values, mode)?;
        let exceptions = match fs.create_file(&paths.exceptions, mode) {
            Ok(handle) => handle,
            Err(error) => {
                drop(values);
                let _ = fs.remove_file(&paths.values);
                return Err(error);
            }
        };
        Ok(Self {
            values: Some(values),
            exceptions: Some(exceptions),
            console,
        })
    }

    pub fn write(&mut self, channel: Channel, text: &str) -> Result<(), RecorderError> {
        match channel {
            Channel::Values => write_handle(self.values.as_mut(), channel, text),
            Channel::Exceptions => write_handle(self.exceptions.as_mut(), channel, text),
            Channel::Stdout => self.console.write_stdout(text),
            Channel::Stderr => self.console.write_stderr(text),
        }
    }

    pub fn values(&mut self) -> Result<&mut (dyn Write + Send + 'static), RecorderError> {
        self.values
            .as_deref_mut()
            .ok_or_else(|| closed(Channel::Values))
    }

    pub fn exceptions(&mut self) -> Result<&mut (dyn Write + Send + 'static), RecorderError> {
        self.exceptions
            .as_deref_mut()
            .ok_or_else(|| closed(Channel::Exceptions))
    }

    pub fn flush(&mut self) -> Result<(), RecorderError> {
        for (channel, handle) in [
            (Channel::Values, self.values.as_mut()),
            (Channel::Exceptions, self.exceptions.as_mut()),
        ] {
            if let Some(handle) = handle {
                handle
                    .flush()
                    .map_err(|e| RecorderError::Io(format!("{}: {e}", channel.as_str())))?;
            }
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<(), RecorderError> {
        let values = release(self.values.take(), Channel::Values);
        let exceptions = release(self.exceptions.take(), Channel::Exceptions);
        values.and(exceptions)
    }
}

impl Drop for ChannelSet {
    fn drop(&mut self) {
        let _ = release(self.values.take(), Channel::Values);
        let _ = release(self.exceptions.take(), Channel::Exceptions);
    }
}

fn write_handle(
    handle: Option<&mut Handle>,
    channel: Channel,
    text: &str,
) -> Result<(), RecorderError> {
    let handle = handle.ok_or_else(|| closed(channel))?;
    handle
        .write_all(text.as_bytes())
        .map_err(|e| RecorderError::Io(format!("{}: {e}", channel.as_str())))
}

fn release(handle: Option<Handle>, channel: Channel) -> Result<(), RecorderError> {
    match handle {
        Some(mut handle) => handle
            .flush()
            .map_err(|e| RecorderError::Io(format!("{}: {e}", channel.as_str()))),
        None => Ok(()),
    }
}

fn closed(channel: Channel) -> RecorderError {
    RecorderError::Io(format!("{} channel is closed", channel.as_str()))
}
