use crate::errors::RecorderError;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Truncate,
    Exclusive,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, RecorderError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), RecorderError>;
    fn exists(&self, path: &Path) -> bool;
    fn create_file(
        &self,
        path: &Path,
        mode: CreateMode,
    ) -> Result<Box<dyn Write + Send>, RecorderError>;
    fn append_line(&self, path: &Path, line: &str) -> Result<(), RecorderError>;
    fn remove_file(&self, path: &Path) -> Result<(), RecorderError>;
}

pub trait Console: Send + Sync {
    fn write_stdout(&self, text: &str) -> Result<(), RecorderError>;
    fn write_stderr(&self, text: &str) -> Result<(), RecorderError>;
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, RecorderError> {
        std::fs::read_to_string(path)
            .map_err(|e| RecorderError::Io(format!("{}: {e}", path.display())))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), RecorderError> {
        std::fs::create_dir_all(path).map_err(|e| RecorderError::Io(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_file(
        &self,
        path: &Path,
        mode: CreateMode,
    ) -> Result<Box<dyn Write + Send>, RecorderError> {
        let mut options = OpenOptions::new();
        options.write(true);
        match mode {
            CreateMode::Truncate => options.create(true).truncate(true),
            CreateMode::Exclusive => options.create_new(true),
        };
        let file = options.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => {
                RecorderError::Collision(format!("{} already exists", path.display()))
            }
            _ => RecorderError::Io(format!("{}: {e}", path.display())),
        })?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<(), RecorderError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RecorderError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| RecorderError::Io(e.to_string()))
    }

    fn remove_file(&self, path: &Path) -> Result<(), RecorderError> {
        std::fs::remove_file(path)
            .map_err(|e| RecorderError::Io(format!("{}: {e}", path.display())))
    }
}

pub struct ProductionConsole;

impl Console for ProductionConsole {
    fn write_stdout(&self, text: &str) -> Result<(), RecorderError> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| RecorderError::Io(format!("stdout: {e}")))
    }

    fn write_stderr(&self, text: &str) -> Result<(), RecorderError> {
        let mut err = io::stderr().lock();
        err.write_all(text.as_bytes())
            .and_then(|()| err.flush())
            .map_err(|e| RecorderError::Io(format!("stderr: {e}")))
    }
}

pub struct ProductionRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub console: Arc<dyn Console>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            console: Arc::new(ProductionConsole),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, SharedBuffer>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
    open_handles: Arc<AtomicUsize>,
    fail_next: Arc<Mutex<Option<RecorderError>>>,
    denied: Arc<Mutex<Vec<PathBuf>>>,
    write_budget: Arc<Mutex<Option<usize>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        fs.files.lock().expect("files lock").insert(
            path.into(),
            Arc::new(Mutex::new(contents.into().into_bytes())),
        );
        fs
    }

    pub fn set_fail_next(&self, error: RecorderError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    pub fn deny_create(&self, path: impl Into<PathBuf>) {
        self.denied.lock().expect("denied lock").push(path.into());
    }

    pub fn allow_create(&self, path: &Path) {
        self.denied.lock().expect("denied lock").retain(|p| p != path);
    }

    pub fn set_write_budget(&self, writes: usize) {
        *self.write_budget.lock().expect("budget lock") = Some(writes);
    }

    pub fn file_contents(&self, path: &Path) -> Option<String> {
        let files = self.files.lock().expect("files lock");
        let buffer = files.get(path)?;
        let bytes = buffer.lock().expect("buffer lock").clone();
        Some(String::from_utf8_lossy(&bytes).to_string())
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn created_dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().expect("dirs lock").clone()
    }

    fn maybe_fail(&self) -> Result<(), RecorderError> {
        if let Some(err) = self.fail_next.lock().expect("fail lock").take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, RecorderError> {
        self.file_contents(path)
            .ok_or_else(|| RecorderError::Io(format!("missing file {}", path.display())))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), RecorderError> {
        self.maybe_fail()?;
        self.dirs
            .lock()
            .expect("dirs lock")
            .push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }

    fn create_file(
        &self,
        path: &Path,
        mode: CreateMode,
    ) -> Result<Box<dyn Write + Send>, RecorderError> {
        self.maybe_fail()?;
        if self.denied.lock().expect("denied lock").iter().any(|p| p == path) {
            return Err(RecorderError::Io(format!(
                "{}: permission denied",
                path.display()
            )));
        }
        let mut files = self.files.lock().expect("files lock");
        if mode == CreateMode::Exclusive && files.contains_key(path) {
            return Err(RecorderError::Collision(format!(
                "{} already exists",
                path.display()
            )));
        }
        let buffer: SharedBuffer = Arc::new(Mutex::new(Vec::new()));
        files.insert(path.to_path_buf(), Arc::clone(&buffer));
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeFile {
            buffer,
            open_handles: Arc::clone(&self.open_handles),
            write_budget: Arc::clone(&self.write_budget),
        }))
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<(), RecorderError> {
        let mut files = self.files.lock().expect("files lock");
        let buffer = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())));
        let mut bytes = buffer.lock().expect("buffer lock");
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), RecorderError> {
        self.files
            .lock()
            .expect("files lock")
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RecorderError::Io(format!("missing file {}", path.display())))
    }
}

struct FakeFile {
    buffer: SharedBuffer,
    open_handles: Arc<AtomicUsize>,
    write_budget: Arc<Mutex<Option<usize>>>,
}

impl Write for FakeFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut budget = self.write_budget.lock().expect("budget lock");
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            *remaining -= 1;
        }
        self.buffer
            .lock()
            .expect("buffer lock")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FakeFile {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default, Clone)]
pub struct FakeConsole {
    stdout: Arc<Mutex<String>>,
    stderr: Arc<Mutex<String>>,
}

impl FakeConsole {
    pub fn stdout_text(&self) -> String {
        self.stdout.lock().expect("stdout lock").clone()
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.lock().expect("stderr lock").clone()
    }
}

impl Console for FakeConsole {
    fn write_stdout(&self, text: &str) -> Result<(), RecorderError> {
        self.stdout.lock().expect("stdout lock").push_str(text);
        Ok(())
    }

    fn write_stderr(&self, text: &str) -> Result<(), RecorderError> {
        self.stderr.lock().expect("stderr lock").push_str(text);
        Ok(())
    }
}
