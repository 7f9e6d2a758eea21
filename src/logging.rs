use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::progress::OutputMode;

/// `orbit.log` is moved to `orbit.log.1` once it grows past this.
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

// ── DeferredFileWriter ───────────────────────────────────

/// A `MakeWriter` that discards writes until `DeferredFileHandle::set_file`
/// points it at the log file.
///
/// The subscriber is installed before the orbit home is known to exist;
/// events emitted before activation are dropped.
#[derive(Clone)]
pub struct DeferredFileWriter {
    inner: Arc<Mutex<Option<File>>>,
}

#[derive(Clone)]
pub struct DeferredFileHandle {
    inner: Arc<Mutex<Option<File>>>,
}

impl DeferredFileWriter {
    pub fn new() -> (Self, DeferredFileHandle) {
        let inner = Arc::new(Mutex::new(None));
        (
            Self {
                inner: inner.clone(),
            },
            DeferredFileHandle { inner },
        )
    }
}

impl DeferredFileHandle {
    /// Rotate `path` if it is too large, then append to it.
    pub fn set_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        rotate_if_large(path, MAX_LOG_BYTES)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.inner.lock().unwrap() = Some(file);
        Ok(())
    }
}

pub struct DeferredWriter {
    inner: Arc<Mutex<Option<File>>>,
}

impl std::io::Write for DeferredWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_mut() {
            Some(f) => f.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DeferredFileWriter {
    type Writer = DeferredWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DeferredWriter {
            inner: self.inner.clone(),
        }
    }
}

// ── rotation ─────────────────────────────────────────────

/// Keep one previous generation: `<path>` becomes `<path>.1`.
pub fn rotate_if_large(path: &Path, max_bytes: u64) -> std::io::Result<bool> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if len <= max_bytes {
        return Ok(false);
    }
    let mut rotated = path.as_os_str().to_owned();
    rotated.push(".1");
    fs::rename(path, rotated)?;
    Ok(true)
}

// ── subscriber ───────────────────────────────────────────

/// Install the global subscriber and return the handle that activates the
/// file layer.
///
/// The terminal layer is silenced whenever spinners own the terminal, since
/// interleaved stderr lines corrupt indicatif's redraws.
pub fn init(mode: OutputMode) -> DeferredFileHandle {
    let terminal_filter = if mode.uses_spinner() {
        EnvFilter::new("off")
    } else if mode == OutputMode::Verbose {
        EnvFilter::new("orbit=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orbit=warn"))
    };
    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    let (file_writer, file_handle) = DeferredFileWriter::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("orbit=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    file_handle
}
