//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tabext_core::context::AppContext;
use tabext_core::error::{ExtensionError, Result};
use tabext_core::repository::ExtensionRepository;
use tabext_core::source::ArchiveFetcher;
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

pub const CIRCUMFERENCE_FROM_RADIUS: &str = "import math\n\n\
/// Circumference of a circle from its radius.\n\
fn calculate_circumference_from_radius(table, col = \"radius\"):\n    \
table[\"circumference\"] = 2 * math.pi * table[col]\n";

pub const CIRCUMFERENCE_FROM_DIAMETER: &str = "import math\n\n\
/// Circumference of a circle from its diameter.\n\
fn calculate_circumference_from_diameter(table, col = \"diameter\"):\n    \
table[\"circumference\"] = math.pi * table[col]\n";

/// A temporary config file, repositories, and extension sources.
pub struct Workspace {
    pub tmp: TempDir,
    pub ctx: AppContext,
}

pub fn workspace() -> Workspace {
    workspace_with_fetcher(Rc::new(OfflineFetcher))
}

pub fn workspace_with_fetcher(fetcher: Rc<dyn ArchiveFetcher>) -> Workspace {
    let tmp = TempDir::new().unwrap();
    let ctx = AppContext::new(tmp.path().join("config").join("repositories.toml"))
        .unwrap()
        .with_bootstrap_location(tmp.path().join("repos").join("user").to_string_lossy())
        .with_fetcher(fetcher);
    Workspace { tmp, ctx }
}

impl Workspace {
    pub fn repository(&self) -> ExtensionRepository {
        self.ctx.repository().unwrap()
    }

    /// Location text for a new repository directory.
    pub fn repo_location(&self, name: &str) -> String {
        self.tmp
            .path()
            .join("repos")
            .join(name)
            .to_string_lossy()
            .to_string()
    }

    pub fn repo_path(&self, name: &str) -> PathBuf {
        PathBuf::from(self.repo_location(name))
    }

    /// Write `files` under `src/<dir>` and return that directory as location text.
    pub fn sources(&self, dir: &str, files: &[(&str, &str)]) -> String {
        let root = self.tmp.path().join("src").join(dir);
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        root.to_string_lossy().to_string()
    }

    pub fn config_text(&self) -> String {
        fs::read_to_string(self.ctx.config_path()).unwrap()
    }
}

#[derive(Debug)]
pub struct OfflineFetcher;

impl ArchiveFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(ExtensionError::Download {
            url: url.to_string(),
            message: "network disabled in tests".to_string(),
            retryable: false,
        })
    }
}

/// Serves one in-memory archive and records requested URLs.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pub archive: Vec<u8>,
    pub requests: RefCell<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(archive: Vec<u8>) -> Self {
        Self {
            archive,
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl ArchiveFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        Ok(self.archive.clone())
    }
}

/// A GitHub-style snapshot: every entry sits under one top-level directory.
pub fn snapshot_zip(top: &str, entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(format!("{}/{}", top, name), options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with warnings captured; returns its result and the log text.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    (value, String::from_utf8_lossy(&bytes).to_string())
}
