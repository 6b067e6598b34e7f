//! Trace collectors.
//!
//! A collector receives each exported tree exactly once, when its root
//! closes. Storage and delivery beyond that are the collector's business.

use crate::error::{Error, Result};
use crate::export::ExportedTrace;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Receives completed span trees.
pub trait Collector: Debug + Send + Sync {
    /// Accepts one exported tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree could not be delivered.
    fn collect(&self, trace: ExportedTrace) -> Result<()>;
}

/// Keeps exported trees in memory.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    traces: Mutex<Vec<ExportedTrace>>,
}

impl MemoryCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every collected tree.
    #[must_use]
    pub fn traces(&self) -> Vec<ExportedTrace> {
        self.lock().clone()
    }

    /// Removes and returns every collected tree.
    pub fn take(&self) -> Vec<ExportedTrace> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of collected trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ExportedTrace>> {
        self.traces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Collector for MemoryCollector {
    fn collect(&self, trace: ExportedTrace) -> Result<()> {
        self.lock().push(trace);
        Ok(())
    }
}

/// Emits each tree as one JSON-bodied log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCollector;

impl Collector for LogCollector {
    fn collect(&self, trace: ExportedTrace) -> Result<()> {
        let body = serde_json::to_string(&trace)?;
        info!(target: "shopsim::export", trace_id = %trace.trace_id, trace = %body);
        Ok(())
    }
}

/// Appends each tree as one JSON line to a file.
#[derive(Debug)]
pub struct JsonLinesCollector {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesCollector {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Collector for JsonLinesCollector {
    fn collect(&self, trace: ExportedTrace) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, &trace)?;
        writer.write_all(b"\n")?;
        writer
            .flush()
            .map_err(|e| Error::Collector(format!("{}: {e}", self.path.display())))
    }
}
