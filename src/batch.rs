//! # Batch Generation
//!
//! One PDF per data row, written into a single output directory. Rows are
//! generated strictly in order on one worker thread, which reports back over
//! a channel; the editing thread polls it without blocking.
//!
//! The worker owns a copy of the template and data taken when the batch
//! starts, so edits made while it runs never reach it.
//!
//! Each file is named after the first column of the first sheet, sanitized
//! to a slug, falling back to `pds_<row>`. Duplicate names get `_2`, `_3`,
//! ... in row order. A file is written to `<name>.pdf.tmp` and renamed into
//! place. When the rename fails it is retried once under a timestamped name;
//! a row that still fails is reported and the batch moves on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::data::DataSource;
use crate::error::PdsError;
use crate::font::FontContext;
use crate::image_loader::ImageLoader;
use crate::model::Template;
use crate::pdf::PdfWriter;
use crate::render::{self, RenderPass};

/// Name of the output directory created next to the data file.
pub const OUTPUT_DIR_NAME: &str = "PDS";

/// Progress reported by a running batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Row `row` (0-based) is done, successfully or not.
    Progress {
        row: usize,
        total: usize,
        /// Estimated time left, from the average time per row so far.
        remaining: Duration,
    },
    RowFailed {
        row: usize,
        error: String,
    },
    /// Always the last event.
    Finished {
        output_dir: PathBuf,
        written: usize,
        failed: usize,
    },
}

/// Strip everything but word characters, whitespace and hyphens, then turn
/// whitespace runs into single underscores.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches('_')
        .to_string()
}

/// Hands out unique file stems in row order.
#[derive(Debug, Default)]
pub struct OutputNames {
    used: HashSet<String>,
}

impl OutputNames {
    pub fn next(&mut self, first_value: &str, row: usize) -> String {
        let mut base = sanitize_filename(first_value);
        if base.is_empty() {
            base = format!("pds_{}", row + 1);
        }
        let mut name = base.clone();
        let mut n = 2;
        while self.used.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        self.used.insert(name.clone());
        name
    }
}

/// Where a batch writes: `explicit` when given, else `<data dir>/PDS`.
pub fn output_dir(data: &DataSource, explicit: Option<PathBuf>) -> Result<PathBuf, PdsError> {
    explicit
        .or_else(|| data.base_dir().map(|dir| dir.join(OUTPUT_DIR_NAME)))
        .ok_or_else(|| {
            PdsError::InvalidInput(
                "no output directory given and the data source has no file path".to_string(),
            )
        })
}

fn check_rows(data: &DataSource) -> Result<usize, PdsError> {
    match data.row_count() {
        0 => Err(PdsError::InvalidInput("the data source has no rows".to_string())),
        n => Ok(n),
    }
}

/// Move the finished temp file into place, retrying once under a
/// timestamped name.
fn commit_file(tmp: &Path, target: &Path) -> Result<PathBuf, PdsError> {
    let Err(e) = std::fs::rename(tmp, target) else {
        return Ok(target.to_path_buf());
    };
    log::warn!(
        "failed to move {} into place: {}; trying an alternative name",
        target.display(),
        e
    );
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let alt = target.with_file_name(format!("{}_{}.pdf", stem, chrono::Utc::now().timestamp()));
    match std::fs::rename(tmp, &alt) {
        Ok(()) => Ok(alt),
        Err(e) => {
            log::error!("failed to move temp PDF to {}: {}", alt.display(), e);
            let _ = std::fs::remove_file(tmp);
            Err(PdsError::Io(e))
        }
    }
}

struct Worker {
    template: Template,
    data: DataSource,
    images: ImageLoader,
    output_dir: PathBuf,
}

impl Worker {
    fn render_row(&self, fonts: &FontContext, row: usize, target: &Path) -> Result<PathBuf, PdsError> {
        let values = render::resolve_row_values(&self.template, &self.data, row);
        let page = RenderPass::new(fonts, &self.images).render(&self.template, &values);
        let title = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = PdfWriter::new().with_title(title).write(&page)?;

        let mut tmp = target.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, bytes)?;
        commit_file(&tmp, target)
    }

    fn run(self, total: usize, mut report: impl FnMut(BatchEvent)) -> (usize, usize) {
        log::info!(
            "generating {} PDF(s) into {}",
            total,
            self.output_dir.display()
        );
        let fonts = FontContext::new();
        let mut names = OutputNames::default();
        let started = Instant::now();
        let (mut written, mut failed) = (0, 0);

        for row in 0..total {
            let name = names.next(&self.data.first_column_value(row), row);
            let target = self.output_dir.join(format!("{}.pdf", name));
            match self.render_row(&fonts, row, &target) {
                Ok(path) => {
                    log::debug!("row {} -> {}", row + 1, path.display());
                    written += 1;
                }
                Err(e) => {
                    log::error!("row {} failed: {}", row + 1, e);
                    failed += 1;
                    report(BatchEvent::RowFailed {
                        row,
                        error: e.to_string(),
                    });
                }
            }
            let done = row + 1;
            let per_row = started.elapsed().as_secs_f64() / done as f64;
            report(BatchEvent::Progress {
                row,
                total,
                remaining: Duration::from_secs_f64(per_row * (total - done) as f64),
            });
        }

        log::info!("batch finished: {} written, {} failed", written, failed);
        report(BatchEvent::Finished {
            output_dir: self.output_dir.clone(),
            written,
            failed,
        });
        (written, failed)
    }
}

fn prepare(
    template: Template,
    data: DataSource,
    images: ImageLoader,
    output_dir: Option<PathBuf>,
) -> Result<(Worker, usize), PdsError> {
    let total = check_rows(&data)?;
    let output_dir = self::output_dir(&data, output_dir)?;
    std::fs::create_dir_all(&output_dir)?;
    Ok((
        Worker {
            template,
            data,
            images,
            output_dir,
        },
        total,
    ))
}

/// Generate every row on the calling thread. Returns `(written, failed)`.
pub fn run(
    template: Template,
    data: DataSource,
    images: ImageLoader,
    output_dir: Option<PathBuf>,
    report: impl FnMut(BatchEvent),
) -> Result<(usize, usize), PdsError> {
    let (worker, total) = prepare(template, data, images, output_dir)?;
    Ok(worker.run(total, report))
}

/// Start generating on a background thread.
///
/// Input problems (no rows, no output directory) are returned here, before
/// the worker starts.
pub fn spawn(
    template: Template,
    data: DataSource,
    images: ImageLoader,
    output_dir: Option<PathBuf>,
) -> Result<BatchHandle, PdsError> {
    let (worker, total) = prepare(template, data, images, output_dir)?;
    let output_dir = worker.output_dir.clone();
    let (tx, rx): (Sender<BatchEvent>, Receiver<BatchEvent>) = mpsc::channel();
    let join = thread::spawn(move || {
        worker.run(total, |event| {
            let _ = tx.send(event);
        });
    });
    Ok(BatchHandle {
        receiver: rx,
        join: Some(join),
        output_dir,
        total,
        finished: false,
    })
}

/// The editing thread's end of a running batch.
#[derive(Debug)]
pub struct BatchHandle {
    receiver: Receiver<BatchEvent>,
    join: Option<JoinHandle<()>>,
    output_dir: PathBuf,
    total: usize,
    finished: bool,
}

impl BatchHandle {
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Every event that is ready, without blocking.
    pub fn poll(&mut self) -> Vec<BatchEvent> {
        let mut ready = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => ready.push(self.observe(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.reap();
                    break;
                }
            }
        }
        ready
    }

    /// Block for the next event. `None` once the worker is gone.
    pub fn recv(&mut self) -> Option<BatchEvent> {
        match self.receiver.recv() {
            Ok(event) => Some(self.observe(event)),
            Err(_) => {
                self.reap();
                None
            }
        }
    }

    /// Block until the worker is done, returning the events not yet seen.
    pub fn wait(mut self) -> Vec<BatchEvent> {
        let mut rest = Vec::new();
        while let Some(event) = self.recv() {
            rest.push(event);
        }
        rest
    }

    fn observe(&mut self, event: BatchEvent) -> BatchEvent {
        if matches!(event, BatchEvent::Finished { .. }) {
            self.finished = true;
        }
        event
    }

    fn reap(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("batch worker panicked");
            }
        }
    }
}
