//! Fixed-size worker pool comparing many tree pairs in parallel.
//!
//! # Phases of one [`Pipeline::run`]
//! 1. **start**: spawn one worker loop per pool thread. Workers share a
//!    bounded work queue (`sync_channel` behind a mutex) and each hold a
//!    sender of the result channel.
//! 2. **feed**: the calling thread enqueues every unit, then closes the queue.
//! 3. **drain**: the calling thread is the single collector. It receives
//!    exactly one [`ComparisonRecord`] per unit and hands each to the sink.
//! 4. **shutdown**: workers exit once the queue is closed and empty; the
//!    collector waits until every worker dropped its result sender.
//!
//! Failures are values, not unwinding: a unit whose trees fail to load, whose
//! tip sets differ, or whose comparison panics still yields one record, and
//! the worker moves on to the next unit.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::distances::{compare_trees, TreeDistances};
use crate::error::{panic_message, Result, TreeDistError};
use crate::io::TreeLoader;
use crate::pairing::ComparisonUnit;

/// Outcome of one comparison unit.
#[derive(Debug)]
pub struct ComparisonRecord {
    pub id: String,
    pub outcome: Result<TreeDistances>,
}

/// Counts of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn received(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Shared flag telling workers to stop loading new units.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Worker pool plus the cancel flag shared by its workers.
///
/// Cancellation is sticky: once cancelled, later runs of the same pipeline
/// answer every unit with [`TreeDistError::Cancelled`].
pub struct Pipeline {
    pool: ThreadPool,
    workers: usize,
    cancel: CancelHandle,
    show_progress: bool,
}

impl Pipeline {
    /// Build a pool of `workers` threads.
    ///
    /// # Errors
    /// [`TreeDistError::Pool`] if `workers` is 0 or the threads cannot be spawned.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(TreeDistError::Pool("worker count must be at least 1".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tree-worker-{i}"))
            .panic_handler(|_| error!("tree worker exited on a panic outside of a comparison"))
            .build()
            .map_err(|e| TreeDistError::Pool(e.to_string()))?;

        Ok(Pipeline {
            pool,
            workers,
            cancel: CancelHandle::default(),
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr while draining instead of logging every
    /// tenth. The bar stays hidden when stderr is not a terminal.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Compare every unit and pass each record to `on_record`, in completion order.
    ///
    /// Failed units are logged here and still handed to `on_record`.
    /// If `on_record` returns an error the pipeline is cancelled, the remaining
    /// records are drained without calling it again, and that error is returned.
    ///
    /// # Errors
    /// - the first error returned by `on_record`;
    /// - [`TreeDistError::LostResults`] if workers died before every unit
    ///   produced a record.
    pub fn run<L, F>(
        &self,
        units: Vec<ComparisonUnit>,
        loader: Arc<L>,
        mut on_record: F,
    ) -> Result<BatchSummary>
    where
        L: TreeLoader + ?Sized + 'static,
        F: FnMut(ComparisonRecord) -> Result<()>,
    {
        let total = units.len();
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };
        if total == 0 {
            return Ok(summary);
        }

        // start
        let (work_tx, work_rx) = mpsc::sync_channel::<ComparisonUnit>(self.workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, result_rx) = mpsc::channel::<ComparisonRecord>();

        for _ in 0..self.workers {
            let worker = Worker {
                queue: Arc::clone(&work_rx),
                results: result_tx.clone(),
                loader: Arc::clone(&loader),
                cancel: self.cancel.clone(),
            };
            self.pool.spawn(move || worker.run());
        }
        drop(result_tx);

        // feed
        for unit in units {
            if work_tx.send(unit).is_err() {
                error!("work queue closed before every unit was enqueued");
                break;
            }
        }
        drop(work_tx);

        // drain
        let mut progress = Progress::new(total, self.show_progress);
        let mut sink_error = None;
        while summary.received() < total {
            let Ok(record) = result_rx.recv() else {
                break;
            };

            match &record.outcome {
                Ok(d) => {
                    summary.succeeded += 1;
                    debug!(id = %record.id, rf = d.rf, norm_rf = d.norm_rf, "pair compared");
                }
                Err(e) => {
                    summary.failed += 1;
                    progress.suspend(|| warn!(id = %record.id, "comparison failed: {e}"));
                }
            }
            progress.advance(summary.received());

            if sink_error.is_none() {
                if let Err(e) = on_record(record) {
                    progress.suspend(|| {
                        error!("result sink failed, cancelling remaining comparisons: {e}")
                    });
                    self.cancel.cancel();
                    sink_error = Some(e);
                }
            }
        }
        progress.finish();

        // shutdown
        while result_rx.recv().is_ok() {
            error!("received a result after every unit was accounted for");
        }

        if let Some(e) = sink_error {
            return Err(e);
        }
        if summary.received() < total {
            return Err(TreeDistError::LostResults {
                expected: total,
                received: summary.received(),
            });
        }
        Ok(summary)
    }

    /// Run every unit and collect the records, in completion order.
    pub fn collect<L>(
        &self,
        units: Vec<ComparisonUnit>,
        loader: Arc<L>,
    ) -> Result<Vec<ComparisonRecord>>
    where
        L: TreeLoader + ?Sized + 'static,
    {
        let mut records = Vec::with_capacity(units.len());
        self.run(units, loader, |record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }
}

/// Load both trees of `unit` and compare them.
pub fn compare_unit<L>(loader: &L, unit: &ComparisonUnit) -> Result<TreeDistances>
where
    L: TreeLoader + ?Sized,
{
    let reference = loader.load(&unit.reference)?;
    let comparison = loader.load(&unit.comparison)?;
    compare_trees(&unit.id, &reference, &comparison)
}

struct Worker<L: ?Sized> {
    queue: Arc<Mutex<Receiver<ComparisonUnit>>>,
    results: Sender<ComparisonRecord>,
    loader: Arc<L>,
    cancel: CancelHandle,
}

impl<L: TreeLoader + ?Sized> Worker<L> {
    fn run(self) {
        loop {
            let unit = {
                let queue = self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                queue.recv()
            };
            let Ok(unit) = unit else {
                break;
            };

            let record = self.process(unit);
            if self.results.send(record).is_err() {
                break;
            }
        }
    }

    fn process(&self, unit: ComparisonUnit) -> ComparisonRecord {
        if self.cancel.is_cancelled() {
            return ComparisonRecord {
                outcome: Err(TreeDistError::Cancelled { id: unit.id.clone() }),
                id: unit.id,
            };
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| compare_unit(&*self.loader, &unit)))
            .unwrap_or_else(|payload| {
                Err(TreeDistError::WorkerPanic {
                    id: unit.id.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });

        ComparisonRecord { id: unit.id, outcome }
    }
}

/// Progress of the drain phase: an `indicatif` bar when requested, otherwise
/// one `info` line each time another tenth of the units completed.
struct Progress {
    bar: Option<ProgressBar>,
    total: usize,
    next_tenth: usize,
}

impl Progress {
    fn new(total: usize, show_bar: bool) -> Self {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(total as u64);
            let style = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} pairs ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        });
        Progress {
            bar,
            total,
            next_tenth: 1,
        }
    }

    /// Run `f` (typically a log call) with the bar cleared from the terminal.
    fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }

    fn advance(&mut self, done: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(done as u64);
            return;
        }
        if done * 10 >= self.next_tenth * self.total {
            info!("{done}/{} pairs processed ({}%)", self.total, done * 100 / self.total);
            while self.next_tenth <= 10 && done * 10 >= self.next_tenth * self.total {
                self.next_tenth += 1;
            }
        }
    }
}
