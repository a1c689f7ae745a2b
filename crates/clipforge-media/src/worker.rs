// crates/clipforge-media/src/worker.rs
//
// ExportWorker: runs one export at a time on a background thread.
// All public API a front end calls for rendering lives here; results come
// back over `rx` so the caller never blocks on encode work.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use uuid::Uuid;

use clipforge_core::error::{EditError, Result};
use clipforge_core::media_types::{CancelFlag, MediaSource, StreamEncoder};
use clipforge_core::quality::EncodeParams;
use clipforge_core::timeline::TimelineSnapshot;

use crate::export::ExportPipeline;

/// Messages sent from the export thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    /// Non-decreasing percentage in [0, 100].
    Progress { job_id: Uuid, percent: u8 },
    /// The output file exists at `path`. Always the last event of a job.
    Done     { job_id: Uuid, path: PathBuf },
    /// The job ended without output. `cancelled` separates a user abort from
    /// a real failure.
    Failed   { job_id: Uuid, msg: String, cancelled: bool },
}

impl ExportEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            ExportEvent::Progress { job_id, .. }
            | ExportEvent::Done { job_id, .. }
            | ExportEvent::Failed { job_id, .. } => *job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportEvent::Progress { .. })
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

struct ActiveJob {
    id:     Uuid,
    cancel: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

// ── ExportWorker ──────────────────────────────────────────────────────────────

pub struct ExportWorker {
    /// Progress / done / failed events for every job started on this worker.
    pub rx:   Receiver<ExportEvent>,
    tx:       Sender<ExportEvent>,
    media:    Arc<dyn MediaSource>,
    encoder:  Arc<dyn StreamEncoder>,
    /// The single running job, if any. Cleared by the job thread just before
    /// it sends its terminal event.
    active:   Arc<Mutex<Option<ActiveJob>>>,
    shutdown: Arc<AtomicBool>,
}

impl ExportWorker {
    pub fn new(media: Arc<dyn MediaSource>, encoder: Arc<dyn StreamEncoder>) -> Self {
        let (tx, rx) = bounded(512);
        Self {
            rx, tx, media, encoder,
            active:   Arc::new(Mutex::new(None)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn a background export of `snapshot` to `output`.
    ///
    /// Fails with `ExportBusy` while another job is running.
    pub fn start(&self, snapshot: TimelineSnapshot, output: PathBuf, params: EncodeParams) -> Result<Uuid> {
        // Hold the slot lock across spawn + insert so the job thread cannot
        // clear the slot before it has been filled.
        let mut slot = self.active.lock();
        if let Some(job) = slot.as_ref() {
            return Err(EditError::ExportBusy(job.id));
        }

        let job_id  = Uuid::new_v4();
        let cancel  = Arc::new(AtomicBool::new(self.shutdown.load(Ordering::Relaxed)));
        let tx      = self.tx.clone();
        let media   = Arc::clone(&self.media);
        let encoder = Arc::clone(&self.encoder);
        let active  = Arc::clone(&self.active);
        let flag    = Arc::clone(&cancel);

        log::info!("[worker] job {job_id}: {} clips → {}", snapshot.len(), output.display());

        let handle = thread::Builder::new()
            .name(format!("clipforge-export-{job_id}"))
            .spawn(move || {
                let progress_tx = tx.clone();
                // A panic in a backend must still free the slot and end the
                // job with a terminal event, or the worker stays busy forever.
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut pipeline = ExportPipeline::new(media.as_ref(), encoder.as_ref()).with_cancel(flag);
                    pipeline.export(&snapshot, &output, &params, |percent| {
                        let _ = progress_tx.send(ExportEvent::Progress { job_id, percent });
                    })
                }));

                // Free the slot first so a listener reacting to the terminal
                // event can start the next job immediately.
                {
                    let mut slot = active.lock();
                    if slot.as_ref().is_some_and(|j| j.id == job_id) {
                        *slot = None;
                    }
                }

                let event = match result {
                    Ok(Ok(path)) => ExportEvent::Done { job_id, path },
                    Ok(Err(e))   => ExportEvent::Failed {
                        job_id,
                        cancelled: e.is_cancelled(),
                        msg:       e.to_string(),
                    },
                    Err(payload) => {
                        let msg = format!("export thread panicked: {}", panic_message(payload.as_ref()));
                        log::error!("[worker] job {job_id}: {msg}");
                        ExportEvent::Failed { job_id, cancelled: false, msg }
                    }
                };
                let _ = tx.send(event);
            })
            .map_err(|e| EditError::io(PathBuf::from("<export thread>"), e))?;

        *slot = Some(ActiveJob { id: job_id, cancel, handle: Some(handle) });
        Ok(job_id)
    }

    /// Signal the job identified by `job_id` to stop. The job finishes its
    /// current frame, removes its temp file and reports `Failed { cancelled: true }`.
    /// Unknown or finished ids are ignored.
    pub fn cancel(&self, job_id: Uuid) {
        if let Some(job) = self.active.lock().as_ref().filter(|j| j.id == job_id) {
            log::info!("[worker] cancelling job {job_id}");
            job.cancel.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Id of the running job, if any.
    pub fn active_job(&self) -> Option<Uuid> {
        self.active.lock().as_ref().map(|j| j.id)
    }

    /// Cancel the active job and wait for its thread to exit. Later `start`
    /// calls still spawn, but their jobs are cancelled immediately.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = {
            let mut slot = self.active.lock();
            slot.as_mut().and_then(|job| {
                job.cancel.store(true, Ordering::Relaxed);
                job.handle.take()
            })
        };
        // Join outside the lock: the job thread needs it to clear its slot.
        if let Some(h) = handle {
            if h.join().is_err() {
                log::error!("[worker] export thread panicked");
            }
        }
    }
}

/// Text of a panic payload: the `panic!` message when it is a string.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload.downcast_ref::<&str>().copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
