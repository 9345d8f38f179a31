//! # Label Printing Service
//!
//! The entry point for applications: submit a label record, watch its
//! progress, cancel it.
//!
//! Validation (unknown printer, unsupported symbology, bad barcode payload)
//! happens on the calling thread and fails before anything connects. The
//! print itself runs on a worker thread: connect, send the rendered
//! commands, disconnect.
//!
//! ```
//! use std::sync::Arc;
//! use etiqueta::label::{LabelRecord, TemplateKind};
//! use etiqueta::printer::CommandProfile;
//! use etiqueta::protocol::Symbology;
//! use etiqueta::service::{JobOutcome, LabelPrinter};
//! use etiqueta::transport::{Endpoint, MemoryConnector};
//!
//! let connector = Arc::new(MemoryConnector::new());
//! let service = LabelPrinter::new(CommandProfile::builtin()?, connector.clone());
//!
//! let record = LabelRecord::new(TemplateKind::StandardPrice)
//!     .price("$4.99")
//!     .barcode(Symbology::Code128, "0123456789");
//!
//! let job = service.submit_label(record, "PR2", &Endpoint::parse("memory:shop")?)?;
//! let report = job.wait()?;
//!
//! assert_eq!(report.outcome, JobOutcome::Completed);
//! assert_eq!(report.bytes_written, connector.printer("shop").bytes().len() as u64);
//! # Ok::<(), etiqueta::EtiquetaError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;

use crate::error::{EtiquetaError, Result};
use crate::events::{JobId, ProgressEventBus, ProgressListener, SubscriptionId};
use crate::ir::RenderedCommand;
use crate::label::{self, LabelRecord};
use crate::printer::{CommandProfile, SessionConfig};
use crate::session::{DocumentOutcome, PrinterSession};
use crate::transport::{Connector, Endpoint, EndpointLocks};

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Summary of a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub id: JobId,
    pub bytes_written: u64,
    pub outcome: JobOutcome,
}

/// A submitted job running on its worker thread.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    join: thread::JoinHandle<Result<JobReport>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the job ends.
    ///
    /// ## Errors
    ///
    /// The connect or transport error that stopped the job.
    pub fn wait(self) -> Result<JobReport> {
        self.join
            .join()
            .map_err(|_| EtiquetaError::Unexpected(format!("{} worker panicked", self.id)))?
    }
}

type CancelFlags = Arc<Mutex<HashMap<JobId, Arc<AtomicBool>>>>;

/// Submits labels to printers. Clones share the event bus, endpoint claims
/// and running jobs.
#[derive(Clone)]
pub struct LabelPrinter {
    profiles: Arc<CommandProfile>,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    bus: Arc<ProgressEventBus>,
    locks: EndpointLocks,
    jobs: CancelFlags,
}

impl LabelPrinter {
    pub fn new(profiles: CommandProfile, connector: Arc<dyn Connector>) -> Self {
        Self {
            profiles: Arc::new(profiles),
            config: SessionConfig::default(),
            connector,
            bus: Arc::new(ProgressEventBus::new()),
            locks: EndpointLocks::new(),
            jobs: Arc::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Share endpoint claims with sessions created outside the service.
    pub fn with_locks(mut self, locks: EndpointLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn profiles(&self) -> &CommandProfile {
        &self.profiles
    }

    pub fn bus(&self) -> &Arc<ProgressEventBus> {
        &self.bus
    }

    pub fn locks(&self) -> &EndpointLocks {
        &self.locks
    }

    pub fn subscribe_progress(&self, listener: Arc<dyn ProgressListener>) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe_progress(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Ids of jobs still running.
    pub fn running_jobs(&self) -> Vec<JobId> {
        self.jobs.lock().keys().copied().collect()
    }

    /// Ask a running job to stop. Its document ends with Cancel; bytes not
    /// yet written are dropped. Returns false for unknown or finished jobs.
    pub fn cancel_job(&self, id: &JobId) -> bool {
        match self.jobs.lock().get(id) {
            Some(flag) => {
                tracing::info!(job = %id, "cancel requested");
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Render `record` for `printer_id` and print it on a worker thread.
    ///
    /// ## Errors
    ///
    /// Validation errors from resolving the profile or rendering the label,
    /// including a logo that cannot be read or decoded. Nothing has
    /// connected when these are returned.
    pub fn submit_label(
        &self,
        record: LabelRecord,
        printer_id: &str,
        endpoint: &Endpoint,
    ) -> Result<JobHandle> {
        let profile = self.profiles.resolve(printer_id)?;
        let commands = label::render(&record, &profile)?;

        let id = JobId::new();
        let cancel = Arc::new(AtomicBool::new(false));
        self.jobs.lock().insert(id, cancel.clone());

        tracing::info!(
            job = %id,
            template = %record.template,
            printer = printer_id,
            %endpoint,
            commands = commands.len(),
            "label submitted"
        );

        let session = PrinterSession::new(profile, self.connector.clone())
            .with_config(self.config.clone())
            .with_bus(self.bus.clone())
            .with_locks(self.locks.clone())
            .with_job(id);
        let endpoint = endpoint.clone();
        let jobs = self.jobs.clone();

        let join = thread::Builder::new()
            .name(format!("etiqueta-{}", id))
            .spawn(move || {
                let result = run_job(id, session, &endpoint, &commands, &cancel);
                jobs.lock().remove(&id);
                match &result {
                    Ok(report) => tracing::info!(
                        job = %id,
                        outcome = %report.outcome,
                        bytes = report.bytes_written,
                        "job finished"
                    ),
                    Err(e) => tracing::error!(job = %id, error = %e, "job failed"),
                }
                result
            });

        match join {
            Ok(join) => Ok(JobHandle { id, join }),
            Err(e) => {
                self.jobs.lock().remove(&id);
                Err(EtiquetaError::Io(e))
            }
        }
    }
}

impl fmt::Debug for LabelPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelPrinter")
            .field("printers", &self.profiles.printer_ids())
            .field("config", &self.config)
            .field("running", &self.jobs.lock().len())
            .finish()
    }
}

fn run_job(
    id: JobId,
    mut session: PrinterSession,
    endpoint: &Endpoint,
    commands: &[RenderedCommand],
    cancel: &AtomicBool,
) -> Result<JobReport> {
    if cancel.load(Ordering::SeqCst) {
        return Ok(JobReport {
            id,
            bytes_written: 0,
            outcome: JobOutcome::Cancelled,
        });
    }

    session.connect(endpoint)?;
    let printed = print_until_cancelled(&mut session, commands, cancel);
    if let Err(e) = &printed {
        // a failed job never reports Complete
        if session.cancel() {
            tracing::warn!(job = %id, error = %e, "printing failed, document cancelled");
        }
    }
    let closed = session.disconnect();

    let sent = printed?;
    closed?;
    let outcome = match session.last_document() {
        Some(DocumentOutcome::Cancelled) => JobOutcome::Cancelled,
        _ => sent,
    };
    Ok(JobReport {
        id,
        bytes_written: session.bytes_written()?,
        outcome,
    })
}

fn print_until_cancelled(
    session: &mut PrinterSession,
    commands: &[RenderedCommand],
    cancel: &AtomicBool,
) -> Result<JobOutcome> {
    for cmd in commands {
        if cancel.load(Ordering::SeqCst) {
            session.cancel();
            return Ok(JobOutcome::Cancelled);
        }
        tracing::trace!(%cmd, "sending");
        session.print_commands(std::slice::from_ref(cmd))?;
    }

    // cancelled while the last command was being sent
    if cancel.load(Ordering::SeqCst) {
        session.cancel();
        return Ok(JobOutcome::Cancelled);
    }
    Ok(JobOutcome::Completed)
}

// ============================================================================
// TESTS
// ============================================================================
