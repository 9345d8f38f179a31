//! # Service Tests
//!
//! Label jobs submitted through [`LabelPrinter`] against in-memory printers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use etiqueta::events::{ListenerError, ProgressEvent, ProgressKind, ProgressListener};
use etiqueta::label::{LabelRecord, TemplateKind};
use etiqueta::printer::CommandProfile;
use etiqueta::protocol::Symbology;
use etiqueta::service::{JobOutcome, LabelPrinter};
use etiqueta::transport::{Endpoint, MemoryConnector};
use etiqueta::EtiquetaError;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn setup() -> (LabelPrinter, Arc<MemoryConnector>) {
    let connector = Arc::new(MemoryConnector::new());
    let service = LabelPrinter::new(CommandProfile::builtin().unwrap(), connector.clone());
    (service, connector)
}

fn label(price: &str) -> LabelRecord {
    LabelRecord::new(TemplateKind::StandardPrice)
        .price(price)
        .barcode(Symbology::Code128, "555")
}

/// Listener that always fails.
struct Broken;

impl ProgressListener for Broken {
    fn on_progress(&self, event: &ProgressEvent) -> Result<(), ListenerError> {
        Err(ListenerError(format!("cannot show {}", event.kind)))
    }
}

/// Listener that counts events.
#[derive(Default)]
struct Counter(AtomicUsize);

impl ProgressListener for Counter {
    fn on_progress(&self, _event: &ProgressEvent) -> Result<(), ListenerError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_failing_listener_does_not_block_others() {
    let (service, _connector) = setup();
    let counter = Arc::new(Counter::default());
    service.subscribe_progress(Arc::new(Broken));
    service.subscribe_progress(counter.clone());

    let report = service
        .submit_label(label("$1"), "PR2", &Endpoint::parse("memory:a").unwrap())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::Completed);
    assert_eq!(counter.0.load(Ordering::SeqCst), 4);
}

#[test]
fn test_unsubscribe_progress() {
    let (service, _connector) = setup();
    let counter = Arc::new(Counter::default());
    let id = service.subscribe_progress(counter.clone());

    // same listener twice keeps one subscription
    assert_eq!(service.subscribe_progress(counter.clone()), id);
    assert!(service.unsubscribe_progress(id));
    assert!(!service.unsubscribe_progress(id));

    service
        .submit_label(label("$1"), "PR2", &Endpoint::parse("memory:a").unwrap())
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(counter.0.load(Ordering::SeqCst), 0);
}

#[test]
fn test_jobs_on_separate_printers() {
    let (service, connector) = setup();
    let handles: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let endpoint = Endpoint::parse(&format!("memory:{}", name)).unwrap();
            service.submit_label(label(name), "PR3", &endpoint).unwrap()
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.wait().unwrap().outcome, JobOutcome::Completed);
    }
    for name in ["a", "b", "c"] {
        let bytes = connector.printer(name).bytes();
        let needle = format!("\x1bE{}\x1bF", name);
        assert!(bytes.windows(needle.len()).any(|w| w == needle.as_bytes()));
    }
}

#[test]
fn test_cancel_never_completes() {
    let (service, _connector) = setup();
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = events.clone();
    let canceller = service.clone();
    service.bus().subscribe_fn(move |e| {
        sink.lock().push(e.kind);
        if e.kind == ProgressKind::StartDoc {
            if let Some(job) = e.job {
                assert!(canceller.cancel_job(&job));
            }
        }
    });

    let report = service
        .submit_label(label("$9"), "PR2", &Endpoint::parse("memory:a").unwrap())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome, JobOutcome::Cancelled);
    let events = events.lock();
    assert!(events.contains(&ProgressKind::Cancel));
    assert!(!events.contains(&ProgressKind::Complete));
}

#[test]
fn test_unsupported_symbology_for_printer() {
    let profiles = CommandProfile::load(
        r#"{ "MINI": { "Symbologies": "CODE39", "DefaultBarcodeHeight": 30, "DefaultBarcodeXOffset": 0 } }"#,
    )
    .unwrap();
    let service = LabelPrinter::new(profiles, Arc::new(MemoryConnector::new()));

    let result = service.submit_label(label("$1"), "MINI", &Endpoint::parse("memory:a").unwrap());
    assert!(matches!(result, Err(EtiquetaError::UnsupportedSymbology(_))));
}

#[tokio::test]
async fn test_async_receiver_sees_job() {
    let (service, _connector) = setup();
    let mut rx = service.bus().receiver();

    let handle = service
        .submit_label(label("$3"), "PR2", &Endpoint::parse("memory:a").unwrap())
        .unwrap();
    let id = handle.id();
    tokio::task::spawn_blocking(move || handle.wait())
        .await
        .unwrap()
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.job, Some(id));
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            ProgressKind::StartDoc,
            ProgressKind::EndDoc,
            ProgressKind::Finished,
            ProgressKind::Complete
        ]
    );
}
