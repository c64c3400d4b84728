//! The print-job orchestrator: owns the rendering surface and the watchdog,
//! sequences initialization → rendering → native print, and produces exactly
//! one outcome per job.
//! （列印作業調度器：持有渲染表面與看門狗，依序執行初始化、渲染與原生列印，
//! 每個作業只產生一次結果。）

use std::sync::mpsc;

use serde_json::json;
use thiserror::Error;

use crate::backend::{NativePrintOutcome, PrintBackend, PrintTicket};
use crate::channel::{self, ChannelError, BODY_INIT};
use crate::job::{Completion, JobOutcome, JobPhase, JobState, PrintOptions};
use crate::line::PrintLine;
use crate::renderer;
use crate::surface::{SurfaceHandle, SurfaceHost, SurfaceRequest};
use crate::watchdog::{WaitError, Watchdog};

/// Errors raised while driving a print job. All failures surface as this
/// one type; none are retried automatically.
#[derive(Debug, Error)]
pub enum PrintJobError {
    /// Configuration gate: non-preview jobs need a target device. Detected
    /// before any surface exists.
    #[error("a printer name is required when preview is disabled")]
    MissingPrinterName,
    /// An image line named neither a path nor a URL.
    #[error("an image path or url is required for the image line at index {index}")]
    MissingImageSource { index: usize },
    /// The rendering surface reported failure for a specific line.
    #[error("line {index} failed to render: {reason}")]
    LineRender { index: usize, reason: String },
    /// The job did not settle within its deadline. Carries the last known
    /// rendering or print error if one was recorded.
    #[error("print job did not settle in time: {0}")]
    TimedOut(String),
    /// The native print subsystem reported an error.
    #[error("native print failed: {0}")]
    NativePrint(String),
    /// The rendering surface itself failed (creation, init, disconnect).
    #[error("rendering surface failed: {0}")]
    Surface(String),
}

/// Orchestrator for receipt print jobs. One `print` call is one job with
/// one outcome; concurrent calls produce fully independent surfaces and
/// watchdogs.
pub struct PosPrinter<H, B> {
    host: H,
    backend: B,
}

impl<H, B> PosPrinter<H, B>
where
    H: SurfaceHost,
    B: PrintBackend,
{
    pub fn new(host: H, backend: B) -> Self {
        Self { host, backend }
    }

    /// Renders `lines` into a fresh surface and, unless previewing, hands
    /// the document to the native print subsystem.
    ///
    /// The surface is released on every exit path; the settlement latch and
    /// the idempotent handle make both the resolution and the underlying
    /// close happen exactly once no matter which failure source wins.
    pub fn print(
        &self,
        lines: &[PrintLine],
        options: &PrintOptions,
    ) -> Result<JobOutcome, PrintJobError> {
        if options.printer_name_missing() {
            return Err(PrintJobError::MissingPrinterName);
        }

        let mut watchdog = Watchdog::for_job(options, lines.len());
        let mut state = JobState::new();

        let surface = self
            .host
            .create(SurfaceRequest {
                size: options.page_size.dimensions(),
                visible: options.preview,
            })
            .map_err(|err| PrintJobError::Surface(err.to_string()))?;
        let mut surface = SurfaceHandle::new(surface);

        let result = self.run(&mut surface, &mut state, lines, options, &mut watchdog);
        state.settle();
        surface.close();
        result
    }

    fn run(
        &self,
        surface: &mut SurfaceHandle<H::Surface>,
        state: &mut JobState,
        lines: &[PrintLine],
        options: &PrintOptions,
        watchdog: &mut Watchdog,
    ) -> Result<JobOutcome, PrintJobError> {
        let ready = surface
            .load_document()
            .map_err(|err| PrintJobError::Surface(err.to_string()))?;
        match watchdog.wait_on(&ready) {
            Ok(()) => {}
            Err(WaitError::Expired) => {
                return Err(PrintJobError::TimedOut(watchdog.timeout_cause()))
            }
            Err(WaitError::Disconnected) => {
                surface.mark_closed();
                return Err(PrintJobError::Surface(
                    "rendering surface closed before the document was ready".into(),
                ));
            }
        }

        // The initialization handshake always completes before the first
        // line is sent.
        channel::request(surface, BODY_INIT, json!(options), watchdog)
            .map_err(|err| Self::init_failure(err, watchdog))?;

        state.advance(JobPhase::Rendering);
        renderer::render_lines(surface, lines, watchdog)?;

        if options.preview {
            return Ok(JobOutcome {
                complete: Completion::Preview,
                state: JobPhase::Settled,
            });
        }

        state.advance(JobPhase::Printing);
        let (done_tx, done_rx) = mpsc::channel();
        self.backend
            .submit(PrintTicket::from_options(options), done_tx)
            .map_err(|err| PrintJobError::NativePrint(err.to_string()))?;

        // A callback arriving after the deadline lands on a dropped
        // receiver and resolves nothing.
        match watchdog.wait_on(&done_rx) {
            Ok(NativePrintOutcome {
                error: Some(reason),
                ..
            }) => {
                watchdog.record_error(reason.clone());
                Err(PrintJobError::NativePrint(reason))
            }
            Ok(NativePrintOutcome { accepted, .. }) => Ok(JobOutcome {
                complete: Completion::Device { accepted },
                state: JobPhase::Settled,
            }),
            Err(WaitError::Expired) => Err(PrintJobError::TimedOut(watchdog.timeout_cause())),
            Err(WaitError::Disconnected) => Err(PrintJobError::NativePrint(
                "print backend dropped the completion channel".into(),
            )),
        }
    }

    fn init_failure(err: ChannelError, watchdog: &Watchdog) -> PrintJobError {
        match err {
            ChannelError::Rejected(reason) => PrintJobError::Surface(reason),
            ChannelError::Deadline => PrintJobError::TimedOut(watchdog.timeout_cause()),
            ChannelError::Disconnected => PrintJobError::Surface(
                "rendering surface closed during initialization".into(),
            ),
            ChannelError::Surface(err) => PrintJobError::Surface(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockPrintBackend;
    use crate::host::VirtualSurfaceHost;
    use crate::job::PageSize;

    #[test]
    fn config_gate_rejects_before_any_surface_exists() {
        let host = VirtualSurfaceHost::new();
        let printer = PosPrinter::new(host.clone(), MockPrintBackend::accepting());
        let err = printer
            .print(&[PrintLine::text("x")], &PrintOptions::default())
            .unwrap_err();
        assert!(matches!(err, PrintJobError::MissingPrinterName));
        assert!(
            host.drain_receipts().is_empty(),
            "no surface may be created for a rejected configuration"
        );
    }

    #[test]
    fn preview_resolves_without_native_print() {
        let host = VirtualSurfaceHost::new();
        let backend = MockPrintBackend::accepting();
        let printer = PosPrinter::new(host.clone(), backend.clone());
        let outcome = printer
            .print(&[PrintLine::text("Hello")], &PrintOptions::for_preview())
            .unwrap();
        assert_eq!(outcome.complete, Completion::Preview);
        assert_eq!(outcome.state, JobPhase::Settled);
        assert!(backend.tickets.lock().unwrap().is_empty());

        let receipts = host.drain_receipts();
        assert_eq!(receipts.len(), 1);
        assert!(receipts[0].visible);
    }

    #[test]
    fn native_error_becomes_a_print_failure() {
        let host = VirtualSurfaceHost::new();
        let printer = PosPrinter::new(host.clone(), MockPrintBackend::failing("out of paper"));
        let err = printer
            .print(&[PrintLine::text("x")], &PrintOptions::for_printer("EPSON"))
            .unwrap_err();
        assert!(matches!(err, PrintJobError::NativePrint(reason) if reason == "out of paper"));
        assert_eq!(host.drain_receipts().len(), 1, "surface still released");
    }

    #[test]
    fn device_outcome_carries_the_ticket() {
        let host = VirtualSurfaceHost::new();
        let backend = MockPrintBackend::accepting();
        let printer = PosPrinter::new(host, backend.clone());
        let options = PrintOptions::for_printer("EPSON")
            .with_copies(2)
            .with_page_size(PageSize::Named("80mm".into()));
        let outcome = printer.print(&[PrintLine::text("x")], &options).unwrap();
        assert_eq!(outcome.complete, Completion::Device { accepted: true });

        let tickets = backend.tickets.lock().unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].device_name, "EPSON");
        assert_eq!(tickets[0].copies, 2);
        assert_eq!(tickets[0].page_size, PageSize::Named("80mm".into()));
    }
}
