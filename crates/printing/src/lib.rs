//! Receipt print-job orchestration for point-of-sale printers.
//!
//! One `print` call renders an ordered sequence of content lines into an
//! isolated rendering surface over a strict request/reply handshake, then
//! hands the document to the native print subsystem (or stops after
//! rendering in preview mode), settling exactly once under a job-wide
//! deadline.

pub mod backend;
pub mod channel;
pub mod host;
pub mod job;
pub mod line;
pub mod printer;
pub mod renderer;
pub mod surface;
pub mod watchdog;

pub use backend::{NativePrintOutcome, PrintBackend, PrintTicket};
pub use channel::{ChannelError, ChannelMessage, ChannelReply, RequestId, BODY_INIT, RENDER_LINE};
pub use host::{RenderedReceipt, VirtualPrintBackend, VirtualSurface, VirtualSurfaceHost};
pub use job::{
    Completion, JobOutcome, JobPhase, JobState, PageDimensions, PageSize, PrintOptions,
};
pub use line::{Alignment, LineStyle, PrintLine};
pub use printer::{PosPrinter, PrintJobError};
pub use renderer::render_lines;
pub use surface::{Surface, SurfaceError, SurfaceHandle, SurfaceHost, SurfaceRequest};
pub use watchdog::{WaitError, Watchdog, JOB_OVERHEAD};
