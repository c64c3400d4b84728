//! Boundary to the host's native print subsystem.
//! （通往作業系統原生列印子系統的邊界。）

use std::fmt;
use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::job::{PageSize, PrintOptions};

/// Arguments handed to the native print subsystem for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintTicket {
    pub silent: bool,
    pub print_background: bool,
    pub device_name: String,
    pub copies: u32,
    pub page_size: PageSize,
}

impl PrintTicket {
    /// Ticket for a non-preview job. Backgrounds always print; the page
    /// size is forwarded as given (named sizes stay named).
    pub fn from_options(options: &PrintOptions) -> Self {
        Self {
            silent: options.silent,
            print_background: true,
            device_name: options.printer_name.clone().unwrap_or_default(),
            copies: options.copies,
            page_size: options.page_size.clone(),
        }
    }
}

/// Terminal report from the native print subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct NativePrintOutcome {
    /// Whether the subsystem accepted the job.
    pub accepted: bool,
    /// Error description when the subsystem failed.
    pub error: Option<String>,
}

impl NativePrintOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            error: Some(error.into()),
        }
    }
}

/// Abstraction over the host print pipeline.
pub trait PrintBackend {
    type Error: fmt::Display;

    /// Starts the native print job. Exactly one outcome is sent on `done`
    /// when the subsystem finishes; a send onto a dropped receiver is the
    /// backend's problem no longer.
    fn submit(&self, ticket: PrintTicket, done: Sender<NativePrintOutcome>)
        -> Result<(), Self::Error>;
}
