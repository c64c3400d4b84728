use serde::{Deserialize, Serialize};

/// Default per-line rendering budget in milliseconds.
pub const DEFAULT_TIME_OUT_PER_LINE_MS: u64 = 400;

/// Default rendering surface width in device units.
pub const DEFAULT_PAGE_WIDTH: u32 = 220;
/// Default rendering surface height in device units.
pub const DEFAULT_PAGE_HEIGHT: u32 = 1200;

/// Rendering surface dimensions in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Requested page size: either a named size forwarded verbatim to the
/// native print subsystem, or explicit device-unit dimensions.
/// （要求的紙張尺寸：具名尺寸會原樣轉交原生列印子系統，或直接給定裝置單位的寬高。）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSize {
    Custom { width: u32, height: u32 },
    Named(String),
}

impl PageSize {
    /// The single surface-sizing rule: explicit dimensions pass through,
    /// anything else yields the 220×1200 default.
    pub fn dimensions(&self) -> PageDimensions {
        match self {
            PageSize::Custom { width, height } => PageDimensions {
                width: *width,
                height: *height,
            },
            PageSize::Named(_) => PageDimensions {
                width: DEFAULT_PAGE_WIDTH,
                height: DEFAULT_PAGE_HEIGHT,
            },
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Custom {
            width: DEFAULT_PAGE_WIDTH,
            height: DEFAULT_PAGE_HEIGHT,
        }
    }
}

/// Job-wide configuration supplied by the caller. The wire form uses the
/// job description's camelCase names (`printerName`, `timeOutPerLine`, …).
/// （呼叫端提供的作業層級設定，序列化時使用 camelCase 欄位名稱。）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrintOptions {
    /// Render-only mode: skip the native print step; the surface is visible.
    pub preview: bool,
    /// Suppress the OS print dialog during native print.
    pub silent: bool,
    /// Target device name; required unless `preview` is set.
    pub printer_name: Option<String>,
    /// Per-line budget in milliseconds feeding the watchdog deadline.
    pub time_out_per_line: u64,
    /// Copies requested from the native print subsystem.
    pub copies: u32,
    /// Surface dimensions and native page size.
    pub page_size: PageSize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            preview: false,
            silent: false,
            printer_name: None,
            time_out_per_line: DEFAULT_TIME_OUT_PER_LINE_MS,
            copies: 1,
            page_size: PageSize::default(),
        }
    }
}

impl PrintOptions {
    /// Options for a render-only preview job.
    pub fn for_preview() -> Self {
        Self {
            preview: true,
            ..Self::default()
        }
    }

    /// Options targeting the named printer.
    pub fn for_printer(name: impl Into<String>) -> Self {
        Self {
            printer_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }

    pub fn with_time_out_per_line(mut self, millis: u64) -> Self {
        self.time_out_per_line = millis;
        self
    }

    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    /// True when the configuration gate must reject the job: no usable
    /// printer name outside preview mode.
    pub fn printer_name_missing(&self) -> bool {
        !self.preview
            && self
                .printer_name
                .as_deref()
                .map_or(true, |name| name.is_empty())
    }
}

/// Phase markers for one print job. Transitions only move forward and a
/// settled job never leaves `Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Initializing,
    Rendering,
    Printing,
    Settled,
}

impl JobPhase {
    fn rank(self) -> u8 {
        match self {
            JobPhase::Initializing => 0,
            JobPhase::Rendering => 1,
            JobPhase::Printing => 2,
            JobPhase::Settled => 3,
        }
    }
}

/// Transient per-job state owned by the orchestrator. The settlement latch
/// is a one-way transition: once `settle` has returned `true`, every later
/// call is a no-op that reports `false`.
/// （單一作業的暫態狀態，僅由調度器持有；settle 為單向閂鎖。）
#[derive(Debug)]
pub struct JobState {
    phase: JobPhase,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            phase: JobPhase::Initializing,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Moves the job forward; backwards transitions and transitions out of
    /// `Settled` are ignored.
    pub fn advance(&mut self, next: JobPhase) -> bool {
        if self.phase == JobPhase::Settled || next.rank() <= self.phase.rank() {
            return false;
        }
        self.phase = next;
        true
    }

    /// Compare-and-set settlement: reports whether this call settled the job.
    pub fn settle(&mut self) -> bool {
        if self.phase == JobPhase::Settled {
            return false;
        }
        self.phase = JobPhase::Settled;
        true
    }

    pub fn is_settled(&self) -> bool {
        self.phase == JobPhase::Settled
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

/// Success value produced by a settled print job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub complete: Completion,
    pub state: JobPhase,
}

/// What "complete" means for the job: a render-only preview, or the native
/// print subsystem's result.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Preview,
    Device { accepted: bool },
}
