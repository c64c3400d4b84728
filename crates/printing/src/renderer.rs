//! Line renderer driver: feeds each content line to the surface in index
//! order and collects the per-line acknowledgment before sending the next.
//! （行渲染驅動器：依索引順序將內容行送入渲染表面，收到回覆後才送出下一行。）

use serde_json::json;

use crate::channel::{self, ChannelError, RENDER_LINE};
use crate::line::PrintLine;
use crate::printer::PrintJobError;
use crate::surface::{Surface, SurfaceHandle};
use crate::watchdog::Watchdog;

/// Renders `lines` through the surface, strictly serialized: line `i + 1`
/// is never dispatched before line `i`'s acknowledgment arrives, because
/// the reply channel tracks one outstanding request at a time.
///
/// An image line naming neither a path nor a URL fails before any message
/// is sent for it; a false-status reply stops the job at that line. On
/// every failure the surface is closed before returning.
pub fn render_lines<S: Surface>(
    surface: &mut SurfaceHandle<S>,
    lines: &[PrintLine],
    watchdog: &mut Watchdog,
) -> Result<(), PrintJobError> {
    for (index, line) in lines.iter().enumerate() {
        if line.missing_image_source() {
            surface.close();
            return Err(PrintJobError::MissingImageSource { index });
        }

        let body = json!({ "line": line, "lineIndex": index });
        match channel::request(surface, RENDER_LINE, body, watchdog) {
            Ok(_) => {}
            Err(ChannelError::Rejected(reason)) => {
                watchdog.record_error(reason.clone());
                surface.close();
                return Err(PrintJobError::LineRender { index, reason });
            }
            Err(ChannelError::Deadline) => {
                surface.close();
                return Err(PrintJobError::TimedOut(watchdog.timeout_cause()));
            }
            Err(ChannelError::Disconnected) => {
                surface.close();
                return Err(PrintJobError::Surface(
                    "rendering surface closed before acknowledging a line".into(),
                ));
            }
            Err(ChannelError::Surface(err)) => {
                surface.close();
                return Err(PrintJobError::Surface(err.to_string()));
            }
        }
    }
    Ok(())
}
