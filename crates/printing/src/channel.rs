//! Request/reply primitive layered on the surface's fire-and-forget send
//! plus a one-shot listener per reply channel.
//! （建立在渲染表面「送出即忘」訊息之上的請求／回覆原語，每個回覆通道只註冊一次性監聽器。）

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use thiserror::Error;

use crate::surface::{Surface, SurfaceError, SurfaceHandle};
use crate::watchdog::{WaitError, Watchdog};

/// Channel carrying the job-wide initialization message.
pub const BODY_INIT: &str = "body-init";
/// Channel carrying one content line per message.
pub const RENDER_LINE: &str = "render-line";

/// Correlation id scoping one request/reply exchange. Ids are process-unique
/// so two concurrent jobs can never observe each other's replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Message posted into the surface's execution context.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub request: RequestId,
    pub body: Value,
}

/// Reply observed on a `{channel}-reply` listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReply {
    pub request: RequestId,
    pub status: bool,
    pub error: Option<String>,
}

impl ChannelReply {
    pub fn ok(request: RequestId) -> Self {
        Self {
            request,
            status: true,
            error: None,
        }
    }

    pub fn failed(request: RequestId, error: impl Into<String>) -> Self {
        Self {
            request,
            status: false,
            error: Some(error.into()),
        }
    }
}

/// Name of the reply channel paired with `channel`.
pub fn reply_channel(channel: &str) -> String {
    format!("{channel}-reply")
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// The surface answered with `status: false`.
    #[error("{0}")]
    Rejected(String),
    /// The watchdog deadline elapsed before the reply arrived.
    #[error("reply deadline elapsed")]
    Deadline,
    /// The surface's execution context went away before replying.
    #[error("rendering surface closed before replying")]
    Disconnected,
}

/// Sends `body` on `channel` and waits for the matching reply.
///
/// The one-shot listener is registered before the send, so a reply can never
/// be lost to a race. At most one request is outstanding per call; the
/// listener is consumed on first matching reply and not reinstated.
pub fn request<S: Surface>(
    surface: &mut SurfaceHandle<S>,
    channel: &str,
    body: Value,
    watchdog: &Watchdog,
) -> Result<ChannelReply, ChannelError> {
    let request = RequestId::next();
    let replies = surface.listen_once(&reply_channel(channel), request)?;
    surface.post(channel, ChannelMessage { request, body })?;

    loop {
        match watchdog.wait_on(&replies) {
            Ok(reply) if reply.request == request => {
                if reply.status {
                    return Ok(reply);
                }
                let reason = reply
                    .error
                    .unwrap_or_else(|| format!("surface rejected {channel}"));
                return Err(ChannelError::Rejected(reason));
            }
            // A reply correlated to some other exchange; keep the listener
            // alive for ours.
            Ok(_) => continue,
            Err(WaitError::Expired) => return Err(ChannelError::Deadline),
            Err(WaitError::Disconnected) => {
                surface.mark_closed();
                return Err(ChannelError::Disconnected);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};

    struct CannedSurface {
        replies: Vec<ChannelReply>,
        posted: Vec<(String, RequestId)>,
        pending: Option<mpsc::Sender<ChannelReply>>,
    }

    impl CannedSurface {
        fn new(replies: Vec<ChannelReply>) -> Self {
            Self {
                replies,
                posted: Vec::new(),
                pending: None,
            }
        }
    }

    impl Surface for CannedSurface {
        type Error = SurfaceError;

        fn load_document(&mut self) -> Result<Receiver<()>, Self::Error> {
            let (tx, rx) = mpsc::channel();
            tx.send(()).unwrap();
            Ok(rx)
        }

        fn listen_once(
            &mut self,
            _channel: &str,
            _request: RequestId,
        ) -> Result<Receiver<ChannelReply>, Self::Error> {
            let (tx, rx) = mpsc::channel();
            self.pending = Some(tx);
            Ok(rx)
        }

        fn post(&mut self, channel: &str, message: ChannelMessage) -> Result<(), Self::Error> {
            self.posted.push((channel.to_string(), message.request));
            let sender = self.pending.take().expect("listener registered first");
            for mut reply in self.replies.drain(..) {
                if reply.request == RequestId(0) {
                    reply.request = message.request;
                }
                let _ = sender.send(reply);
            }
            Ok(())
        }

        fn close(&mut self) {}
    }

    // Placeholder id rewritten to the real one by the canned surface.
    fn for_current_request() -> RequestId {
        RequestId(0)
    }

    #[test]
    fn reply_channel_name() {
        assert_eq!(reply_channel("render-line"), "render-line-reply");
    }

    #[test]
    fn resolves_matching_ok_reply() {
        let surface = CannedSurface::new(vec![ChannelReply::ok(for_current_request())]);
        let mut handle = SurfaceHandle::new(surface);
        let reply = request(
            &mut handle,
            RENDER_LINE,
            Value::Null,
            &Watchdog::unarmed(),
        )
        .unwrap();
        assert!(reply.status);
    }

    #[test]
    fn rejects_false_status_with_cause() {
        let surface = CannedSurface::new(vec![ChannelReply::failed(
            for_current_request(),
            "bad line",
        )]);
        let mut handle = SurfaceHandle::new(surface);
        let err = request(
            &mut handle,
            RENDER_LINE,
            Value::Null,
            &Watchdog::unarmed(),
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(reason) if reason == "bad line"));
    }

    #[test]
    fn skips_replies_for_other_requests() {
        let stray = ChannelReply::ok(RequestId(u64::MAX));
        let surface = CannedSurface::new(vec![stray, ChannelReply::ok(for_current_request())]);
        let mut handle = SurfaceHandle::new(surface);
        let reply = request(
            &mut handle,
            BODY_INIT,
            Value::Null,
            &Watchdog::unarmed(),
        )
        .unwrap();
        assert!(reply.status);
    }

    #[test]
    fn disconnect_marks_surface_closed() {
        // No reply is ever produced and the sender is dropped immediately.
        let surface = CannedSurface::new(vec![]);
        let mut handle = SurfaceHandle::new(surface);
        let err = request(
            &mut handle,
            RENDER_LINE,
            Value::Null,
            &Watchdog::unarmed(),
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::Disconnected));
        assert!(!handle.is_open());
    }
}
