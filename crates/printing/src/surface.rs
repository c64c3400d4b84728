//! The rendering surface boundary: an isolated document-hosting execution
//! context reached only through named messages, never shared memory.
//! （渲染表面邊界：僅能透過具名訊息存取的獨立文件執行環境，不共用記憶體。）

use std::fmt;
use std::sync::mpsc::Receiver;

use thiserror::Error;

use crate::channel::{ChannelMessage, ChannelReply, RequestId};
use crate::job::PageDimensions;

/// Sizing and visibility for a new rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub size: PageDimensions,
    pub visible: bool,
}

/// Host capability that creates rendering surfaces.
pub trait SurfaceHost {
    type Error: fmt::Display;
    type Surface: Surface;

    fn create(&self, request: SurfaceRequest) -> Result<Self::Surface, Self::Error>;
}

/// One host-provided document-hosting surface.
///
/// All receivers disconnect when the surface's execution context goes away;
/// that disconnect is the host's "closed" notification.
pub trait Surface {
    type Error: fmt::Display;

    /// Loads the fixed print document. The returned receiver yields one
    /// value when the document is ready.
    fn load_document(&mut self) -> Result<Receiver<()>, Self::Error>;

    /// Registers a one-shot listener for replies on `channel` correlated to
    /// `request`. Must be called before the matching `post`.
    fn listen_once(
        &mut self,
        channel: &str,
        request: RequestId,
    ) -> Result<Receiver<ChannelReply>, Self::Error>;

    /// Fire-and-forget send into the surface's execution context.
    fn post(&mut self, channel: &str, message: ChannelMessage) -> Result<(), Self::Error>;

    /// Closes the surface. Must tolerate repeated calls.
    fn close(&mut self);
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// Operation on a surface that is already closed or was never created.
    #[error("rendering surface is closed")]
    Closed,
    #[error("rendering surface failed: {0}")]
    Host(String),
}

/// Thin ownership wrapper around a host surface.
///
/// The handle nulls its inner reference on close (or when the host reports
/// the surface gone), so later erroneous operations fail fast with
/// [`SurfaceError::Closed`] instead of touching a stale resource. `close`
/// is idempotent and the drop guard releases the surface on any exit path.
pub struct SurfaceHandle<S: Surface> {
    inner: Option<S>,
}

impl<S: Surface> SurfaceHandle<S> {
    pub fn new(surface: S) -> Self {
        Self {
            inner: Some(surface),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn load_document(&mut self) -> Result<Receiver<()>, SurfaceError> {
        self.open()?
            .load_document()
            .map_err(|err| SurfaceError::Host(err.to_string()))
    }

    pub fn listen_once(
        &mut self,
        channel: &str,
        request: RequestId,
    ) -> Result<Receiver<ChannelReply>, SurfaceError> {
        self.open()?
            .listen_once(channel, request)
            .map_err(|err| SurfaceError::Host(err.to_string()))
    }

    pub fn post(&mut self, channel: &str, message: ChannelMessage) -> Result<(), SurfaceError> {
        self.open()?
            .post(channel, message)
            .map_err(|err| SurfaceError::Host(err.to_string()))
    }

    /// Closes the underlying surface if it is still owned; later calls are
    /// no-ops.
    pub fn close(&mut self) {
        if let Some(mut surface) = self.inner.take() {
            surface.close();
        }
    }

    /// Drops the inner reference without a close call, for when the host
    /// already reported the surface gone.
    pub fn mark_closed(&mut self) {
        self.inner = None;
    }

    fn open(&mut self) -> Result<&mut S, SurfaceError> {
        self.inner.as_mut().ok_or(SurfaceError::Closed)
    }
}

impl<S: Surface> Drop for SurfaceHandle<S> {
    fn drop(&mut self) {
        self.close();
    }
}
