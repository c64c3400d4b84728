//! In-process rendering surface host: each surface runs on its own thread
//! and composes the job's lines into a plain-text receipt, standing in for
//! the host window's document logic at the same message boundary.
//! （行程內的渲染表面主機：每個表面各自擁有執行緒，把內容行排版成純文字收據，
//! 以相同的訊息邊界取代宿主視窗的文件邏輯。）

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::backend::{NativePrintOutcome, PrintBackend, PrintTicket};
use crate::channel::{self, ChannelMessage, ChannelReply, RequestId, BODY_INIT, RENDER_LINE};
use crate::job::PrintOptions;
use crate::line::{Alignment, LineStyle, PrintLine};
use crate::surface::{Surface, SurfaceHost, SurfaceRequest};

/// Receipt text produced by a virtual surface once it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReceipt {
    pub lines: Vec<String>,
    pub visible: bool,
}

#[derive(Debug, Error)]
pub enum VirtualHostError {
    #[error("virtual surface thread is gone")]
    Detached,
}

/// Surface host whose finished receipts can be drained afterwards — the
/// "virtual printer" end of a preview job.
#[derive(Clone, Default)]
pub struct VirtualSurfaceHost {
    receipts: Arc<Mutex<Vec<RenderedReceipt>>>,
}

impl VirtualSurfaceHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every receipt finished so far, oldest first.
    pub fn drain_receipts(&self) -> Vec<RenderedReceipt> {
        self.receipts
            .lock()
            .expect("receipt sink poisoned")
            .drain(..)
            .collect()
    }
}

impl SurfaceHost for VirtualSurfaceHost {
    type Error = VirtualHostError;
    type Surface = VirtualSurface;

    fn create(&self, request: SurfaceRequest) -> Result<VirtualSurface, VirtualHostError> {
        let (commands, inbox) = mpsc::channel();
        let sink = self.receipts.clone();
        let worker = thread::spawn(move || document_loop(inbox, request, sink));
        Ok(VirtualSurface {
            commands,
            worker: Some(worker),
        })
    }
}

enum SurfaceCommand {
    LoadDocument { ready: Sender<()> },
    Listen {
        channel: String,
        request: RequestId,
        replies: Sender<ChannelReply>,
    },
    Deliver {
        channel: String,
        message: ChannelMessage,
    },
    Close,
}

/// One thread-backed surface. Dropping it without `close` still ends the
/// worker: the command channel disconnects and the loop exits.
pub struct VirtualSurface {
    commands: Sender<SurfaceCommand>,
    worker: Option<JoinHandle<()>>,
}

impl Surface for VirtualSurface {
    type Error = VirtualHostError;

    fn load_document(&mut self) -> Result<Receiver<()>, VirtualHostError> {
        let (ready, ready_rx) = mpsc::channel();
        self.commands
            .send(SurfaceCommand::LoadDocument { ready })
            .map_err(|_| VirtualHostError::Detached)?;
        Ok(ready_rx)
    }

    fn listen_once(
        &mut self,
        channel: &str,
        request: RequestId,
    ) -> Result<Receiver<ChannelReply>, VirtualHostError> {
        let (replies, replies_rx) = mpsc::channel();
        self.commands
            .send(SurfaceCommand::Listen {
                channel: channel.to_string(),
                request,
                replies,
            })
            .map_err(|_| VirtualHostError::Detached)?;
        Ok(replies_rx)
    }

    fn post(&mut self, channel: &str, message: ChannelMessage) -> Result<(), VirtualHostError> {
        self.commands
            .send(SurfaceCommand::Deliver {
                channel: channel.to_string(),
                message,
            })
            .map_err(|_| VirtualHostError::Detached)
    }

    fn close(&mut self) {
        let _ = self.commands.send(SurfaceCommand::Close);
        // Joining makes the finished receipt observable as soon as close
        // returns.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn document_loop(
    inbox: Receiver<SurfaceCommand>,
    request: SurfaceRequest,
    sink: Arc<Mutex<Vec<RenderedReceipt>>>,
) {
    let mut document = ReceiptDocument::new(request.size.width);
    let mut listeners: HashMap<(String, RequestId), Sender<ChannelReply>> = HashMap::new();

    while let Ok(command) = inbox.recv() {
        match command {
            SurfaceCommand::LoadDocument { ready } => {
                let _ = ready.send(());
            }
            SurfaceCommand::Listen {
                channel,
                request,
                replies,
            } => {
                listeners.insert((channel, request), replies);
            }
            SurfaceCommand::Deliver { channel, message } => {
                let reply = document.handle(&channel, &message.body, message.request);
                let key = (channel::reply_channel(&channel), message.request);
                if let Some(replies) = listeners.remove(&key) {
                    let _ = replies.send(reply);
                }
            }
            SurfaceCommand::Close => break,
        }
    }

    sink.lock().expect("receipt sink poisoned").push(RenderedReceipt {
        lines: document.lines,
        visible: request.visible,
    });
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderLinePayload {
    line: PrintLine,
    line_index: usize,
}

/// Plain-text receipt compositor: the virtual surface's document logic.
struct ReceiptDocument {
    columns: usize,
    options: Option<PrintOptions>,
    lines: Vec<String>,
}

impl ReceiptDocument {
    fn new(width: u32) -> Self {
        // Roughly 7 device units per character cell on a thermal head.
        Self {
            columns: (width as usize / 7).clamp(20, 64),
            options: None,
            lines: Vec::new(),
        }
    }

    fn handle(&mut self, channel: &str, body: &Value, request: RequestId) -> ChannelReply {
        match channel {
            BODY_INIT => match serde_json::from_value::<PrintOptions>(body.clone()) {
                Ok(options) => {
                    self.options = Some(options);
                    ChannelReply::ok(request)
                }
                Err(err) => ChannelReply::failed(request, format!("invalid print options: {err}")),
            },
            RENDER_LINE => match serde_json::from_value::<RenderLinePayload>(body.clone()) {
                Ok(payload) => self.render(payload.line, payload.line_index, request),
                Err(err) => ChannelReply::failed(request, format!("invalid line payload: {err}")),
            },
            other => ChannelReply::failed(request, format!("unknown channel {other}")),
        }
    }

    fn render(&mut self, line: PrintLine, index: usize, request: RequestId) -> ChannelReply {
        match line {
            PrintLine::Text { value, style } => {
                for part in value.split('\n') {
                    self.push_aligned(part, &style);
                }
            }
            PrintLine::Image { path, url, style } => {
                if let Some(path) = path {
                    if !Path::new(&path).exists() {
                        return ChannelReply::failed(
                            request,
                            format!("line {index}: image not found: {path}"),
                        );
                    }
                    self.push_aligned(&format!("[image {path}]"), &style);
                } else if let Some(url) = url {
                    self.push_aligned(&format!("[image {url}]"), &style);
                } else {
                    return ChannelReply::failed(
                        request,
                        format!("line {index}: an image path or url is required"),
                    );
                }
            }
            PrintLine::Table {
                header,
                rows,
                style,
            } => {
                if !header.is_empty() {
                    self.push_aligned(&header.join(" | "), &style);
                    self.lines.push("-".repeat(self.columns));
                }
                for row in rows {
                    self.push_aligned(&row.join(" | "), &style);
                }
            }
            PrintLine::Barcode { value, style } => {
                self.push_aligned(&format!("*{value}*"), &style);
            }
            PrintLine::QrCode { value, style } => {
                self.push_aligned(&format!("[qr] {value}"), &style);
            }
        }
        ChannelReply::ok(request)
    }

    fn push_aligned(&mut self, text: &str, style: &LineStyle) {
        let width = self.columns;
        let len = text.chars().count();
        let line = if len >= width {
            text.to_string()
        } else {
            match style.alignment {
                Alignment::Left => text.to_string(),
                Alignment::Center => {
                    let pad = (width - len) / 2;
                    format!("{}{}", " ".repeat(pad), text)
                }
                Alignment::Right => format!("{}{}", " ".repeat(width - len), text),
            }
        };
        self.lines.push(line);
    }
}

/// Backend that accepts every ticket and records it — a spool that prints
/// nowhere.
#[derive(Clone, Default)]
pub struct VirtualPrintBackend {
    tickets: Arc<Mutex<Vec<PrintTicket>>>,
}

impl VirtualPrintBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<PrintTicket> {
        self.tickets.lock().expect("ticket sink poisoned").clone()
    }
}

impl PrintBackend for VirtualPrintBackend {
    type Error = VirtualHostError;

    fn submit(
        &self,
        ticket: PrintTicket,
        done: Sender<NativePrintOutcome>,
    ) -> Result<(), VirtualHostError> {
        self.tickets
            .lock()
            .expect("ticket sink poisoned")
            .push(ticket);
        let _ = done.send(NativePrintOutcome::accepted());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PageDimensions;
    use crate::surface::SurfaceHandle;
    use crate::watchdog::Watchdog;
    use serde_json::json;

    fn open_surface(host: &VirtualSurfaceHost) -> SurfaceHandle<VirtualSurface> {
        let surface = host
            .create(SurfaceRequest {
                size: PageDimensions {
                    width: 220,
                    height: 1200,
                },
                visible: false,
            })
            .expect("create virtual surface");
        SurfaceHandle::new(surface)
    }

    #[test]
    fn init_then_render_produces_receipt_lines() {
        let host = VirtualSurfaceHost::new();
        let mut surface = open_surface(&host);
        let watchdog = Watchdog::unarmed();

        let ready = surface.load_document().unwrap();
        watchdog.wait_on(&ready).unwrap();

        channel::request(
            &mut surface,
            BODY_INIT,
            json!(PrintOptions::for_preview()),
            &watchdog,
        )
        .unwrap();

        let body = json!({ "line": PrintLine::text("Hello"), "lineIndex": 0 });
        channel::request(&mut surface, RENDER_LINE, body, &watchdog).unwrap();
        surface.close();

        let receipts = host.drain_receipts();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].lines, vec!["Hello".to_string()]);
    }

    #[test]
    fn missing_image_file_is_a_failed_line_render() {
        let host = VirtualSurfaceHost::new();
        let mut surface = open_surface(&host);
        let watchdog = Watchdog::unarmed();
        watchdog.wait_on(&surface.load_document().unwrap()).unwrap();

        let body = json!({
            "line": PrintLine::image_path("/definitely/not/here.png"),
            "lineIndex": 3,
        });
        let err = channel::request(&mut surface, RENDER_LINE, body, &watchdog).unwrap_err();
        match err {
            crate::channel::ChannelError::Rejected(reason) => {
                assert!(reason.contains("line 3"), "reason: {reason}");
                assert!(reason.contains("image not found"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn alignment_pads_within_column_budget() {
        let mut document = ReceiptDocument::new(220);
        let centered = LineStyle {
            alignment: Alignment::Center,
            ..Default::default()
        };
        document.push_aligned("TOTAL", &centered);
        let right = LineStyle {
            alignment: Alignment::Right,
            ..Default::default()
        };
        document.push_aligned("9.99", &right);

        // 220 / 7 → 31 columns.
        assert_eq!(document.lines[0], format!("{}TOTAL", " ".repeat(13)));
        assert_eq!(document.lines[1], format!("{}9.99", " ".repeat(27)));
    }

    #[test]
    fn table_renders_header_rule_and_rows() {
        let mut document = ReceiptDocument::new(220);
        let reply = document.render(
            PrintLine::Table {
                header: vec!["item".into(), "qty".into()],
                rows: vec![vec!["espresso".into(), "2".into()]],
                style: LineStyle::default(),
            },
            0,
            RequestId::next(),
        );
        assert!(reply.status);
        assert_eq!(document.lines[0], "item | qty");
        assert!(document.lines[1].starts_with('-'));
        assert_eq!(document.lines[2], "espresso | 2");
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let mut document = ReceiptDocument::new(220);
        let reply = document.handle("mystery", &Value::Null, RequestId::next());
        assert!(!reply.status);
        assert!(reply.error.unwrap().contains("unknown channel"));
    }
}
