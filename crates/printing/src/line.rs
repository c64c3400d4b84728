use serde::{Deserialize, Serialize};

/// Horizontal placement of a rendered line on the receipt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Optional style attributes carried by a content line.
/// （內容行可附帶的樣式屬性。）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineStyle {
    pub alignment: Alignment,
    pub bold: bool,
    pub font_size: Option<u32>,
}

/// One content unit of a print job. Lines are immutable once submitted and
/// render strictly in the order supplied.
/// （列印作業中的單一內容行，送出後不可變更，並依提交順序渲染。）
///
/// The wire form matches the job description format: a `type` tag plus the
/// type-specific payload, e.g. `{"type": "text", "value": "Hello"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PrintLine {
    Text {
        value: String,
        #[serde(default)]
        style: LineStyle,
    },
    Image {
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        style: LineStyle,
    },
    Table {
        #[serde(default)]
        header: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<String>>,
        #[serde(default)]
        style: LineStyle,
    },
    Barcode {
        value: String,
        #[serde(default)]
        style: LineStyle,
    },
    QrCode {
        value: String,
        #[serde(default)]
        style: LineStyle,
    },
}

impl PrintLine {
    /// Plain text line with default styling.
    pub fn text(value: impl Into<String>) -> Self {
        PrintLine::Text {
            value: value.into(),
            style: LineStyle::default(),
        }
    }

    /// Image line backed by a file on disk.
    pub fn image_path(path: impl Into<String>) -> Self {
        PrintLine::Image {
            path: Some(path.into()),
            url: None,
            style: LineStyle::default(),
        }
    }

    /// Image line fetched from a URL.
    pub fn image_url(url: impl Into<String>) -> Self {
        PrintLine::Image {
            path: None,
            url: Some(url.into()),
            style: LineStyle::default(),
        }
    }

    /// Barcode line encoding `value`.
    pub fn barcode(value: impl Into<String>) -> Self {
        PrintLine::Barcode {
            value: value.into(),
            style: LineStyle::default(),
        }
    }

    /// QR code line encoding `value`.
    pub fn qr_code(value: impl Into<String>) -> Self {
        PrintLine::QrCode {
            value: value.into(),
            style: LineStyle::default(),
        }
    }

    /// Wire name of the line type, as it appears in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            PrintLine::Text { .. } => "text",
            PrintLine::Image { .. } => "image",
            PrintLine::Table { .. } => "table",
            PrintLine::Barcode { .. } => "barcode",
            PrintLine::QrCode { .. } => "qrCode",
        }
    }

    /// True for an image line that names neither a path nor a URL. The
    /// driver checks this before any message is sent for the line.
    pub fn missing_image_source(&self) -> bool {
        matches!(
            self,
            PrintLine::Image {
                path: None,
                url: None,
                ..
            }
        )
    }
}
