//! Files carried alongside a message: donation receipts, event flyers,
//! inline logos.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Upper bound on the combined size of a message's attachments.
///
/// SendGrid refuses anything larger, and most relays cap well below it.
pub const MAX_ATTACHMENT_BYTES: usize = 30 * 1024 * 1024;

/// How a mail client should present the file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// Offered as a download.
    #[default]
    Attached,
    /// Embedded in the HTML body as `<img src="cid:...">`.
    Inline { content_id: String },
}

/// A file held in memory.
///
/// ```
/// use outreach::Attachment;
///
/// let receipt = Attachment::new("receipt-2026-0042.pdf", b"%PDF".to_vec());
/// assert_eq!(receipt.mime, "application/pdf");
///
/// let logo = Attachment::inline("logo", "logo.png", vec![0x89, 0x50]);
/// assert_eq!(logo.content_id(), Some("logo"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// Guessed from the filename unless overridden with [`Attachment::with_mime`].
    pub mime: String,
    pub bytes: Vec<u8>,
    pub disposition: Disposition,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            filename,
            mime,
            bytes,
            disposition: Disposition::Attached,
        }
    }

    /// An image or other part referenced from the HTML body by `content_id`.
    pub fn inline(content_id: impl Into<String>, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            disposition: Disposition::Inline {
                content_id: content_id.into(),
            },
            ..Self::new(filename, bytes)
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn content_id(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::Inline { content_id } => Some(content_id),
            Disposition::Attached => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.content_id().is_some()
    }

    /// Standard-alphabet base64, as HTTP mail APIs expect.
    pub fn encoded(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Combined size of a set of attachments.
pub fn total_size(attachments: &[Attachment]) -> usize {
    attachments.iter().map(Attachment::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_guessed_from_filename() {
        let flyer = Attachment::new("spring-drive.pdf", b"%PDF-1.7".to_vec());
        assert_eq!(flyer.mime, "application/pdf");
        assert_eq!(flyer.disposition, Disposition::Attached);
        assert_eq!(flyer.content_id(), None);

        let notes = Attachment::new("notes.txt", b"hi".to_vec());
        assert_eq!(notes.mime, "text/plain");

        let unknown = Attachment::new("export.zzq_unknown", vec![]);
        assert_eq!(unknown.mime, "application/octet-stream");
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_inline_carries_content_id() {
        let logo = Attachment::inline("brand", "logo.png", vec![1, 2, 3]);
        assert!(logo.is_inline());
        assert_eq!(logo.content_id(), Some("brand"));
        assert_eq!(logo.mime, "image/png");
        assert_eq!(logo.len(), 3);
    }

    #[test]
    fn test_mime_override() {
        let csv = Attachment::new("donations", b"a,b".to_vec()).with_mime("text/csv");
        assert_eq!(csv.mime, "text/csv");
    }

    #[test]
    fn test_encoded() {
        assert_eq!(Attachment::new("a.txt", b"Gift".to_vec()).encoded(), "R2lmdA==");
    }

    #[test]
    fn test_total_size() {
        let files = [
            Attachment::new("a.txt", vec![0; 10]),
            Attachment::inline("logo", "logo.png", vec![0; 5]),
        ];
        assert_eq!(total_size(&files), 15);
        assert_eq!(total_size(&[]), 0);
    }
}
