//! Hand-off link generation for the capture surface.
//!
//! The session token rides as a query parameter on a page URL; the QR
//! payload is the same URL as bytes. No protocol novelty here.

/// Builds shareable capture links from configured page URLs.
#[derive(Debug, Clone)]
pub struct HandoffChannel {
    capture_page_url: String,
    multi_capture_page_url: String,
}

impl HandoffChannel {
    /// Create a channel from the configured capture page URLs.
    #[must_use]
    pub fn new(capture_page_url: String, multi_capture_page_url: String) -> Self {
        Self {
            capture_page_url,
            multi_capture_page_url,
        }
    }

    /// Shareable URL for a single-student session token.
    #[must_use]
    pub fn share_url(&self, token: &str) -> String {
        format!("{}?token={token}", self.capture_page_url)
    }

    /// Shareable URL for a roster token.
    #[must_use]
    pub fn roster_share_url(&self, token: &str) -> String {
        format!("{}?token={token}", self.multi_capture_page_url)
    }

    /// QR payload for a single-student token: the share URL as bytes.
    #[must_use]
    pub fn qr_payload(&self, token: &str) -> Vec<u8> {
        self.share_url(token).into_bytes()
    }

    /// QR payload for a roster token.
    #[must_use]
    pub fn roster_qr_payload(&self, token: &str) -> Vec<u8> {
        self.roster_share_url(token).into_bytes()
    }
}
