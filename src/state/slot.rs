//! Image slots — one named upload position and its derived preview data.
//!
//! DESIGN
//! ======
//! Fields are private and change only through the transitions below, so
//! the slot invariants always hold:
//! - no raw image implies no preview URL, no mask preview, not accepted
//! - `mask_accepted` implies a mask preview is present
//!
//! Every `select` and `remove` bumps `selection_token`. A preview request
//! carries the token it was issued under; its completion is applied only
//! while that token is still the slot's pending one.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::inference::types::{ImageFile, MaskPreviewData};

const MIB: u64 = 1024 * 1024;

#[cfg(test)]
#[path = "slot_test.rs"]
mod tests;

// =============================================================================
// SLOT KEY
// =============================================================================

/// Named upload positions. Both are required for analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKey {
    Front,
    Side,
}

impl SlotKey {
    /// Slots that must hold an image before submission, in display order.
    pub const REQUIRED: [SlotKey; 2] = [SlotKey::Front, SlotKey::Side];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Side => "side",
        }
    }

    /// Multipart field name used by the analysis endpoint.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Front => "front_image",
            Self::Side => "side_image",
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front" => Ok(Self::Front),
            "side" => Ok(Self::Side),
            other => Err(format!("unknown slot '{other}' (expected 'front' or 'side')")),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Local rejection of a selected file. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please upload a valid image file")]
    InvalidType { media_type: String },
    #[error("Image size must be less than {limit_mb}MB", limit_mb = .limit / MIB)]
    TooLarge { size: u64, limit: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("no preview awaiting a decision for the {0} image")]
    NoPendingPreview(SlotKey),
}

/// Check a file against the media-type and size rules.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidType`] for non-image media types and
/// [`ValidationError::TooLarge`] when the file exceeds `max_bytes`.
pub fn validate_image(file: &ImageFile, max_bytes: u64) -> Result<(), ValidationError> {
    if !file.media_type.to_ascii_lowercase().starts_with("image/") {
        return Err(ValidationError::InvalidType { media_type: file.media_type.clone() });
    }
    if file.size() > max_bytes {
        return Err(ValidationError::TooLarge { size: file.size(), limit: max_bytes });
    }
    Ok(())
}

// =============================================================================
// PREVIEW TOKENS
// =============================================================================

/// Identifies one preview request: the slot and the selection it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewTicket {
    pub slot: SlotKey,
    pub token: u64,
}

/// What happened when a preview request resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The mask preview was attached and now awaits accept/retry.
    Attached,
    /// Generation failed; the slot keeps its image without a mask.
    Failed,
    /// The slot moved on (new selection, removal, reset); result dropped.
    Stale,
}

// =============================================================================
// IMAGE SLOT
// =============================================================================

#[derive(Clone, Debug)]
pub struct ImageSlot {
    key: SlotKey,
    raw_image: Option<ImageFile>,
    mask_preview: Option<MaskPreviewData>,
    mask_accepted: bool,
    selection_token: u64,
    pending_preview: Option<u64>,
}

impl ImageSlot {
    #[must_use]
    pub fn new(key: SlotKey) -> Self {
        Self {
            key,
            raw_image: None,
            mask_preview: None,
            mask_accepted: false,
            selection_token: 0,
            pending_preview: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> SlotKey {
        self.key
    }

    #[must_use]
    pub fn raw_image(&self) -> Option<&ImageFile> {
        self.raw_image.as_ref()
    }

    /// `data:` URL of the selected image for display, built on demand so
    /// it never outlives the raw image.
    #[must_use]
    pub fn preview_url(&self) -> Option<String> {
        self.raw_image
            .as_ref()
            .map(|image| format!("data:{};base64,{}", image.media_type, STANDARD.encode(&image.bytes)))
    }

    #[must_use]
    pub fn mask_preview(&self) -> Option<&MaskPreviewData> {
        self.mask_preview.as_ref()
    }

    #[must_use]
    pub fn mask_accepted(&self) -> bool {
        self.mask_accepted
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.raw_image.is_some()
    }

    /// True while a preview request for the current selection is outstanding.
    #[must_use]
    pub fn preview_pending(&self) -> bool {
        self.pending_preview.is_some()
    }

    /// True when a generated preview waits for the user's accept/retry.
    #[must_use]
    pub fn awaiting_decision(&self) -> bool {
        self.mask_preview.is_some() && !self.mask_accepted
    }

    /// Attach a new image, replacing everything derived from the old one.
    ///
    /// On rejection the slot is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the file is not an acceptable image.
    pub fn select(&mut self, file: ImageFile, max_bytes: u64) -> Result<PreviewTicket, ValidationError> {
        validate_image(&file, max_bytes)?;
        self.selection_token += 1;
        let token = self.selection_token;
        self.raw_image = Some(file);
        self.mask_preview = None;
        self.mask_accepted = false;
        self.pending_preview = Some(token);
        Ok(PreviewTicket { slot: self.key, token })
    }

    /// Clear the slot. Any outstanding preview request becomes stale.
    pub fn remove(&mut self) {
        self.selection_token += 1;
        self.raw_image = None;
        self.mask_preview = None;
        self.mask_accepted = false;
        self.pending_preview = None;
    }

    /// Whether `ticket` is still the slot's outstanding preview request.
    #[must_use]
    pub fn is_current(&self, ticket: PreviewTicket) -> bool {
        ticket.slot == self.key && self.pending_preview == Some(ticket.token)
    }

    /// Apply a resolved preview request. `None` means generation failed.
    pub fn complete_preview(&mut self, ticket: PreviewTicket, preview: Option<MaskPreviewData>) -> PreviewOutcome {
        if !self.is_current(ticket) {
            return PreviewOutcome::Stale;
        }
        self.pending_preview = None;
        match preview {
            Some(data) => {
                self.mask_preview = Some(data);
                PreviewOutcome::Attached
            }
            None => PreviewOutcome::Failed,
        }
    }

    /// Keep the generated preview.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::NoPendingPreview`] unless a preview awaits a decision.
    pub fn accept_preview(&mut self) -> Result<(), SlotError> {
        if !self.awaiting_decision() {
            return Err(SlotError::NoPendingPreview(self.key));
        }
        self.mask_accepted = true;
        Ok(())
    }

    /// Reject the generated preview; the slot empties so the user re-selects.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::NoPendingPreview`] unless a preview awaits a decision.
    pub fn retry_preview(&mut self) -> Result<(), SlotError> {
        if !self.awaiting_decision() {
            return Err(SlotError::NoPendingPreview(self.key));
        }
        self.remove();
        Ok(())
    }
}
