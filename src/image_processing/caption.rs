use super::metadata::PhotoMetadata;

/// Longest caption that stays legible when burned at the default font size
pub const DEFAULT_MAX_CAPTION_LEN: usize = 148;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionOptions {
    /// Used for every photo, ahead of any embedded caption
    pub override_caption: Option<String>,
    /// Used when the photo has no caption of its own
    pub default_caption: String,
    pub date_in_caption: bool,
    pub max_len: usize,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self {
            override_caption: None,
            default_caption: String::new(),
            date_in_caption: true,
            max_len: DEFAULT_MAX_CAPTION_LEN,
        }
    }
}

/// Caption in its catalog form and in its burned-in form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedCaption {
    /// Never truncated
    pub full: String,
    /// At most `max_len` characters
    pub burned: String,
}

impl ComposedCaption {
    pub fn is_truncated(&self) -> bool {
        self.full != self.burned
    }
}

pub struct CaptionComposer {
    options: CaptionOptions,
}

impl CaptionComposer {
    pub fn new(options: CaptionOptions) -> Self {
        Self { options }
    }

    pub fn compose(&self, metadata: &PhotoMetadata) -> ComposedCaption {
        let base = self
            .options
            .override_caption
            .as_deref()
            .or(metadata.embedded_caption.as_deref())
            .unwrap_or(&self.options.default_caption);

        let full = match metadata.capture_timestamp {
            Some(timestamp) if self.options.date_in_caption => {
                if base.is_empty() {
                    timestamp.format("%a %m/%d/%Y %H:%M:%S").to_string()
                } else {
                    format!("{}: {}", timestamp.format("%m/%d/%y"), base)
                }
            }
            _ => base.to_string(),
        };

        let burned = truncate_caption(&full, self.options.max_len);
        ComposedCaption { full, burned }
    }
}

/// Cut `caption` to `max_len` characters, the last three being an ellipsis
pub fn truncate_caption(caption: &str, max_len: usize) -> String {
    if caption.chars().count() <= max_len {
        return caption.to_string();
    }

    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = caption.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
