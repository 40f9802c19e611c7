use serde::{Deserialize, Serialize};

/// Snapshot of the desktop captured by the vision layer before planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenState {
    pub active_window: Option<String>,
    /// Cursor position in physical pixels.
    pub mouse_position: (i32, i32),
    /// Primary monitor size in physical pixels (width, height).
    pub screen_size: (u32, u32),
}

impl ScreenState {
    /// One-line-per-field text used inside the planning prompt.
    pub fn summary(&self) -> String {
        let window = self
            .active_window
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .unwrap_or("none");
        format!(
            "Active window: {window}\nMouse position: ({}, {})\nScreen size: {}x{}",
            self.mouse_position.0, self.mouse_position.1, self.screen_size.0, self.screen_size.1
        )
    }
}

/// Scene description produced by the vision layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionInfo {
    pub description: String,
    /// Raw PNG bytes; forwarded to the model as an image when present.
    #[serde(skip)]
    pub screenshot_png: Option<Vec<u8>>,
}

impl VisionInfo {
    pub fn from_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            screenshot_png: None,
        }
    }

    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot_png = Some(png);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_window_mouse_and_screen() {
        let state = ScreenState {
            active_window: Some("Untitled - Paint".into()),
            mouse_position: (640, 360),
            screen_size: (1920, 1080),
        };
        let summary = state.summary();
        assert!(summary.contains("Active window: Untitled - Paint"));
        assert!(summary.contains("Mouse position: (640, 360)"));
        assert!(summary.contains("Screen size: 1920x1080"));
    }

    #[test]
    fn blank_window_title_reads_as_none() {
        let state = ScreenState {
            active_window: Some("  ".into()),
            ..ScreenState::default()
        };
        assert!(state.summary().starts_with("Active window: none"));
    }
}
