//! Status presenter - pure mapping from recognizer status to a user-facing
//! icon and message, plus the status-line rendering for the console.

use crate::recognizer::Status;
use unicode_width::UnicodeWidthStr;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    pub icon: &'static str,
    pub message: &'static str,
}

/// Pure function of state; recomputed on every redraw.
pub fn present(status: Status) -> StatusLine {
    match status {
        Status::Setup => StatusLine {
            icon: "🎤",
            message: "Press Ctrl-S and speak, or type your text.",
        },
        Status::Listening => StatusLine {
            icon: "🎙",
            message: "Speak now... or press Ctrl-S again to cancel.",
        },
        Status::Processing => StatusLine {
            icon: "⏳",
            message: "Processing your voice...",
        },
        Status::Blocked => StatusLine {
            icon: "⛔",
            message: "Permission to use the microphone is blocked. Check your audio settings.",
        },
        Status::Denied => StatusLine {
            icon: "🚫",
            message: "Permission to use the microphone was denied.",
        },
        Status::NoMic => StatusLine {
            icon: "🔇",
            message: "No microphone was found. Ensure that a microphone is installed.",
        },
        Status::NoSpeech => StatusLine {
            icon: "🤫",
            message: "No speech was detected. You may need to adjust your microphone.",
        },
        Status::Unsupported => StatusLine {
            icon: "✗",
            message: "Speech capture is unavailable in this build. Type your text instead.",
        },
    }
}

/// Renders the one-line status bar. Pure string building - the console
/// decides when to draw it.
#[derive(Default)]
pub struct StatusBar {
    spin_frame: usize,
}

impl StatusBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) {
        self.spin_frame = self.spin_frame.wrapping_add(1);
    }

    fn spinner_string(&self, active: bool) -> String {
        if active {
            format!("\x1b[93m{}\x1b[90m ", SPINNER[self.spin_frame % SPINNER.len()])
        } else {
            String::new()
        }
    }

    pub fn render(
        &self,
        status: Status,
        incremental: bool,
        in_flight: bool,
        term_width: usize,
    ) -> String {
        let line = present(status);
        let spinner = self.spinner_string(in_flight || status == Status::Processing);
        let mode = if incremental {
            "\x1b[92m[INC]\x1b[90m"
        } else {
            "\x1b[90m[---]\x1b[90m"
        };

        let content = format!("{}{} {} │ {}", spinner, line.icon, line.message, mode);

        let width = content.width();
        let padding = if term_width > width {
            (term_width - width) / 2
        } else {
            0
        };
        format!("\x1b[90m{}{}\x1b[0m", " ".repeat(padding), content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_has_icon_and_message() {
        let statuses = [
            Status::Setup,
            Status::Listening,
            Status::Processing,
            Status::Blocked,
            Status::Denied,
            Status::NoMic,
            Status::NoSpeech,
            Status::Unsupported,
        ];
        for status in statuses {
            let line = present(status);
            assert!(!line.icon.is_empty());
            assert!(!line.message.is_empty());
        }
    }

    #[test]
    fn test_presenter_is_pure() {
        assert_eq!(present(Status::Blocked), present(Status::Blocked));
    }

    #[test]
    fn test_render_mentions_incremental_mode() {
        let bar = StatusBar::new();
        assert!(bar.render(Status::Setup, true, false, 0).contains("[INC]"));
        assert!(!bar.render(Status::Setup, false, false, 0).contains("[INC]"));
    }
}
