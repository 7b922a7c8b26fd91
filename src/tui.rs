//! Raw-mode console: input line editing, live interim preview, status bar,
//! and a scrolling pane for parse results.

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute, queue};
use serde_json::Value;
use std::io::{self, Write, stdout};
use unicode_width::UnicodeWidthStr;

/// What the user asked for since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// The input line changed; carries the new content (keystroke hook)
    Edited(String),
    /// Enter pressed - submit the line as final
    Submit(String),
    ToggleSpeech,
    ToggleIncremental,
    Quit,
}

pub struct Console {
    input: String,
    cursor_pos: usize,
    preview: String,
    status_drawn: bool,
}

impl Console {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), cursor::Hide)?;
        Ok(Self {
            input: String::new(),
            cursor_pos: 0,
            preview: String::new(),
            status_drawn: false,
        })
    }

    pub fn restore(&self) -> io::Result<()> {
        execute!(stdout(), cursor::Show, cursor::MoveToColumn(0))?;
        terminal::disable_raw_mode()?;
        println!();
        Ok(())
    }

    pub fn term_width(&self) -> usize {
        terminal::size().map(|(w, _)| w as usize).unwrap_or(80)
    }

    pub fn set_preview(&mut self, text: &str) {
        self.preview = text.to_string();
    }

    pub fn clear_preview(&mut self) {
        self.preview.clear();
    }

    /// Replace the input line (recognized text lands here so the user can
    /// edit and resubmit it).
    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor_pos = self.char_count();
    }

    /// Drain pending key events. Non-blocking; called from the tick arm of
    /// the event loop.
    pub fn poll_input(&mut self) -> io::Result<Vec<InputEvent>> {
        let mut out = Vec::new();

        while event::poll(std::time::Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    match key.code {
                        KeyCode::Char('c') => out.push(InputEvent::Quit),
                        KeyCode::Char('s') => out.push(InputEvent::ToggleSpeech),
                        KeyCode::Char('t') => out.push(InputEvent::ToggleIncremental),
                        KeyCode::Char('a') => self.cursor_pos = 0,
                        KeyCode::Char('e') => self.cursor_pos = self.char_count(),
                        KeyCode::Char('k') => {
                            let byte_pos = self.char_to_byte_index(self.cursor_pos);
                            self.input.truncate(byte_pos);
                            out.push(InputEvent::Edited(self.input.clone()));
                        }
                        KeyCode::Char('u') => {
                            let byte_pos = self.char_to_byte_index(self.cursor_pos);
                            self.input = self.input[byte_pos..].to_string();
                            self.cursor_pos = 0;
                            out.push(InputEvent::Edited(self.input.clone()));
                        }
                        _ => {}
                    }
                    continue;
                }

                match key.code {
                    KeyCode::Esc => out.push(InputEvent::Quit),
                    KeyCode::Enter => {
                        let text = self.input.trim().to_string();
                        self.input.clear();
                        self.cursor_pos = 0;
                        if !text.is_empty() {
                            out.push(InputEvent::Submit(text));
                        }
                    }
                    KeyCode::Char(c) => {
                        let byte_pos = self.char_to_byte_index(self.cursor_pos);
                        self.input.insert(byte_pos, c);
                        self.cursor_pos += 1;
                        out.push(InputEvent::Edited(self.input.clone()));
                    }
                    KeyCode::Backspace if self.cursor_pos > 0 => {
                        self.cursor_pos -= 1;
                        let byte_pos = self.char_to_byte_index(self.cursor_pos);
                        self.input.remove(byte_pos);
                        out.push(InputEvent::Edited(self.input.clone()));
                    }
                    KeyCode::Delete if self.cursor_pos < self.char_count() => {
                        let byte_pos = self.char_to_byte_index(self.cursor_pos);
                        self.input.remove(byte_pos);
                        out.push(InputEvent::Edited(self.input.clone()));
                    }
                    KeyCode::Left => self.cursor_pos = self.cursor_pos.saturating_sub(1),
                    KeyCode::Right if self.cursor_pos < self.char_count() => self.cursor_pos += 1,
                    KeyCode::Home => self.cursor_pos = 0,
                    KeyCode::End => self.cursor_pos = self.char_count(),
                    _ => {}
                }
            }
        }

        Ok(out)
    }

    /// Print scrolling content above the status block.
    fn print_content(&mut self, text: &str) -> io::Result<()> {
        let mut out = stdout();
        if self.status_drawn {
            queue!(out, cursor::MoveUp(1), cursor::MoveToColumn(0))?;
            queue!(out, terminal::Clear(ClearType::FromCursorDown))?;
        }
        for line in text.lines() {
            queue!(
                out,
                crossterm::style::Print(line),
                crossterm::style::Print("\r\n")
            )?;
        }
        out.flush()?;
        self.status_drawn = false;
        Ok(())
    }

    /// Echo a submitted line into the scrollback.
    pub fn show_submitted(&mut self, text: &str) -> io::Result<()> {
        self.print_content(&format!("\x1b[32m>\x1b[0m {}", text))
    }

    pub fn show_error(&mut self, message: &str) -> io::Result<()> {
        self.print_content(&format!("\x1b[31m✗ {}\x1b[0m", message))
    }

    /// Render the result payload and parse tree.
    pub fn show_result(&mut self, results: Option<&Value>, tree: Option<&Value>) -> io::Result<()> {
        if let Some(data) = results {
            if !data.is_null() {
                self.print_content(&format!("\x1b[36m{}\x1b[0m", render_json(data)))?;
            }
        }
        if let Some(tree) = tree {
            if !tree.is_null() {
                self.print_content("\x1b[90m── parse tree ──\x1b[0m")?;
                self.print_content(&render_json(tree))?;
            }
        }
        Ok(())
    }

    /// Redraw the two-line status block: status bar, then preview + prompt.
    pub fn draw(&mut self, status_line: &str) -> io::Result<()> {
        let mut out = stdout();

        if self.status_drawn {
            queue!(out, cursor::MoveUp(1), cursor::MoveToColumn(0))?;
        }
        queue!(out, terminal::Clear(ClearType::FromCursorDown))?;

        let prompt = if self.preview.is_empty() {
            format!("\x1b[1m>\x1b[0m {}", self.input)
        } else {
            format!("\x1b[1m>\x1b[0m {} \x1b[90m{}\x1b[0m", self.input, self.preview)
        };

        queue!(
            out,
            crossterm::style::Print(status_line),
            crossterm::style::Print("\r\n"),
            crossterm::style::Print(&prompt),
            cursor::MoveToColumn((2 + self.cursor_display_width()) as u16),
            cursor::Show,
        )?;
        out.flush()?;
        self.status_drawn = true;
        Ok(())
    }

    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    fn cursor_display_width(&self) -> usize {
        self.input
            .chars()
            .take(self.cursor_pos)
            .collect::<String>()
            .width()
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn render_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
