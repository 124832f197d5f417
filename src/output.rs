use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use unicode_width::UnicodeWidthChar;

pub const MAX_OUTPUT_LINES: usize = 5000;

/// Document shared between the reader thread and the UI. The lock is only
/// held for a single append or a single frame's worth of reading.
pub type SharedDocument = Arc<Mutex<OutputDocument>>;

pub fn shared() -> SharedDocument {
    Arc::new(Mutex::new(OutputDocument::default()))
}

/// A panic on the other side of the lock leaves the text intact, so keep going.
pub fn lock(document: &SharedDocument) -> MutexGuard<'_, OutputDocument> {
    document.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Line buffer behind the output pane.
///
/// The last line is always the one currently being written to, so a chunk
/// that ends mid-line is continued by the next one. Lines are wrapped to the
/// pane width set by `set_viewport`; `scroll_back` counts wrapped rows from
/// the bottom of the document.
#[derive(Debug)]
pub struct OutputDocument {
    lines: VecDeque<String>,
    scroll_back: usize,
    auto_scroll: bool,
    width: usize,
    height: usize,
    total_rows: usize,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self {
            lines: VecDeque::from([String::new()]),
            scroll_back: 0,
            auto_scroll: true,
            width: usize::MAX,
            height: 1,
            total_rows: 1,
        }
    }
}

impl OutputDocument {
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let width = self.width;
        let before = self.total_rows;
        let mut pieces = text.split('\n');
        if let (Some(first), Some(last)) = (pieces.next(), self.lines.back_mut()) {
            self.total_rows -= row_count(last, width);
            push_visible(last, first);
            self.total_rows += row_count(last, width);
        }
        for piece in pieces {
            let mut line = String::new();
            push_visible(&mut line, piece);
            self.total_rows += row_count(&line, width);
            self.lines.push_back(line);
        }
        let grown = self.total_rows.saturating_sub(before);

        while self.lines.len() > MAX_OUTPUT_LINES {
            if let Some(dropped) = self.lines.pop_front() {
                self.total_rows -= row_count(&dropped, width);
            }
        }

        if self.auto_scroll {
            self.scroll_back = 0;
        } else {
            self.scroll_back = (self.scroll_back + grown).min(self.max_scroll());
        }
    }

    /// Appends `text` as a line of its own.
    pub fn append_line(&mut self, text: &str) {
        if self.lines.back().is_some_and(|l| !l.is_empty()) {
            self.append("\n");
        }
        self.append(text);
        self.append("\n");
    }

    pub fn clear(&mut self) {
        *self = Self {
            auto_scroll: self.auto_scroll,
            width: self.width,
            height: self.height,
            ..Self::default()
        };
    }

    pub fn contents(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
        if enabled {
            self.scroll_back = 0;
        }
    }

    /// Size of the pane in cells. Row counts follow the width.
    pub fn set_viewport(&mut self, height: usize, width: usize) {
        let width = width.max(1);
        if width != self.width {
            self.width = width;
            self.total_rows = self.lines.iter().map(|l| row_count(l, width)).sum();
        }
        self.height = height.max(1);
        self.scroll_back = self.scroll_back.min(self.max_scroll());
    }

    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_back = (self.scroll_back + rows).min(self.max_scroll());
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_back = self.max_scroll();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    /// The wrapped rows that fill the pane at the current scroll position.
    pub fn window(&self) -> Vec<&str> {
        let end = self.total_rows.saturating_sub(self.scroll_back);
        let start = end.saturating_sub(self.height);
        let mut rows = Vec::with_capacity(end - start);
        let mut row = 0;
        for line in &self.lines {
            if row >= end {
                break;
            }
            let count = row_count(line, self.width);
            if row + count <= start {
                row += count;
                continue;
            }
            for piece in wrap(line, self.width) {
                if (start..end).contains(&row) {
                    rows.push(piece);
                }
                row += 1;
            }
        }
        rows
    }

    fn max_scroll(&self) -> usize {
        self.total_rows.saturating_sub(self.height)
    }
}

fn push_visible(line: &mut String, piece: &str) {
    line.extend(piece.chars().filter(|c| *c != '\r'));
}

/// Splits `line` into rows no wider than `width` display cells.
fn wrap(line: &str, width: usize) -> Vec<&str> {
    let mut rows = Vec::new();
    let mut row_start = 0;
    let mut used = 0;
    for (i, c) in line.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > width && used > 0 {
            rows.push(&line[row_start..i]);
            row_start = i;
            used = 0;
        }
        used += w;
    }
    rows.push(&line[row_start..]);
    rows
}

fn row_count(line: &str, width: usize) -> usize {
    if width == usize::MAX {
        return 1;
    }
    wrap(line, width).len()
}

/// Lossy UTF-8 decoding that holds back a multi-byte sequence split across reads.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let split = self.pending.len() - incomplete_tail(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        text
    }
}

fn incomplete_tail(bytes: &[u8]) -> usize {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(_) => return 0,
            Err(e) => match e.error_len() {
                None => return rest.len() - e.valid_up_to(),
                Some(len) => rest = &rest[e.valid_up_to() + len..],
            },
        }
    }
}
