//! Terminal text rendering: ANSI colors, word wrapping and framed boxes.

use textwrap::{Options, WordSeparator, WrapAlgorithm};
use unicode_width::UnicodeWidthStr;

const RESET: &str = "\x1b[0m";

/// Width used when wrapping server messages.
pub const MESSAGE_WIDTH: usize = 79;
/// Boxes leave room for the `remote: ` prefix git adds on an 80 column terminal.
pub const BOX_WIDTH: usize = 70;

/// 256-color palette entries used by the boxes.
pub mod palette {
    pub const BORDER: u8 = 240;
    pub const MUTED: u8 = 243;
    pub const ADDED: u8 = 46;
    pub const REMOVED: u8 = 196;
}

/// Colors a `print_message` action may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Plain,
}

impl Color {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "red" => Some(Color::Red),
            "green" => Some(Color::Green),
            "yellow" => Some(Color::Yellow),
            "blue" => Some(Color::Blue),
            "plain" => Some(Color::Plain),
            _ => None,
        }
    }

    fn code(self) -> Option<u8> {
        match self {
            Color::Red => Some(31),
            Color::Green => Some(32),
            Color::Yellow => Some(33),
            Color::Blue => Some(34),
            Color::Plain => None,
        }
    }

    pub fn paint(self, text: &str) -> String {
        match self.code() {
            Some(code) => format!("\x1b[{code}m{text}{RESET}"),
            None => text.to_string(),
        }
    }
}

/// Foreground from the 256-color palette.
pub fn fg256(code: u8, text: &str) -> String {
    format!("\x1b[38;5;{code}m{text}{RESET}")
}

/// Greedy word wrap that never splits a word; existing newlines are kept.
///
/// Always yields at least one line, so an empty message prints a blank line.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let options = Options::new(width)
        .break_words(false)
        .word_separator(WordSeparator::AsciiSpace)
        .wrap_algorithm(WrapAlgorithm::FirstFit);
    let mut lines: Vec<String> = textwrap::wrap(text, options)
        .into_iter()
        .map(|line| line.into_owned())
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Printable content of one box line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    rendered: String,
    width: usize,
}

impl Cell {
    pub fn plain(text: &str) -> Self {
        Self {
            rendered: text.to_string(),
            width: text.width(),
        }
    }

    pub fn colored(code: u8, text: &str) -> Self {
        Self {
            rendered: fg256(code, text),
            width: text.width(),
        }
    }

    pub fn then(mut self, other: Cell) -> Self {
        self.rendered.push_str(&other.rendered);
        self.width += other.width;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// Frame `lines` in a single-line border with one column of padding each side.
///
/// `content_width` is the printable width between the paddings; shorter lines
/// are padded with spaces.
pub fn framed(lines: &[Cell], content_width: usize) -> String {
    let horizontal = "─".repeat(content_width + 2);
    let mut out = String::new();
    out.push_str(&fg256(palette::BORDER, &format!("┌{horizontal}┐")));
    out.push('\n');
    for line in lines {
        let pad = content_width.saturating_sub(line.width);
        out.push_str(&fg256(palette::BORDER, "│"));
        out.push(' ');
        out.push_str(&line.rendered);
        out.push_str(&" ".repeat(pad));
        out.push(' ');
        out.push_str(&fg256(palette::BORDER, "│"));
        out.push('\n');
    }
    out.push_str(&fg256(palette::BORDER, &format!("└{horizontal}┘")));
    out
}

/// Cut `text` to at most `width` printable columns.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Box showing shell commands, each behind a muted `$` prompt.
pub fn commands_box(commands: &[String]) -> String {
    // border + padding on both sides
    let max_content = BOX_WIDTH - 4;
    let prompt = "$ ";
    let lines: Vec<Cell> = commands
        .iter()
        .map(|command| {
            let command = truncate_to_width(command, max_content - prompt.width());
            Cell::colored(palette::MUTED, "$")
                .then(Cell::plain(" "))
                .then(Cell::plain(&command))
        })
        .collect();
    let content_width = lines.iter().map(Cell::width).max().unwrap_or(0);
    framed(&lines, content_width)
}

/// Fixed-width box showing a unified diff with added/removed lines colored.
pub fn diff_box(diff: &str) -> String {
    let content_width = BOX_WIDTH - 2;
    let mut lines = Vec::new();
    for line in diff.split('\n') {
        let color = if line.starts_with('+') {
            palette::ADDED
        } else if line.starts_with('-') {
            palette::REMOVED
        } else {
            palette::MUTED
        };
        let wrapped = textwrap::wrap(line, content_width);
        if wrapped.is_empty() {
            lines.push(Cell::plain(""));
            continue;
        }
        for piece in wrapped {
            lines.push(Cell::colored(color, &piece));
        }
    }
    framed(&lines, content_width)
}
