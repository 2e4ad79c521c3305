//! Content-stream walking shared by the layout and table adapters.
//!
//! Decodes one page's operators with lopdf and rebuilds visual lines: text
//! shown at the same baseline joins into one line, a baseline change starts a
//! new one. Each line keeps the font size it started with and whether a
//! vertical gap larger than ordinary leading preceded it.

use lopdf::{content::Content, Document, Object, ObjectId};

/// A gap wider than this many font sizes separates paragraphs.
const PARAGRAPH_GAP: f32 = 1.6;

/// TJ adjustments more negative than this (thousandths of an em) read as a space.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// One visual line of page text. `text` is not whitespace-normalized, so
/// column gaps survive for table detection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextLine {
    pub font_size: f32,
    pub text: String,
    pub gap_before: bool,
}

/// Decode a PDF string operand: UTF-8, then UTF-16BE with BOM, then Latin-1.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn number(operand: Option<&Object>) -> Option<f32> {
    operand.and_then(|o| o.as_float().ok())
}

/// Rebuild the visual lines of one page.
pub(crate) fn page_lines(doc: &Document, page_id: ObjectId) -> Result<Vec<TextLine>, String> {
    let data = doc.get_page_content(page_id).map_err(|e| e.to_string())?;
    let content = Content::decode(&data).map_err(|e| e.to_string())?;

    let mut walker = LineWalker::default();
    for op in &content.operations {
        walker.apply(op.operator.as_str(), &op.operands);
    }
    Ok(walker.finish())
}

struct LineWalker {
    font_size: f32,
    leading: f32,
    /// Baseline of the text cursor.
    y: f32,
    current: String,
    current_y: f32,
    current_size: f32,
    pending_space: bool,
    last_emitted: Option<(f32, f32)>,
    lines: Vec<TextLine>,
}

impl Default for LineWalker {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            leading: 0.0,
            y: 0.0,
            current: String::new(),
            current_y: 0.0,
            current_size: 12.0,
            pending_space: false,
            last_emitted: None,
            lines: Vec::new(),
        }
    }
}

impl LineWalker {
    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "BT" => self.y = 0.0,
            "Tf" => {
                if let Some(size) = number(operands.get(1)) {
                    self.font_size = size.abs();
                }
            }
            "TL" => {
                if let Some(l) = number(operands.first()) {
                    self.leading = l;
                }
            }
            "Td" | "TD" => {
                let ty = number(operands.get(1)).unwrap_or(0.0);
                if operator == "TD" {
                    self.leading = -ty;
                }
                if ty == 0.0 {
                    self.pending_space = true;
                }
                self.y += ty;
            }
            "Tm" => {
                if let Some(f) = number(operands.get(5)) {
                    self.y = f;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut text = String::new();
                    for item in items {
                        match item {
                            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                            other => {
                                if other.as_float().map_or(false, |n| n < TJ_SPACE_THRESHOLD) {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                    self.show(&text);
                }
            }
            "'" | "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.last() {
                    self.show(&decode_pdf_string(bytes));
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 { self.leading } else { self.font_size * 1.2 };
        self.y -= leading;
    }

    fn show(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.current.is_empty() && (self.y - self.current_y).abs() > 0.5 {
            self.flush();
        }
        if self.current.is_empty() {
            self.current_y = self.y;
            self.current_size = self.font_size;
        } else if self.pending_space && !self.current.ends_with(char::is_whitespace) {
            self.current.push(' ');
        }
        self.pending_space = false;
        self.current.push_str(text);
    }

    fn flush(&mut self) {
        if self.current.trim().is_empty() {
            self.current.clear();
            return;
        }
        let gap_before = match self.last_emitted {
            Some((prev_y, prev_size)) => {
                (prev_y - self.current_y).abs() > PARAGRAPH_GAP * self.current_size.max(prev_size)
            }
            None => false,
        };
        self.lines.push(TextLine {
            font_size: self.current_size,
            text: std::mem::take(&mut self.current),
            gap_before,
        });
        self.last_emitted = Some((self.current_y, self.current_size));
    }

    fn finish(mut self) -> Vec<TextLine> {
        self.flush();
        self.lines
    }
}
