//! Paragraph segmenter.
//!
//! Splits extracted (markdown-flavoured) document text into the ordered
//! paragraphs that notes attach to. Text is split on blank lines; blocks that
//! do not end a sentence are merged with the following block, which repairs
//! paragraphs broken apart by PDF and OCR extraction. Headings always stand
//! alone.

/// Characters that close a paragraph.
const TERMINALS: [char; 4] = ['.', '?', '!', ':'];

/// Marker that starts a markdown heading.
const HEADING_MARKER: char = '#';

/// Split `text` into paragraphs in source order.
///
/// Returns an empty vector when `text` has no content. Output is a pure
/// function of the input.
pub fn segment(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer = String::new();

    for block in text.split("\n\n") {
        let trimmed = block.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with(HEADING_MARKER) {
            flush(&mut buffer, &mut paragraphs);
            paragraphs.push(trimmed.to_string());
        } else if trimmed.ends_with(TERMINALS) {
            append(&mut buffer, trimmed);
            flush(&mut buffer, &mut paragraphs);
        } else {
            append(&mut buffer, trimmed);
        }
    }

    flush(&mut buffer, &mut paragraphs);
    paragraphs
}

fn append(buffer: &mut String, block: &str) {
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(block);
}

fn flush(buffer: &mut String, paragraphs: &mut Vec<String>) {
    if !buffer.is_empty() {
        paragraphs.push(std::mem::take(buffer));
    }
}
