use std::collections::VecDeque;

/// Decoded text that no receive request has consumed yet.
///
/// Logically this is one string: every queued line followed by `\n`, then
/// the unterminated remainder. Complete lines are split out as soon as text
/// arrives so line requests are a queue pop; exact-count requests read across
/// the same logical string so mixed request modes see bytes in arrival order.
#[derive(Debug, Default)]
pub(crate) struct DecodedText {
    lines: VecDeque<String>,
    partial: String,
    chars: usize,
}

impl DecodedText {
    /// Append freshly decoded text, splitting off any completed lines.
    pub(crate) fn push(&mut self, decoded: &str) {
        self.chars += decoded.chars().count();
        let mut rest = decoded;
        while let Some(idx) = rest.find('\n') {
            self.partial.push_str(&rest[..idx]);
            self.lines.push_back(std::mem::take(&mut self.partial));
            rest = &rest[idx + 1..];
        }
        self.partial.push_str(rest);
    }

    /// Remove the next complete line, without its newline.
    pub(crate) fn take_line(&mut self) -> Option<String> {
        let line = self.lines.pop_front()?;
        self.chars -= line.chars().count() + 1;
        Some(line)
    }

    /// Remove exactly `count` characters, newlines included.
    pub(crate) fn take_exact(&mut self, count: usize) -> Option<String> {
        if self.chars < count {
            return None;
        }

        let mut out = String::new();
        let mut remaining = count;
        while remaining > 0 {
            match self.lines.front_mut() {
                Some(line) => {
                    let len = line.chars().count();
                    if remaining > len {
                        out.push_str(line);
                        out.push('\n');
                        remaining -= len + 1;
                        self.lines.pop_front();
                    } else {
                        // The rest of this line stays queued, still newline-terminated.
                        let split = byte_offset(line, remaining);
                        out.extend(line.drain(..split));
                        remaining = 0;
                    }
                }
                None => {
                    let split = byte_offset(&self.partial, remaining);
                    out.extend(self.partial.drain(..split));
                    remaining = 0;
                }
            }
        }

        self.chars -= count;
        Some(out)
    }

    /// Total characters buffered, queued newlines included.
    pub(crate) fn len_chars(&self) -> usize {
        self.chars
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(idx, _)| idx)
}
