use crate::config::Profile;
use crate::script::{char_len, starts_with_upper};
use crate::strip::normalize_spacing;

struct Buffer {
    lines: Vec<String>,
    len: usize,
    forced: bool,
}

impl Buffer {
    fn new() -> Self {
        Self { lines: Vec::new(), len: 0, forced: false }
    }

    fn push(&mut self, line: &str) {
        self.len += char_len(line);
        self.lines.push(line.to_string());
    }

    fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    fn flush(&mut self, out: &mut Vec<(String, bool)>) {
        if !self.lines.is_empty() {
            let text = normalize_spacing(&self.lines.join(" "));
            if !text.is_empty() {
                out.push((text, self.forced));
            }
        }
        *self = Buffer::new();
    }
}

/// Group cleaned lines into paragraph texts.
///
/// A paragraph ends at a blank line or a section-break line, or when the
/// buffer already holds a sentence ending and the next line opens a new one
/// with a capital. Short lowercase leftovers are folded into the paragraph
/// before them.
pub fn assemble(lines: &[String], profile: &Profile) -> Vec<String> {
    let t = profile.thresholds();
    let script = profile.script();
    let mut raw: Vec<(String, bool)> = Vec::new();
    let mut buf = Buffer::new();

    for line in lines {
        let s = line.trim();
        if s.is_empty() {
            buf.flush(&mut raw);
            continue;
        }
        if profile.lines.break_patterns.iter().any(|re| re.is_match(s)) {
            buf.flush(&mut raw);
            continue;
        }
        if profile.lines.start_patterns.iter().any(|re| re.is_match(s)) {
            buf.flush(&mut raw);
            buf.forced = true;
            buf.push(s);
            continue;
        }
        let sentence_break = buf.last().map(|l| profile.ends_terminal(l)).unwrap_or(false)
            && starts_with_upper(s, script)
            && char_len(s) > t.min_split_line_len
            && buf.len > t.min_split_buffer_len;
        if sentence_break {
            buf.flush(&mut raw);
        }
        buf.push(s);
    }
    buf.flush(&mut raw);

    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (text, forced) in raw {
        let fold = !forced && char_len(&text) < t.merge_below_len && !starts_with_upper(&text, script);
        match out.last_mut() {
            Some(prev) if fold => {
                prev.push(' ');
                prev.push_str(&text);
            }
            _ => out.push(text),
        }
    }
    out
}
