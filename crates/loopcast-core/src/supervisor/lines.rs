//! Chunk-to-line splitting for relay output.

/// Accumulates raw output chunks and yields complete lines.
///
/// Lines end at `\n`, `\r\n`, or a bare `\r` (progress updates rewrite the same terminal
/// line with carriage returns). Empty lines are skipped.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0usize;
        for (idx, byte) in self.pending.iter().enumerate() {
            if matches!(byte, b'\n' | b'\r') {
                push_line(&mut lines, &self.pending[start..idx]);
                start = idx.saturating_add(1);
            }
        }
        if start > 0 {
            self.pending.drain(0..start);
        }
        lines
    }

    pub(crate) fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.pending);
        let mut lines = Vec::with_capacity(1);
        push_line(&mut lines, &tail);
        lines.pop()
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    if raw.is_empty() {
        return;
    }
    lines.push(String::from_utf8_lossy(raw).into_owned());
}
