//! Append-only progress log keyed by variant index.
//!
//! Receives the human-readable `status` lines the backend streams during
//! generation.

use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct ExecutionLog {
    lines: BTreeMap<usize, Vec<String>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, variant_index: usize, line: impl Into<String>) {
        self.lines.entry(variant_index).or_default().push(line.into());
    }

    /// Lines recorded for one variant, oldest first.
    pub fn lines(&self, variant_index: usize) -> &[String] {
        self.lines
            .get(&variant_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_kept_per_variant_in_order() {
        let mut log = ExecutionLog::new();
        log.append(0, "Generating code...");
        log.append(1, "Generating images...");
        log.append(0, "Done");

        assert_eq!(log.lines(0), ["Generating code...", "Done"]);
        assert_eq!(log.lines(1), ["Generating images..."]);
        assert!(log.lines(7).is_empty());
    }

    #[test]
    fn reset_clears_all_variants() {
        let mut log = ExecutionLog::new();
        log.append(2, "x");
        log.reset();
        assert!(log.is_empty());
    }
}
