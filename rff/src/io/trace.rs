//! JSON-lines trace of controller iterations.
//!
//! One [`StepOutcome`] per line, written in iteration order and flushed per
//! record so a crashed run still leaves a readable prefix.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::types::StepOutcome;

pub struct TraceWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TraceWriter {
    /// Create (or truncate) the trace file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create trace dir {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("create trace {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, step: &StepOutcome) -> Result<()> {
        serde_json::to_writer(&mut self.writer, step).context("serialize trace record")?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("write trace {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a trace file back into records.
pub fn read_trace(path: &Path) -> Result<Vec<StepOutcome>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read trace {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DirectAttempt, Transition};

    fn step(iter: u32, transition: Transition) -> StepOutcome {
        StepOutcome {
            iter,
            direct_attempt: Some(DirectAttempt::Invalid),
            transition,
            stagnation: 0,
            stagnation_reset: false,
            avoid: vec!["a".to_string()],
            workspace_size: 1,
        }
    }

    #[test]
    fn appends_one_record_per_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("runs/trace.jsonl");
        let mut writer = TraceWriter::create(&path).expect("create");
        let first = step(
            0,
            Transition::Committed {
                symbol: "a".to_string(),
            },
        );
        let second = step(
            1,
            Transition::Solved {
                answer: "24".to_string(),
            },
        );
        writer.append(&first).expect("append");
        writer.append(&second).expect("append");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.contains(r#""kind":"committed""#));
        assert_eq!(read_trace(&path).expect("parse"), vec![first, second]);
    }
}
