//! Command history.
//!
//! Every accepted line is appended in order. The backing file is plain
//! text with one entry per line, so entries containing newlines do not
//! survive a round trip.
//!
//! `persisted` marks how many entries have already been written out by
//! [`History::append_new`]; it never exceeds `entries.len()`.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    persisted: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an accepted line. Blank lines are not recorded.
    pub fn push(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.entries.push(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Reads a history file and appends its lines. The persisted cursor is
    /// left where it was.
    pub fn load(&mut self, path: &Path) -> io::Result<usize> {
        let reader = BufReader::new(fs::File::open(path)?);
        let before = self.entries.len();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                self.entries.push(line);
            }
        }
        Ok(self.entries.len() - before)
    }

    /// Treats everything currently in memory as already written.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.entries.len();
    }

    /// Overwrites `path` with the whole log.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        write_lines(&mut out, &self.entries)?;
        out.flush()
    }

    /// Appends entries not yet persisted and advances the cursor.
    pub fn append_new(&mut self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut out = BufWriter::new(file);
        write_lines(&mut out, &self.entries[self.persisted..])?;
        out.flush()?;
        self.persisted = self.entries.len();
        Ok(())
    }

    /// Renders the last `limit` entries (all when `None`) with their
    /// 1-based positions.
    pub fn render(&self, limit: Option<usize>) -> String {
        let skip = limit.map_or(0, |n| self.entries.len().saturating_sub(n));
        self.entries
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, line)| format!("{:>5}  {}\n", i + 1, line))
            .collect()
    }
}

fn write_lines(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
