//! Agent section writer

use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// Writes agent sections, optionally piggybacked to other hosts
pub struct AgentWriter<W: Write> {
    out: W,
}

impl<W: Write> AgentWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// `<<<name:sep(0)>>>` followed by `data` as a single JSON line
    pub fn json_section<T: Serialize + ?Sized>(&mut self, name: &str, data: &T) -> Result<()> {
        writeln!(self.out, "<<<{}:sep(0)>>>", name)?;
        serde_json::to_writer(&mut self.out, data)?;
        writeln!(self.out)?;
        Ok(())
    }

    /// `<<<name>>>` followed by plain text lines
    pub fn raw_section(&mut self, name: &str, lines: &[String]) -> Result<()> {
        writeln!(self.out, "<<<{}>>>", name)?;
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    /// Run `write` with its sections assigned to `host`, or to the queried
    /// host itself for `None`
    pub fn piggyback<F>(&mut self, host: Option<&str>, write: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let Some(host) = host else {
            return write(self);
        };
        writeln!(self.out, "<<<<{}>>>>", host)?;
        let result = write(self);
        writeln!(self.out, "<<<<>>>>")?;
        result
    }
}
