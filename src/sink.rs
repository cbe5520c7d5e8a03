use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write to stdout: {0}")]
    Echo(#[source] io::Error),
    #[error("failed to write to {}: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },
}

/// Append-only destination for generated lines, mirrored to an echo writer.
pub struct LogSink<W: Write> {
    file: File,
    echo: W,
    path: PathBuf,
}

impl<W: Write> LogSink<W> {
    /// Creates `dir` when missing and opens `dir/file_name` for appending.
    pub fn open(dir: &Path, file_name: &str, echo: W) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, echo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record to the file, then mirrors it to the echo writer.
    /// Both are flushed before returning.
    pub fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        self.file
            .write_all(record.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| SinkError::File {
                path: self.path.clone(),
                source,
            })?;

        self.echo(line)
    }

    /// Plain text for the operator; never reaches the file.
    pub fn notice(&mut self, text: &str) -> Result<(), SinkError> {
        self.echo(text)
    }

    fn echo(&mut self, text: &str) -> Result<(), SinkError> {
        writeln!(self.echo, "{text}")
            .and_then(|()| self.echo.flush())
            .map_err(SinkError::Echo)
    }

    #[cfg(test)]
    pub(crate) fn into_echo(self) -> W {
        self.echo
    }
}
