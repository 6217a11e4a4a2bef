//! Forwards emulator stdout/stderr into the tracing system.

use std::{
    io::{BufRead, BufReader, Read},
    thread::{self, JoinHandle},
};

use emulite_shared::errors::{EmuliteError, EmuliteResult};

/// Log level for an emulator output stream.
#[derive(Debug, Clone, Copy)]
pub(super) enum LogLevel {
    Info,
    Warn,
}

/// Owns the reader threads for one emulator process.
///
/// Each thread reads until its pipe closes, which happens when the emulator
/// exits or is killed.
pub(super) struct LogStreamHandler {
    threads: Vec<JoinHandle<()>>,
}

impl LogStreamHandler {
    /// Spawn one reader per stream. Guest console (stdout) is logged at INFO,
    /// emulator diagnostics (stderr) at WARN.
    pub(super) fn new<O, E>(stdout: O, stderr: E) -> EmuliteResult<Self>
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let stdout_thread =
            Self::spawn_reader_thread(BufReader::new(stdout), "stdout", LogLevel::Info)?;
        let stderr_thread =
            Self::spawn_reader_thread(BufReader::new(stderr), "stderr", LogLevel::Warn)?;

        Ok(Self {
            threads: vec![stdout_thread, stderr_thread],
        })
    }

    /// Remove ANSI CSI sequences (`ESC [ ... m`) from guest output.
    pub(super) fn strip_ansi_codes(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            if c == '\x1b' {
                if chars.next() == Some('[') {
                    for next_char in chars.by_ref() {
                        if next_char == 'm' {
                            break;
                        }
                    }
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    fn spawn_reader_thread<R: BufRead + Send + 'static>(
        reader: R,
        stream_name: &'static str,
        log_level: LogLevel,
    ) -> EmuliteResult<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("emulator-{}", stream_name))
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            let clean_line = Self::strip_ansi_codes(&line);
                            match log_level {
                                LogLevel::Info => {
                                    tracing::info!(target: "emulator:stdout", "{}", clean_line);
                                }
                                LogLevel::Warn => {
                                    tracing::warn!(target: "emulator:stderr", "{}", clean_line);
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                stream = stream_name,
                                "Failed to read emulator output: {}", e
                            );
                            break;
                        }
                    }
                }
                tracing::debug!(stream = stream_name, "Emulator pipe closed");
            })
            .map_err(|e| {
                EmuliteError::Internal(format!(
                    "Failed to spawn {} reader thread: {}",
                    stream_name, e
                ))
            })
    }

    /// Wait for both reader threads to drain their pipes.
    pub(super) fn shutdown(mut self) {
        self.join_all();
    }

    fn join_all(&mut self) {
        for handle in self.threads.drain(..) {
            if let Err(e) = handle.join() {
                tracing::warn!("emulator output reader panicked: {:?}", e);
            }
        }
    }
}

impl Drop for LogStreamHandler {
    fn drop(&mut self) {
        self.join_all();
    }
}
