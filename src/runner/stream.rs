//! Merging of a subprocess's output streams into ordered line events.
//!
//! Each byte stream is decoded independently on its own reader thread and
//! split into [`LineEvent`]s: one `done: true` event per newline-terminated
//! line, plus a `done: false` event whenever a read chunk ends mid-line so
//! downstream consumers can surface live partial updates. Both per-stream
//! sequences feed a single channel; each stream's internal order is
//! preserved, cross-stream ordering is arrival order.

use std::io::Read;
use std::sync::mpsc;
use std::thread;

/// Which stream a line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One decoded unit of subprocess output.
///
/// `done` is true for newline-terminated lines and for the trailing fragment
/// flushed at end of stream; it is false for a still-growing fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct LineEvent {
    pub source: StreamSource,
    pub text: String,
    pub done: bool,
}

/// Spawn a reader thread decoding `reader` into line events on `tx`.
///
/// The thread exits when the stream ends or the receiver is dropped.
pub fn spawn_line_reader<R>(source: StreamSource, reader: R, tx: mpsc::Sender<LineEvent>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || read_lines(source, reader, &tx))
}

fn read_lines<R: Read>(source: StreamSource, mut reader: R, tx: &mpsc::Sender<LineEvent>) {
    let mut chunk = [0u8; 8192];
    let mut held: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        held.extend_from_slice(&chunk[..n]);

        while let Some(pos) = held.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = held.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let event = LineEvent {
                source,
                text: String::from_utf8_lossy(&line).into_owned(),
                done: true,
            };
            if tx.send(event).is_err() {
                return;
            }
        }

        // Chunk ended mid-line: emit the current fragment so consumers can
        // show live progress. A multi-byte character split across chunks
        // decodes lossily here; the terminated line re-decodes cleanly.
        if !held.is_empty() {
            let event = LineEvent {
                source,
                text: String::from_utf8_lossy(&held).into_owned(),
                done: false,
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    }

    // Stream ended without a trailing newline: flush the fragment as final.
    if !held.is_empty() {
        let _ = tx.send(LineEvent {
            source,
            text: String::from_utf8_lossy(&held).into_owned(),
            done: true,
        });
    }
}

/// Merge two output streams into one receiver of line events.
///
/// Returns the receiver plus the reader thread handles; join them after the
/// receiver has been drained.
pub fn merge_streams<O, E>(stdout: O, stderr: E) -> (mpsc::Receiver<LineEvent>, Vec<thread::JoinHandle<()>>)
where
    O: Read + Send + 'static,
    E: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handles = vec![
        spawn_line_reader(StreamSource::Stdout, stdout, tx.clone()),
        spawn_line_reader(StreamSource::Stderr, stderr, tx),
    ];
    (rx, handles)
}
