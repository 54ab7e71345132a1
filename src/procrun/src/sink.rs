//! Output sinks for child process streams.
//!
//! Every child stream is copied into a [`FanOut`]: the stream's
//! [`CaptureBuffer`] first, followed by any caller-supplied sinks in the
//! order they were added.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Chunk size used when copying a child pipe into its sinks.
const PUMP_CHUNK_SIZE: usize = 8 * 1024;

/// Chunks read ahead of a slow sink before the pipe is left to fill.
const PUMP_QUEUE_DEPTH: usize = 64;

/// A writable destination for child output.
pub type Sink = Box<dyn Write + Send>;

/// Which standard stream of the child a sink belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Shared in-memory byte buffer.
///
/// Clones share the same storage, so a handle can be kept while another
/// one is handed to a runner as a sink.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Duplicates every write to an ordered list of sinks.
pub struct FanOut {
    sinks: Vec<Sink>,
}

impl FanOut {
    /// Create a fan-out whose first sink is `primary`.
    pub fn new(primary: impl Write + Send + 'static) -> Self {
        Self {
            sinks: vec![Box::new(primary)],
        }
    }

    /// Append a sink after the ones already registered.
    pub fn push(&mut self, sink: impl Write + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Write for FanOut {
    /// Writes `buf` to every sink in order. The first failing sink aborts the
    /// write; sinks after it do not receive the chunk.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Copy a child pipe into `sinks` until EOF.
///
/// The pipe is read on the runtime while the sinks are written on a
/// dedicated thread, so a slow or blocking sink never stalls the executor.
/// After a sink error the pipe is still drained to EOF so the child never
/// blocks on a full pipe; the first sink error is returned at the end.
pub(crate) async fn pump<R>(mut reader: R, sinks: FanOut, stream: Stream) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let (chunks_tx, chunks_rx) = mpsc::channel::<Vec<u8>>(PUMP_QUEUE_DEPTH);
    let (done_tx, done_rx) = oneshot::channel();
    thread::Builder::new()
        .name(format!("procrun-{stream}"))
        .spawn(move || {
            let _ = done_tx.send(write_chunks(chunks_rx, sinks, stream));
        })?;

    let mut buf = vec![0u8; PUMP_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;

        // The writer only hangs up if a sink panicked; keep draining the pipe.
        let _ = chunks_tx.send(buf[..n].to_vec()).await;
    }
    drop(chunks_tx);

    match done_rx.await {
        Ok(result) => {
            result?;
            debug!(%stream, bytes = total, "stream closed");
            Ok(total)
        }
        Err(_) => Err(io::Error::other(format!("{stream} sink writer exited early"))),
    }
}

/// Write queued chunks to `sinks` until the queue closes.
fn write_chunks(
    mut chunks: mpsc::Receiver<Vec<u8>>,
    mut sinks: FanOut,
    stream: Stream,
) -> io::Result<()> {
    let mut sink_error: Option<io::Error> = None;

    while let Some(chunk) = chunks.blocking_recv() {
        if sink_error.is_none()
            && let Err(e) = sinks.write_all(&chunk)
        {
            warn!(%stream, error = %e, "sink write failed, discarding remaining output");
            sink_error = Some(e);
        }
    }

    match sink_error {
        Some(e) => Err(e),
        None => sinks.flush(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    /// Sink that rejects every write.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Sink that stalls the calling thread on every write.
    struct SlowSink(Duration);

    impl Write for SlowSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            std::thread::sleep(self.0);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_capture_buffer_clones_share_storage() {
        let buffer = CaptureBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(b"hello").unwrap();

        assert_eq!(buffer.snapshot(), b"hello".to_vec());
        assert_eq!(buffer.len(), 5);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_fan_out_duplicates_to_every_sink() {
        let primary = CaptureBuffer::new();
        let first = CaptureBuffer::new();
        let second = CaptureBuffer::new();

        let mut fan_out = FanOut::new(primary.clone());
        fan_out.push(first.clone());
        fan_out.push(second.clone());
        assert_eq!(fan_out.len(), 3);

        fan_out.write_all(b"abc").unwrap();
        fan_out.write_all(b"def").unwrap();

        assert_eq!(primary.snapshot(), b"abcdef".to_vec());
        assert_eq!(first.snapshot(), primary.snapshot());
        assert_eq!(second.snapshot(), primary.snapshot());
    }

    #[test]
    fn test_fan_out_stops_at_first_failing_sink() {
        let primary = CaptureBuffer::new();
        let after = CaptureBuffer::new();

        let mut fan_out = FanOut::new(primary.clone());
        fan_out.push(BrokenSink);
        fan_out.push(after.clone());

        let err = fan_out.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(primary.snapshot(), b"data".to_vec());
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn test_pump_copies_until_eof() {
        let primary = CaptureBuffer::new();
        let reader: &[u8] = b"line one\nline two\n";

        let copied = pump(reader, FanOut::new(primary.clone()), Stream::Stdout)
            .await
            .unwrap();

        assert_eq!(copied, 18);
        assert_eq!(primary.snapshot(), b"line one\nline two\n".to_vec());
    }

    #[tokio::test]
    async fn test_pump_reports_sink_error_after_draining() {
        let primary = CaptureBuffer::new();
        let mut fan_out = FanOut::new(primary.clone());
        fan_out.push(BrokenSink);
        let reader: &[u8] = b"payload";

        let err = pump(reader, fan_out, Stream::Stderr).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(primary.snapshot(), b"payload".to_vec());
    }

    #[tokio::test]
    async fn test_slow_sink_does_not_block_runtime() {
        let primary = CaptureBuffer::new();
        let mut fan_out = FanOut::new(primary.clone());
        fan_out.push(SlowSink(Duration::from_millis(500)));
        let reader: &'static [u8] = b"payload";

        let handle = tokio::spawn(pump(reader, fan_out, Stream::Stdout));
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(handle.await.unwrap().unwrap(), 7);
        assert_eq!(primary.snapshot(), b"payload".to_vec());
    }

    #[test]
    fn test_stream_display() {
        assert_eq!(Stream::Stdout.to_string(), "stdout");
        assert_eq!(Stream::Stderr.to_string(), "stderr");
    }
}
