//! Line reader feeding operator commands to the bridge
//!
//! Runs on a dedicated thread. A blocking read on stdin cannot be
//! cancelled, so it must stay outside the tokio runtime or shutdown would
//! wait on it forever.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Reads command lines and forwards them over a channel
pub struct ConsoleListener {
    command_tx: mpsc::Sender<String>,
    running: Arc<AtomicBool>,
}

impl ConsoleListener {
    pub fn new(command_tx: mpsc::Sender<String>) -> Self {
        Self {
            command_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start reading from stdin
    pub fn start(&self) -> Result<(), ListenerError> {
        self.start_with(std::io::BufReader::new(std::io::stdin()))
    }

    /// Start reading from an arbitrary line source
    ///
    /// The reader thread is detached; it ends when the source is exhausted,
    /// the channel closes, or [`ConsoleListener::stop`] was called before
    /// the next line.
    pub fn start_with<R>(&self, reader: R) -> Result<(), ListenerError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }

        let command_tx = self.command_tx.clone();
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("console-listener".to_string())
            .spawn(move || {
                info!("console listener thread started");
                if let Err(e) = read_lines(reader, command_tx, &running) {
                    error!(error = %e, "console listener error");
                }
                running.store(false, Ordering::SeqCst);
                info!("console listener thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(ListenerError::ThreadSpawn(e.to_string()));
        }

        Ok(())
    }

    /// Stop forwarding after the next line
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the reader thread is still alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the console listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("console listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("failed to read command line: {0}")]
    Read(#[from] std::io::Error),
}

fn read_lines<R: BufRead>(
    reader: R,
    command_tx: mpsc::Sender<String>,
    running: &AtomicBool,
) -> Result<(), ListenerError> {
    for line in reader.lines() {
        let line = line?;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        // Not inside the runtime, so blocking here is fine
        if command_tx.blocking_send(line).is_err() {
            warn!("command channel closed");
            break;
        }
    }

    debug!("console input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};
    use std::time::Duration;

    /// Line source that never produces data, like an idle stdin pipe
    struct StalledReader;

    impl Read for StalledReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            loop {
                thread::park();
            }
        }
    }

    impl BufRead for StalledReader {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            loop {
                thread::park();
            }
        }

        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(8);
        let listener = ConsoleListener::new(tx);
        assert!(!listener.is_running());
    }

    #[tokio::test]
    async fn test_forwards_lines() {
        let (tx, mut rx) = mpsc::channel(8);
        let listener = ConsoleListener::new(tx);

        listener.start_with(&b"enable\nstatus\n"[..]).unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("enable"));
        assert_eq!(rx.recv().await.as_deref(), Some("status"));

        drop(listener);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        let listener = ConsoleListener::new(tx);

        listener.start_with(StalledReader).unwrap();
        assert!(listener.is_running());
        assert!(matches!(
            listener.start_with(StalledReader),
            Err(ListenerError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_stalled_input_does_not_block_runtime_shutdown() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let (tx, _rx) = mpsc::channel(8);
            let listener = ConsoleListener::new(tx);

            runtime.block_on(async {
                listener.start_with(StalledReader).unwrap();
                tokio::task::yield_now().await;
            });
            listener.stop();

            // dropping the runtime waits for all of its blocking work
            drop(runtime);
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
