use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::session::SearchSession;

/// Samples a session's counters on a fixed interval and emits them as
/// progress events.
///
/// The reporter only reads counters; scanning never waits on it. It exits
/// on its own once the session has emitted its terminal event, or
/// immediately when [`ProgressReporter::stop`] is called.
pub(crate) struct ProgressReporter {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Starts the sampling thread. Returns `None` if no thread could be
    /// spawned; the search runs without progress in that case.
    pub(crate) fn spawn(session: Arc<SearchSession>, interval: Duration) -> Option<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let generation = session.generation();

        let spawned = thread::Builder::new()
            .name(format!("treescout-progress-{}", generation))
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if !session.emit_progress() {
                                break;
                            }
                        }
                    }
                }
                debug!("Progress reporter for generation {} stopped", generation);
            });

        match spawned {
            Ok(handle) => Some(Self {
                stop_tx,
                handle: Some(handle),
            }),
            Err(err) => {
                warn!("Could not start progress reporter: {}", err);
                None
            }
        }
    }

    /// Stops the reporter and waits for its thread to exit
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Progress reporter thread panicked");
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
