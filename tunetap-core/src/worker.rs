//! # Analysis Worker Module
//!
//! A dedicated thread that owns the capture source and runs the
//! capture → pause → analyze → resume cycle on a fixed schedule.
//!
//! ## Architecture
//! - **Worker thread**: sole owner of the [`CaptureSource`] and the
//!   [`TuningSession`]; one analysis in flight at a time
//! - **Communication**: readouts go out on a bounded crossbeam channel and
//!   into a lock-protected latest-value cell; shutdown comes in on a second
//!   channel. A full readout queue drops its oldest entry.
//! - **Failures**: logged and followed by a longer back-off, never fatal

use crate::analysis::{TunerReadout, TuningSession};
use crate::audio::CaptureSource;
use crate::config::TunerConfig;
use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Readouts held for a consumer that is not draining the channel.
pub const READOUT_QUEUE_LEN: usize = 32;

/// Handle to a running capture/analysis thread.
#[derive(Debug)]
pub struct AnalysisWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
    publisher: Publisher,
    readout_rx: Receiver<TunerReadout>,
}

/// Where the worker delivers readouts.
#[derive(Debug, Clone)]
struct Publisher {
    latest: Arc<Mutex<TunerReadout>>,
    tx: Sender<TunerReadout>,
    overflow: Receiver<TunerReadout>,
}

impl Publisher {
    fn publish(&self, readout: TunerReadout) {
        match self.latest.lock() {
            Ok(mut latest) => *latest = readout.clone(),
            Err(poisoned) => *poisoned.into_inner() = readout.clone(),
        }
        if let Err(TrySendError::Full(readout)) = self.tx.try_send(readout) {
            let _ = self.overflow.try_recv();
            if self.tx.try_send(readout).is_err() {
                log::debug!(target: "worker", "Readout queue full, dropping readout");
            }
        }
    }

    fn latest(&self) -> TunerReadout {
        match self.latest.lock() {
            Ok(latest) => latest.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AnalysisWorker {
    /// Starts a worker that takes ownership of `source`.
    ///
    /// Fails without spawning anything if `config` does not validate.
    pub fn spawn<S>(source: S, config: TunerConfig) -> Result<Self>
    where
        S: CaptureSource + Send + 'static,
    {
        Self::spawn_with(move || source, config)
    }

    /// Starts a worker whose source is built on the worker thread itself,
    /// for sources that cannot move between threads.
    pub fn spawn_with<F, S>(make_source: F, config: TunerConfig) -> Result<Self>
    where
        F: FnOnce() -> S + Send + 'static,
        S: CaptureSource + 'static,
    {
        let session = TuningSession::new(config)?;
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (readout_tx, readout_rx) = crossbeam_channel::bounded(READOUT_QUEUE_LEN);
        let publisher = Publisher {
            latest: Arc::new(Mutex::new(TunerReadout::inactive())),
            tx: readout_tx,
            overflow: readout_rx.clone(),
        };

        let thread_publisher = publisher.clone();
        let thread_handle = thread::spawn(move || {
            log::info!(target: "worker", "Analysis thread starting");
            let mut source = make_source();
            run(&mut source, session, &shutdown_rx, &thread_publisher);
            source.stop();
            log::info!(target: "worker", "Analysis thread finished");
        });

        Ok(Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
            publisher,
            readout_rx,
        })
    }

    /// Readouts in the order the worker produced them. At most
    /// [`READOUT_QUEUE_LEN`] are held; older ones are dropped first.
    pub fn readouts(&self) -> &Receiver<TunerReadout> {
        &self.readout_rx
    }

    /// The most recent readout.
    pub fn latest(&self) -> TunerReadout {
        self.publisher.latest()
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Stops capture and analysis, then publishes an inactive readout.
    ///
    /// Calling it again does nothing.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        log::info!(target: "worker", "Stopping analysis worker");
        let _ = self.shutdown_tx.try_send(());
        if handle.join().is_err() {
            log::error!(target: "worker", "Analysis thread panicked");
        }
        self.publisher.publish(TunerReadout::inactive());
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker body: start capture (retrying), then cycle until shutdown.
fn run<S: CaptureSource>(
    source: &mut S,
    mut session: TuningSession,
    shutdown_rx: &Receiver<()>,
    publisher: &Publisher,
) {
    let config = session.config().clone();
    publisher.publish(session.readout().clone());

    loop {
        match source.start() {
            Ok(()) => break,
            Err(e) => {
                log::warn!(target: "worker", "Capture failed to start: {:#}", e);
                if wait_for_shutdown(shutdown_rx, config.restart_delay()) {
                    return;
                }
            }
        }
    }
    log::info!(target: "worker", "Capture started");

    loop {
        let delay = match run_cycle(source, &mut session) {
            Ok(Some(readout)) => {
                publisher.publish(readout);
                config.cycle_delay()
            }
            Ok(None) => config.cycle_delay(),
            Err(e) => {
                log::warn!(target: "worker", "Capture cycle failed: {:#}", e);
                config.retry_delay()
            }
        };
        if wait_for_shutdown(shutdown_rx, delay) {
            break;
        }
    }
}

/// One capture/analysis cycle. Capture is resumed even when reading the
/// segment fails, so a single bad read does not stall recording.
fn run_cycle<S: CaptureSource>(
    source: &mut S,
    session: &mut TuningSession,
) -> Result<Option<TunerReadout>> {
    if source.recorded()? <= session.config().capture_duration() {
        return Ok(None);
    }

    source.pause()?;
    let segment = source.segment();
    let readout = match &segment {
        Ok(bytes) => session.process(bytes).cloned(),
        Err(_) => None,
    };
    source.resume()?;
    segment?;
    Ok(readout)
}

/// Sleeps for `delay` unless shutdown is requested first. Returns true on
/// shutdown.
fn wait_for_shutdown(shutdown_rx: &Receiver<()>, delay: Duration) -> bool {
    crossbeam_channel::select! {
        recv(shutdown_rx) -> _ => true,
        default(delay) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct DeadSource {
        stops: Arc<Mutex<usize>>,
    }

    impl CaptureSource for DeadSource {
        fn start(&mut self) -> Result<()> {
            bail!("no microphone permission")
        }
        fn recorded(&mut self) -> Result<Duration> {
            Ok(Duration::ZERO)
        }
        fn pause(&mut self) -> Result<()> {
            Ok(())
        }
        fn resume(&mut self) -> Result<()> {
            Ok(())
        }
        fn segment(&mut self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn stop(&mut self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    #[test]
    fn stop_interrupts_start_retries() {
        let stops = Arc::new(Mutex::new(0));
        let config = TunerConfig {
            restart_delay_ms: 60_000,
            ..TunerConfig::default()
        };
        let source = DeadSource {
            stops: Arc::clone(&stops),
        };
        let mut worker = AnalysisWorker::spawn(source, config).unwrap();
        assert!(worker.is_running());
        worker.stop();
        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(*stops.lock().unwrap(), 1);
        assert_eq!(worker.latest(), TunerReadout::inactive());
    }

    #[test]
    fn invalid_config_spawns_nothing() {
        let stops = Arc::new(Mutex::new(0));
        let config = TunerConfig {
            max_cents_jump: -8,
            ..TunerConfig::default()
        };
        let source = DeadSource {
            stops: Arc::clone(&stops),
        };
        assert!(AnalysisWorker::spawn(source, config).is_err());
        assert_eq!(*stops.lock().unwrap(), 0);
    }

    #[test]
    fn undrained_queue_keeps_newest_readouts() {
        let (tx, rx) = crossbeam_channel::bounded(READOUT_QUEUE_LEN);
        let publisher = Publisher {
            latest: Arc::new(Mutex::new(TunerReadout::inactive())),
            tx,
            overflow: rx.clone(),
        };
        for cents in 0..1000 {
            publisher.publish(TunerReadout {
                note_name: Some("A"),
                frequency: 440.0,
                cents,
                active: true,
            });
        }
        assert_eq!(rx.len(), READOUT_QUEUE_LEN);
        assert_eq!(publisher.latest().cents, 999);
        let queued: Vec<i32> = rx.try_iter().map(|r| r.cents).collect();
        assert_eq!(queued.first(), Some(&(1000 - READOUT_QUEUE_LEN as i32)));
        assert_eq!(queued.last(), Some(&999));
    }

    #[test]
    fn shutdown_wait_times_out() {
        let (_tx, rx) = crossbeam_channel::bounded::<()>(1);
        assert!(!wait_for_shutdown(&rx, Duration::from_millis(5)));
    }

    #[test]
    fn dropped_sender_counts_as_shutdown() {
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        drop(tx);
        assert!(wait_for_shutdown(&rx, Duration::from_secs(60)));
    }
}
