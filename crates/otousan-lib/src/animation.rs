// SPDX-License-Identifier: MPL-2.0

//! The mouth animation thread.

use crate::error::{Error, Result};
use std::{
    sync::mpsc::{self, RecvTimeoutError, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

/// Delay between talking frames.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "otousan-mouth";

/// Handle to a running animation thread.
///
/// The thread calls `tick` immediately and then once per interval until
/// [`AnimationTask::stop`] is called or the handle is dropped.
#[derive(Debug)]
pub struct AnimationTask {
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl AnimationTask {
    pub fn spawn<F>(interval: Duration, tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || run(interval, &stop_rx, tick))
            .map_err(Error::Spawn)?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    /// Signals the thread and waits for it to exit. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel, which also stops the loop.
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("animation thread panicked");
            }
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }
}

impl Drop for AnimationTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<F: FnMut()>(interval: Duration, stop_rx: &mpsc::Receiver<()>, mut tick: F) {
    tracing::trace!("animation started");

    loop {
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }

        tick();
        thread::yield_now();

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::trace!("animation stopped");
}
