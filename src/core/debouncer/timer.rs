//! Restartable single-shot timer backed by one thread.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Callback = Box<dyn FnOnce() + Send>;

enum Command {
    Arm { deadline: Instant, callback: Callback },
    Cancel,
    Shutdown,
}

/// A delayed callback that can be cancelled and re-armed
///
/// Arming replaces any callback that has not fired yet. The timer thread
/// sleeps on its command channel until the deadline, so nothing is polled.
pub struct DelayedTask {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn new() -> Self {
        let (commands, receiver) = unbounded();
        let handle = thread::Builder::new()
            .name("debounce-timer".to_string())
            .spawn(move || run(receiver))
            .ok();
        if handle.is_none() {
            tracing::error!("Failed to spawn debounce timer thread");
        }

        Self { commands, handle }
    }

    /// Run `callback` after `delay` unless cancelled or re-armed first
    pub fn arm<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.commands.send(Command::Arm {
            deadline: Instant::now() + delay,
            callback: Box::new(callback),
        });
    }

    /// Drop the pending callback, if any
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }

    /// Stop the timer thread without firing and wait for it to exit
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            // Dropped from inside a callback: the thread exits on its own.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Default for DelayedTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(commands: Receiver<Command>) {
    let mut pending: Option<(Instant, Callback)> = None;

    loop {
        let command = match pending.as_ref() {
            Some((deadline, _)) => match commands.recv_deadline(*deadline) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some((_, callback)) = pending.take() {
                        callback();
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Arm { deadline, callback } => pending = Some((deadline, callback)),
            Command::Cancel => pending = None,
            Command::Shutdown => break,
        }
    }
}
