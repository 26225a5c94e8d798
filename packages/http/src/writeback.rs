//! Background executor for deferred writes.
//!
//! When a write-back executor is attached to a connection, item writes
//! update local state immediately and hand the PUT to the executor. The
//! caller never sees the outcome of the network call.

use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Accepts tasks to run later, off the calling thread.
pub trait WriteBack: Send + Sync {
    fn submit(&self, task: Task);
}

enum Message {
    Run(Task),
    Barrier(Sender<()>),
}

/// Single worker thread running tasks in submission order.
pub struct WriteBackQueue {
    sender: Mutex<Option<Sender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBackQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Message>();
        let worker = thread::Builder::new()
            .name("remotefs-writeback".to_string())
            .spawn(move || {
                for message in receiver {
                    match message {
                        Message::Run(task) => task(),
                        Message::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(error = %err, "failed to start write-back worker, writes run inline");
                None
            }
        };
        let sender = worker.as_ref().map(|_| sender);

        Self {
            sender: Mutex::new(sender),
            worker: Mutex::new(worker),
        }
    }

    /// Block until every task submitted before this call has run.
    pub fn drain(&self) {
        let (done, wait) = mpsc::channel();
        if self.send(Message::Barrier(done)).is_ok() {
            let _ = wait.recv();
        }
    }

    fn send(&self, message: Message) -> Result<(), Message> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(message).map_err(|err| err.0),
            None => Err(message),
        }
    }
}

impl Default for WriteBackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBack for WriteBackQueue {
    fn submit(&self, task: Task) {
        if let Err(Message::Run(task)) = self.send(Message::Run(task)) {
            task();
        }
    }
}

impl Drop for WriteBackQueue {
    fn drop(&mut self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("write-back worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn runs_tasks_in_order() {
        let queue = WriteBackQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let seen = Arc::clone(&seen);
            queue.submit(Box::new(move || seen.lock().unwrap().push(i)));
        }
        queue.drain();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn tasks_run_off_the_calling_thread() {
        let queue = WriteBackQueue::new();
        let name = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&name);
        queue.submit(Box::new(move || {
            *recorded.lock().unwrap() = thread::current().name().map(str::to_string);
        }));
        queue.drain();
        assert_eq!(name.lock().unwrap().as_deref(), Some("remotefs-writeback"));
    }

    #[test]
    fn drop_waits_for_pending_tasks() {
        let done = Arc::new(Mutex::new(false));
        {
            let queue = WriteBackQueue::new();
            let done = Arc::clone(&done);
            queue.submit(Box::new(move || {
                thread::sleep(Duration::from_millis(50));
                *done.lock().unwrap() = true;
            }));
        }
        assert!(*done.lock().unwrap());
    }
}
