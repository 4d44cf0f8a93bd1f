//! Default background worker pool for decode tasks.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use log::warn;

use crate::externals::TaskProcessor;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size worker pool implementing [`TaskProcessor`].
///
/// Workers drain a shared channel; dropping the pool closes the channel and
/// joins the workers, so queued tasks finish before the drop returns.
pub struct ThreadPoolTaskProcessor {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPoolTaskProcessor {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("tile-load-{}", index))
                .spawn(move || loop {
                    let job = {
                        let receiver = receiver.lock().unwrap();
                        receiver.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break, // channel closed
                    }
                })
                .expect("failed to spawn tile load worker");
            workers.push(handle);
        }

        ThreadPoolTaskProcessor {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }
}

impl TaskProcessor for ThreadPoolTaskProcessor {
    fn start_task(&self, task: Box<dyn FnOnce() + Send>) {
        let sender = self.sender.lock().unwrap();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    warn!("tile load worker pool is gone; dropping task");
                }
            }
            None => warn!("task submitted to a shut-down worker pool"),
        }
    }
}

impl Drop for ThreadPoolTaskProcessor {
    fn drop(&mut self) {
        // Closing the channel lets each worker's recv() fail and exit.
        self.sender.lock().unwrap().take();
        for handle in self.workers.lock().unwrap().drain(..) {
            if handle.join().is_err() {
                warn!("tile load worker panicked");
            }
        }
    }
}
