//! Fixed-size worker pool: each worker owns an exclusive duplicate of a
//! prototype [`Parser`], so render tasks never contend over parser state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::error::{EngineError, EngineResult};
use crate::parser::Parser;

type Job<P> = Box<dyn FnOnce(&mut P) + Send + 'static>;

struct Shared<P> {
    queue: Mutex<VecDeque<Job<P>>>,
    cv: Condvar,
    shutting_down: AtomicBool,
}

/// A single-consume completion handle for one submitted task.
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the task completes. Fails if the worker pool was
    /// dropped, or panicked, before producing a result.
    pub fn wait(self) -> EngineResult<T> {
        self.rx
            .recv()
            .map_err(|_| EngineError::ParserFailure("worker task ended without a result".into()))
    }
}

pub struct WorkerPool<P: Parser + 'static> {
    shared: Arc<Shared<P>>,
    workers: Vec<JoinHandle<()>>,
}

impl<P: Parser + 'static> WorkerPool<P> {
    /// Build a pool of `size` workers, each holding an independent
    /// [`Parser::duplicate`] of `prototype`.
    pub fn new(prototype: &P, size: usize) -> EngineResult<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            shutting_down: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(size);
        for _ in 0..size {
            let parser = prototype.duplicate()?;
            let shared = Arc::clone(&shared);
            workers.push(std::thread::spawn(move || worker_loop(shared, parser)));
        }

        Ok(Self { shared, workers })
    }

    /// Submit a task that runs with exclusive access to a worker's parser.
    /// Fails with [`EngineError::PoolShutdown`] if shutdown has begun.
    pub fn submit<T, F>(&self, f: F) -> EngineResult<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut P) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job<P> = Box::new(move |parser: &mut P| {
            let _ = tx.send(f(parser));
        });

        let mut queue = self.shared.queue.lock().unwrap();
        if self.shared.shutting_down.load(Ordering::Acquire) {
            return Err(EngineError::PoolShutdown);
        }
        queue.push_back(job);
        self.shared.cv.notify_one();
        Ok(TaskHandle { rx })
    }
}

fn worker_loop<P: Parser>(shared: Arc<Shared<P>>, mut parser: P) {
    loop {
        let job = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(job) = queue.pop_front() {
                    break Some(job);
                }
                if shared.shutting_down.load(Ordering::Acquire) {
                    break None;
                }
                queue = shared.cv.wait(queue).unwrap();
            }
        };
        match job {
            Some(job) => job(&mut parser),
            None => return,
        }
    }
}

impl<P: Parser + 'static> Drop for WorkerPool<P> {
    /// Signal shutdown, let every worker drain the queue to empty, then
    /// join all worker threads. No task submitted before this point is
    /// abandoned.
    fn drop(&mut self) {
        {
            let _queue = self.shared.queue.lock().unwrap();
            self.shared.shutting_down.store(true, Ordering::Release);
        }
        self.shared.cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
