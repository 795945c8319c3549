//! Public facade: `request()` and `poll_result()`, backed by one
//! coordinator thread and a worker pool.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::EngineConfig;
use crate::coordinator::{Coordinator, ResultSlot};
use crate::error::EngineResult;
use crate::mailbox::Mailbox;
use crate::parser::Parser;
use crate::pixel_buffer::Medium;
use crate::pool::WorkerPool;
use crate::request::RenderResult;

/// Owns the coordinator thread and worker pool for one document session.
/// Dropping the engine signals shutdown and joins the coordinator (which in
/// turn drops the pool, joining every worker) before returning.
pub struct RenderEngine<P: Parser + 'static> {
    mailbox: Arc<Mailbox>,
    result_slot: Arc<ResultSlot>,
    coordinator_thread: Option<JoinHandle<()>>,
    _parser: PhantomData<P>,
}

impl<P: Parser + 'static> RenderEngine<P> {
    /// Build an engine around `prototype`, duplicating it once for the
    /// coordinator's own use and once per pool worker.
    pub fn new(prototype: P, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let pool = WorkerPool::new(&prototype, config.pool_size)?;
        let coordinator_parser = prototype.duplicate()?;

        let mailbox = Arc::new(Mailbox::new());
        let result_slot: Arc<ResultSlot> = Arc::new(Mutex::new(None));

        let coordinator = Coordinator::new(
            coordinator_parser,
            pool,
            config,
            Arc::clone(&mailbox),
            Arc::clone(&result_slot),
        );
        let coordinator_thread = std::thread::spawn(move || coordinator.run());
        log::info!("render engine started");

        Ok(Self {
            mailbox,
            result_slot,
            coordinator_thread: Some(coordinator_thread),
            _parser: PhantomData,
        })
    }

    /// Non-blocking. Overwrites any not-yet-picked-up pending request.
    /// Returns the assigned `req_id`, or `None` if the engine has begun
    /// shutting down.
    pub fn request(&self, page: u32, zoom: f32, rotation: u16, medium: Medium) -> Option<u64> {
        self.mailbox.post(page, zoom, rotation, medium)
    }

    /// Non-blocking. Returns the most recent published result exactly once;
    /// subsequent calls return `None` until another result is published.
    pub fn poll_result(&self) -> Option<RenderResult> {
        self.result_slot.lock().unwrap().take()
    }
}

impl<P: Parser + 'static> Drop for RenderEngine<P> {
    fn drop(&mut self) {
        log::info!("render engine shutting down");
        self.mailbox.shutdown();
        if let Some(thread) = self.coordinator_thread.take() {
            let _ = thread.join();
        }
    }
}
