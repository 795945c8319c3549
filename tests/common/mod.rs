//! A fake, instrumentable Parser backend shared by the end-to-end scenario
//! tests: configurable per-page display-list build delay, a gate that holds
//! up every section draw until released, optional failure injection on a
//! specific section draw, and call counters the tests assert against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use pdvu_render::{EngineError, EngineResult, Parser, Rect};

#[derive(Clone)]
pub struct FakeParser {
    pages: Arc<Vec<(f64, f64)>>,
    dlist_sleep_ms: Arc<Mutex<HashMap<usize, u64>>>,
    dlist_call_counts: Arc<Mutex<HashMap<usize, usize>>>,
    write_sleep_ms: Arc<AtomicU64>,
    write_gate_open: Arc<(Mutex<bool>, Condvar)>,
    fail_on_nth_write: Arc<Mutex<Option<usize>>>,
    write_call_counter: Arc<AtomicUsize>,
}

impl FakeParser {
    pub fn new(pages: Vec<(f64, f64)>) -> Self {
        Self {
            pages: Arc::new(pages),
            dlist_sleep_ms: Arc::new(Mutex::new(HashMap::new())),
            dlist_call_counts: Arc::new(Mutex::new(HashMap::new())),
            write_sleep_ms: Arc::new(AtomicU64::new(0)),
            write_gate_open: Arc::new((Mutex::new(true), Condvar::new())),
            fail_on_nth_write: Arc::new(Mutex::new(None)),
            write_call_counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_dlist_sleep_ms(&self, page: usize, ms: u64) {
        self.dlist_sleep_ms.lock().unwrap().insert(page, ms);
    }

    pub fn dlist_call_count(&self, page: usize) -> usize {
        self.dlist_call_counts
            .lock()
            .unwrap()
            .get(&page)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_write_sleep_ms(&self, ms: u64) {
        self.write_sleep_ms.store(ms, Ordering::SeqCst);
    }

    pub fn close_gate(&self) {
        *self.write_gate_open.0.lock().unwrap() = false;
    }

    pub fn open_gate(&self) {
        *self.write_gate_open.0.lock().unwrap() = true;
        self.write_gate_open.1.notify_all();
    }

    pub fn fail_on_nth_write(&self, n: usize) {
        *self.fail_on_nth_write.lock().unwrap() = Some(n);
    }

    pub fn clear_failure(&self) {
        *self.fail_on_nth_write.lock().unwrap() = None;
    }

    pub fn write_call_count(&self) -> usize {
        self.write_call_counter.load(Ordering::SeqCst)
    }
}

impl Parser for FakeParser {
    type DisplayList = ();

    fn num_pages(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, page: usize) -> EngineResult<Rect> {
        let (w, h) = self.pages.get(page).copied().unwrap_or((0.0, 0.0));
        Ok(Rect::new(0.0, 0.0, w, h))
    }

    fn get_display_list(&self, page: usize) -> EngineResult<Arc<Self::DisplayList>> {
        let sleep_ms = self
            .dlist_sleep_ms
            .lock()
            .unwrap()
            .get(&page)
            .copied()
            .unwrap_or(0);
        if sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }
        *self.dlist_call_counts.lock().unwrap().entry(page).or_insert(0) += 1;
        Ok(Arc::new(()))
    }

    fn write_section(
        &self,
        _display_list: &Self::DisplayList,
        clip: Rect,
        _zoom: f64,
        _rotation: u16,
        dst: &mut [u8],
    ) -> EngineResult<()> {
        {
            let (lock, cv) = &*self.write_gate_open;
            let mut open = lock.lock().unwrap();
            while !*open {
                open = cv.wait(open).unwrap();
            }
        }

        let call_index = self.write_call_counter.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on_nth_write.lock().unwrap() == Some(call_index) {
            return Err(EngineError::ParserFailure(format!(
                "synthetic failure on write #{call_index}"
            )));
        }

        let sleep_ms = self.write_sleep_ms.load(Ordering::SeqCst);
        if sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }

        let value = (clip.y0.max(0.0) as u32 % 256) as u8;
        dst.fill(value);
        Ok(())
    }

    fn duplicate(&self) -> EngineResult<Self> {
        Ok(self.clone())
    }
}

/// Poll `engine` until a result is published, or `timeout` elapses.
pub fn poll_until_ready<P: Parser + 'static>(
    engine: &pdvu_render::RenderEngine<P>,
    timeout: Duration,
) -> Option<pdvu_render::RenderResult> {
    let start = std::time::Instant::now();
    loop {
        if let Some(result) = engine.poll_result() {
            return Some(result);
        }
        if start.elapsed() > timeout {
            return None;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
