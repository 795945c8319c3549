//! Single-slot, overwrite-on-write request mailbox: the coordinator's inbox.
//!
//! New requests replace whatever is pending rather than queuing behind it —
//! this is the drop-older coalescing the facade's `request()` promises. A
//! request already being rendered is unaffected; only the *next* one to be
//! picked up can be superseded. `req_id`s are assigned here, under the same
//! lock that posts the request, so ids are totally ordered across calls.

use std::sync::{Condvar, Mutex};
use std::time::Instant;

use crate::pixel_buffer::Medium;
use crate::request::RenderRequest;

enum Slot {
    Empty,
    Pending(RenderRequest),
    ShuttingDown,
}

struct State {
    slot: Slot,
    next_req_id: u64,
}

pub struct Mailbox {
    state: Mutex<State>,
    cv: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: Slot::Empty,
                next_req_id: 1,
            }),
            cv: Condvar::new(),
        }
    }

    /// Assign the next `req_id` and overwrite the pending request, if any.
    /// Returns the assigned id, or `None` if the mailbox has shut down.
    pub fn post(&self, page: u32, zoom: f32, rotation: u16, medium: Medium) -> Option<u64> {
        let mut state = self.state.lock().unwrap();
        if matches!(state.slot, Slot::ShuttingDown) {
            return None;
        }
        let req_id = state.next_req_id;
        state.next_req_id += 1;
        state.slot = Slot::Pending(RenderRequest {
            req_id,
            page,
            zoom,
            rotation,
            medium,
            submitted_at: Instant::now(),
        });
        self.cv.notify_one();
        Some(req_id)
    }

    /// Block until a request arrives or shutdown is signaled, then take it.
    /// Returns `None` on shutdown.
    pub fn take(&self) -> Option<RenderRequest> {
        let mut state = self.state.lock().unwrap();
        loop {
            match std::mem::replace(&mut state.slot, Slot::Empty) {
                Slot::Empty => {
                    state = self.cv.wait(state).unwrap();
                }
                Slot::Pending(req) => return Some(req),
                Slot::ShuttingDown => {
                    state.slot = Slot::ShuttingDown;
                    return None;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.slot = Slot::ShuttingDown;
        self.cv.notify_one();
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn post_then_take_returns_the_request() {
        let mailbox = Mailbox::new();
        let id = mailbox.post(0, 1.0, 0, Medium::TempFile).unwrap();
        assert_eq!(id, 1);
        assert_eq!(mailbox.take().unwrap().req_id, 1);
    }

    #[test]
    fn ids_are_monotonically_increasing() {
        let mailbox = Mailbox::new();
        let a = mailbox.post(0, 1.0, 0, Medium::TempFile).unwrap();
        let b = mailbox.post(0, 2.0, 0, Medium::TempFile).unwrap();
        assert!(b > a);
    }

    #[test]
    fn newer_post_overwrites_older_pending_request() {
        let mailbox = Mailbox::new();
        mailbox.post(0, 1.0, 0, Medium::TempFile);
        mailbox.post(0, 2.0, 0, Medium::TempFile);
        let third = mailbox.post(0, 3.0, 0, Medium::TempFile).unwrap();
        let taken = mailbox.take().unwrap();
        assert_eq!(taken.req_id, third);
        assert_eq!(taken.zoom, 3.0);
    }

    #[test]
    fn take_blocks_until_a_post_arrives() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.take())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        mailbox.post(0, 1.0, 0, Medium::TempFile);
        assert!(consumer.join().unwrap().is_some());
    }

    #[test]
    fn shutdown_wakes_a_blocked_take_with_none() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.take())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        mailbox.shutdown();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn post_after_shutdown_is_ignored() {
        let mailbox = Mailbox::new();
        mailbox.shutdown();
        assert!(mailbox.post(0, 1.0, 0, Medium::TempFile).is_none());
        assert!(mailbox.take().is_none());
    }
}
