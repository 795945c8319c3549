//! The coordinator: single supervisor thread owning both caches, the
//! currently-published pixel buffer, and the request-processing pipeline.
//!
//! Everything here runs on one thread. The only cross-thread surfaces are
//! the [`Mailbox`] (inbound) and the result slot (outbound) — both
//! independently synchronized, so the coordinator itself never needs a
//! lock around its own state.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::band::split_bounds;
use crate::cache::LruCache;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::geometry::PageGeometry;
use crate::mailbox::Mailbox;
use crate::parser::Parser;
use crate::pixel_buffer::{Medium, PixelBuffer};
use crate::pool::WorkerPool;
use crate::request::{PageCacheEntry, PageKey, RenderRequest, RenderResult};

pub type ResultSlot = Mutex<Option<RenderResult>>;

pub struct Coordinator<P: Parser + 'static> {
    parser: P,
    pool: WorkerPool<P>,
    config: EngineConfig,
    mailbox: Arc<Mailbox>,
    result_slot: Arc<ResultSlot>,
    dlist_cache: LruCache<usize, Arc<P::DisplayList>>,
    page_cache: LruCache<PageKey, PageCacheEntry>,
    /// The buffer currently referenced by the last published result. Held
    /// here so its OS resource survives until a newer render replaces it.
    current_buffer: Option<Arc<PixelBuffer>>,
}

impl<P: Parser + 'static> Coordinator<P> {
    pub fn new(
        parser: P,
        pool: WorkerPool<P>,
        config: EngineConfig,
        mailbox: Arc<Mailbox>,
        result_slot: Arc<ResultSlot>,
    ) -> Self {
        Self {
            dlist_cache: LruCache::new(config.display_list_cache_capacity),
            page_cache: LruCache::new(config.page_cache_capacity),
            parser,
            pool,
            config,
            mailbox,
            result_slot,
            current_buffer: None,
        }
    }

    /// Drain the mailbox until shutdown, publishing one result per request.
    pub fn run(mut self) {
        log::debug!("coordinator loop starting");
        while let Some(request) = self.mailbox.take() {
            log::debug!("coordinator processing req_id={}", request.req_id);
            let result = self.process(&request);
            if !result.error.is_empty() {
                log::warn!("req_id={} failed: {}", result.req_id, result.error);
            }
            *self.result_slot.lock().unwrap() = Some(result);
        }
        log::info!("coordinator loop exiting");
    }

    fn process(&mut self, request: &RenderRequest) -> RenderResult {
        let page_key = PageKey::new(request.page, request.zoom, request.rotation);

        // Step 1: page cache lookup.
        if self.config.use_cache {
            if let Some(entry) = self.page_cache.get(&page_key) {
                log::debug!("page cache hit for req_id={}", request.req_id);
                return self.publish_from_cache(request, &entry);
            }
        }

        let page_index = request.page as usize;

        // Step 2: display-list acquisition.
        let dlist_start = Instant::now();
        let cached_dlist = if self.config.use_cache {
            self.dlist_cache.get(&page_index)
        } else {
            None
        };
        let (display_list, from_cache) = match cached_dlist {
            Some(dl) => (dl, true),
            None => match self.parser.get_display_list(page_index) {
                Ok(dl) => (dl, false),
                Err(e) => {
                    return self.fail(request, format!("failed to build display list: {e}"))
                }
            },
        };
        let dlist_elapsed = dlist_start.elapsed();

        let bounds = match self.parser.page_bounds(page_index) {
            Ok(b) => b,
            Err(e) => return self.fail(request, format!("failed to read page bounds: {e}")),
        };
        let quarters = (request.rotation / 90) as i32;
        let geometry = PageGeometry::from_bounds(bounds)
            .scale(request.zoom as f64)
            .rotate_quarter_clockwise(quarters);

        // Step 3: buffer allocation.
        let buffer = match PixelBuffer::create(geometry.byte_size, request.medium) {
            Ok(b) => Arc::new(b),
            Err(e) => return self.fail(request, e.to_string()),
        };

        // Step 4: strip split.
        let bands = split_bounds(&geometry, self.config.pool_size);

        // Step 5 + 6: fan-out, then fan-in in submission order.
        let render_start = Instant::now();
        let mut handles = Vec::with_capacity(bands.len());
        for band in &bands {
            let display_list = Arc::clone(&display_list);
            let buffer = Arc::clone(&buffer);
            let band = *band;
            let zoom = request.zoom as f64;
            let rotation = request.rotation;
            let submitted = self.pool.submit(move |parser: &mut P| -> EngineResult<()> {
                // SAFETY: bands produced by `split_bounds` are disjoint and
                // cover the buffer exactly; no other live slice aliases
                // `band.offset..band.offset+band.bytes`.
                let dst = unsafe { buffer.band_slice(band.offset, band.bytes) };
                parser.write_section(&display_list, band.rect, zoom, rotation, dst)
            });
            match submitted {
                Ok(handle) => handles.push(handle),
                Err(e) => return self.fail(request, e.to_string()),
            }
        }

        for handle in handles {
            match handle.wait() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return self.fail(request, format!("section draw failed: {e}")),
                Err(e) => return self.fail(request, e.to_string()),
            }
        }
        let render_elapsed = render_start.elapsed();

        // Step 7: page cache admission.
        if self.config.use_cache
            && render_elapsed >= self.config.page_cache_admission_threshold
        {
            let entry = match request.medium {
                Medium::SharedMemory => {
                    let mut bytes = vec![0u8; buffer.size()];
                    buffer.copy_out(&mut bytes);
                    PageCacheEntry::Copied {
                        bytes: Arc::new(bytes),
                        width: geometry.width,
                        height: geometry.height,
                    }
                }
                Medium::TempFile => PageCacheEntry::Handle {
                    buffer: Arc::clone(&buffer),
                    width: geometry.width,
                    height: geometry.height,
                },
            };
            log::debug!("admitting page {} into page cache", request.page);
            self.page_cache.put(page_key, entry);
        }

        // Step 8: display-list cache admission.
        if self.config.use_cache
            && !from_cache
            && dlist_elapsed >= self.config.display_list_admission_threshold
        {
            log::debug!("admitting page {} into display-list cache", page_index);
            self.dlist_cache.put(page_index, Arc::clone(&display_list));
        }

        // Step 9: publish.
        self.current_buffer = Some(Arc::clone(&buffer));
        RenderResult {
            req_id: request.req_id,
            page: request.page,
            zoom: request.zoom,
            width: geometry.width,
            height: geometry.height,
            render_ms: render_elapsed.as_millis() as i64,
            error: String::new(),
            path: buffer.name().to_string(),
            medium: request.medium.as_str().to_string(),
        }
    }

    fn publish_from_cache(&mut self, request: &RenderRequest, entry: &PageCacheEntry) -> RenderResult {
        let (buffer, width, height) = match materialize(entry, request.medium) {
            Ok(v) => v,
            Err(e) => return self.fail(request, e.to_string()),
        };
        self.current_buffer = Some(Arc::clone(&buffer));
        RenderResult {
            req_id: request.req_id,
            page: request.page,
            zoom: request.zoom,
            width,
            height,
            render_ms: request.submitted_at.elapsed().as_millis() as i64,
            error: String::new(),
            path: buffer.name().to_string(),
            medium: request.medium.as_str().to_string(),
        }
    }

    fn fail(&self, request: &RenderRequest, message: impl Into<String>) -> RenderResult {
        RenderResult::failure(request.req_id, request.page, request.zoom, request.medium, message)
    }
}

/// Turn a cached page entry into a publishable buffer in the requested
/// medium, copying bytes only when the cached representation doesn't
/// already match (see [`PageCacheEntry`]'s doc comment for the asymmetry).
fn materialize(
    entry: &PageCacheEntry,
    requested_medium: Medium,
) -> EngineResult<(Arc<PixelBuffer>, i32, i32)> {
    match entry {
        PageCacheEntry::Copied { bytes, width, height } => {
            let buffer = PixelBuffer::create(bytes.len(), requested_medium)?;
            if !bytes.is_empty() {
                unsafe { buffer.band_slice(0, bytes.len()) }.copy_from_slice(bytes);
            }
            Ok((Arc::new(buffer), *width, *height))
        }
        PageCacheEntry::Handle { buffer, width, height } => {
            if buffer.medium() == requested_medium {
                Ok((Arc::clone(buffer), *width, *height))
            } else {
                let mut bytes = vec![0u8; buffer.size()];
                buffer.copy_out(&mut bytes);
                let fresh = PixelBuffer::create(bytes.len(), requested_medium)?;
                if !bytes.is_empty() {
                    unsafe { fresh.band_slice(0, bytes.len()) }.copy_from_slice(&bytes);
                }
                Ok((Arc::new(fresh), *width, *height))
            }
        }
    }
}
