use std::{
    alloc::{GlobalAlloc, Layout, System},
    sync::atomic::{AtomicUsize, Ordering},
};

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// System allocator wrapper that keeps a count of live heap bytes and their high-water mark.
///
/// Only has an effect once registered with `#[global_allocator]`; otherwise all
/// counters stay at zero.
pub struct PeakAlloc;

unsafe impl GlobalAlloc for PeakAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_grow(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_grow(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        CURRENT.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                record_grow(new_size - layout.size());
            } else {
                CURRENT.fetch_sub(layout.size() - new_size, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}

fn record_grow(size: usize) {
    let now = CURRENT.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(now, Ordering::Relaxed);
}

pub fn current_bytes() -> usize {
    CURRENT.load(Ordering::Relaxed)
}

pub fn peak_bytes() -> usize {
    PEAK.load(Ordering::Relaxed)
}

/// Lowers the high-water mark to the current live size and returns it.
pub fn reset_peak() -> usize {
    let now = CURRENT.load(Ordering::Relaxed);
    PEAK.store(now, Ordering::Relaxed);
    now
}

pub fn bytes_to_mib(bytes: usize) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

/// Peak heap growth observed since the scope was opened.
#[derive(Debug, Clone, Copy)]
pub struct PeakScope {
    baseline: usize,
}

impl PeakScope {
    pub fn start() -> Self {
        Self {
            baseline: reset_peak(),
        }
    }

    pub fn peak_bytes(&self) -> usize {
        peak_bytes().saturating_sub(self.baseline)
    }
}
