use knap_utils::PeakAlloc;

#[global_allocator]
static ALLOC: PeakAlloc = PeakAlloc;

mod harness;
pub use harness::*;
