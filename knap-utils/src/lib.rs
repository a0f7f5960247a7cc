mod json;
pub use json::*;
mod logging;
pub use logging::*;
mod memory;
pub use memory::*;
