mod error;
pub use error::*;
mod interrupt;
pub use interrupt::*;
pub mod knapsack;
