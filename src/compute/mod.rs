pub mod fetcher;
pub mod lane;
pub mod scheduler;
pub mod simd_core;
pub use simd_core::{Core, CoreInputs};
pub use fetcher::{Fetcher, FetcherState};
pub use lane::lsu::LsuState;
pub use lane::Lane;
pub use scheduler::CoreState;
