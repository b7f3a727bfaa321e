pub mod stats;
pub mod system;
pub use stats::SimStats;
pub use system::Gpu;
