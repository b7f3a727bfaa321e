pub mod trace;
pub use trace::{CoreSnapshot, CycleRecord, ExecutionTrace, LaneSnapshot};
