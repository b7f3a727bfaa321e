pub mod compute;
pub mod config;
pub mod dispatch;
pub mod isa;
pub mod kernel;
pub mod memory;
pub mod system;
pub mod trace;
pub mod util;
