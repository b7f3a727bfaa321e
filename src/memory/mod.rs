pub mod controller;
pub mod device;
pub mod layout;
pub use controller::{ConsumerRequest, MemoryController, Response};
pub use device::Memory;
pub use layout::DataLayout;
