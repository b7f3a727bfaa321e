use anyhow::Result;

use crate::memory::Memory;

/// A program plus the data-memory image it runs against and a way to check
/// its result.
pub trait Kernel {
    fn program(&self) -> Result<Vec<u16>>;
    /// `(base address, bytes)` images loaded into data memory before launch.
    fn data(&self) -> Result<Vec<(u8, Vec<u8>)>>;
    fn thread_count(&self) -> u8;
    fn check(&self, data: &Memory<u8>) -> Result<()>;
    fn get_kernel_type(&self) -> String;
    fn log(&self);
}
