pub mod kernel;
pub mod matadd;
pub mod matmul;
pub use kernel::Kernel;
pub use matadd::{MatAdd, MatAddConfig};
pub use matmul::{MatMul, MatMulConfig};
