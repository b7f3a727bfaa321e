pub mod arch_config;
pub mod dcr;
pub use arch_config::GpuConfig;
pub use dcr::DeviceControlRegister;
