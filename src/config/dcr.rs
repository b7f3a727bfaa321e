/// Host-facing device control register. A write-enable pulse latches the
/// kernel's thread count; nothing else is programmable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceControlRegister {
    thread_count: u8,
}

impl DeviceControlRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, write_enable: bool, data: u8) {
        if write_enable {
            self.thread_count = data;
        }
    }

    pub fn thread_count(&self) -> u8 {
        self.thread_count
    }

    pub fn reset(&mut self) {
        self.thread_count = 0;
    }
}
