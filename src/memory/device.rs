use anyhow::{ensure, Result};

use crate::util::MEM_WORDS;

/// Behavioral memory device: 256 words behind fixed read/write latencies.
/// The latency is applied by the controller channel that owns the request;
/// the device itself only stores words.
#[derive(Debug, Clone)]
pub struct Memory<W> {
    pub name: String,
    pub read_latency: u32,
    pub write_latency: u32,
    data: Vec<W>,
}

impl<W: Copy + Default> Memory<W> {
    pub fn new(name: &str, read_latency: u32, write_latency: u32) -> Self {
        Memory {
            name: name.to_string(),
            read_latency,
            write_latency,
            data: vec![W::default(); MEM_WORDS],
        }
    }

    pub fn load(&mut self, base: usize, words: &[W]) -> Result<()> {
        ensure!(
            base + words.len() <= MEM_WORDS,
            "{}: image of {} words at {} overflows {} words",
            self.name,
            words.len(),
            base,
            MEM_WORDS
        );
        self.data[base..base + words.len()].copy_from_slice(words);
        Ok(())
    }

    pub fn read(&self, addr: u8) -> W {
        self.data[addr as usize]
    }

    pub fn write(&mut self, addr: u8, value: W) {
        self.data[addr as usize] = value;
    }

    pub fn dump(&self, base: usize, len: usize) -> &[W] {
        let end = (base + len).min(MEM_WORDS);
        &self.data[base.min(end)..end]
    }

    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|w| *w = W::default());
    }
}
