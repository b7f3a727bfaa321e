use anyhow::{anyhow, bail, ensure, Result};

use crate::util::MEM_WORDS;

#[derive(Debug, Clone)]
pub struct Region {
    pub id: Option<String>, // None when free
    pub start: usize,
    pub size: usize,
}

impl Region {
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

/// First-fit placement of named buffers in the 256-word data memory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub align: usize,
    pub regions: Vec<Region>,
}

impl DataLayout {
    pub fn new(align: usize) -> DataLayout {
        DataLayout {
            align: align.max(1),
            regions: vec![Region {
                id: None,
                start: 0,
                size: MEM_WORDS,
            }],
        }
    }

    pub fn alloc(&mut self, id: &str, size: usize) -> Result<u8> {
        ensure!(size > 0, "buffer {:?} has zero size", id);
        if self.get_addr(id).is_some() {
            bail!("buffer {:?} already allocated", id);
        }
        let size = (size + self.align - 1) / self.align * self.align;
        let idx = self
            .regions
            .iter()
            .position(|r| r.id.is_none() && r.size >= size)
            .ok_or_else(|| {
                anyhow!(
                    "failed to allocate {:?} with {} words, current regions {:?}",
                    id,
                    size,
                    self.regions
                )
            })?;

        let start = self.regions[idx].start;
        let remain = self.regions[idx].size - size;
        self.regions[idx] = Region {
            id: Some(id.to_string()),
            start,
            size,
        };
        if remain > 0 {
            self.regions.insert(
                idx + 1,
                Region {
                    id: None,
                    start: start + size,
                    size: remain,
                },
            );
        }
        Ok(start as u8)
    }

    pub fn free(&mut self, id: &str) -> Result<()> {
        let idx = self
            .regions
            .iter()
            .position(|r| r.id.as_deref() == Some(id))
            .ok_or_else(|| anyhow!("buffer {:?} not found", id))?;
        self.regions[idx].id = None;
        self.merge(idx);
        Ok(())
    }

    fn merge(&mut self, mut idx: usize) {
        if idx > 0 && self.regions[idx - 1].id.is_none() {
            self.regions[idx - 1].size += self.regions[idx].size;
            self.regions.remove(idx);
            idx -= 1;
        }
        if idx + 1 < self.regions.len() && self.regions[idx + 1].id.is_none() {
            self.regions[idx].size += self.regions[idx + 1].size;
            self.regions.remove(idx + 1);
        }
    }

    pub fn get_addr(&self, id: &str) -> Option<u8> {
        self.regions
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .map(|r| r.start as u8)
    }

    pub fn get_size(&self, id: &str) -> Option<usize> {
        self.regions
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .map(|r| r.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() -> Result<()> {
        let mut layout = DataLayout::new(8);
        assert_eq!(layout.alloc("a", 8)?, 0);
        assert_eq!(layout.alloc("b", 5)?, 8);
        assert_eq!(layout.alloc("c", 8)?, 16);
        assert_eq!(layout.get_size("b"), Some(8));
        assert!(layout.alloc("a", 1).is_err());
        assert!(layout.alloc("huge", 256).is_err());

        layout.free("b")?;
        layout.free("a")?;
        assert_eq!(layout.regions.len(), 3);
        assert_eq!(layout.alloc("d", 16)?, 0);
        layout.free("c")?;
        layout.free("d")?;
        assert_eq!(layout.regions.len(), 1);
        assert_eq!(layout.regions[0].end(), MEM_WORDS);
        assert!(layout.free("d").is_err());
        Ok(())
    }
}
