use std::collections::HashMap;

use log::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub cycles: u64,
    /// Retired instructions per class, counted once per core (not per lane).
    pub retired: HashMap<String, usize>,
    pub program_reads: usize,
    pub data_reads: usize,
    pub data_writes: usize,
    pub blocks_completed: usize,
}

impl SimStats {
    pub fn record_retire(&mut self, class: &str) {
        *self.retired.entry(class.to_string()).or_insert(0) += 1;
    }

    pub fn total_retired(&self) -> usize {
        self.retired.values().sum()
    }

    pub fn reset(&mut self) {
        *self = SimStats::default();
    }

    pub fn log(&self) {
        info!(
            "cycles: {}, retired: {}, blocks: {}",
            self.cycles,
            self.total_retired(),
            self.blocks_completed
        );
        info!(
            "program reads: {}, data reads: {}, data writes: {}",
            self.program_reads, self.data_reads, self.data_writes
        );
        let mut classes = self.retired.iter().collect::<Vec<_>>();
        classes.sort();
        for (class, cnt) in classes {
            info!("  {}: {}", class, cnt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retire_counts() {
        let mut stats = SimStats::default();
        stats.record_retire("ADD");
        stats.record_retire("ADD");
        stats.record_retire("RET");
        assert_eq!(stats.retired["ADD"], 2);
        assert_eq!(stats.total_retired(), 3);
        stats.reset();
        assert_eq!(stats.total_retired(), 0);
    }
}
