use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} contains no records")]
    Empty { path: PathBuf },
}

/// Loads the non-blank lines of a libsvm text file
pub fn load_lines(path: &Path) -> Result<Vec<String>, DataError> {
    let io_error = |source| DataError::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(io_error)?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }

    if lines.is_empty() {
        return Err(DataError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!(path = %path.display(), records = lines.len(), "loaded dataset");
    Ok(lines)
}

/// Round-robin shard: keeps lines whose position modulo `num_shards` equals `shard_index`
pub fn shard(lines: Vec<String>, shard_index: usize, num_shards: usize) -> Vec<String> {
    if num_shards <= 1 {
        return lines;
    }
    lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % num_shards == shard_index)
        .map(|(_, line)| line)
        .collect()
}

/// Yields mini-batches of raw lines, reshuffling at every epoch start.
///
/// A trailing partial batch is dropped unless [`BatchReader::keep_partial_batches`]
/// is set, so by default every yielded batch has exactly `batch_size` lines.
#[derive(Debug)]
pub struct BatchReader {
    lines: Vec<String>,
    order: Vec<usize>,
    batch_size: usize,
    epochs: Option<usize>,
    shuffle: bool,
    keep_partial: bool,
    rng: StdRng,
    /// Zero-based epoch currently being read
    epoch: usize,
    position: usize,
}

impl BatchReader {
    /// # Arguments
    /// * `lines` - Raw records
    /// * `batch_size` - Lines per batch, must be positive
    /// * `epochs` - Passes over the data, `None` repeats forever
    /// * `shuffle` - Whether to reshuffle at each epoch
    /// * `seed` - Seed for the shuffle, `None` draws one from the OS
    pub fn new(
        lines: Vec<String>,
        batch_size: usize,
        epochs: Option<usize>,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let order = (0..lines.len()).collect();
        let mut reader = BatchReader {
            lines,
            order,
            batch_size: batch_size.max(1),
            epochs,
            shuffle,
            keep_partial: false,
            rng,
            epoch: 0,
            position: 0,
        };
        reader.start_epoch();
        reader
    }

    /// Also yield the short batch left at the end of each epoch
    pub fn keep_partial_batches(mut self) -> Self {
        self.keep_partial = true;
        self
    }

    fn start_epoch(&mut self) {
        self.position = 0;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.lines.len() / self.batch_size
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the next batch, or `None` once every epoch is consumed
    pub fn next_batch(&mut self) -> Option<Vec<String>> {
        if self.lines.is_empty() || (self.batches_per_epoch() == 0 && !self.keep_partial) {
            return None;
        }

        loop {
            if self.epochs.is_some_and(|epochs| self.epoch >= epochs) {
                return None;
            }

            let end = (self.position + self.batch_size).min(self.order.len());
            let full = end - self.position == self.batch_size;
            if full || (self.keep_partial && end > self.position) {
                let batch = self.order[self.position..end]
                    .iter()
                    .map(|&i| self.lines[i].clone())
                    .collect();
                self.position = end;
                return Some(batch);
            }

            self.epoch += 1;
            debug!(epoch = self.epoch, "batch reader starting new epoch");
            self.start_epoch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    fn numbered(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("+1 {}:1", i + 1)).collect()
    }

    #[test]
    fn test_full_batches_only() {
        let mut reader = BatchReader::new(numbered(7), 3, Some(1), false, None);
        assert_eq!(reader.batches_per_epoch(), 2);

        assert_eq!(reader.next_batch().unwrap(), numbered(3));
        assert_eq!(reader.next_batch().unwrap(), numbered(6)[3..].to_vec());
        assert!(reader.next_batch().is_none());
        assert!(reader.next_batch().is_none());
    }

    #[test]
    fn test_epochs_and_shuffle() {
        let mut reader = BatchReader::new(numbered(4), 2, Some(3), true, Some(42));
        let mut count = 0;
        while let Some(batch) = reader.next_batch() {
            assert_eq!(batch.len(), 2);
            count += 1;
        }
        assert_eq!(count, 6);
        assert_eq!(reader.epoch(), 3);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut reader = BatchReader::new(numbered(10), 5, Some(1), true, Some(7));
        let mut seen = HashSet::new();
        while let Some(batch) = reader.next_batch() {
            seen.extend(batch);
        }
        assert_eq!(seen, numbered(10).into_iter().collect());
    }

    #[test]
    fn test_unbounded_epochs_keep_going() {
        let mut reader = BatchReader::new(numbered(2), 2, None, false, None);
        for _ in 0..10 {
            assert!(reader.next_batch().is_some());
        }
    }

    #[test]
    fn test_too_few_lines_for_a_batch() {
        let mut reader = BatchReader::new(numbered(2), 3, None, false, None);
        assert_eq!(reader.batches_per_epoch(), 0);
        assert!(reader.next_batch().is_none());
    }

    #[test]
    fn test_keep_partial_batches() {
        let mut reader =
            BatchReader::new(numbered(7), 3, Some(2), false, None).keep_partial_batches();
        let sizes: Vec<usize> = std::iter::from_fn(|| reader.next_batch())
            .map(|batch| batch.len())
            .collect();
        assert_eq!(sizes, vec![3, 3, 1, 3, 3, 1]);

        let mut reader =
            BatchReader::new(numbered(2), 5, Some(1), false, None).keep_partial_batches();
        assert_eq!(reader.next_batch().unwrap(), numbered(2));
        assert!(reader.next_batch().is_none());
    }

    #[test]
    fn test_shard_round_robin() {
        let lines = numbered(5);
        assert_eq!(
            shard(lines.clone(), 1, 2),
            vec![lines[1].clone(), lines[3].clone()]
        );
        assert_eq!(shard(lines.clone(), 0, 1), lines);
    }

    #[test]
    fn test_load_lines_skips_blank() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "+1 1:0.5").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "-1 2:1").unwrap();

        let lines = load_lines(file.path()).unwrap();
        assert_eq!(lines, vec!["+1 1:0.5".to_string(), "-1 2:1".to_string()]);
    }

    #[test]
    fn test_load_lines_errors() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            load_lines(file.path()),
            Err(DataError::Empty { .. })
        ));

        let missing = file.path().with_extension("missing");
        assert!(matches!(load_lines(&missing), Err(DataError::Io { .. })));
    }
}
