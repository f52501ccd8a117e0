//! Fixed-size shard windows over the staged file listing

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Contiguous slice `[start, end)` of the file listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardWindow<'a> {
    pub start: usize,
    pub end: usize,
    pub files: &'a [PathBuf],
}

impl ShardWindow<'_> {
    /// Remote object name for this window
    pub fn name(&self) -> String {
        shard_name(self.start, self.end)
    }
}

/// `shards/shard_{start:06}_{end:06}.jsonl`
pub fn shard_name(start: usize, end: usize) -> String {
    format!("shards/shard_{start:06}_{end:06}.jsonl")
}

/// Windows of `shard_size` files starting at `start_index`; the last one may be shorter.
pub fn partition(
    files: &[PathBuf],
    shard_size: NonZeroUsize,
    start_index: usize,
) -> impl Iterator<Item = ShardWindow<'_>> {
    let rest = files.get(start_index..).unwrap_or(&[]);
    rest.chunks(shard_size.get())
        .enumerate()
        .map(move |(i, chunk)| {
            let start = start_index + i * shard_size.get();
            ShardWindow {
                start,
                end: start + chunk.len(),
                files: chunk,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("{i:04}.xml"))).collect()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn window_count_and_sizes() {
        for (len, shard) in [(10, 3), (9, 3), (1, 5), (0, 4), (250, 250), (1001, 500)] {
            let list = files(len);
            let windows: Vec<_> = partition(&list, size(shard), 0).collect();
            assert_eq!(windows.len(), len.div_ceil(shard), "len={len} shard={shard}");
            for (i, w) in windows.iter().enumerate() {
                let expected = if i + 1 == windows.len() && len % shard != 0 {
                    len % shard
                } else {
                    shard
                };
                assert_eq!(w.files.len(), expected);
                assert_eq!(w.end - w.start, w.files.len());
            }
        }
    }

    #[test]
    fn windows_cover_each_index_once_from_start() {
        let list = files(23);
        let windows: Vec<_> = partition(&list, size(5), 7).collect();

        assert_eq!(windows.first().unwrap().start, 7);
        assert_eq!(windows.last().unwrap().end, 23);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let covered: Vec<&PathBuf> = windows.iter().flat_map(|w| w.files).collect();
        let expected: Vec<&PathBuf> = list[7..].iter().collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn start_past_end_is_empty() {
        let list = files(4);
        assert_eq!(partition(&list, size(2), 4).count(), 0);
        assert_eq!(partition(&list, size(2), 10).count(), 0);
    }

    #[test]
    fn shard_names() {
        let list = files(600);
        let names: Vec<_> = partition(&list, size(250), 0).map(|w| w.name()).collect();
        assert_eq!(
            names,
            [
                "shards/shard_000000_000250.jsonl",
                "shards/shard_000250_000500.jsonl",
                "shards/shard_000500_000600.jsonl",
            ]
        );
    }
}
