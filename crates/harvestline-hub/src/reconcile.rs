//! Remote progress: the highest file index already published as a shard

/// Parse `shards/shard_{start}_{end}.jsonl` (each index at least six digits).
pub fn parse_shard_name(name: &str) -> Option<(usize, usize)> {
    let stem = name.strip_prefix("shards/shard_")?.strip_suffix(".jsonl")?;
    let (start, end) = stem.split_once('_')?;
    Some((parse_index(start)?, parse_index(end)?))
}

fn parse_index(s: &str) -> Option<usize> {
    if s.len() < 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Largest shard end index in a remote listing, 0 if there are no shards.
pub fn remote_high_water_mark<S: AsRef<str>>(listing: &[S]) -> usize {
    listing
        .iter()
        .filter_map(|name| parse_shard_name(name.as_ref()))
        .map(|(_, end)| end)
        .max()
        .unwrap_or(0)
}

/// Index to resume publishing from.
///
/// Normally the further of local and remote progress; `force_remote` ignores
/// the local file (e.g. after the remote dataset was rebuilt).
pub fn resume_index(local: usize, remote: usize, force_remote: bool) -> usize {
    if force_remote {
        remote
    } else {
        local.max(remote)
    }
}
