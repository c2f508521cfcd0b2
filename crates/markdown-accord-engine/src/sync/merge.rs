//! Character-level three-way text merge.

use similar::{DiffOp, TextDiff};

/// Merge two descendants of a common baseline into one text.
///
/// Local edits are taken as-is; remote edits are replayed on top of them
/// at positions carried through the local diff. A remote deletion only
/// removes baseline characters that still survive locally, and a remote
/// insertion lands before the first surviving character at or after its
/// baseline anchor (at the end if none survives). When both sides insert
/// at the same spot, local text comes first. The result is deterministic
/// and never fails; overlapping rewrites keep both sides' text rather
/// than dropping either.
pub fn three_way_merge(base: &str, local: &str, remote: &str) -> String {
    if local == base {
        return remote.to_string();
    }
    if remote == base || local == remote {
        return local.to_string();
    }

    let base_len = base.chars().count();
    let local_chars: Vec<char> = local.chars().collect();
    let remote_chars: Vec<char> = remote.chars().collect();

    // Where each surviving baseline character lives in the local text.
    let mut base_to_local: Vec<Option<usize>> = vec![None; base_len];
    for op in TextDiff::from_chars(base, local).ops() {
        if let DiffOp::Equal {
            old_index,
            new_index,
            len,
        } = *op
        {
            for k in 0..len {
                base_to_local[old_index + k] = Some(new_index + k);
            }
        }
    }

    let mut deleted = vec![false; local_chars.len()];
    let mut inserts: Vec<Vec<char>> = vec![Vec::new(); local_chars.len() + 1];

    for op in TextDiff::from_chars(base, remote).ops() {
        match *op {
            DiffOp::Equal { .. } => {}
            DiffOp::Delete {
                old_index, old_len, ..
            } => mark_deleted(&base_to_local, &mut deleted, old_index, old_len),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => {
                let at = first_surviving(&base_to_local, old_index, local_chars.len());
                inserts[at].extend_from_slice(&remote_chars[new_index..new_index + new_len]);
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                mark_deleted(&base_to_local, &mut deleted, old_index, old_len);
                let at = first_surviving(&base_to_local, old_index, local_chars.len());
                inserts[at].extend_from_slice(&remote_chars[new_index..new_index + new_len]);
            }
        }
    }

    let mut merged = String::with_capacity(local.len() + remote.len() / 4);
    for (i, &c) in local_chars.iter().enumerate() {
        merged.extend(inserts[i].iter());
        if !deleted[i] {
            merged.push(c);
        }
    }
    merged.extend(inserts[local_chars.len()].iter());
    merged
}

fn mark_deleted(base_to_local: &[Option<usize>], deleted: &mut [bool], from: usize, len: usize) {
    for p in from..from + len {
        if let Some(lp) = base_to_local.get(p).copied().flatten() {
            deleted[lp] = true;
        }
    }
}

fn first_surviving(base_to_local: &[Option<usize>], from: usize, local_len: usize) -> usize {
    base_to_local
        .get(from..)
        .into_iter()
        .flatten()
        .find_map(|mapped| *mapped)
        .unwrap_or(local_len)
}
