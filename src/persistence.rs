//! Bit-exact save/restore of an archetype graph's memo tables.
//!
//! The format is native-endian and deliberately not wire-compatible with
//! any other tool: it exists to snapshot and reload this process's own
//! memo state, not to interchange with the original implementation.
//! `save`/`restore` each open exactly one file and let its `Drop` close
//! it on every exit path, including error returns.

use crate::archetype::Archetype;
use crate::error::HnkError;
use hnk_bignum::Count;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;

fn write_i32(sink: &mut impl Write, value: i32) -> Result<(), HnkError> {
    sink.write_all(&value.to_ne_bytes())?;
    Ok(())
}

fn read_i32(source: &mut impl Read) -> Result<i32, HnkError> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}

/// Writes `root`'s memo tables and children to `path`.
pub fn save(root: &Archetype, path: impl AsRef<Path>) -> Result<(), HnkError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    tracing::debug!("saving archetype graph");
    save_node(root, &mut writer)
}

fn save_node(node: &Archetype, sink: &mut impl Write) -> Result<(), HnkError> {
    write_i32(sink, node.max_h() as i32)?;
    write_i32(sink, node.max_k() as i32)?;
    write_i32(sink, node.max_split() as i32)?;

    for h in 0..=node.max_h() {
        write_i32(sink, node.max_k_at_h(h)? as i32)?;
    }

    for h in 0..=node.max_h() {
        if node.counts_row_present(h) {
            let storage = node.max_k_at_h_storage(h)?;
            write_i32(sink, storage as i32)?;
            for k in 0..=storage {
                node.count(h, k as i64)?.write_raw(sink)?;
            }
        } else {
            write_i32(sink, 0)?;
        }
    }

    let n_splits = node.n_splits();
    for h in 0..=node.max_h() {
        if node.split_row_present(h) {
            let storage = node.max_k_at_h_storage(h)?;
            write_i32(sink, storage as i32)?;
            for k in 0..=storage {
                if node.split_cell_present(h, k) {
                    write_i32(sink, n_splits as i32)?;
                    for s in 0..n_splits as usize {
                        let value = node.memo_split(h, k, s).unwrap_or_else(Count::zero);
                        value.write_raw(sink)?;
                    }
                } else {
                    write_i32(sink, 0)?;
                }
            }
        } else {
            write_i32(sink, 0)?;
        }
    }

    for h in 0..=node.max_h() {
        if node.ratios_row_present(h) {
            let storage = node.max_k_at_h_storage(h)?;
            write_i32(sink, storage as i32)?;
            for k in 0..=storage {
                let value = node.ratio_kplus1(h, k)?;
                sink.write_all(&value.to_ne_bytes())?;
            }
        } else {
            write_i32(sink, 0)?;
        }
    }

    let children = node.children_snapshot();
    for child in &children {
        if Rc::ptr_eq(child, node) {
            write_i32(sink, 0)?;
        } else {
            write_i32(sink, 1)?;
            save_node(child, sink)?;
        }
    }

    Ok(())
}

/// Restores memo tables into `root`, which must already be constructed to
/// the same shape (`max_h`, `max_k`, `max_split`, topology) as the graph
/// that was saved. Mismatches fail with `HnkError::ShapeMismatch` rather
/// than silently adopting the file's parameters.
pub fn restore(root: &Archetype, path: impl AsRef<Path>) -> Result<(), HnkError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    tracing::debug!("restoring archetype graph");
    restore_node(root, &mut reader)
}

fn restore_node(node: &Archetype, source: &mut impl Read) -> Result<(), HnkError> {
    let max_h = read_i32(source)?;
    let max_k = read_i32(source)?;
    let max_split = read_i32(source)?;
    if max_h != node.max_h() as i32 || max_k != node.max_k() as i32 || max_split != node.max_split() as i32 {
        return Err(HnkError::ShapeMismatch {
            reason: format!(
                "expected (max_h={}, max_k={}, max_split={}), found (max_h={max_h}, max_k={max_k}, max_split={max_split})",
                node.max_h(),
                node.max_k(),
                node.max_split()
            ),
        });
    }

    for h in 0..=node.max_h() {
        let value = read_i32(source)?;
        if value < 0 {
            return Err(HnkError::ShapeMismatch {
                reason: format!("negative max_k_at_h at height {h}"),
            });
        }
        node.store_max_k_at_h(h, value as u32);
    }

    for h in 0..=node.max_h() {
        let width = read_i32(source)?;
        if width > 0 {
            for k in 0..=(width as u32) {
                let value = Count::read_raw(source)?;
                node.store_count(h, k, value);
            }
        }
    }

    let n_splits = node.n_splits();
    for h in 0..=node.max_h() {
        let width = read_i32(source)?;
        if width > 0 {
            for k in 0..=(width as u32) {
                let cell_width = read_i32(source)?;
                if cell_width > 0 {
                    for s in 0..n_splits as usize {
                        let value = Count::read_raw(source)?;
                        node.store_split(h, k, s, value);
                    }
                }
            }
        }
    }

    for h in 0..=node.max_h() {
        let width = read_i32(source)?;
        if width > 0 {
            for k in 0..=(width as u32) {
                let mut buf = [0u8; 8];
                source.read_exact(&mut buf)?;
                node.store_ratio(h, k, f64::from_ne_bytes(buf));
            }
        }
    }

    let children = node.children_snapshot();
    for (i, child) in children.iter().enumerate() {
        let marker = read_i32(source)?;
        match marker {
            0 => {
                if !Rc::ptr_eq(child, node) {
                    return Err(HnkError::ShapeMismatch {
                        reason: format!("restored graph marks child {i} as self-recursive but the live graph does not"),
                    });
                }
            }
            1 => restore_node(child, source)?,
            other => {
                return Err(HnkError::ShapeMismatch {
                    reason: format!("unexpected subtree marker {other}"),
                })
            }
        }
    }

    Ok(())
}
