//! Block directory walking.
//!
//! A room file is a sequential stream of blocks right after the revision
//! field. There is no directory table; the only way to enumerate blocks is
//! to walk the stream:
//!
//! - Old style: `[u8 id][u32 or u64 length][payload]`, length width chosen
//!   by revision. Ids 1..=9 map to well-known block names.
//! - New style (id byte 0): `[16-byte NUL-padded name][u64 length][payload]`.
//! - `0xff` terminates the stream.
//!
//! Payloads are never copied during the walk; a [`Block`] carries only its
//! absolute offset and length into the original buffer.

use crate::cursor::{ByteReader, CursorError};
use crate::version::{RoomVersion, VersionError};
use thiserror::Error;

/// Reserved id byte that ends the block stream.
pub const BLOCK_END: u8 = 0xff;

/// Width of a new-style string block id.
const NEW_STYLE_ID_LEN: usize = 16;

/// Errors from directory walking and block splicing
#[derive(Error, Debug)]
pub enum BlockError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error("block {name} at offset {offset} declares {length} bytes but only {available} remain")]
    InvalidLength {
        name: String,
        offset: usize,
        length: u64,
        available: usize,
    },

    #[error("no block matching {0:?}")]
    BlockNotFound(String),
}

/// Directory entry id: a numeric code for old-style blocks, or a string
/// identifier for new-style ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Legacy(u8),
    Named(String),
}

/// One directory entry. `offset`/`length` describe the payload within the
/// original buffer; `offset + length <= buffer len` is guaranteed by the
/// walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub offset: usize,
    pub length: usize,
}

/// Well-known names for old-style numeric block ids.
fn legacy_block_name(id: u8) -> Option<&'static str> {
    Some(match id {
        1 => "Main",
        2 => "TextScript",
        3 => "CompScript",
        4 => "CompScript2",
        5 => "ObjNames",
        6 => "AnimBg",
        7 => "CompScript3",
        8 => "Properties",
        9 => "ObjectScNames",
        _ => return None,
    })
}

impl Block {
    /// Human-readable block name. Unmapped numeric ids get a synthetic
    /// `Block<N>` name so unknown block types still round-trip.
    pub fn name(&self) -> String {
        match &self.id {
            BlockId::Legacy(id) => legacy_block_name(*id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Block{}", id)),
            BlockId::Named(name) => name.clone(),
        }
    }

    /// Whether `key` (a block name, or a numeric id rendered as decimal)
    /// refers to this block.
    pub fn matches(&self, key: &str) -> bool {
        if self.name() == key {
            return true;
        }
        match (&self.id, key.parse::<u8>()) {
            (BlockId::Legacy(id), Ok(n)) => *id == n,
            _ => false,
        }
    }
}

/// Walk the block stream and return the directory in on-disk order.
pub fn parse_blocks(bytes: &[u8]) -> Result<Vec<Block>, BlockError> {
    let version = RoomVersion::detect(bytes)?;
    let caps = version.capabilities();

    let mut r = ByteReader::new(bytes);
    r.seek(2); // revision field
    let mut blocks = Vec::new();

    loop {
        if r.remaining() == 0 {
            break;
        }
        let id = r.read_u8()?;
        if id == BLOCK_END {
            break;
        }

        let (block_id, length) = if id == 0 {
            // new-style block: string id, always a wide length
            let name = r.read_fixed_string(NEW_STYLE_ID_LEN)?;
            let length = r.read_u64_le()?;
            (BlockId::Named(name), length)
        } else {
            let length = if caps.wide_block_lengths {
                r.read_u64_le()?
            } else {
                u64::from(r.read_u32_le()?)
            };
            (BlockId::Legacy(id), length)
        };

        let offset = r.position();
        let block = Block {
            id: block_id,
            offset,
            length: length as usize,
        };
        if (offset as u64).saturating_add(length) > bytes.len() as u64 {
            return Err(BlockError::InvalidLength {
                name: block.name(),
                offset,
                length,
                available: bytes.len() - offset,
            });
        }
        r.skip(block.length);
        blocks.push(block);
    }

    Ok(blocks)
}

/// Find a directory entry by name or decimal numeric id.
pub fn find_block<'b>(blocks: &'b [Block], key: &str) -> Option<&'b Block> {
    blocks.iter().find(|b| b.matches(key))
}

/// Borrow a block's payload bytes, or `None` when no block matches.
pub fn extract_block_payload<'a>(
    bytes: &'a [u8],
    key: &str,
) -> Result<Option<&'a [u8]>, BlockError> {
    let blocks = parse_blocks(bytes)?;
    Ok(find_block(&blocks, key).map(|b| &bytes[b.offset..b.offset + b.length]))
}

/// Splice a replacement payload over a block: everything before the block's
/// offset, the new payload, everything after `offset + length`. The
/// surrounding bytes are preserved verbatim.
pub fn replace_block_payload(
    bytes: &[u8],
    key: &str,
    new_payload: &[u8],
) -> Result<Vec<u8>, BlockError> {
    let blocks = parse_blocks(bytes)?;
    let block =
        find_block(&blocks, key).ok_or_else(|| BlockError::BlockNotFound(key.to_string()))?;

    let mut out = Vec::with_capacity(bytes.len() - block.length + new_payload.len());
    out.extend_from_slice(&bytes[..block.offset]);
    out.extend_from_slice(new_payload);
    out.extend_from_slice(&bytes[block.offset + block.length..]);
    Ok(out)
}

/// How far into the file the legacy scanner looks for a directory.
const LEGACY_SCAN_WINDOW: usize = 0x400;

/// Size of one fixed-encoding directory entry: `[u32 id][u32 offset][u32 length]`.
const LEGACY_ENTRY_SIZE: usize = 12;

/// Highest block count the legacy scanner considers plausible.
const LEGACY_MAX_BLOCKS: usize = 20;

/// Outcome of a best-effort legacy directory scan. An empty block list is
/// not an error; `diagnostic` says what happened either way.
#[derive(Debug, Clone)]
pub struct LegacyScanResult {
    pub blocks: Vec<Block>,
    pub diagnostic: String,
}

/// Fallback for files the sequential walk cannot handle: scan every
/// 4-byte-aligned offset in a bounded window for a plausible block count
/// followed by exactly that many well-formed `{id, offset, length}` triples.
pub fn scan_legacy(bytes: &[u8]) -> LegacyScanResult {
    let window = bytes.len().min(LEGACY_SCAN_WINDOW);
    for start in (0..window).step_by(4) {
        if let Some(blocks) = try_legacy_directory_at(bytes, start) {
            return LegacyScanResult {
                diagnostic: format!(
                    "recovered {} block(s) from fixed directory at offset {:#x}",
                    blocks.len(),
                    start
                ),
                blocks,
            };
        }
    }
    LegacyScanResult {
        blocks: Vec::new(),
        diagnostic: format!(
            "no plausible fixed block directory in the first {:#x} bytes",
            window
        ),
    }
}

fn try_legacy_directory_at(bytes: &[u8], start: usize) -> Option<Vec<Block>> {
    let mut r = ByteReader::new(bytes);
    r.seek(start);

    let count = r.read_u32_le().ok()? as usize;
    if !(1..=LEGACY_MAX_BLOCKS).contains(&count) {
        return None;
    }
    let directory_end = start + 4 + count * LEGACY_ENTRY_SIZE;

    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let id = r.read_u32_le().ok()?;
        let offset = r.read_u32_le().ok()? as usize;
        let length = r.read_u32_le().ok()? as usize;

        // payloads must live past the directory itself and inside the file
        if id == 0 || id > u32::from(u8::MAX) {
            return None;
        }
        if offset < directory_end || offset.checked_add(length)? > bytes.len() {
            return None;
        }
        blocks.push(Block {
            id: BlockId::Legacy(id as u8),
            offset,
            length,
        });
    }
    Some(blocks)
}
