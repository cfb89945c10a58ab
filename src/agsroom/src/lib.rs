//! # agsroom
//!
//! Codec for compiled AGS room files (`.crm`).
//!
//! This library provides functionality to:
//! - Detect which on-disk format revision a room uses
//! - Walk the block directory (with a legacy fallback scanner)
//! - Export and replace whole block payloads
//! - Recover the hotspot table: display names, script identifiers, and the
//!   interaction handlers referenced by the compiled script
//! - Rewrite the hotspot tables in place, preserving every byte the codec
//!   does not understand
//!
//! ## Example
//!
//! ```no_run
//! use std::fs;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = fs::read("room3.crm")?;
//!
//! let version = agsroom::detect_version(&bytes)?;
//! println!("revision: {}", version);
//! for block in agsroom::list_blocks(&bytes)? {
//!     println!("{} @ {:#x} ({} bytes)", block.name(), block.offset, block.length);
//! }
//!
//! let mut hotspots = agsroom::read_hotspots(&bytes).hotspots;
//! hotspots[0].name = "Main Entrance".to_string();
//! hotspots[0].script_name = "hMainEntrance".to_string();
//! agsroom::write_hotspots(
//!     Path::new("room3.crm"),
//!     Path::new("room3.crm"),
//!     &hotspots,
//!     &agsroom::WriteOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod blocks;
pub mod cursor;
pub mod hotspots;
pub mod version;
pub mod writer;

// Re-export commonly used items
pub use backup::{create_backup, verify_backup, BackupError, BackupMetadata};
pub use blocks::{
    extract_block_payload, find_block, parse_blocks, replace_block_payload, scan_legacy, Block,
    BlockError, BlockId, LegacyScanResult,
};
pub use cursor::{ByteReader, CursorError};
pub use hotspots::{
    read_hotspots, Hotspot, HotspotChanges, HotspotReadResult, HotspotUpdate, Interaction, Point,
};
pub use version::{Capabilities, RoomVersion, VersionError};
pub use writer::{
    encode_hotspots, validate_hotspots, write_hotspots, WriteError, WriteOptions, WriteReport,
};

/// Read the revision field at the start of a room buffer.
pub fn detect_version(bytes: &[u8]) -> Result<RoomVersion, VersionError> {
    RoomVersion::detect(bytes)
}

/// Walk the block directory in on-disk order.
pub fn list_blocks(bytes: &[u8]) -> Result<Vec<Block>, BlockError> {
    blocks::parse_blocks(bytes)
}

/// Read the hotspot table straight from a file path.
pub fn read_hotspots_from(path: &std::path::Path) -> std::io::Result<HotspotReadResult> {
    Ok(hotspots::read_hotspots(&std::fs::read(path)?))
}
