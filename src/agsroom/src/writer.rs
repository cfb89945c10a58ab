//! In-place rewriting of the hotspot name tables.
//!
//! The writer re-emits the display-name and script-name sequences into the
//! byte range the original tables occupied, plus whatever zero padding
//! trails them. Every byte outside that range is preserved verbatim, and
//! the output is always exactly as long as the input. A rewrite that cannot
//! fit fails with `InsufficientSpace` rather than truncating or shifting
//! adjacent data.
//!
//! All mutation happens on an in-memory copy; the target file is only
//! touched by the final persist, so a crash mid-computation cannot corrupt
//! the source. The backup copy and the persist are still two separate
//! filesystem operations, so a crash between them can leave one without
//! the other.

use crate::backup::{self, BackupError};
use crate::cursor::ByteReader;
use crate::hotspots::{
    align4, find_script_table, is_script_identifier, synthesized_script_name, Hotspot,
    HOTSPOT_NAMES_OFFSET, MAX_HOTSPOTS, MAX_NAME_LEN,
};
use crate::version::{RoomVersion, VersionError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Zero bytes at the end of the rewritable region that are never written,
/// kept as a buffer against the following section.
pub const REGION_SAFETY_MARGIN: usize = 8;

/// Cap on how much trailing zero padding is counted as rewritable.
const MAX_PADDING_SCAN: usize = 0x200;

/// Valid range for walk-to coordinates.
const WALK_TO_MAX: i32 = 9999;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("room revision {0} predates length-prefixed hotspot tables")]
    UnsupportedVersion(RoomVersion),

    #[error("no named hotspots to write")]
    EmptyTable,

    #[error("hotspot id {0} outside 0..=49")]
    InvalidHotspotId(u8),

    #[error("duplicate hotspot id {0}")]
    DuplicateId(u8),

    #[error("hotspot name {0:?} exceeds the 50-byte cap")]
    NameTooLong(String),

    #[error("walk-to point ({x}, {y}) outside 0..=9999")]
    InvalidWalkTo { x: i32, y: i32 },

    #[error("script name {0:?} does not match the identifier grammar")]
    InvalidScriptName(String),

    #[error("rewritten tables need {needed} bytes but only {available} fit before the next section")]
    InsufficientSpace { needed: usize, available: usize },

    #[error("hotspot table offset {offset:#x} crosses buffer end ({len} bytes)")]
    OutOfBounds { offset: usize, len: usize },

    #[error("post-write validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knobs for [`write_hotspots`]. Both default on.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Copy the source to a timestamped backup before persisting.
    pub backup: bool,
    /// Sanity-check the target after persisting.
    pub validate: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            backup: true,
            validate: true,
        }
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    pub bytes_written: usize,
}

/// Reject a hotspot set that must not reach the encoder. Runs before any
/// byte of any file is touched.
pub fn validate_hotspots(hotspots: &[Hotspot]) -> Result<(), WriteError> {
    if !hotspots.iter().any(|h| h.id > 0) {
        return Err(WriteError::EmptyTable);
    }
    let mut seen = [false; MAX_HOTSPOTS];
    for h in hotspots {
        let slot = usize::from(h.id);
        if slot >= MAX_HOTSPOTS {
            return Err(WriteError::InvalidHotspotId(h.id));
        }
        if seen[slot] {
            return Err(WriteError::DuplicateId(h.id));
        }
        seen[slot] = true;
        if h.name.len() > MAX_NAME_LEN {
            return Err(WriteError::NameTooLong(h.name.clone()));
        }
        if let Some(p) = h.walk_to {
            if !(0..=WALK_TO_MAX).contains(&p.x) || !(0..=WALK_TO_MAX).contains(&p.y) {
                return Err(WriteError::InvalidWalkTo { x: p.x, y: p.y });
            }
        }
        if h.script_name.len() > MAX_NAME_LEN || !is_script_identifier(&h.script_name) {
            return Err(WriteError::InvalidScriptName(h.script_name.clone()));
        }
    }
    Ok(())
}

fn push_prefixed(out: &mut Vec<u8>, s: &str) {
    out.extend((s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Serialize both tables as they will appear on disk, starting at
/// [`HOTSPOT_NAMES_OFFSET`]: name slots 1..=max id, terminator, alignment
/// padding, script slots 0..=max id, terminator. Missing slots get
/// placeholder entries so ids keep their positions.
fn encode_tables(hotspots: &[Hotspot]) -> Vec<u8> {
    let max_id = hotspots.iter().map(|h| h.id).max().unwrap_or(0);
    let mut out = Vec::new();

    for id in 1..=max_id {
        let name = hotspots
            .iter()
            .find(|h| h.id == id)
            .map(|h| h.name.clone())
            .unwrap_or_else(|| format!("Hotspot{}", id));
        push_prefixed(&mut out, &name);
    }
    out.extend(0u32.to_le_bytes());

    // the script table must land on a 4-byte boundary or rediscovery misses it
    let table_base = HOTSPOT_NAMES_OFFSET + out.len();
    out.resize(out.len() + (align4(table_base) - table_base), 0);

    let background = hotspots
        .iter()
        .find(|h| h.id == 0)
        .map(|h| h.script_name.clone())
        .unwrap_or_else(|| synthesized_script_name(0));
    push_prefixed(&mut out, &background);
    for id in 1..=max_id {
        let script = hotspots
            .iter()
            .find(|h| h.id == id)
            .map(|h| h.script_name.clone())
            .unwrap_or_else(|| synthesized_script_name(id));
        push_prefixed(&mut out, &script);
    }
    out.extend(0u32.to_le_bytes());
    out
}

/// Byte range the original tables occupy, from the fixed name offset to the
/// end of the script-name terminator (or the name terminator when no script
/// table is discoverable).
fn occupied_table_end(original: &[u8], caps: &crate::version::Capabilities) -> usize {
    let mut r = ByteReader::new(original);
    r.seek(HOTSPOT_NAMES_OFFSET);
    r.read_string_sequence(caps, MAX_HOTSPOTS, MAX_NAME_LEN);
    let names_end = r.position();
    match find_script_table(original, names_end) {
        Some(pos) => {
            let mut r = ByteReader::new(original);
            r.seek(pos);
            r.read_string_sequence(caps, MAX_HOTSPOTS, MAX_NAME_LEN);
            r.position()
        }
        None => names_end,
    }
}

/// Re-emit the hotspot tables into a copy of `original`.
///
/// Pure in-memory transform: validates the hotspot set, measures the space
/// the original tables (plus trailing zero padding, minus the safety
/// margin) give it, and either patches in place or fails. The returned
/// buffer is always exactly `original.len()` bytes.
pub fn encode_hotspots(original: &[u8], hotspots: &[Hotspot]) -> Result<Vec<u8>, WriteError> {
    validate_hotspots(hotspots)?;

    let version = RoomVersion::detect(original)?;
    let caps = version.capabilities();
    if !caps.length_prefixed_strings || !caps.script_names {
        return Err(WriteError::UnsupportedVersion(version));
    }
    if HOTSPOT_NAMES_OFFSET >= original.len() {
        return Err(WriteError::OutOfBounds {
            offset: HOTSPOT_NAMES_OFFSET,
            len: original.len(),
        });
    }

    let occupied_end = occupied_table_end(original, &caps);

    // trailing zero padding belongs to the table region and is rewritable
    let pad_cap = occupied_end
        .saturating_add(MAX_PADDING_SCAN)
        .min(original.len());
    let mut pad_end = occupied_end;
    while pad_end < pad_cap && original[pad_end] == 0 {
        pad_end += 1;
    }
    let available_end = pad_end
        .saturating_sub(REGION_SAFETY_MARGIN)
        .max(occupied_end);
    let available = available_end - HOTSPOT_NAMES_OFFSET;

    let encoded = encode_tables(hotspots);
    if encoded.len() > available {
        return Err(WriteError::InsufficientSpace {
            needed: encoded.len(),
            available,
        });
    }

    let mut out = original.to_vec();
    out[HOTSPOT_NAMES_OFFSET..HOTSPOT_NAMES_OFFSET + encoded.len()].copy_from_slice(&encoded);
    // erase any stale tail of the old tables
    let new_end = HOTSPOT_NAMES_OFFSET + encoded.len();
    if new_end < occupied_end {
        for b in &mut out[new_end..occupied_end] {
            *b = 0;
        }
    }
    Ok(out)
}

/// Validate, back up, patch, persist.
///
/// `target` may equal `source`. The source file is read once and never
/// mutated before the final persist.
pub fn write_hotspots(
    source: &Path,
    target: &Path,
    hotspots: &[Hotspot],
    options: &WriteOptions,
) -> Result<WriteReport, WriteError> {
    validate_hotspots(hotspots)?;
    let original = fs::read(source)?;

    let backup_path = if options.backup {
        Some(backup::create_backup(source)?)
    } else {
        None
    };

    let patched = encode_hotspots(&original, hotspots)?;
    fs::write(target, &patched)?;

    if options.validate {
        let size = fs::metadata(target)?.len();
        if size != original.len() as u64 {
            return Err(WriteError::Validation(format!(
                "target is {} bytes, expected {}",
                size,
                original.len()
            )));
        }
    }

    let named = hotspots.iter().filter(|h| h.id > 0).count();
    Ok(WriteReport {
        message: format!("rewrote {} hotspot table entries in {}", named, target.display()),
        backup_path,
        bytes_written: patched.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotspots::{read_hotspots, Point};

    fn hotspot(id: u8, name: &str, script: &str) -> Hotspot {
        Hotspot {
            id,
            name: name.to_string(),
            script_name: script.to_string(),
            walk_to: None,
            interactions: Vec::new(),
            enabled: true,
            properties: Default::default(),
        }
    }

    /// Original file whose tables were laid out by `encode_tables`, with
    /// `padding` rewritable zero bytes and opaque data after them.
    fn sample_room(hotspots: &[Hotspot], padding: usize) -> Vec<u8> {
        let mut buf = 33u16.to_le_bytes().to_vec();
        buf.resize(HOTSPOT_NAMES_OFFSET, 0);
        buf.extend(encode_tables(hotspots));
        buf.extend(vec![0u8; padding]);
        buf.extend_from_slice(b"\xEE\xEEhDoor_Look\0following section");
        buf
    }

    #[test]
    fn test_encode_roundtrip_same_length() {
        let set = vec![hotspot(1, "Door", "hDoor"), hotspot(2, "Window", "hWindow")];
        let original = sample_room(&set, 64);

        let mut renamed = set.clone();
        renamed[0].name = "Main Entrance".to_string();
        renamed[0].script_name = "hMainEntrance".to_string();
        renamed[0].walk_to = Some(Point { x: 150, y: 200 });

        let patched = encode_hotspots(&original, &renamed).unwrap();
        assert_eq!(patched.len(), original.len());

        let reread = read_hotspots(&patched);
        assert!(reread.success);
        assert_eq!(reread.hotspots[0].name, "Main Entrance");
        assert_eq!(reread.hotspots[0].script_name, "hMainEntrance");
        assert_eq!(reread.hotspots[1].name, "Window");
    }

    #[test]
    fn test_identity_rewrite_fits_without_padding() {
        let set = vec![hotspot(1, "Door", "hDoor")];
        let original = sample_room(&set, 0);
        let patched = encode_hotspots(&original, &set).unwrap();
        assert_eq!(patched, original);
    }

    #[test]
    fn test_bytes_outside_region_preserved() {
        let set = vec![hotspot(1, "Door", "hDoor")];
        let original = sample_room(&set, 32);
        let mut shorter = set.clone();
        shorter[0].name = "D".to_string();

        let patched = encode_hotspots(&original, &shorter).unwrap();
        assert_eq!(&patched[..2], &original[..2]);
        let tail = original.len() - 30; // the opaque data past the padding
        assert_eq!(&patched[tail..], &original[tail..]);
    }

    #[test]
    fn test_growth_into_following_section_fails() {
        let set = vec![hotspot(1, "Door", "hDoor")];
        let original = sample_room(&set, 0);
        let mut grown = set.clone();
        grown[0].name = "A considerably longer hotspot name".to_string();

        assert!(matches!(
            encode_hotspots(&original, &grown),
            Err(WriteError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn test_growth_within_padding_succeeds() {
        let set = vec![hotspot(1, "Door", "hDoor")];
        let original = sample_room(&set, 64);
        let mut grown = set.clone();
        grown[0].name = "Main Entrance Door".to_string();

        let patched = encode_hotspots(&original, &grown).unwrap();
        assert_eq!(patched.len(), original.len());
        let reread = read_hotspots(&patched);
        assert_eq!(reread.hotspots[0].name, "Main Entrance Door");
    }

    #[test]
    fn test_validation_rejections() {
        let bad_id = vec![hotspot(50, "Door", "hDoor")];
        assert!(matches!(
            validate_hotspots(&bad_id),
            Err(WriteError::InvalidHotspotId(50))
        ));

        let mut bad_walk = vec![hotspot(1, "Door", "hDoor")];
        bad_walk[0].walk_to = Some(Point { x: 10000, y: 5 });
        assert!(matches!(
            validate_hotspots(&bad_walk),
            Err(WriteError::InvalidWalkTo { x: 10000, y: 5 })
        ));

        let bad_script = vec![hotspot(1, "Door", "h Door")];
        assert!(matches!(
            validate_hotspots(&bad_script),
            Err(WriteError::InvalidScriptName(_))
        ));

        let dupes = vec![hotspot(1, "Door", "hDoor"), hotspot(1, "Door2", "hDoor2")];
        assert!(matches!(
            validate_hotspots(&dupes),
            Err(WriteError::DuplicateId(1))
        ));

        assert!(matches!(validate_hotspots(&[]), Err(WriteError::EmptyTable)));
    }

    #[test]
    fn test_unsupported_revision_is_refused() {
        let set = vec![hotspot(1, "Door", "hDoor")];
        let mut original = sample_room(&set, 16);
        original[0] = 22; // V270: script names but fixed-width strings
        assert!(matches!(
            encode_hotspots(&original, &set),
            Err(WriteError::UnsupportedVersion(RoomVersion::V270))
        ));
    }

    #[test]
    fn test_write_hotspots_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room3.crm");
        let set = vec![hotspot(1, "Door", "hDoor")];
        let original = sample_room(&set, 64);
        fs::write(&path, &original).unwrap();

        let mut renamed = set.clone();
        renamed[0].name = "Gate".to_string();
        let report =
            write_hotspots(&path, &path, &renamed, &WriteOptions::default()).unwrap();

        assert_eq!(report.bytes_written, original.len());
        let backup_path = report.backup_path.expect("backup requested");
        assert_eq!(fs::read(&backup_path).unwrap(), original);

        let reread = read_hotspots(&fs::read(&path).unwrap());
        assert_eq!(reread.hotspots[0].name, "Gate");
    }

    #[test]
    fn test_rejected_write_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room3.crm");
        let set = vec![hotspot(1, "Door", "hDoor")];
        let original = sample_room(&set, 16);
        fs::write(&path, &original).unwrap();

        let bad = vec![hotspot(1, "Door", "not an id!")];
        assert!(write_hotspots(&path, &path, &bad, &WriteOptions::default()).is_err());
        assert_eq!(fs::read(&path).unwrap(), original);
        // validation failed before the backup step, too
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
