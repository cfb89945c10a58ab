//! Hotspot table recovery.
//!
//! Display names and script names live in two independent string sequences.
//! The display-name table sits at a fixed offset; the script-name table has
//! no pointer to it at all and must be discovered by a bounded forward scan
//! (see [`script_table_starts_at`]). Interaction handlers are not stored as
//! a table either: a hotspot responds to an event if the compiled script
//! payload mentions `<script_name>_<EventKind>` anywhere, so presence is
//! recovered by substring search over the whole file.
//!
//! Reading never fails to the caller. A malformed file degrades to a single
//! synthetic background hotspot plus diagnostics; the consumer needs partial
//! results more than it needs errors.

use crate::cursor::ByteReader;
use crate::version::RoomVersion;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Hard cap on interactive areas per room.
pub const MAX_HOTSPOTS: usize = 50;

/// Sanity cap on a single name's byte length.
pub const MAX_NAME_LEN: usize = 50;

/// Absolute offset of the display-name table.
///
/// Empirically validated against rooms compiled by the 3.6-era editor; the
/// format's authors never documented it. A sample whose names are not here
/// fails sequence validation and degrades to the diagnostic default instead
/// of being special-cased.
pub const HOTSPOT_NAMES_OFFSET: usize = 0x101;

/// How far past the display names the script-name scan looks.
const SCRIPT_SCAN_WINDOW: usize = 0x200;

/// Scan stride. Script tables start on 4-byte boundaries relative to the
/// end of the display names.
const SCRIPT_SCAN_STEP: usize = 4;

/// A walk-to target inside the room. Coordinates are room pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Event kinds a hotspot can respond to. The on-disk representation is
/// implicit: a handler exists when `<script_name>_<suffix>` appears in the
/// compiled script payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    Look,
    Interact,
    UseInv,
    Talk,
    Walk,
    Use,
    PickUp,
    AnyClick,
    StandOn,
}

impl Interaction {
    pub const ALL: [Interaction; 9] = [
        Interaction::Look,
        Interaction::Interact,
        Interaction::UseInv,
        Interaction::Talk,
        Interaction::Walk,
        Interaction::Use,
        Interaction::PickUp,
        Interaction::AnyClick,
        Interaction::StandOn,
    ];

    /// Handler-name suffix for this event kind.
    pub fn suffix(self) -> &'static str {
        match self {
            Interaction::Look => "Look",
            Interaction::Interact => "Interact",
            Interaction::UseInv => "UseInv",
            Interaction::Talk => "Talk",
            Interaction::Walk => "Walk",
            Interaction::Use => "Use",
            Interaction::PickUp => "PickUp",
            Interaction::AnyClick => "AnyClick",
            Interaction::StandOn => "StandOn",
        }
    }
}

/// One interactive area. Id 0 is the room background and only appears as
/// the synthetic fallback; named hotspots use 1..=49.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: u8,
    pub name: String,
    pub script_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walk_to: Option<Point>,
    pub interactions: Vec<Interaction>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, String>,
}

impl Hotspot {
    fn new(id: u8, name: String) -> Self {
        Hotspot {
            id,
            name,
            script_name: String::new(),
            walk_to: None,
            interactions: vec![Interaction::Look, Interaction::Interact],
            enabled: true,
            properties: HashMap::new(),
        }
    }

    /// The synthetic background hotspot returned when recovery fails.
    pub fn background() -> Self {
        let mut h = Hotspot::new(0, "Background".to_string());
        h.script_name = synthesized_script_name(0);
        h
    }
}

/// Outcome of a hotspot read. `success` is false when the result is the
/// synthetic fallback; `diagnostics` explains anything unusual either way.
#[derive(Debug, Clone, Serialize)]
pub struct HotspotReadResult {
    pub hotspots: Vec<Hotspot>,
    pub success: bool,
    pub diagnostics: Vec<String>,
}

impl HotspotReadResult {
    fn fallback(diagnostic: String) -> Self {
        HotspotReadResult {
            hotspots: vec![Hotspot::background()],
            success: false,
            diagnostics: vec![diagnostic],
        }
    }
}

/// Default script name for a hotspot slot with no recovered identifier.
pub fn synthesized_script_name(id: u8) -> String {
    format!("hHotspot{}", id)
}

/// Whether `s` satisfies the script identifier grammar
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_script_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip control characters from a raw display name. Compiled rooms
/// interleave names with stray control bytes.
pub fn clean_display_name(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_control()).collect()
}

fn is_plausible_script_name(s: &str) -> bool {
    s.starts_with('h') && is_script_identifier(s)
}

/// Sequence-validation predicate: does a script-name table start at `pos`?
///
/// True when the bytes at `pos` decode as a length-prefixed
/// identifier-shaped string with the `h` prefix, AND are followed by either
/// a second such string or the zero-length terminator. The two-string
/// lookahead is what separates a genuine table from coincidental byte
/// patterns inside compiled script payloads.
pub fn script_table_starts_at(bytes: &[u8], pos: usize) -> bool {
    if pos >= bytes.len() {
        return false;
    }
    let mut r = ByteReader::new(bytes);
    r.seek(pos);
    let first = match r.read_prefixed_string(MAX_NAME_LEN) {
        Ok(s) => s,
        Err(_) => return false,
    };
    if !is_plausible_script_name(&first) {
        return false;
    }
    match r.read_prefixed_string(MAX_NAME_LEN) {
        Ok(s) if s.is_empty() => true,
        Ok(s) => is_plausible_script_name(&s),
        Err(_) => false,
    }
}

/// Round up to the next 4-byte boundary.
pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Scan forward from `from`, visiting 4-byte-aligned offsets only, for a
/// script-name table start.
pub(crate) fn find_script_table(bytes: &[u8], from: usize) -> Option<usize> {
    let end = from.saturating_add(SCRIPT_SCAN_WINDOW).min(bytes.len());
    let mut pos = align4(from);
    while pos < end {
        if script_table_starts_at(bytes, pos) {
            return Some(pos);
        }
        pos += SCRIPT_SCAN_STEP;
    }
    None
}

/// Recover the hotspot table from a room buffer.
///
/// Phase 1 reads the display names at [`HOTSPOT_NAMES_OFFSET`]; phase 2
/// (revisions with script-name support) discovers and reads the script-name
/// table; a final pass recovers interactions by substring search. Never
/// errors: failures degrade to the synthetic background hotspot with
/// `success = false`.
pub fn read_hotspots(bytes: &[u8]) -> HotspotReadResult {
    let version = match RoomVersion::detect(bytes) {
        Ok(v) => v,
        Err(e) => return HotspotReadResult::fallback(format!("revision detection failed: {}", e)),
    };
    let caps = version.capabilities();
    let mut diagnostics = Vec::new();

    // Phase 1: display names at the fixed offset
    if HOTSPOT_NAMES_OFFSET >= bytes.len() {
        return HotspotReadResult::fallback(format!(
            "file ends before the display-name table at {:#x}",
            HOTSPOT_NAMES_OFFSET
        ));
    }
    let mut r = ByteReader::new(bytes);
    r.seek(HOTSPOT_NAMES_OFFSET);
    let names = r.read_string_sequence(&caps, MAX_HOTSPOTS, MAX_NAME_LEN);
    if names.is_empty() {
        return HotspotReadResult::fallback(format!(
            "no display names at {:#x}; possible additional format variant",
            HOTSPOT_NAMES_OFFSET
        ));
    }
    let names_end = r.position();

    let mut hotspots = Vec::with_capacity(names.len());
    for (i, raw) in names.iter().enumerate() {
        let id = i + 1;
        if id >= MAX_HOTSPOTS {
            diagnostics.push(format!(
                "display-name table has more than {} entries; extras dropped",
                MAX_HOTSPOTS - 1
            ));
            break;
        }
        hotspots.push(Hotspot::new(id as u8, clean_display_name(raw)));
    }

    // Phase 2: script names at a discovered offset
    let mut script_names: Vec<String> = Vec::new();
    if caps.script_names {
        match find_script_table(bytes, names_end) {
            Some(pos) => {
                let mut r = ByteReader::new(bytes);
                r.seek(pos);
                script_names = r.read_string_sequence(&caps, MAX_HOTSPOTS, MAX_NAME_LEN);
            }
            None => diagnostics.push(format!(
                "no script-name table within {:#x} bytes of the display names; identifiers synthesized",
                SCRIPT_SCAN_WINDOW
            )),
        }
    }

    // slot 0 of the script-name table belongs to the background, hence i + 1
    for (i, h) in hotspots.iter_mut().enumerate() {
        h.script_name = script_names
            .get(i + 1)
            .filter(|s| is_plausible_script_name(s))
            .cloned()
            .unwrap_or_else(|| synthesized_script_name(h.id));
    }

    // Interaction recovery: the whole file is scanned as opaque bytes
    for h in hotspots.iter_mut() {
        let mut found = Vec::new();
        for kind in Interaction::ALL {
            let needle = format!("{}_{}", h.script_name, kind.suffix());
            if memmem::find(bytes, needle.as_bytes()).is_some() {
                found.push(kind);
            }
        }
        if !found.is_empty() {
            h.interactions = found;
        }
    }

    HotspotReadResult {
        hotspots,
        success: true,
        diagnostics,
    }
}

/// A partial update for one hotspot. Unset fields keep the value read from
/// the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotspotUpdate {
    pub name: Option<String>,
    pub script_name: Option<String>,
    pub walk_to: Option<Point>,
    pub enabled: Option<bool>,
    pub properties: Option<HashMap<String, String>>,
}

/// Pending hotspot edits, keyed by hotspot id and applied as an overlay on
/// a freshly-read table immediately before serialization. Nothing is cached
/// across operations; the file is the only persistent store.
#[derive(Debug, Clone, Default)]
pub struct HotspotChanges {
    updates: BTreeMap<u8, HotspotUpdate>,
}

impl HotspotChanges {
    pub fn new() -> Self {
        HotspotChanges::default()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Queue an update for `id`, merging field-wise with any already queued.
    pub fn set(&mut self, id: u8, update: HotspotUpdate) {
        let slot = self.updates.entry(id).or_default();
        if update.name.is_some() {
            slot.name = update.name;
        }
        if update.script_name.is_some() {
            slot.script_name = update.script_name;
        }
        if update.walk_to.is_some() {
            slot.walk_to = update.walk_to;
        }
        if update.enabled.is_some() {
            slot.enabled = update.enabled;
        }
        if update.properties.is_some() {
            slot.properties = update.properties;
        }
    }

    /// Overlay the queued updates onto `hotspots`. Ids with no existing
    /// entry are created with placeholder defaults so a write can extend
    /// the table.
    pub fn apply(&self, hotspots: &mut Vec<Hotspot>) {
        for (&id, update) in &self.updates {
            if !hotspots.iter().any(|h| h.id == id) {
                let mut fresh = Hotspot::new(id, format!("Hotspot{}", id));
                fresh.script_name = synthesized_script_name(id);
                hotspots.push(fresh);
                hotspots.sort_by_key(|h| h.id);
            }
            let hotspot = match hotspots.iter_mut().find(|h| h.id == id) {
                Some(h) => h,
                None => continue,
            };
            if let Some(name) = &update.name {
                hotspot.name = name.clone();
            }
            if let Some(script_name) = &update.script_name {
                hotspot.script_name = script_name.clone();
            }
            if let Some(walk_to) = update.walk_to {
                hotspot.walk_to = Some(walk_to);
            }
            if let Some(enabled) = update.enabled {
                hotspot.enabled = enabled;
            }
            if let Some(properties) = &update.properties {
                hotspot.properties = properties.clone();
            }
        }
    }
}
