//! End-to-end tests against a synthetic shop room: ten named hotspots, a
//! large `Main` block, a `CompScript3` block, and handler references inside
//! the compiled payloads.

use agsroom::hotspots::HOTSPOT_NAMES_OFFSET;
use agsroom::{
    read_hotspots, verify_backup, write_hotspots, HotspotChanges, HotspotUpdate, Interaction,
    Point, WriteError, WriteOptions,
};
use std::fs;

/// Absolute offset where the first block's payload starts:
/// revision (2) + block id (1) + block length (8).
const MAIN_PAYLOAD_START: usize = 11;

const NAMES: [&str; 10] = [
    // control bytes interleaved, as compilers leave them
    "Sta\u{1}ff Do\u{7}or",
    "Till",
    "Counter",
    "Window",
    "Shelf",
    "Poster",
    "Doormat",
    "Lamp",
    "Crate",
    "Back Door",
];

const SCRIPTS: [&str; 11] = [
    "hHotspot0",
    "hStaffDoor",
    "hTill",
    "hCounter",
    "hWindow",
    "hShelf",
    "hPoster",
    "hDoormat",
    "hLamp",
    "hCrate",
    "hBackDoor",
];

fn prefixed(s: &str) -> Vec<u8> {
    let mut v = (s.len() as u32).to_le_bytes().to_vec();
    v.extend_from_slice(s.as_bytes());
    v
}

fn build_tables(names: &[&str], scripts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for n in names {
        out.extend(prefixed(n));
    }
    out.extend(0u32.to_le_bytes());
    // script table starts on a 4-byte boundary
    let base = HOTSPOT_NAMES_OFFSET + out.len();
    out.resize(out.len() + (((base + 3) & !3) - base), 0);
    for s in scripts {
        out.extend(prefixed(s));
    }
    out.extend(0u32.to_le_bytes());
    out
}

fn sample_room() -> Vec<u8> {
    let mut main_payload = vec![0u8; HOTSPOT_NAMES_OFFSET - MAIN_PAYLOAD_START];
    main_payload.extend(build_tables(&NAMES, &SCRIPTS));
    main_payload.extend(vec![0u8; 64]); // reserved padding after the tables
    for marker in [
        "hStaffDoor_Look",
        "hStaffDoor_Interact",
        "hStaffDoor_Talk",
        "hBackDoor_AnyClick",
    ] {
        main_payload.extend_from_slice(marker.as_bytes());
        main_payload.push(0);
    }
    main_payload.resize(120_000, 0xAB);

    let mut buf = 33u16.to_le_bytes().to_vec();
    buf.push(1); // Main
    buf.extend((main_payload.len() as u64).to_le_bytes());
    buf.extend(&main_payload);

    let compiled = b"SCOM\x03\x00compiled script image";
    buf.push(7); // CompScript3
    buf.extend((compiled.len() as u64).to_le_bytes());
    buf.extend_from_slice(compiled);

    buf.push(0xff);
    buf
}

#[test]
fn block_directory_of_sample_room() {
    let room = sample_room();
    let blocks = agsroom::list_blocks(&room).unwrap();
    let names: Vec<String> = blocks.iter().map(|b| b.name()).collect();
    assert_eq!(names, ["Main", "CompScript3"]);

    let main = &blocks[0];
    assert!(main.length > 100_000);
    assert_eq!(main.offset, MAIN_PAYLOAD_START);
}

#[test]
fn hotspots_of_sample_room() {
    let room = sample_room();
    let result = read_hotspots(&room);
    assert!(result.success);
    assert_eq!(result.hotspots.len(), 10);

    let staff_door = result
        .hotspots
        .iter()
        .find(|h| h.name == "Staff Door")
        .expect("cleaned name");
    assert_eq!(staff_door.id, 1);
    assert!(staff_door.script_name.starts_with('h'));
    assert_eq!(staff_door.script_name, "hStaffDoor");
    assert_eq!(
        staff_door.interactions,
        vec![Interaction::Look, Interaction::Interact, Interaction::Talk]
    );

    let back_door = result.hotspots.last().unwrap();
    assert_eq!(back_door.interactions, vec![Interaction::AnyClick]);

    // nothing references hTill, so it gets the default pair
    assert_eq!(
        result.hotspots[1].interactions,
        vec![Interaction::Look, Interaction::Interact]
    );
}

#[test]
fn reading_twice_is_identical() {
    let room = sample_room();
    let a = read_hotspots(&room);
    let b = read_hotspots(&room);
    assert_eq!(a.hotspots, b.hotspots);
}

#[test]
fn rename_round_trip_keeps_file_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.crm");
    let original = sample_room();
    fs::write(&path, &original).unwrap();

    let mut hotspots = read_hotspots(&original).hotspots;
    let mut changes = HotspotChanges::new();
    changes.set(
        1,
        HotspotUpdate {
            name: Some("Main Entrance".to_string()),
            script_name: Some("hMainEntrance".to_string()),
            walk_to: Some(Point { x: 150, y: 200 }),
            ..Default::default()
        },
    );
    changes.apply(&mut hotspots);

    let report = write_hotspots(&path, &path, &hotspots, &WriteOptions::default()).unwrap();
    assert_eq!(report.bytes_written, original.len());

    let patched = fs::read(&path).unwrap();
    assert_eq!(patched.len(), original.len());

    let reread = read_hotspots(&patched);
    assert!(reread.success);
    assert_eq!(reread.hotspots[0].name, "Main Entrance");
    assert_eq!(reread.hotspots[0].script_name, "hMainEntrance");
    // neighbours untouched
    assert_eq!(reread.hotspots[1].name, "Till");
    assert_eq!(reread.hotspots[9].script_name, "hBackDoor");

    // the block structure survives the patch
    let blocks = agsroom::list_blocks(&patched).unwrap();
    assert_eq!(blocks.len(), 2);

    let backup = report.backup_path.expect("backup requested");
    assert_eq!(fs::read(&backup).unwrap(), original);
    assert!(verify_backup(&backup).unwrap());
}

#[test]
fn invalid_updates_never_touch_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.crm");
    let original = sample_room();
    fs::write(&path, &original).unwrap();

    let good = read_hotspots(&original).hotspots;

    let mut bad_id = good.clone();
    bad_id[0].id = 50;
    assert!(matches!(
        write_hotspots(&path, &path, &bad_id, &WriteOptions::default()),
        Err(WriteError::InvalidHotspotId(50))
    ));

    let mut bad_walk = good.clone();
    bad_walk[0].walk_to = Some(Point { x: 150, y: 12000 });
    assert!(matches!(
        write_hotspots(&path, &path, &bad_walk, &WriteOptions::default()),
        Err(WriteError::InvalidWalkTo { .. })
    ));

    let mut bad_script = good.clone();
    bad_script[0].script_name = "1staffdoor".to_string();
    assert!(matches!(
        write_hotspots(&path, &path, &bad_script, &WriteOptions::default()),
        Err(WriteError::InvalidScriptName(_))
    ));

    assert_eq!(fs::read(&path).unwrap(), original);
    // no backups were created for rejected writes
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn oversized_rename_reports_insufficient_space() {
    let original = sample_room();
    let mut hotspots = read_hotspots(&original).hotspots;
    for h in hotspots.iter_mut() {
        h.name = "An improbably verbose name for a shop fixture".to_string();
    }
    assert!(matches!(
        agsroom::encode_hotspots(&original, &hotspots),
        Err(WriteError::InsufficientSpace { .. })
    ));
}

#[test]
fn export_then_replace_is_byte_identical() {
    let room = sample_room();
    let payload = agsroom::extract_block_payload(&room, "CompScript3")
        .unwrap()
        .expect("block exists")
        .to_vec();
    let respliced = agsroom::replace_block_payload(&room, "CompScript3", &payload).unwrap();
    assert_eq!(respliced, room);

    assert!(agsroom::extract_block_payload(&room, "ObjNames")
        .unwrap()
        .is_none());
}
