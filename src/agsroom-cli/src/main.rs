mod file_io;

use agsroom::{HotspotChanges, HotspotUpdate, Point, WriteOptions};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "agsroom")]
#[command(about = "AGS compiled room inspector and editor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a room's format revision and capability flags
    Info {
        /// Path to the .crm file
        input: PathBuf,
    },

    /// List the block directory
    Blocks {
        /// Path to the .crm file
        input: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Use the legacy fixed-directory scanner instead of the
        /// sequential walk
        #[arg(long)]
        legacy: bool,
    },

    /// Export one block's payload (stdout if no output path)
    ExportBlock {
        /// Path to the .crm file
        input: PathBuf,

        /// Block name or numeric id (e.g. "CompScript3" or "7")
        #[arg(short, long)]
        block: String,

        /// Path to write the payload to (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hex-encode the payload instead of writing raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Replace one block's payload and write the spliced room
    ImportBlock {
        /// Path to the .crm file
        input: PathBuf,

        /// Block name or numeric id
        #[arg(short, long)]
        block: String,

        /// Path to the replacement payload (stdin if not specified)
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Where to write the spliced room (overwrites input if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the hotspot table
    Hotspots {
        /// Path to the .crm file
        input: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Update one hotspot and patch the file in place
    SetHotspot {
        /// Path to the .crm file
        input: PathBuf,

        /// Hotspot id (0..=49)
        #[arg(long)]
        id: u8,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New script identifier (e.g. "hMainEntrance")
        #[arg(long)]
        script_name: Option<String>,

        /// Walk-to target as "X,Y"
        #[arg(long)]
        walk_to: Option<String>,

        /// Skip the timestamped backup
        #[arg(long)]
        no_backup: bool,

        /// Skip the post-write sanity check
        #[arg(long)]
        no_validate: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Blocks {
            input,
            json,
            legacy,
        } => cmd_blocks(&input, json, legacy),
        Commands::ExportBlock {
            input,
            block,
            output,
            hex,
        } => cmd_export_block(&input, &block, output.as_deref(), hex),
        Commands::ImportBlock {
            input,
            block,
            payload,
            output,
        } => cmd_import_block(&input, &block, payload.as_deref(), output.as_deref()),
        Commands::Hotspots { input, json } => cmd_hotspots(&input, json),
        Commands::SetHotspot {
            input,
            id,
            name,
            script_name,
            walk_to,
            no_backup,
            no_validate,
        } => cmd_set_hotspot(&input, id, name, script_name, walk_to, no_backup, no_validate),
    }
}

fn read_room(input: &Path) -> Result<Vec<u8>> {
    fs::read(input).with_context(|| format!("failed to read {}", input.display()))
}

fn cmd_info(input: &Path) -> Result<()> {
    let bytes = read_room(input)?;
    let version = agsroom::detect_version(&bytes)?;
    let caps = version.capabilities();
    println!("revision:      {}", version);
    println!("script names:  {}", if caps.script_names { "yes" } else { "no" });
    println!(
        "strings:       {}",
        if caps.length_prefixed_strings {
            "length-prefixed"
        } else {
            "fixed-width"
        }
    );
    println!(
        "block lengths: {}",
        if caps.wide_block_lengths { "64-bit" } else { "32-bit" }
    );
    Ok(())
}

fn cmd_blocks(input: &Path, json: bool, legacy: bool) -> Result<()> {
    let bytes = read_room(input)?;
    let blocks = if legacy {
        let result = agsroom::scan_legacy(&bytes);
        eprintln!("{}", result.diagnostic);
        result.blocks
    } else {
        agsroom::list_blocks(&bytes)?
    };

    if json {
        let entries: Vec<_> = blocks
            .iter()
            .map(|b| {
                serde_json::json!({
                    "name": b.name(),
                    "offset": b.offset,
                    "length": b.length,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for b in &blocks {
            println!("{:<16} @ {:#08x}  {} bytes", b.name(), b.offset, b.length);
        }
    }
    Ok(())
}

fn cmd_export_block(input: &Path, block: &str, output: Option<&Path>, as_hex: bool) -> Result<()> {
    let bytes = read_room(input)?;
    let payload = agsroom::extract_block_payload(&bytes, block)?
        .with_context(|| format!("no block matching {:?} in {}", block, input.display()))?;
    if as_hex {
        file_io::write_output(output, hex::encode(payload).as_bytes())
    } else {
        file_io::write_output(output, payload)
    }
}

fn cmd_import_block(
    input: &Path,
    block: &str,
    payload: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = read_room(input)?;
    let new_payload = file_io::read_input(payload)?;
    let spliced = agsroom::replace_block_payload(&bytes, block, &new_payload)?;
    let target = output.unwrap_or(input);
    file_io::write_output(Some(target), &spliced)?;
    println!(
        "replaced {} ({} -> {} bytes), wrote {}",
        block,
        bytes.len(),
        spliced.len(),
        target.display()
    );
    Ok(())
}

fn cmd_hotspots(input: &Path, json: bool) -> Result<()> {
    let bytes = read_room(input)?;
    let result = agsroom::read_hotspots(&bytes);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for d in &result.diagnostics {
        eprintln!("note: {}", d);
    }
    if !result.success {
        bail!("hotspot recovery failed for {}", input.display());
    }
    for h in &result.hotspots {
        let events: Vec<&str> = h.interactions.iter().map(|i| i.suffix()).collect();
        println!(
            "{:>2}  {:<20} {:<20} [{}]",
            h.id,
            h.name,
            h.script_name,
            events.join(", ")
        );
    }
    Ok(())
}

fn parse_walk_to(value: &str) -> Result<Point> {
    let (x, y) = value
        .split_once(',')
        .with_context(|| format!("expected X,Y, got {:?}", value))?;
    Ok(Point {
        x: x.trim().parse().context("walk-to X is not a number")?,
        y: y.trim().parse().context("walk-to Y is not a number")?,
    })
}

fn cmd_set_hotspot(
    input: &Path,
    id: u8,
    name: Option<String>,
    script_name: Option<String>,
    walk_to: Option<String>,
    no_backup: bool,
    no_validate: bool,
) -> Result<()> {
    if name.is_none() && script_name.is_none() && walk_to.is_none() {
        bail!("nothing to change: pass --name, --script-name, or --walk-to");
    }

    let bytes = read_room(input)?;
    let result = agsroom::read_hotspots(&bytes);
    if !result.success {
        bail!(
            "refusing to patch {}: {}",
            input.display(),
            result.diagnostics.join("; ")
        );
    }

    let mut hotspots = result.hotspots;
    let mut changes = HotspotChanges::new();
    changes.set(
        id,
        HotspotUpdate {
            name,
            script_name,
            walk_to: walk_to.as_deref().map(parse_walk_to).transpose()?,
            ..Default::default()
        },
    );
    changes.apply(&mut hotspots);

    let options = WriteOptions {
        backup: !no_backup,
        validate: !no_validate,
    };
    let report = agsroom::write_hotspots(input, input, &hotspots, &options)?;
    if let Some(backup) = &report.backup_path {
        println!("backup: {}", backup.display());
    }
    println!("{}", report.message);
    Ok(())
}
