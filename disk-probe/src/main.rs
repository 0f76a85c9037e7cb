// SPDX-FileCopyrightText: Copyright © 2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::env;

use blockdevice::{BlockDevice, Options};
use disks::{Attribute, Disk, Matcher};
use log::{debug, info};

const USAGE: &str = "usage:
  disk-probe list
  disk-probe find <attribute=pattern>...
  disk-probe open <path> [--lock] [--gpt] [--read-only]

attributes: name, device, model, subsystem, serial, wwid, uuid, bus-path";

/// Prints one disk with every attribute it carries
fn print_disk(disk: &Disk) {
    println!("{disk}");
    for attribute in Attribute::ALL {
        if let Some(value) = attribute.value(disk) {
            println!("  {attribute:<10} {value}");
        }
    }
}

fn list() -> Result<(), Box<dyn std::error::Error>> {
    let disks = disks::list()?;
    info!("Found {} disks", disks.len());
    for disk in &disks {
        print_disk(disk);
    }
    Ok(())
}

fn find(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let matchers = args.iter().map(|a| a.parse()).collect::<Result<Vec<Matcher>, _>>()?;
    debug!("Matchers: {matchers:?}");
    let disk = disks::find(&matchers)?;
    print_disk(&disk);
    Ok(())
}

fn open(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let Some((path, flags)) = args.split_first() else {
        return Err(USAGE.into());
    };

    let mut options = Options::default();
    for flag in flags {
        options = match flag.as_str() {
            "--lock" => options.with_exclusive_lock(true),
            "--gpt" => options.with_new_gpt(true),
            "--read-only" => options.with_mode(blockdevice::READ_ONLY_MODE),
            other => return Err(format!("unknown flag {other}\n{USAGE}").into()),
        };
    }

    let device = BlockDevice::open(path, &options)?;
    let table = device
        .partition_table()?
        .map_or_else(|| "none".to_owned(), |kind| kind.to_string());
    println!("{}: {} bytes, partition table: {table}", path, device.size()?);
    device.close()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = env::args().skip(1).collect::<Vec<_>>();
    match args.split_first() {
        Some((command, _)) if command == "list" => list(),
        Some((command, rest)) if command == "find" => find(rest),
        Some((command, rest)) if command == "open" => open(rest),
        _ => Err(USAGE.into()),
    }
}
