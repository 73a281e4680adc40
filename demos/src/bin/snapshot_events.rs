//! Проходит снапшот итератором событий и печатает сводку.

use std::{
    collections::{BTreeMap, HashMap},
    env,
    fs::File,
    io,
};

use zrdb::{ChecksumStatus, Event, KeyKind, SnapshotParser};

fn main() -> io::Result<()> {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: snapshot_events <snapshot.rdb>");
        return Ok(());
    };

    let mut parser = SnapshotParser::new(File::open(&path)?);
    let mut per_db: BTreeMap<u64, HashMap<KeyKind, u64>> = BTreeMap::new();

    for event in parser.by_ref() {
        match event {
            Event::HeaderSeen { version } => println!("format version: {version}"),
            Event::AuxPair { key, value } => println!(
                "aux {} = {}",
                String::from_utf8_lossy(&key),
                String::from_utf8_lossy(&value)
            ),
            Event::Key { summary, .. } => {
                *per_db
                    .entry(summary.db)
                    .or_default()
                    .entry(summary.kind)
                    .or_default() += 1;
            }
            Event::Unsupported { key, value_type, .. } => {
                println!(
                    "stopped at {} ({value_type:?})",
                    String::from_utf8_lossy(&key)
                );
            }
            Event::Error {
                kind,
                offset,
                message,
            } => {
                println!("{kind} error at {offset:?}: {message}");
            }
            _ => {}
        }
    }

    for (db, kinds) in &per_db {
        println!("db {db}:");
        for (kind, n) in kinds {
            println!("  {kind:?}: {n}");
        }
    }

    let stats = parser.stats();
    println!(
        "{} keys, {} bytes read, checksum {}",
        stats.keys_parsed,
        stats.bytes_read,
        match stats.checksum {
            ChecksumStatus::Valid => "valid",
            ChecksumStatus::Mismatch { .. } => "mismatch",
            ChecksumStatus::Disabled => "disabled",
            ChecksumStatus::NotChecked => "not checked",
        }
    );
    Ok(())
}
