//! Demo driver for the cairn storage engine.
//!
//! Walks through basic CRUD, hammers the engine with a bulk insert, and
//! then races the B+ tree index against a full-file linear scan.

use cairn::StorageEngine;
use std::io;
use std::time::Instant;

const BULK: usize = 10_000;

fn main() -> io::Result<()> {
    let db_dir = std::env::var("CAIRN_DB_DIR").unwrap_or(".".to_string());
    let mut db = StorageEngine::open(&db_dir)?;

    println!("cairn storage engine demo (database dir: {db_dir})");

    crud_walkthrough(&mut db)?;
    bulk_insert(&mut db)?;
    index_vs_scan(&mut db)?;

    println!("\n== Part 4: statistics ==");
    db.print_stats()?;
    Ok(())
}

fn crud_walkthrough(db: &mut StorageEngine) -> io::Result<()> {
    println!("\n== Part 1: basic CRUD ==");

    db.insert("user:1001", "Alice Johnson")?;
    db.insert("user:1002", "Bob Smith")?;
    db.insert("user:1003", "Charlie Brown")?;
    db.insert("product:5001", "Laptop - $1299")?;
    db.insert("product:5002", "Mouse - $29")?;
    println!("Inserted 5 records.");

    for key in ["user:1001", "product:5001", "user:9999"] {
        match db.get(key)? {
            Some(value) => println!("  get {key} -> {value}"),
            None => println!("  get {key} -> NOT FOUND"),
        }
    }

    db.update("user:1002", "Bob Smith (Updated)")?;
    println!(
        "  after update, user:1002 -> {}",
        db.get("user:1002")?.unwrap_or_default()
    );

    db.remove("product:5002")?;
    println!(
        "  after remove, product:5002 -> {}",
        match db.get("product:5002")? {
            Some(v) => v,
            None => "gone".to_string(),
        }
    );
    Ok(())
}

fn bulk_insert(db: &mut StorageEngine) -> io::Result<()> {
    println!("\n== Part 2: bulk insert ({BULK} records) ==");

    let start = Instant::now();
    for i in 0..BULK {
        db.insert(&format!("bench:{i}"), &format!("Data_{}", i * 1000))?;
    }
    let elapsed = start.elapsed();

    println!("Done in {} ms", elapsed.as_millis());
    println!(
        "  -> {:.0} inserts/sec",
        BULK as f64 / elapsed.as_secs_f64()
    );

    db.flush_all()?;
    println!("Checkpoint complete; journal truncated.");
    Ok(())
}

fn index_vs_scan(db: &mut StorageEngine) -> io::Result<()> {
    println!("\n== Part 3: indexed get vs linear scan ==");

    let probes = [
        "bench:100",
        "bench:2500",
        "bench:5000",
        "bench:7500",
        "bench:9999",
        "user:1001",
    ];

    let start = Instant::now();
    let mut found_indexed = 0;
    for key in &probes {
        if db.get(key)?.is_some() {
            found_indexed += 1;
        }
    }
    let indexed = start.elapsed();
    println!(
        "Indexed search: found {found_indexed}/{} in {} us (tree height {})",
        probes.len(),
        indexed.as_micros(),
        db.index_height()
    );

    let start = Instant::now();
    let mut found_scanned = 0;
    for key in &probes {
        if db.linear_scan(key)?.is_some() {
            found_scanned += 1;
        }
    }
    let scanned = start.elapsed();
    println!(
        "Linear scan:    found {found_scanned}/{} in {} us",
        probes.len(),
        scanned.as_micros()
    );

    if indexed.as_micros() > 0 {
        println!(
            "Speedup: {:.1}x",
            scanned.as_micros() as f64 / indexed.as_micros() as f64
        );
    } else {
        println!("Indexed search was below timer resolution; scan took {} us", scanned.as_micros());
    }
    Ok(())
}
