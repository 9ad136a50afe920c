//! Main entry point for the zipfs CLI application.
//!
//! Opens the archive named on the command line, runs one command against
//! it and closes it, which writes any change back to disk.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

use zipfs::cli::Command;
use zipfs::{Cli, CopyOptions, Entry, WriteOptions, ZipFileSystem};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let fs = ZipFileSystem::open(&cli.archive, cli.config()?)
        .with_context(|| format!("cannot open {}", cli.archive))?;
    run(&fs, &cli.command)?;
    fs.close()
        .with_context(|| format!("cannot write {}", cli.archive))?;
    Ok(())
}

/// Run a single command against an open archive.
fn run(fs: &ZipFileSystem, command: &Command) -> Result<()> {
    match command {
        Command::Ls { path, long } => list(fs, path, *long),
        Command::Cat { path } => {
            let mut input = fs.new_input(path)?;
            let mut stdout = io::stdout().lock();
            io::copy(&mut input, &mut stdout)?;
            stdout.flush()?;
            Ok(())
        }
        Command::Put { src, dest } => {
            let mut file = std::fs::File::open(src).with_context(|| format!("cannot read {src}"))?;
            let mut out = fs.new_output(dest, WriteOptions::default())?;
            io::copy(&mut file, &mut out)?;
            out.close()?;
            Ok(())
        }
        Command::Mkdir { path } => Ok(fs.create_directory(path)?),
        Command::Rm { path } => Ok(fs.delete(path)?),
        Command::Mv { src, dest, force } => Ok(fs.rename(src, dest, copy_options(*force))?),
        Command::Cp { src, dest, force } => Ok(fs.copy(src, dest, copy_options(*force))?),
        Command::Stat { path } => {
            let entry = fs.attributes(path)?;
            stat(fs, &entry);
            Ok(())
        }
    }
}

fn copy_options(force: bool) -> CopyOptions {
    CopyOptions {
        replace_existing: force,
        copy_attributes: true,
    }
}

/// List a directory, either names only or as a table.
fn list(fs: &ZipFileSystem, path: &str, long: bool) -> Result<()> {
    let children = fs.read_dir(path)?;
    if !long {
        for child in &children {
            println!("{child}");
        }
        return Ok(());
    }

    let mut total = 0u64;
    for child in &children {
        let entry = fs.attributes(child)?;
        let kind = if entry.is_directory() { 'd' } else { '-' };
        println!(
            "{}  {:>12}  {:>8}  {}  {}",
            kind,
            format_size(entry.size()),
            format!("{:?}", entry.method()),
            format_time(&entry),
            child
        );
        total += entry.size();
    }
    println!("{} entries, {}", children.len(), format_size(total));
    Ok(())
}

fn stat(fs: &ZipFileSystem, entry: &Entry) {
    let ratio = if entry.size() > 0 {
        100 - (entry.compressed_size().min(entry.size()) * 100 / entry.size())
    } else {
        0
    };
    println!("  Name: {}", fs.display_name(entry));
    println!("  Type: {}", if entry.is_directory() { "directory" } else { "file" });
    println!("  Size: {} ({} bytes)", format_size(entry.size()), entry.size());
    println!("Stored: {} bytes, {:?}, {}% saved", entry.compressed_size(), entry.method(), ratio);
    println!("   CRC: {:08x}", entry.crc());
    println!("Modify: {}", format_time(entry));
    println!("Access: {}", DateTime::<Local>::from(entry.last_access_time()).format("%Y-%m-%d %H:%M:%S"));
    println!("Create: {}", DateTime::<Local>::from(entry.creation_time()).format("%Y-%m-%d %H:%M:%S"));
}

fn format_time(entry: &Entry) -> String {
    DateTime::<Local>::from(entry.last_modified_time())
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match size {
        s if s >= GB => format!("{:.2} GB", s as f64 / GB as f64),
        s if s >= MB => format!("{:.2} MB", s as f64 / MB as f64),
        s if s >= KB => format!("{:.2} KB", s as f64 / KB as f64),
        s => format!("{s} bytes"),
    }
}
