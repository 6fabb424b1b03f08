#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use evg_repo::{append_commit, load_commit_log};
use evg_types::{CommitRecord, Version};
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str);

    match cmd {
        Some("init") => init_cmd(&args[1..]),
        Some("commit") => commit_cmd(&args[1..]),
        Some("log") => log_cmd(&args[1..]),
        Some("show") => show_cmd(&args[1..]),
        Some("--help" | "-h" | "help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("unknown command: {other}")
        }
    }
}

fn print_usage() {
    println!("evg-cli\n");
    println!("USAGE:");
    println!("  evg-cli init <repo-dir>");
    println!("  evg-cli commit <repo-dir> <file> [-m <message>]");
    println!("  evg-cli log <repo-dir> [--at <version>] [--json]");
    println!("  evg-cli show <repo-dir> <version>");
}

fn init_cmd(args: &[String]) -> Result<()> {
    let Some(repo) = args.first() else {
        bail!("init requires a repository directory");
    };
    fs::create_dir_all(repo).with_context(|| format!("failed to create repository {repo}"))?;
    println!("initialized empty repository at {repo}");
    Ok(())
}

fn commit_cmd(args: &[String]) -> Result<()> {
    let Some(repo) = args.first() else {
        bail!("commit requires <repo-dir> <file>");
    };
    let Some(file) = args.get(1) else {
        bail!("commit requires <repo-dir> <file>");
    };
    let message = match args.iter().position(|a| a == "-m") {
        Some(idx) => args
            .get(idx + 1)
            .cloned()
            .context("-m requires a message argument")?,
        None => String::new(),
    };

    let repo = Path::new(repo);
    let diff_data =
        fs::read_to_string(file).with_context(|| format!("failed to read file {file}"))?;
    let file_name = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("file path has no usable name: {file}"))?
        .to_owned();

    let mut log = load_commit_log(repo)
        .with_context(|| format!("failed to rebuild commit log from {}", repo.display()))?;
    let version = log.head_version().map_or(Version::FIRST, Version::next);
    let record = CommitRecord::new(version, file_name, diff_data, message);

    log.insert(record.clone()).context("commit rejected")?;
    let path = append_commit(repo, &record)
        .with_context(|| format!("failed to write commit artifact in {}", repo.display()))?;

    println!("committed version {version} ({})", path.display());
    Ok(())
}

fn log_cmd(args: &[String]) -> Result<()> {
    let Some(repo) = args.first() else {
        bail!("log requires a repository directory");
    };
    let json = args.iter().any(|a| a == "--json");
    let at = match args.iter().position(|a| a == "--at") {
        Some(idx) => {
            let raw = args.get(idx + 1).context("--at requires a version number")?;
            let version: u64 = raw
                .parse()
                .with_context(|| format!("invalid version number: {raw}"))?;
            Some(Version(version))
        }
        None => None,
    };

    let repo = Path::new(repo);
    let log = load_commit_log(repo)
        .with_context(|| format!("failed to rebuild commit log from {}", repo.display()))?;

    let records = match at {
        Some(version) => log.snapshot_at(version),
        None => log.timeline(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("serialize timeline")?
        );
        return Ok(());
    }

    if records.is_empty() {
        println!("no commits");
        return Ok(());
    }
    for record in records {
        println!(
            "v{:<6} {:<24} {}",
            record.commit_key, record.file_name, record.commit_message
        );
    }
    Ok(())
}

fn show_cmd(args: &[String]) -> Result<()> {
    let Some(repo) = args.first() else {
        bail!("show requires <repo-dir> <version>");
    };
    let Some(raw) = args.get(1) else {
        bail!("show requires <repo-dir> <version>");
    };
    let version: u64 = raw
        .parse()
        .with_context(|| format!("invalid version number: {raw}"))?;

    let repo = Path::new(repo);
    let log = load_commit_log(repo)
        .with_context(|| format!("failed to rebuild commit log from {}", repo.display()))?;
    let record = log
        .record_at(Version(version))
        .with_context(|| format!("no commit with version {version} in {}", repo.display()))?;

    print!("{}", record.diff_data);
    if !record.diff_data.ends_with('\n') {
        println!();
    }
    Ok(())
}
