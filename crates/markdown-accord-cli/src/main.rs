use std::sync::Arc;
use std::{env, fs, process};

use anyhow::{Context, Result};
use markdown_accord_engine::{Block, ChunkOp, diff_blocks, parse, serialize, three_way_merge};
use tracing_subscriber::EnvFilter;

fn print_usage(program: &str) {
    eprintln!(
        r#"{program} - markdown synchronization tools

USAGE:
    {program} merge <base> <local> <remote>   Three-way merge, result on stdout
    {program} diff <prev> <next>              Block alignment of two files
    {program} normalize <file>                Canonical form of a file on stdout
"#
    );
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("merge") if args.len() == 5 => cmd_merge(&args[2], &args[3], &args[4]),
        Some("diff") if args.len() == 4 => cmd_diff(&args[2], &args[3]),
        Some("normalize") if args.len() == 3 => cmd_normalize(&args[2]),
        Some("--help") | Some("-h") => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            print_usage(&args[0]);
            process::exit(1);
        }
    }
}

fn cmd_merge(base: &str, local: &str, remote: &str) -> Result<()> {
    let base = read(base)?;
    let local = read(local)?;
    let remote = read(remote)?;
    print!("{}", three_way_merge(&base, &local, &remote));
    Ok(())
}

fn cmd_diff(prev_path: &str, next_path: &str) -> Result<()> {
    let prev = load_blocks(prev_path)?;
    let next = load_blocks(next_path)?;

    for chunk in diff_blocks(&prev, &next) {
        match chunk.op {
            ChunkOp::Equal => {
                for block in &prev[chunk.prev_index..chunk.prev_index + chunk.count] {
                    println!("  {}", summary(block));
                }
            }
            ChunkOp::Delete => {
                for block in &prev[chunk.prev_index..chunk.prev_index + chunk.count] {
                    println!("- {}", summary(block));
                }
            }
            ChunkOp::Insert => {
                for block in &next[chunk.next_index..chunk.next_index + chunk.count] {
                    println!("+ {}", summary(block));
                }
            }
        }
    }
    Ok(())
}

fn cmd_normalize(path: &str) -> Result<()> {
    let blocks = load_blocks(path)?;
    print!("{}", serialize(&blocks));
    Ok(())
}

fn load_blocks(path: &str) -> Result<Vec<Arc<Block>>> {
    parse(&read(path)?).with_context(|| format!("failed to parse {path}"))
}

fn read(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
}

/// First line of a block's canonical form, truncated for display.
fn summary(block: &Arc<Block>) -> String {
    let text = serialize(std::slice::from_ref(block));
    let first = text.lines().next().unwrap_or("");
    if first.chars().count() > 72 {
        let head: String = first.chars().take(69).collect();
        format!("{head}...")
    } else {
        first.to_string()
    }
}
