//! Frames Probe - load URLs through the texture cache
//!
//! Usage: frames-probe [--config cache.json] <url>...

use anyhow::{bail, Context, Result};
use frames_texture::{CacheConfig, EntryRef, MemorySink, TextureCache};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const LOAD_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, urls) = parse_args(std::env::args().skip(1))?;
    if urls.is_empty() {
        bail!("usage: frames-probe [--config cache.json] <url>...");
    }

    tracing::info!("frames-texture v{}", frames_texture::VERSION);
    let mut cache = TextureCache::with_http(config, MemorySink::new())?;

    let entries: Vec<EntryRef> = urls.iter().map(|url| cache.acquire(url)).collect();
    wait_all(&mut cache, &entries);

    for entry in &entries {
        report(&mut cache, entry);
    }

    let stats = cache.stats();
    println!(
        "cache: {} entries ({} ready, {} failed, {} pending), {} frames, {} bytes resident",
        stats.entries,
        stats.ready,
        stats.failed,
        stats.pending,
        stats.materialized_frames,
        cache.sink().resident_bytes()
    );

    for entry in entries {
        cache.release(entry);
    }
    let evicted = cache.sweep();
    tracing::info!("Evicted {} entries, {} textures still live", evicted, cache.sink().live_count());

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(CacheConfig, Vec<String>)> {
    let mut config = CacheConfig::default();
    let mut urls = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config needs a file")?;
            config = load_config(Path::new(&path))?;
        } else {
            urls.push(arg);
        }
    }

    Ok((config, urls))
}

fn load_config(path: &Path) -> Result<CacheConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: CacheConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn wait_all(cache: &mut TextureCache<MemorySink>, entries: &[EntryRef]) {
    let deadline = Instant::now() + LOAD_TIMEOUT;
    loop {
        let pending = entries.iter().filter(|entry| !cache.ready(entry)).count();
        if pending == 0 {
            return;
        }
        if Instant::now() >= deadline {
            tracing::warn!("Gave up waiting on {} entries", pending);
            return;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn report(cache: &mut TextureCache<MemorySink>, entry: &EntryRef) {
    if let Some(error) = cache.error(entry) {
        println!("{}: failed: {}", entry.url(), error);
        return;
    }
    if !cache.ready(entry) {
        println!("{}: still loading", entry.url());
        return;
    }

    // Touch every frame so each one is uploaded once
    let starts = cache.frame_delays(entry).to_vec();
    if starts.is_empty() {
        cache.frame(entry, 0);
    }
    for start in starts {
        cache.frame(entry, start);
    }

    println!(
        "{}: {}x{}, {} frame(s), {}ms{}",
        entry.url(),
        cache.width(entry),
        cache.height(entry),
        cache.frame_count(entry),
        cache.duration(entry),
        if cache.is_animated(entry) { ", animated" } else { "" }
    );
}
