// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Opening a cache with files under a scratch directory
//! 2. Writing entries to each tier
//! 3. Reading them back (with timing)
//! 4. Promotion of a hot item from the structured tier to memory
//! 5. The `Cacheable` read-through wrapper
//! 6. Displaying cache metrics and raw exported metrics
//! 7. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::{json, Value};
use tiered_cache::{CacheConfig, CacheManager, Cacheable, SetOptions, TierLevel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures everything the cache emits)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           tiered-cache: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and open the cache
    // ─────────────────────────────────────────────────────────────────────────
    let scratch = std::env::temp_dir().join(format!("tiered_cache_demo_{}", std::process::id()));
    std::fs::create_dir_all(&scratch)?;

    println!("📦 Opening cache under {}...", scratch.display());
    let config = CacheConfig {
        max_memory_size: 4 * 1024 * 1024,
        local_path: Some(scratch.join("local.json")),
        db_path: Some(scratch.join("cache.db")),
        cleanup_interval_secs: 30,
        ..Default::default()
    };
    let cache = Arc::new(CacheManager::open(config).await?);

    for (level, status) in cache.tier_status() {
        println!("   └─ {:<14} {}", level, status);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Write one entry per tier
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Writing one entry per tier...");
    let entries = [
        ("user.alice", json!({"name": "Alice", "role": "admin"}), TierLevel::Memory),
        ("user.bob", json!({"name": "Bob", "role": "user"}), TierLevel::Session),
        ("config.app", json!({"theme": "dark", "version": "2.0"}), TierLevel::Local),
        ("stats.daily", json!({"requests": 42000, "latency_p99": 12}), TierLevel::StructuredDb),
    ];

    for (key, data, level) in &entries {
        let start = std::time::Instant::now();
        let opts = SetOptions::at(*level).with_ttl(Duration::from_secs(600));
        cache.set_with(key, data, opts).await?;
        println!("   └─ {} → {} ({:?})", key, level, start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read them back
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Reading entries back (with timing)...");
    for (key, _, _) in &entries {
        let start = std::time::Instant::now();
        let value: Option<Value> = cache.get(key).await;
        let elapsed = start.elapsed();
        match value {
            Some(v) => println!("   └─ {} → {} ({:?})", key, v, elapsed),
            None => println!("   └─ {} → NOT FOUND ({:?})", key, elapsed),
        }
    }
    let missing: Option<Value> = cache.get("user.nobody").await;
    println!("   └─ user.nobody → {:?}", missing);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Promotion
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔥 Reading 'stats.daily' until it is promoted...");
    for read in 2..=6 {
        let _: Option<Value> = cache.get("stats.daily").await;
        println!("   └─ read {}: {}", read, cache.locate("stats.daily").await);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Read-through wrapper
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🧮 Cacheable wrapper...");
    let slow_square = Cacheable::new(cache.clone(), "Demo::slow_square", |n: u64| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, std::io::Error>(n * n)
    })
    .ttl(Duration::from_secs(60));

    for attempt in 1..=2 {
        let start = std::time::Instant::now();
        let result = slow_square.call(12).await?;
        println!("   └─ call {}: 12² = {} ({:?})", attempt, result, start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    let metrics = cache.get_metrics().await;
    println!("\n📊 Cache Metrics:");
    println!("   ┌─ Requests: {} (hits {}, misses {})", metrics.total_requests, metrics.hits, metrics.misses);
    println!("   ├─ Hit rate: {:.1}%", metrics.hit_rate() * 100.0);
    println!("   ├─ Evictions: {}, errors: {}", metrics.evictions, metrics.errors);
    println!("   ├─ Avg response: {:.3} ms", metrics.average_response_time_ms);
    for (level, hits) in &metrics.hits_by_level {
        let bytes = metrics.size_by_level.get(level).copied().unwrap_or(0);
        println!("   │  └─ {:<14} hits={} bytes={}", level, hits, bytes);
    }
    println!("   └─ JSON: {}", serde_json::to_string(&metrics)?);

    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    cache.clear().await;
    cache.shutdown().await;

    println!("\n🧹 Removing {}...", scratch.display());
    if let Err(e) = std::fs::remove_dir_all(&scratch) {
        println!("   └─ Warning: could not remove scratch dir: {}", e);
    }

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();
    
    // Collect and sort metrics by name for cleaner output
    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];
    
    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (kind, key) = composite_key.into_parts();
        let name = key.name();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let _ = kind;
        
        match value {
            DebugValue::Counter(v) => counters.push((name.to_string(), label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name.to_string(), label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                let min = samples.iter().map(|v| v.into_inner()).fold(f64::INFINITY, f64::min);
                let max = samples.iter().map(|v| v.into_inner()).fold(f64::NEG_INFINITY, f64::max);
                histograms.push((name.to_string(), label_str, count, sum, avg, min, max));
            }
        }
    }
    
    // Sort each category
    counters.sort_by(|a, b| a.0.cmp(&b.0));
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));
    
    // Print counters
    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    
    // Print gauges
    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.2}", name, labels, value);
        }
    }
    
    // Print histograms
    if !histograms.is_empty() {
        println!("   └─ Histograms (distributions)");
        for (name, labels, count, sum, avg, min, max) in &histograms {
            if *min == f64::INFINITY {
                println!("   │  └─ {}{} = (no samples)", name, labels);
            } else {
                println!("   │  └─ {}{}", name, labels);
                println!("   │     count={} sum={:.4} avg={:.4} min={:.4} max={:.4}", 
                    count, sum, avg, min, max);
            }
        }
    }
    
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}