//! # Asset Streaming Integration Test
//!
//! Cache eviction order and budget convergence, loader de-duplication, and
//! the loader → cache path a frame loop takes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use duat_core::ManualClock;
use duat_rendering::assets::{encode_rgba, LoadCallback};
use duat_rendering::{
    AssetCache, AssetKey, AssetSource, AssetType, BackgroundLoader, CompletedLoad,
    DirectorySource, EntryMetadata, GeneratedSource, LoadError, LoadPriority, LoadRequest,
    PreloadPlan, Submission, Surface,
};
use duat_shared::QualityLevel;

/// Unprotected metadata regardless of the kind's default.
fn plain() -> EntryMetadata {
    EntryMetadata::for_type(AssetType::Texture).protected(false)
}

/// A surface of exactly `bytes` bytes (multiple of 4).
fn blob(bytes: u32) -> Surface {
    Surface::solid(bytes / 4, 1, [1, 2, 3, 255])
}

fn drain_until<F>(loader: &mut BackgroundLoader, mut done: F) -> Vec<CompletedLoad>
where
    F: FnMut(&[CompletedLoad]) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut all = Vec::new();
    while !done(&all) && Instant::now() < deadline {
        all.extend(loader.wait_completed(Duration::from_millis(50)));
    }
    all
}

#[test]
fn test_lru_scenario_evicts_least_recent() {
    // Budget 100 bytes, entries of 40 % each
    let mut cache = AssetCache::new(100, ManualClock::new().shared());
    let [a, b, c, d] = ["A", "B", "C", "D"].map(AssetKey::new);

    cache.put(a.clone(), blob(40), plain());
    cache.put(b.clone(), blob(40), plain());
    cache.put(c.clone(), blob(40), plain());
    // Inserting C already pushed A out
    assert!(!cache.contains(&a));

    let _ = cache.get(&a);
    cache.put(d.clone(), blob(40), plain());

    assert!(!cache.contains(&b), "B was least recently used");
    assert!(cache.contains(&c));
    assert!(cache.contains(&d));
    assert!(cache.current_bytes() <= cache.budget_bytes());
    assert_eq!(cache.stats().evictions, 2);
}

#[test]
fn test_budget_converges_once_protection_lifts() {
    let mut cache = AssetCache::new(1_000, ManualClock::new().shared());

    for i in 0..100 {
        cache.put(AssetKey::new(format!("tex/{i}")), blob(40), plain());
        assert!(cache.current_bytes() <= cache.budget_bytes());
    }

    // Protected entries may overshoot, never get evicted
    for i in 0..30 {
        cache.put(
            AssetKey::new(format!("ui/{i}")),
            blob(40),
            plain().protected(true),
        );
    }
    assert!(cache.current_bytes() > cache.budget_bytes());
    assert_eq!(cache.protected_count(), 30);
    assert!(cache.stats().over_budget_inserts > 0);

    for i in 0..30 {
        cache.unprotect(&AssetKey::new(format!("ui/{i}")));
    }
    cache.maintain();
    assert!(cache.current_bytes() <= 700);

    cache.put(AssetKey::new("late"), blob(40), plain());
    assert!(cache.current_bytes() <= cache.budget_bytes());
}

#[test]
fn test_clear_preserving_protected() {
    let mut cache = AssetCache::new(10_000, ManualClock::new().shared());
    for i in 0..10 {
        cache.put(
            AssetKey::new(format!("k{i}")),
            blob(40),
            plain().protected(i % 5 == 0),
        );
    }
    assert_eq!(cache.clear(true), 8);
    assert_eq!(cache.len(), 2);
    assert!(cache.iter_lru().all(|e| e.metadata.protected));
}

#[test]
fn test_concurrent_requests_share_one_load() {
    let mut loader = BackgroundLoader::new(2).expect("loader");
    let loads = Arc::new(AtomicUsize::new(0));
    let delivered = Arc::new(AtomicUsize::new(0));
    let key = AssetKey::new("backgrounds/tomb");

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        let loads = Arc::clone(&loads);
        let delivered = Arc::clone(&delivered);
        let callback: LoadCallback = Box::new(move |_, result| {
            assert!(result.is_ok());
            delivered.fetch_add(1, Ordering::SeqCst);
        });
        outcomes.push(loader.request_async(
            LoadRequest::new(key.clone(), AssetType::Background),
            move || {
                loads.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(Surface::solid(4, 4, [0, 0, 0, 255]))
            },
            Some(callback),
        ));
    }

    assert_eq!(outcomes[0], Submission::Submitted);
    assert!(outcomes[1..].iter().all(|s| *s == Submission::Coalesced));

    let mut done = drain_until(&mut loader, |done| !done.is_empty());
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].dispatch(), 5);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(delivered.load(Ordering::SeqCst), 5);
    assert!(!loader.is_pending(&key));
}

#[test]
fn test_preloads_land_in_cache() {
    let source: Arc<dyn AssetSource> =
        Arc::new(GeneratedSource::new(16, 16).with_missing_prefix("missing/"));
    let mut plan = PreloadPlan::new();
    plan.add_rule("combat", "sprites/scarab", AssetType::Sprite, LoadPriority::High)
        .add_rule("combat", "cards/anubis", AssetType::CardArt, LoadPriority::Medium)
        .add_rule("combat", "missing/relic", AssetType::Sprite, LoadPriority::Low);

    let mut cache = AssetCache::new(1 << 20, ManualClock::new().shared());
    let mut loader = BackgroundLoader::new(2).expect("loader");
    assert_eq!(plan.schedule("combat", &cache, &mut loader, &source, QualityLevel::Ultra), 3);
    // Everything is in flight; a second pass queues nothing
    assert_eq!(plan.schedule("combat", &cache, &mut loader, &source, QualityLevel::Ultra), 0);

    let done = drain_until(&mut loader, |done| done.len() >= 3);
    assert_eq!(done.len(), 3);
    for load in done {
        match load.result {
            Ok(surface) => {
                let meta = EntryMetadata::for_type(load.asset_type).on_screen("combat");
                cache.put(load.key, surface, meta);
            }
            Err(err) => assert!(matches!(err, LoadError::NotFound(_))),
        }
    }
    assert_eq!(cache.len(), 2);
    assert_eq!(loader.stats().failed, 1);
    assert_eq!(cache.remove_screen("combat") + cache.protected_count(), 2);
}

#[test]
fn test_directory_source_reads_raw_rgba() {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let root = std::env::temp_dir().join(format!("duat_assets_{id}"));
    std::fs::create_dir_all(root.join("ui")).expect("mkdir");

    let surface = Surface::solid(3, 2, [9, 8, 7, 255]);
    let bytes = encode_rgba(&surface).expect("rgba surface");
    let source = DirectorySource::new(&root);
    std::fs::write(source.file_for(&AssetKey::new("ui/button")), bytes).expect("write");

    let loaded = source.load(&AssetKey::new("ui/button")).expect("load");
    assert_eq!(loaded, surface);
    assert!(matches!(
        source.load(&AssetKey::new("ui/absent")),
        Err(LoadError::NotFound(_))
    ));

    std::fs::remove_dir_all(&root).ok();
}
