//! Sweep, push consumer, download queue and cache warming.

mod common;

use aura_core::config::LibraryConfig;
use aura_core::media::{MediaItem, MediaType, Movie};
use aura_core::poster::ImageType;
use aura_db::repositories::SubscriptionRepo;
use aura_worker::download_queue::{self, QueueOutcome};
use aura_worker::{warmer, SetUpdateConsumer, Sweep};
use common::*;

// ---------------------------------------------------------------------------
// Library warming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn warmer_loads_every_page() {
    let h = harness().await;
    let movies: Vec<MediaItem> = (0..(warmer::PAGE_SIZE + 20))
        .map(|i| MediaItem {
            tmdb_id: i.to_string(),
            library_title: "Movies".into(),
            rating_key: format!("rk{i}"),
            media_type: MediaType::Movie,
            movie: Some(Movie::default()),
            ..Default::default()
        })
        .collect();
    h.server.sections.lock().unwrap().insert("Movies".into(), movies);

    let libraries = vec![
        LibraryConfig {
            name: "Movies".into(),
            ..Default::default()
        },
        LibraryConfig {
            name: "Missing".into(),
            ..Default::default()
        },
    ];
    let warmed = warmer::warm_libraries(h.server.as_ref(), &h.cache, &libraries).await;

    assert_eq!(warmed, 1);
    let section = h.cache.get_by_title("Movies").await.unwrap();
    assert_eq!(section.total_size, warmer::PAGE_SIZE + 20);
    assert_eq!(section.path, "/data/movies");
    assert!(h.cache.get_by_title("Missing").await.is_none());
}

fn library_movie(key: &str) -> MediaItem {
    MediaItem {
        tmdb_id: key.to_string(),
        library_title: "Movies".into(),
        rating_key: key.to_string(),
        media_type: MediaType::Movie,
        movie: Some(Movie::default()),
        ..Default::default()
    }
}

#[tokio::test]
async fn warmer_pages_by_listing_entries_not_items() {
    let h = harness().await;
    let entries: Vec<MediaItem> = (0..1000).map(|i| library_movie(&format!("rk{i}"))).collect();
    h.server.sections.lock().unwrap().insert("Movies".into(), entries);
    // The first entry is a collection of five movies.
    h.server.collections.lock().unwrap().insert(
        "rk0".into(),
        (0..5).map(|i| library_movie(&format!("boxed{i}"))).collect(),
    );

    let library = LibraryConfig {
        name: "Movies".into(),
        ..Default::default()
    };
    let cached = warmer::warm_library(h.server.as_ref(), &h.cache, &library)
        .await
        .unwrap();

    assert_eq!(cached, Some(1004));
    let section = h.cache.get_by_title("Movies").await.unwrap();
    assert!(section.media_items.iter().any(|m| m.rating_key == "rk999"));
}

#[tokio::test]
async fn warmer_continues_past_a_page_without_items() {
    let h = harness().await;
    let entries: Vec<MediaItem> = (0..(warmer::PAGE_SIZE + 3))
        .map(|i| library_movie(&format!("rk{i}")))
        .collect();
    h.server.unsupported.lock().unwrap().extend(
        entries
            .iter()
            .take(warmer::PAGE_SIZE)
            .map(|m| m.rating_key.clone()),
    );
    h.server.sections.lock().unwrap().insert("Movies".into(), entries);

    let library = LibraryConfig {
        name: "Movies".into(),
        ..Default::default()
    };
    let cached = warmer::warm_library(h.server.as_ref(), &h.cache, &library)
        .await
        .unwrap();

    assert_eq!(cached, Some(3));
}

// ---------------------------------------------------------------------------
// Push consumer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_for_unknown_set_does_nothing() {
    let h = harness().await;
    let consumer = SetUpdateConsumer::new(h.db.clone(), h.detector.clone());

    assert!(consumer.handle_set("999").await.is_empty());
    assert!(h.server.applied().is_empty());
}

#[tokio::test]
async fn update_runs_a_forced_check_for_subscribers() {
    let h = harness().await;
    h.server.add_item(show("500", &[1, 2]));
    h.source.add_set(show_set("42", "2024-03-01T00:00:00Z", &[1, 2]));
    let rec = record(show("500", &[1, 2]), show_set("42", "2023-01-01T00:00:00Z", &[1, 2]));
    SubscriptionRepo::upsert_all(&h.db, &rec).await.unwrap();

    let consumer = SetUpdateConsumer::new(h.db.clone(), h.detector.clone());
    let results = consumer.handle_set("42").await;

    assert_eq!(results.len(), 1);
    assert_eq!(h.server.applied().len(), 2);
    assert!(h
        .server
        .applied()
        .iter()
        .all(|(_, t)| *t == ImageType::SeasonPoster));
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_checks_stored_items_and_skips_ignored() {
    let h = harness().await;
    h.server.add_item(show("500", &[1, 2, 3]));
    h.source.add_set(show_set("42", "2023-01-01T00:00:00Z", &[1, 2, 3]));
    let rec = record(show("500", &[1, 2]), show_set("42", "2023-01-01T00:00:00Z", &[1, 2]));
    SubscriptionRepo::upsert_all(&h.db, &rec).await.unwrap();

    let mut ignored = show("900", &[1]);
    ignored.tmdb_id = "900".into();
    SubscriptionRepo::set_ignored(&h.db, &ignored).await.unwrap();

    let sweep = Sweep::new(h.db.clone(), h.detector.clone(), vec![]);
    let summary = sweep.run_once().await.unwrap().unwrap();

    assert_eq!(summary.items, 1);
    assert_eq!(summary.success, 1);
    assert_eq!(h.server.applied(), vec![("500-s3".to_string(), ImageType::SeasonPoster)]);

    // Nothing changed since, so a second sweep applies nothing new.
    let again = sweep.run_once().await.unwrap().unwrap();
    assert_eq!(again.skipped, 1);
    assert_eq!(h.server.applied().len(), 1);
}

// ---------------------------------------------------------------------------
// Download queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn queue_removes_completed_and_flags_broken_files() {
    let h = harness().await;
    h.server.add_item(show("500", &[1, 2]));
    let queue = h.paths.download_queue();

    let rec = record(show("500", &[1, 2]), show_set("42", "2023-01-01T00:00:00Z", &[1, 2]));
    std::fs::write(queue.join("a_dark.json"), serde_json::to_string(&rec).unwrap()).unwrap();
    std::fs::write(queue.join("b_broken.json"), "{ not json").unwrap();
    std::fs::write(queue.join("error_old.json"), "{}").unwrap();
    std::fs::write(queue.join("notes.txt"), "ignored").unwrap();

    let processed = download_queue::drain(&h.detector, &queue).await.unwrap();

    assert_eq!(
        processed.iter().map(|(_, o)| *o).collect::<Vec<_>>(),
        vec![QueueOutcome::Completed, QueueOutcome::Failed]
    );
    assert!(!queue.join("a_dark.json").exists());
    assert!(queue.join("error_b_broken.json").exists());
    assert!(queue.join("error_old.json").exists());
    assert!(queue.join("notes.txt").exists());
    assert_eq!(h.server.applied().len(), 2);

    let saved = SubscriptionRepo::get(&h.db, "70523", "TV").await.unwrap();
    assert!(saved.is_some());
}

#[tokio::test]
async fn queue_marks_partial_success_as_warning() {
    let h = harness().await;
    h.server.add_item(show("500", &[1, 2]));
    let queue = h.paths.download_queue();

    let mut rec = record(show("500", &[1, 2]), show_set("42", "2023-01-01T00:00:00Z", &[1]));
    let mut failing = rec.subscriptions[0].clone();
    failing.poster_set = show_set("43", "2023-01-01T00:00:00Z", &[7]);
    rec.subscriptions.push(failing);
    std::fs::write(queue.join("dark.json"), serde_json::to_string(&rec).unwrap()).unwrap();

    let processed = download_queue::drain(&h.detector, &queue).await.unwrap();

    assert_eq!(processed[0].1, QueueOutcome::Partial);
    assert!(queue.join("warning_dark.json").exists());
}
