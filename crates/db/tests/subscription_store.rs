//! Integration tests for the subscription store against an in-memory
//! SQLite database with migrations applied.

use assert_matches::assert_matches;
use aura_core::config::AppPaths;
use aura_core::error::CoreError;
use aura_core::library_cache::LibraryCache;
use aura_core::media::{MediaFile, MediaItem, MediaType, Movie};
use aura_core::poster::{ImageType, PosterSet, SelectedTypes, SetUser};
use aura_core::subscription::{MediaItemWithSubs, Subscription};
use aura_db::migrations::MigrationContext;
use aura_db::query::{
    AutoDownloadFilter, Pagination, Sort, SortField, SortOrder, SubscriptionFilter,
    SELECTED_TYPE_NONE, USER_NONE,
};
use aura_db::repositories::SubscriptionRepo;
use aura_db::DbError;
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn setup() -> SqlitePool {
    let pool = aura_db::create_memory_pool().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let paths = AppPaths::new(dir.path());
    let cache = LibraryCache::new();
    aura_db::run_migrations(&pool, &MigrationContext { paths: &paths, cache: &cache })
        .await
        .unwrap();
    pool
}

fn movie(tmdb: &str, library: &str, title: &str, year: i32) -> MediaItem {
    MediaItem {
        tmdb_id: tmdb.to_string(),
        library_title: library.to_string(),
        rating_key: format!("rk-{tmdb}"),
        media_type: MediaType::Movie,
        title: title.to_string(),
        year,
        movie: Some(Movie {
            file: MediaFile {
                path: format!("/movies/{title}/{title}.mkv"),
                size: 1,
                duration: 1,
            },
        }),
        ..Default::default()
    }
}

fn sub(set_id: &str, user: &str, types: &[ImageType]) -> Subscription {
    Subscription {
        poster_set: PosterSet {
            id: set_id.to_string(),
            title: format!("Set {set_id}"),
            user: SetUser { name: user.to_string() },
            ..Default::default()
        },
        selected_types: SelectedTypes::new(types.iter().copied()),
        auto_download: true,
        last_downloaded: "2024-01-01T00:00:00Z".to_string(),
    }
}

fn types(item: &MediaItemWithSubs, set_id: &str) -> Option<String> {
    item.subscriptions
        .iter()
        .find(|s| s.poster_set.id == set_id)
        .map(|s| s.selected_types.to_csv())
}

// ---------------------------------------------------------------------------
// UpsertAll
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upsert_then_get_round_trips_subscriptions_in_row_order() {
    let pool = setup().await;
    let item = MediaItemWithSubs::new(
        movie("348", "Movies", "Alien", 1979),
        vec![
            sub("b", "alpha", &[ImageType::Poster]),
            sub("a", "beta", &[ImageType::Backdrop]),
        ],
    );
    SubscriptionRepo::upsert_all(&pool, &item).await.unwrap();

    let stored = SubscriptionRepo::get(&pool, "348", "Movies").await.unwrap().unwrap();
    assert_eq!(stored.media_item, item.media_item);
    let ids: Vec<_> = stored.subscriptions.iter().map(|s| s.poster_set.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert!(!stored.ignored);
}

#[tokio::test]
async fn upsert_strips_types_claimed_by_incoming_sets() {
    let pool = setup().await;
    let base = movie("348", "Movies", "Alien", 1979);

    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(
            base.clone(),
            vec![sub("a", "alpha", &[ImageType::Poster, ImageType::Backdrop])],
        ),
    )
    .await
    .unwrap();

    // Set b takes over the poster; a keeps only the backdrop.
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(base.clone(), vec![sub("b", "beta", &[ImageType::Poster])]),
    )
    .await
    .unwrap();
    let stored = SubscriptionRepo::get(&pool, "348", "Movies").await.unwrap().unwrap();
    assert_eq!(types(&stored, "a").as_deref(), Some("backdrop"));
    assert_eq!(types(&stored, "b").as_deref(), Some("poster"));

    // Set c takes the backdrop; a is left empty and removed.
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(base, vec![sub("c", "gamma", &[ImageType::Backdrop])]),
    )
    .await
    .unwrap();
    let stored = SubscriptionRepo::get(&pool, "348", "Movies").await.unwrap().unwrap();
    assert_eq!(types(&stored, "a"), None);
    assert_eq!(types(&stored, "b").as_deref(), Some("poster"));
    assert_eq!(types(&stored, "c").as_deref(), Some("backdrop"));

    let joins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM SavedItems WHERE PosterSetID = 'a'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(joins, 0);
}

#[tokio::test]
async fn incoming_subscription_with_no_types_is_pruned() {
    let pool = setup().await;
    let base = movie("348", "Movies", "Alien", 1979);
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(base.clone(), vec![sub("a", "alpha", &[ImageType::Poster])]),
    )
    .await
    .unwrap();

    SubscriptionRepo::upsert_all(&pool, &MediaItemWithSubs::new(base, vec![sub("a", "alpha", &[])]))
        .await
        .unwrap();

    let (found, summaries) = SubscriptionRepo::exists(&pool, "348", "Movies").await.unwrap();
    assert!(found);
    assert!(summaries.is_empty());
}

#[tokio::test]
async fn upsert_rejects_item_without_tmdb() {
    let pool = setup().await;
    let item = MediaItemWithSubs::new(
        movie("", "Movies", "Home Video", 2001),
        vec![sub("a", "alpha", &[ImageType::Poster])],
    );
    let err = SubscriptionRepo::upsert_all(&pool, &item).await.unwrap_err();
    assert_matches!(err, DbError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Delete / Exists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_single_set_keeps_item_until_last_subscription() {
    let pool = setup().await;
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(
            movie("348", "Movies", "Alien", 1979),
            vec![
                sub("a", "alpha", &[ImageType::Poster]),
                sub("b", "beta", &[ImageType::Backdrop]),
            ],
        ),
    )
    .await
    .unwrap();

    assert!(SubscriptionRepo::delete(&pool, "348", "Movies", Some("a")).await.unwrap());
    let (found, summaries) = SubscriptionRepo::exists(&pool, "348", "Movies").await.unwrap();
    assert!(found);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].poster_set_id, "b");
    assert_eq!(summaries[0].poster_set_user, "beta");

    assert!(SubscriptionRepo::delete(&pool, "348", "Movies", Some("b")).await.unwrap());
    let (found, _) = SubscriptionRepo::exists(&pool, "348", "Movies").await.unwrap();
    assert!(!found);
}

#[tokio::test]
async fn delete_all_cascades_across_tables() {
    let pool = setup().await;
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(
            movie("348", "Movies", "Alien", 1979),
            vec![sub("a", "alpha", &[ImageType::Poster])],
        ),
    )
    .await
    .unwrap();

    assert!(SubscriptionRepo::delete(&pool, "348", "Movies", None).await.unwrap());
    for table in ["MediaItems", "PosterSets", "SavedItems"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "{table} should be empty");
    }
    assert!(!SubscriptionRepo::delete(&pool, "348", "Movies", None).await.unwrap());
}

// ---------------------------------------------------------------------------
// Ignore / push lookups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ignored_items_are_hidden_until_resubscribed() {
    let pool = setup().await;
    let alien = movie("348", "Movies", "Alien", 1979);
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(alien.clone(), vec![sub("a", "alpha", &[ImageType::Poster])]),
    )
    .await
    .unwrap();

    SubscriptionRepo::set_ignored(&pool, &alien).await.unwrap();
    let stored = SubscriptionRepo::get(&pool, "348", "Movies").await.unwrap().unwrap();
    assert!(stored.ignored);
    assert!(stored.subscriptions.is_empty());

    let page = SubscriptionRepo::query(&pool, &SubscriptionFilter::default(), Pagination::default(), Sort::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(alien, vec![sub("a", "alpha", &[ImageType::Poster])]),
    )
    .await
    .unwrap();
    let stored = SubscriptionRepo::get(&pool, "348", "Movies").await.unwrap().unwrap();
    assert!(!stored.ignored);
}

#[tokio::test]
async fn list_by_poster_set_finds_every_holder() {
    let pool = setup().await;
    for (tmdb, library) in [("348", "Movies"), ("348", "4K Movies"), ("679", "Movies")] {
        let set = if tmdb == "679" { "other" } else { "shared" };
        SubscriptionRepo::upsert_all(
            &pool,
            &MediaItemWithSubs::new(
                movie(tmdb, library, "Alien", 1979),
                vec![sub(set, "alpha", &[ImageType::Poster])],
            ),
        )
        .await
        .unwrap();
    }

    let holders = SubscriptionRepo::list_by_poster_set(&pool, "shared").await.unwrap();
    let libraries: Vec<_> = holders.iter().map(|h| h.media_item.library_title.as_str()).collect();
    assert_eq!(libraries, vec!["4K Movies", "Movies"]);

    assert!(SubscriptionRepo::list_by_poster_set(&pool, "999").await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

async fn seed_library(pool: &SqlitePool) {
    let mut alien = movie("348", "Movies", "Alien", 1979);
    alien.released_at = 296_870_400; // 1979-05-25
    let aliens = movie("679", "Movies", "Aliens", 1986);
    let heat = movie("949", "4K Movies", "Heat", 1995);

    SubscriptionRepo::upsert_all(
        pool,
        &MediaItemWithSubs::new(
            alien,
            vec![
                sub("a1", "alpha", &[ImageType::Poster]),
                sub("a2", "", &[ImageType::Backdrop]),
            ],
        ),
    )
    .await
    .unwrap();

    let mut manual = sub("b1", "beta", &[ImageType::Poster, ImageType::Backdrop]);
    manual.auto_download = false;
    manual.last_downloaded = "2025-06-01T00:00:00Z".to_string();
    SubscriptionRepo::upsert_all(pool, &MediaItemWithSubs::new(aliens, vec![manual]))
        .await
        .unwrap();

    SubscriptionRepo::upsert_all(
        pool,
        &MediaItemWithSubs::new(heat, vec![sub("c1", "alpha", &[ImageType::Poster])]),
    )
    .await
    .unwrap();
}

fn titles(page: &aura_db::query::QueryPage) -> Vec<&str> {
    page.items.iter().map(|i| i.media_item.title.as_str()).collect()
}

#[tokio::test]
async fn query_pages_by_item_not_by_row() {
    let pool = setup().await;
    seed_library(&pool).await;

    let first = SubscriptionRepo::query(&pool, &SubscriptionFilter::default(), Pagination::new(1, 1), Sort::default())
        .await
        .unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(titles(&first), vec!["Alien"]);
    assert_eq!(first.items[0].subscriptions.len(), 2);
    assert_eq!(first.distinct_users, vec!["alpha", "beta"]);

    let third = SubscriptionRepo::query(&pool, &SubscriptionFilter::default(), Pagination::new(3, 1), Sort::default())
        .await
        .unwrap();
    assert_eq!(titles(&third), vec!["Heat"]);
}

#[tokio::test]
async fn query_filters() {
    let pool = setup().await;
    seed_library(&pool).await;
    let run = |filter: SubscriptionFilter| {
        let pool = pool.clone();
        async move {
            SubscriptionRepo::query(&pool, &filter, Pagination::new(1, 50), Sort::default())
                .await
                .unwrap()
        }
    };

    let page = run(SubscriptionFilter { multi_set_only: true, ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Alien"]);

    let page = run(SubscriptionFilter { users: vec![USER_NONE.into()], ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Alien"]);

    let page = run(SubscriptionFilter { users: vec!["beta".into()], ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Aliens"]);

    let page = run(SubscriptionFilter {
        auto_download: AutoDownloadFilter::Off,
        ..Default::default()
    })
    .await;
    assert_eq!(titles(&page), vec!["Aliens"]);

    let page = run(SubscriptionFilter { selected_types: vec!["backdrop".into()], ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Alien", "Aliens"]);

    let page = run(SubscriptionFilter { selected_types: vec![SELECTED_TYPE_NONE.into()], ..Default::default() }).await;
    assert!(page.items.is_empty());

    let page = run(SubscriptionFilter { library_contains: Some("4k".into()), ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Heat"]);

    let page = run(SubscriptionFilter { sections: vec!["Movies".into()], year: Some(1986), ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Aliens"]);

    let page = run(SubscriptionFilter { title_contains: Some("alien".into()), ..Default::default() }).await;
    assert_eq!(page.total, 2);

    let page = run(SubscriptionFilter { tmdb_id: Some("949".into()), ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["Heat"]);
}

#[tokio::test]
async fn query_contains_filters_match_wildcards_literally() {
    let pool = setup().await;
    seed_library(&pool).await;
    SubscriptionRepo::upsert_all(
        &pool,
        &MediaItemWithSubs::new(
            movie("1000", "Kids_Movies", "100% Wolf", 2020),
            vec![sub("d1", "alpha", &[ImageType::Poster])],
        ),
    )
    .await
    .unwrap();
    let run = |filter: SubscriptionFilter| {
        let pool = pool.clone();
        async move {
            SubscriptionRepo::query(&pool, &filter, Pagination::new(1, 50), Sort::default())
                .await
                .unwrap()
        }
    };

    let page = run(SubscriptionFilter { title_contains: Some("%".into()), ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["100% Wolf"]);

    let page = run(SubscriptionFilter { library_contains: Some("_".into()), ..Default::default() }).await;
    assert_eq!(titles(&page), vec!["100% Wolf"]);

    let page = run(SubscriptionFilter { title_contains: Some("a_i".into()), ..Default::default() }).await;
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn query_sorts() {
    let pool = setup().await;
    seed_library(&pool).await;
    let sorted = |field, order| {
        let pool = pool.clone();
        async move {
            SubscriptionRepo::query(&pool, &SubscriptionFilter::default(), Pagination::new(1, 50), Sort::new(field, order))
                .await
                .unwrap()
        }
    };

    let page = sorted(SortField::Year, SortOrder::Desc).await;
    assert_eq!(titles(&page), vec!["Heat", "Aliens", "Alien"]);

    let page = sorted(SortField::Library, SortOrder::Asc).await;
    assert_eq!(titles(&page), vec!["Heat", "Alien", "Aliens"]);

    let page = sorted(SortField::LastDownloaded, SortOrder::Desc).await;
    assert_eq!(titles(&page)[0], "Aliens");
}
