//! Library-cache warming.
//!
//! Resolves every configured library on the media server and loads its items
//! page by page into the [`LibraryCache`]. Failures are logged per library.

use aura_core::config::LibraryConfig;
use aura_core::library_cache::{LibraryCache, LibrarySection};
use aura_mediaserver::{MediaServer, MediaServerError};

/// Items requested per page.
pub const PAGE_SIZE: usize = 500;

/// Warm every library; returns how many loaded without error.
pub async fn warm_libraries(
    server: &dyn MediaServer,
    cache: &LibraryCache,
    libraries: &[LibraryConfig],
) -> usize {
    let mut warmed = 0;
    for library in libraries {
        match warm_library(server, cache, library).await {
            Ok(Some(count)) => {
                tracing::info!(library = %library.name, items = count, "Library cached");
                warmed += 1;
            }
            Ok(None) => {
                tracing::warn!(library = %library.name, "Library not found on media server");
            }
            Err(e) => {
                tracing::error!(library = %library.name, error = %e, "Failed to cache library");
            }
        }
    }
    warmed
}

/// Load one library. `None` when the server has no such section.
pub async fn warm_library(
    server: &dyn MediaServer,
    cache: &LibraryCache,
    library: &LibraryConfig,
) -> Result<Option<usize>, MediaServerError> {
    let mut resolved = library.clone();
    if !server.fetch_section_info(&mut resolved).await? {
        return Ok(None);
    }
    let section = LibrarySection {
        id: resolved.section_id,
        title: resolved.name,
        section_type: resolved.section_type,
        path: resolved.path,
        media_items: Vec::new(),
        total_size: 0,
    };

    // Paging walks the server's listing entries. A page can yield more items
    // than entries (expanded collections) or none at all (filtered entries),
    // so the offset only ever moves by whole pages.
    let mut offset = 0;
    loop {
        let (items, total) = server.fetch_section_items(&section, offset, PAGE_SIZE).await?;
        tracing::debug!(
            library = %section.title,
            offset,
            total,
            items = items.len(),
            "Fetched library page"
        );
        cache
            .upsert_section(LibrarySection {
                media_items: items,
                ..section.clone()
            })
            .await;
        offset += PAGE_SIZE;
        if offset >= total {
            break;
        }
    }

    Ok(Some(
        cache
            .get_by_title(&section.title)
            .await
            .map(|s| s.total_size)
            .unwrap_or(0),
    ))
}
