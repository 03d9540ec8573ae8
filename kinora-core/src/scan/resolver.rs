//! Get-or-create for related entities and wholesale link replacement.
//!
//! Everything here runs inside the current file's savepoint.

use tracing::trace;
use uuid::Uuid;

use super::entity_cache::StagedEntities;
use crate::database::CatalogTx;
use crate::error::Result;
use crate::metadata::{NormalizedMovie, NormalizedTrack};
use crate::types::{EntitySeed, Link, LinkTable, RelatedEntity};

/// Cached entity if one is visible, otherwise an upsert keyed by the seed's
/// external key. The store's unique index is what collapses races.
pub async fn get_or_create(
    tx: &mut dyn CatalogTx,
    staged: &mut StagedEntities<'_>,
    seed: &EntitySeed,
) -> Result<RelatedEntity> {
    let key = seed.external_key();
    if let Some(entity) = staged.lookup(seed.kind, &key) {
        return Ok(entity);
    }
    let entity = tx.upsert_related(seed).await?;
    trace!(kind = %seed.kind, key = %key, id = %entity.id, "resolved related entity");
    staged.stage(entity.clone());
    Ok(entity)
}

/// Delete every link of `parent` in `table`, then insert `links`.
pub async fn replace_links(
    tx: &mut dyn CatalogTx,
    table: LinkTable,
    parent: Uuid,
    links: &[Link],
) -> Result<()> {
    tx.delete_links(table, parent).await?;
    for link in links {
        tx.insert_link(table, parent, link).await?;
    }
    Ok(())
}

async fn resolve_links(
    tx: &mut dyn CatalogTx,
    staged: &mut StagedEntities<'_>,
    seeds: &[(&EntitySeed, &str)],
) -> Result<Vec<Link>> {
    let mut links = Vec::with_capacity(seeds.len());
    for (ordinal, (seed, role)) in seeds.iter().enumerate() {
        let entity = get_or_create(tx, staged, seed).await?;
        links.push(Link::new(entity.id, ordinal as i32).with_role(*role));
    }
    Ok(links)
}

fn unroled(seeds: &[EntitySeed]) -> Vec<(&EntitySeed, &str)> {
    seeds.iter().map(|seed| (seed, "")).collect()
}

fn roled(pairs: &[(EntitySeed, String)]) -> Vec<(&EntitySeed, &str)> {
    pairs.iter().map(|(seed, role)| (seed, role.as_str())).collect()
}

/// Upsert the movie row and rebuild every link table hanging off it.
pub async fn persist_movie(
    tx: &mut dyn CatalogTx,
    staged: &mut StagedEntities<'_>,
    movie: &NormalizedMovie,
) -> Result<Uuid> {
    let movie_id = tx.upsert_movie(&movie.record).await?;
    let relations = &movie.relations;

    let genres = resolve_links(tx, staged, &unroled(&relations.genres)).await?;
    replace_links(tx, LinkTable::MovieGenre, movie_id, &genres).await?;

    let companies = resolve_links(tx, staged, &unroled(&relations.companies)).await?;
    replace_links(tx, LinkTable::MovieProductionCompany, movie_id, &companies).await?;

    let cast = resolve_links(tx, staged, &roled(&relations.cast)).await?;
    replace_links(tx, LinkTable::MovieCast, movie_id, &cast).await?;

    let crew = resolve_links(tx, staged, &roled(&relations.crew)).await?;
    replace_links(tx, LinkTable::MovieCrew, movie_id, &crew).await?;

    let extras = resolve_links(tx, staged, &roled(&relations.extras)).await?;
    replace_links(tx, LinkTable::MovieExtraVideo, movie_id, &extras).await?;

    Ok(movie_id)
}

/// Resolve the album (and its artists) first so the track row can point at
/// it, then upsert the track and rebuild its links.
pub async fn persist_track(
    tx: &mut dyn CatalogTx,
    staged: &mut StagedEntities<'_>,
    track: &NormalizedTrack,
) -> Result<Uuid> {
    let mut record = track.record.clone();

    if let Some(album_seed) = &track.album {
        let album = get_or_create(tx, staged, album_seed).await?;
        let album_artists = resolve_links(tx, staged, &unroled(&track.album_artists)).await?;
        replace_links(tx, LinkTable::AlbumMusician, album.id, &album_artists).await?;
        record.album_id = Some(album.id);
    }

    let track_id = tx.upsert_track(&record).await?;

    let artists = resolve_links(tx, staged, &unroled(&track.artists)).await?;
    replace_links(tx, LinkTable::TrackMusician, track_id, &artists).await?;

    let genres = resolve_links(tx, staged, &unroled(&track.genres)).await?;
    replace_links(tx, LinkTable::TrackGenre, track_id, &genres).await?;

    Ok(track_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CatalogStore, MemoryCatalog};
    use crate::scan::entity_cache::EntityCache;
    use crate::types::{EntityKind, TrackRecord};

    #[tokio::test]
    async fn repeated_seeds_upsert_once() {
        let store = MemoryCatalog::new();
        let cache = EntityCache::new();
        let mut staged = StagedEntities::new(&cache);
        let mut tx = store.begin().await.unwrap();

        let seed = EntitySeed::new(EntityKind::Genre, "Drama").with_external_id(18);
        let first = get_or_create(tx.as_mut(), &mut staged, &seed).await.unwrap();
        let second = get_or_create(tx.as_mut(), &mut staged, &seed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.related_upserts(), 1);
    }

    #[tokio::test]
    async fn track_links_are_replaced_not_merged() {
        let store = MemoryCatalog::new();
        let cache = EntityCache::new();
        let track = |genres: &[&str]| NormalizedTrack {
            record: TrackRecord {
                file_path: "/a/01.flac".into(),
                title: "One".into(),
                ..Default::default()
            },
            album: Some(EntitySeed::new(EntityKind::Album, "Album")),
            album_artists: vec![EntitySeed::new(EntityKind::Musician, "Band")],
            artists: vec![EntitySeed::new(EntityKind::Musician, "Band")],
            genres: genres
                .iter()
                .map(|g| EntitySeed::new(EntityKind::Genre, *g))
                .collect(),
        };

        for genres in [&["Rock", "Blues"][..], &["Jazz"][..]] {
            let mut staged = StagedEntities::new(&cache);
            let mut tx = store.begin().await.unwrap();
            persist_track(tx.as_mut(), &mut staged, &track(genres)).await.unwrap();
            tx.commit().await.unwrap();
            staged.publish();
        }

        let track_id = store.track_id("/a/01.flac").unwrap();
        let links = store.links(LinkTable::TrackGenre, track_id);
        assert_eq!(links.len(), 1);
        assert_eq!(store.entity_by_id(links[0].child_id).unwrap().name, "Jazz");

        let album_id = store.track("/a/01.flac").unwrap().album_id.unwrap();
        assert_eq!(store.links(LinkTable::AlbumMusician, album_id).len(), 1);
    }
}
