#![cfg(feature = "pg-tests")]

use anyhow::Result;
use sqlx::PgPool;

use kinora_core::database::{CatalogStore, PostgresCatalog};
use kinora_core::types::{
    EntityKind, EntitySeed, ImageSource, Link, LinkTable, MediaKind, MovieRecord, TrackRecord,
    VideoStream,
};

fn movie(path: &str, size: u64) -> MovieRecord {
    MovieRecord {
        file_path: path.to_string(),
        file_name: "Heat.mkv".into(),
        size,
        title: "Heat".into(),
        video_streams: vec![VideoStream {
            codec: Some("h264".into()),
            width: Some(1920),
            height: Some(1080),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[sqlx::test(migrator = "kinora_core::MIGRATOR")]
async fn upsert_keeps_the_row_id_and_tracks_size(pool: PgPool) -> Result<()> {
    let catalog = PostgresCatalog::from_pool(pool);

    let mut tx = catalog.begin().await?;
    let first = tx.upsert_movie(&movie("/m/Heat.mkv", 100)).await?;
    tx.commit().await?;
    assert_eq!(catalog.stored_size(MediaKind::Movies, "/m/Heat.mkv").await?, Some(100));

    let mut tx = catalog.begin().await?;
    let second = tx.upsert_movie(&movie("/m/Heat.mkv", 250)).await?;
    tx.commit().await?;

    assert_eq!(first, second);
    assert_eq!(catalog.stored_size(MediaKind::Movies, "/m/Heat.mkv").await?, Some(250));
    assert_eq!(catalog.stored_size(MediaKind::Music, "/m/Heat.mkv").await?, None);
    Ok(())
}

#[sqlx::test(migrator = "kinora_core::MIGRATOR")]
async fn rollback_to_savepoint_discards_only_that_file(pool: PgPool) -> Result<()> {
    let catalog = PostgresCatalog::from_pool(pool.clone());

    let mut tx = catalog.begin().await?;
    tx.savepoint("file_0").await?;
    tx.upsert_movie(&movie("/m/a.mkv", 1)).await?;
    tx.release_savepoint("file_0").await?;

    tx.savepoint("file_1").await?;
    tx.upsert_movie(&movie("/m/b.mkv", 1)).await?;
    tx.rollback_to_savepoint("file_1").await?;
    tx.commit().await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies").fetch_one(&pool).await?;
    assert_eq!(count, 1);
    assert_eq!(catalog.stored_size(MediaKind::Movies, "/m/b.mkv").await?, None);
    Ok(())
}

#[sqlx::test(migrator = "kinora_core::MIGRATOR")]
async fn related_entities_are_unique_by_external_key(pool: PgPool) -> Result<()> {
    let catalog = PostgresCatalog::from_pool(pool);
    let seed = EntitySeed::new(EntityKind::Genre, "Crime")
        .with_external_id("tmdb:genre:80")
        .with_image(ImageSource::absolute(Some("https://img.example/crime.png")));

    let mut tx = catalog.begin().await?;
    let first = tx.upsert_related(&seed).await?;
    let renamed = EntitySeed::new(EntityKind::Genre, "Crime Drama").with_external_id("tmdb:genre:80");
    let second = tx.upsert_related(&renamed).await?;
    tx.commit().await?;

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Crime Drama");
    assert_eq!(second.image_url.as_deref(), Some("https://img.example/crime.png"));
    Ok(())
}

#[sqlx::test(migrator = "kinora_core::MIGRATOR")]
async fn links_are_replaced_per_parent(pool: PgPool) -> Result<()> {
    let catalog = PostgresCatalog::from_pool(pool.clone());

    let mut tx = catalog.begin().await?;
    let album = tx
        .upsert_related(&EntitySeed::new(EntityKind::Album, "Record").with_scope(Some("Band")))
        .await?;
    let band = tx.upsert_related(&EntitySeed::new(EntityKind::Musician, "Band")).await?;
    let guest = tx.upsert_related(&EntitySeed::new(EntityKind::Musician, "Guest")).await?;
    let track_id = tx
        .upsert_track(&TrackRecord {
            file_path: "/music/01.flac".into(),
            title: "One".into(),
            album_id: Some(album.id),
            ..Default::default()
        })
        .await?;

    tx.insert_link(LinkTable::TrackMusician, track_id, &Link::new(band.id, 0)).await?;
    tx.insert_link(LinkTable::TrackMusician, track_id, &Link::new(band.id, 0)).await?;
    tx.insert_link(LinkTable::TrackMusician, track_id, &Link::new(guest.id, 1)).await?;
    tx.delete_links(LinkTable::TrackMusician, track_id).await?;
    tx.insert_link(LinkTable::TrackMusician, track_id, &Link::new(guest.id, 0)).await?;
    tx.commit().await?;

    let rows: Vec<(uuid::Uuid, i32)> =
        sqlx::query_as("SELECT musician_id, ordinal FROM track_musicians WHERE track_id = $1")
            .bind(track_id)
            .fetch_all(&pool)
            .await?;
    assert_eq!(rows, vec![(guest.id, 0)]);
    Ok(())
}
