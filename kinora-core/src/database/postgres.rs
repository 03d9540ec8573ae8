use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use super::ports::{CatalogStore, CatalogTx, valid_savepoint_name};
use crate::error::{MediaError, Result};
use crate::types::{
    EntitySeed, Link, LinkTable, MediaKind, MovieRecord, RelatedEntity, TrackRecord,
};

/// Catalog backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl fmt::Debug for PostgresCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCatalog")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresCatalog {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(url)
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to connect to database: {e}")))?;
        info!(max_connections, "database pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR.run(&self.pool).await?;
        Ok(())
    }
}

fn size_to_db(size: u64, path: &str) -> Result<i64> {
    i64::try_from(size).map_err(|_| MediaError::InvalidMedia(format!("{path}: size {size} out of range")))
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn stored_size(&self, kind: MediaKind, file_path: &str) -> Result<Option<u64>> {
        let sql = format!("SELECT size FROM {} WHERE file_path = $1", kind.table());
        let size: Option<i64> = sqlx::query_scalar(&sql)
            .bind(file_path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(size.and_then(|s| u64::try_from(s).ok()))
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to start batch transaction: {e}")))?;
        Ok(Box::new(PgCatalogTx { tx }))
    }
}

struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgCatalogTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgCatalogTx").finish_non_exhaustive()
    }
}

impl PgCatalogTx {
    async fn savepoint_command(&mut self, command: &str, name: &str) -> Result<()> {
        if !valid_savepoint_name(name) {
            return Err(MediaError::Internal(format!("invalid savepoint name {name:?}")));
        }
        let sql = format!("{command} {name}");
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogTx for PgCatalogTx {
    async fn savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoint_command("SAVEPOINT", name).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoint_command("ROLLBACK TO SAVEPOINT", name).await
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoint_command("RELEASE SAVEPOINT", name).await
    }

    async fn upsert_movie(&mut self, movie: &MovieRecord) -> Result<Uuid> {
        let size = size_to_db(movie.size, &movie.file_path)?;
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO movies (
                id, file_path, file_name, size, container, duration_seconds, bit_rate,
                video_streams, audio_streams, subtitle_streams, chapters,
                title, original_title, year, overview, tagline, release_date,
                runtime_minutes, rating, vote_count, popularity, poster_url,
                backdrop_url, tmdb_id
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ON CONFLICT (file_path) DO UPDATE SET
                file_name = EXCLUDED.file_name,
                size = EXCLUDED.size,
                container = EXCLUDED.container,
                duration_seconds = EXCLUDED.duration_seconds,
                bit_rate = EXCLUDED.bit_rate,
                video_streams = EXCLUDED.video_streams,
                audio_streams = EXCLUDED.audio_streams,
                subtitle_streams = EXCLUDED.subtitle_streams,
                chapters = EXCLUDED.chapters,
                title = EXCLUDED.title,
                original_title = EXCLUDED.original_title,
                year = EXCLUDED.year,
                overview = EXCLUDED.overview,
                tagline = EXCLUDED.tagline,
                release_date = EXCLUDED.release_date,
                runtime_minutes = EXCLUDED.runtime_minutes,
                rating = EXCLUDED.rating,
                vote_count = EXCLUDED.vote_count,
                popularity = EXCLUDED.popularity,
                poster_url = EXCLUDED.poster_url,
                backdrop_url = EXCLUDED.backdrop_url,
                tmdb_id = EXCLUDED.tmdb_id,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&movie.file_path)
        .bind(&movie.file_name)
        .bind(size)
        .bind(&movie.container)
        .bind(movie.duration_seconds)
        .bind(movie.bit_rate)
        .bind(Json(&movie.video_streams))
        .bind(Json(&movie.audio_streams))
        .bind(Json(&movie.subtitle_streams))
        .bind(Json(&movie.chapters))
        .bind(&movie.title)
        .bind(&movie.original_title)
        .bind(movie.year)
        .bind(&movie.overview)
        .bind(&movie.tagline)
        .bind(movie.release_date)
        .bind(movie.runtime_minutes)
        .bind(movie.rating)
        .bind(movie.vote_count)
        .bind(movie.popularity)
        .bind(&movie.poster_url)
        .bind(&movie.backdrop_url)
        .bind(movie.tmdb_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn upsert_track(&mut self, track: &TrackRecord) -> Result<Uuid> {
        let size = size_to_db(track.size, &track.file_path)?;
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tracks (
                id, file_path, file_name, size, container, codec, profile, bit_rate,
                sample_rate, channels, channel_layout, duration_seconds, title,
                album_id, track_number, track_total, disc_number, disc_total, year
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            ON CONFLICT (file_path) DO UPDATE SET
                file_name = EXCLUDED.file_name,
                size = EXCLUDED.size,
                container = EXCLUDED.container,
                codec = EXCLUDED.codec,
                profile = EXCLUDED.profile,
                bit_rate = EXCLUDED.bit_rate,
                sample_rate = EXCLUDED.sample_rate,
                channels = EXCLUDED.channels,
                channel_layout = EXCLUDED.channel_layout,
                duration_seconds = EXCLUDED.duration_seconds,
                title = EXCLUDED.title,
                album_id = EXCLUDED.album_id,
                track_number = EXCLUDED.track_number,
                track_total = EXCLUDED.track_total,
                disc_number = EXCLUDED.disc_number,
                disc_total = EXCLUDED.disc_total,
                year = EXCLUDED.year,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&track.file_path)
        .bind(&track.file_name)
        .bind(size)
        .bind(&track.container)
        .bind(&track.codec)
        .bind(&track.profile)
        .bind(track.bit_rate)
        .bind(track.sample_rate)
        .bind(track.channels)
        .bind(&track.channel_layout)
        .bind(track.duration_seconds)
        .bind(&track.title)
        .bind(track.album_id)
        .bind(track.track_number)
        .bind(track.track_total)
        .bind(track.disc_number)
        .bind(track.disc_total)
        .bind(track.year)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn upsert_related(&mut self, seed: &EntitySeed) -> Result<RelatedEntity> {
        let table = seed.kind.table();
        let external_key = seed.external_key();
        let image_url = seed.image.as_ref().map(|img| img.to_url());
        let sql = format!(
            r#"
            INSERT INTO {table} (id, external_key, external_id, name, image_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_key) DO UPDATE SET
                name = EXCLUDED.name,
                image_url = COALESCE(EXCLUDED.image_url, {table}.image_url),
                updated_at = NOW()
            RETURNING id, name, image_url
            "#
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&external_key)
            .bind(&seed.external_id)
            .bind(&seed.name)
            .bind(&image_url)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(RelatedEntity {
            id: row.try_get("id")?,
            kind: seed.kind,
            external_key,
            name: row.try_get("name")?,
            image_url: row.try_get("image_url")?,
        })
    }

    async fn delete_links(&mut self, table: LinkTable, parent: Uuid) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            table.table(),
            table.parent_column()
        );
        sqlx::query(&sql).bind(parent).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_link(&mut self, table: LinkTable, parent: Uuid, link: &Link) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}, {}, role, ordinal) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
            table.table(),
            table.parent_column(),
            table.child_column()
        );
        sqlx::query(&sql)
            .bind(parent)
            .bind(link.child_id)
            .bind(&link.role)
            .bind(link.ordinal)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgCatalogTx { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to commit batch transaction: {e}")))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgCatalogTx { tx } = *self;
        tx.rollback()
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to roll back batch transaction: {e}")))
    }
}
