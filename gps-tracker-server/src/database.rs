use gps_tracker_types::{
    DecodedRecord,
    Imei,
};
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
#[error("database error")]
pub enum Error {
    Sqlx(#[from] sqlx::error::Error),
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = PgPool::connect(database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Doesn't connect until the first query.
    #[cfg(test)]
    pub(crate) fn connect_lazy(database_url: &str) -> Result<Self, Error> {
        Ok(Self {
            pool: PgPool::connect_lazy(database_url)?,
        })
    }

    pub async fn insert_record(&self, record: &DecodedRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            insert into gps_data (
                imei, timestamp, latitude, longitude, altitude, speed_kph, ignition_on,
                latitude_hex, longitude_hex, latitude_binary, longitude_binary, raw_data
            )
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&record.imei)
        .bind(record.timestamp)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(record.altitude)
        .bind(record.speed_kph)
        .bind(record.ignition_on)
        .bind(&record.latitude_hex)
        .bind(&record.longitude_hex)
        .bind(&record.latitude_binary)
        .bind(&record.longitude_binary)
        .bind(&record.raw_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the latest records, newest first.
    pub async fn list_records(
        &self,
        imei: Option<&Imei>,
        limit: i64,
    ) -> Result<Vec<DecodedRecord>, Error> {
        let records = sqlx::query_as::<_, DecodedRecord>(
            r#"
            select
                imei, timestamp, latitude, longitude, altitude, speed_kph, ignition_on,
                latitude_hex, longitude_hex, latitude_binary, longitude_binary, raw_data
            from gps_data
            where $1::text is null or imei = $1
            order by timestamp desc
            limit $2
            "#,
        )
        .bind(imei)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
