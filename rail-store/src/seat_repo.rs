use async_trait::async_trait;
use rail_core::repository::{SeatRepository, TrainRepository, TrainStationRepository};
use rail_core::{CoreError, CoreResult, Segment, SeatType, Train, TrainClass, TrainId};
use sqlx::PgPool;

/// `t_seat.seat_status` value of a seat that can still be sold.
pub const SEAT_STATUS_AVAILABLE: i32 = 0;

pub struct PostgresSeatRepository {
    pool: PgPool,
}

impl PostgresSeatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TrainRow {
    id: i64,
    train_number: String,
    train_type: i32,
    start_station: String,
    end_station: String,
}

fn store_error(err: sqlx::Error) -> CoreError {
    CoreError::StoreError(err.to_string())
}

#[async_trait]
impl TrainRepository for PostgresSeatRepository {
    async fn find_train(&self, train_id: TrainId) -> CoreResult<Option<Train>> {
        let row = sqlx::query_as::<_, TrainRow>(
            "SELECT id, train_number, train_type, start_station, end_station FROM t_train WHERE id = $1",
        )
        .bind(train_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            Some(row) => Ok(Some(Train {
                id: TrainId(row.id),
                train_number: row.train_number,
                train_class: TrainClass::from_code(row.train_type)?,
                start_station: row.start_station,
                end_station: row.end_station,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SeatRepository for PostgresSeatRepository {
    async fn count_available_seats(
        &self,
        train_id: TrainId,
        seat_type: SeatType,
        segment: &Segment,
    ) -> CoreResult<u64> {
        let seat_code = i32::try_from(seat_type.0).map_err(|_| {
            CoreError::ValidationError(format!("Seat type out of range: {}", seat_type))
        })?;

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM t_seat
            WHERE train_id = $1
              AND seat_type = $2
              AND seat_status = $3
              AND start_station = $4
              AND end_station = $5
            "#,
        )
        .bind(train_id.0)
        .bind(seat_code)
        .bind(SEAT_STATUS_AVAILABLE)
        .bind(&segment.start_station)
        .bind(&segment.end_station)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl TrainStationRepository for PostgresSeatRepository {
    async fn list_stations(&self, train_id: TrainId) -> CoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT departure FROM t_train_station WHERE train_id = $1 ORDER BY sequence",
        )
        .bind(train_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)
    }
}
