use chrono::{NaiveDate, NaiveTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use bistro_core::domain::customer::CustomerId;
use bistro_core::domain::reservation::{
    slot_key, NewReservation, Reservation, ReservationId, ReservationStatus, ReservationTable,
    TableId,
};

use super::{
    decode_err, is_foreign_key_violation, now_rfc3339, to_u32, unique_violation, RepositoryError,
};
use crate::DbPool;

pub struct SqlReservationRepository {
    pool: DbPool,
}

impl SqlReservationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn available_tables(
        &self,
        party_size: u32,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<ReservationTable>, RepositoryError> {
        let (date_key, time_key) = slot_key(date, time);
        let rows = sqlx::query(
            "SELECT t.id, t.table_number, t.capacity
             FROM restaurant_tables t
             WHERE t.capacity >= ?1
               AND NOT EXISTS (
                   SELECT 1 FROM reservations r
                   WHERE r.table_id = t.id
                     AND r.reservation_date = ?2
                     AND r.reservation_time = ?3
                     AND r.status <> 'cancelled'
               )
             ORDER BY t.capacity ASC, t.id ASC",
        )
        .bind(i64::from(party_size))
        .bind(&date_key)
        .bind(&time_key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_table).collect()
    }

    /// Books the slot with a single conditional insert so the free-slot check
    /// and the write happen under the same write lock. The partial unique
    /// index on live reservations backs this up.
    pub async fn create(&self, request: &NewReservation) -> Result<ReservationId, RepositoryError> {
        if request.party_size == 0 {
            return Err(RepositoryError::Invalid("party size must be at least 1".to_string()));
        }

        let (date_key, time_key) = slot_key(request.date, request.time);
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO reservations
                 (customer_id, table_id, reservation_date, reservation_time, party_size, status,
                  created_at, updated_at)
             SELECT ?1, t.id, ?3, ?4, ?5, 'confirmed', ?6, ?6
             FROM restaurant_tables t
             WHERE t.id = ?2
               AND t.capacity >= ?5
               AND NOT EXISTS (
                   SELECT 1 FROM reservations r
                   WHERE r.table_id = t.id
                     AND r.reservation_date = ?3
                     AND r.reservation_time = ?4
                     AND r.status <> 'cancelled'
               )",
        )
        .bind(request.customer_id.0)
        .bind(request.table_id.0)
        .bind(&date_key)
        .bind(&time_key)
        .bind(i64::from(request.party_size))
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await;

        let slot_taken = || RepositoryError::SlotTaken {
            table_id: request.table_id.0,
            date: date_key.clone(),
            time: time_key.clone(),
        };

        let inserted = match inserted {
            Ok(result) => result,
            Err(error) if unique_violation(&error).is_some() => return Err(slot_taken()),
            Err(error) if is_foreign_key_violation(&error) => {
                return Err(RepositoryError::NotFound {
                    entity: "customer",
                    id: request.customer_id.0,
                })
            }
            Err(error) => return Err(error.into()),
        };

        if inserted.rows_affected() == 0 {
            let capacity: Option<i64> =
                sqlx::query_scalar("SELECT capacity FROM restaurant_tables WHERE id = ?1")
                    .bind(request.table_id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match capacity {
                None => RepositoryError::NotFound { entity: "table", id: request.table_id.0 },
                Some(capacity) if capacity < i64::from(request.party_size) => {
                    RepositoryError::Invalid(format!(
                        "table {} seats {capacity}, party of {} does not fit",
                        request.table_id.0, request.party_size
                    ))
                }
                Some(_) => slot_taken(),
            });
        }

        tx.commit().await?;
        Ok(ReservationId(inserted.last_insert_rowid()))
    }

    pub async fn find(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_reservation(&mut *conn, id).await
    }

    pub async fn cancel(&self, id: ReservationId) -> Result<Reservation, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut reservation) = load_reservation(&mut *tx, id).await? else {
            return Err(RepositoryError::NotFound { entity: "reservation", id: id.0 });
        };

        if reservation.status != ReservationStatus::Cancelled {
            sqlx::query(
                "UPDATE reservations SET status = 'cancelled', updated_at = ?2 WHERE id = ?1",
            )
            .bind(id.0)
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await?;
            reservation.status = ReservationStatus::Cancelled;
        }

        tx.commit().await?;
        Ok(reservation)
    }
}

async fn load_reservation(
    conn: &mut SqliteConnection,
    id: ReservationId,
) -> Result<Option<Reservation>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, customer_id, table_id, reservation_date, reservation_time, party_size, status
         FROM reservations WHERE id = ?1",
    )
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_reservation).transpose()
}

fn row_to_table(row: &SqliteRow) -> Result<ReservationTable, RepositoryError> {
    let capacity: i64 = row.try_get("capacity").map_err(decode_err)?;
    Ok(ReservationTable {
        id: TableId(row.try_get("id").map_err(decode_err)?),
        table_number: row.try_get("table_number").map_err(decode_err)?,
        capacity: to_u32("capacity", capacity)?,
    })
}

fn row_to_reservation(row: &SqliteRow) -> Result<Reservation, RepositoryError> {
    let date_str: String = row.try_get("reservation_date").map_err(decode_err)?;
    let time_str: String = row.try_get("reservation_time").map_err(decode_err)?;
    let status_str: String = row.try_get("status").map_err(decode_err)?;
    let party_size: i64 = row.try_get("party_size").map_err(decode_err)?;

    Ok(Reservation {
        id: ReservationId(row.try_get("id").map_err(decode_err)?),
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_err)?),
        table_id: TableId(row.try_get("table_id").map_err(decode_err)?),
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(decode_err)?,
        time: NaiveTime::parse_from_str(&time_str, "%H:%M").map_err(decode_err)?,
        party_size: to_u32("party_size", party_size)?,
        status: ReservationStatus::parse(&status_str).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown reservation status `{status_str}`"))
        })?,
    })
}
