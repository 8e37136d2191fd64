use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use bistro_core::domain::customer::{ContactField, Customer, CustomerId, CustomerUpdate};

use super::{decode_err, now_rfc3339, unique_violation, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str) -> Result<CustomerId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_customer(&mut *conn, name, None, None).await
    }

    pub async fn ensure(
        &self,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<CustomerId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if phone.is_some() || email.is_some() {
            let matched: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM customers
                 WHERE name = ?1
                   AND ((?2 IS NOT NULL AND phone = ?2) OR (?3 IS NOT NULL AND email = ?3))
                 ORDER BY id DESC LIMIT 1",
            )
            .bind(name)
            .bind(phone)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(id) = matched {
                tx.commit().await?;
                return Ok(CustomerId(id));
            }
        }

        // Most recent same-name row whose stored contacts do not contradict the request.
        let fallback: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM customers
             WHERE name = ?1
               AND (phone IS NULL OR ?2 IS NULL OR phone = ?2)
               AND (email IS NULL OR ?3 IS NULL OR email = ?3)
             ORDER BY id DESC LIMIT 1",
        )
        .bind(name)
        .bind(phone)
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match fallback {
            Some(id) => {
                if phone.is_some() || email.is_some() {
                    sqlx::query(
                        "UPDATE customers
                         SET phone = COALESCE(phone, ?2), email = COALESCE(email, ?3), updated_at = ?4
                         WHERE id = ?1",
                    )
                    .bind(id)
                    .bind(phone)
                    .bind(email)
                    .bind(now_rfc3339())
                    .execute(&mut *tx)
                    .await
                    .map_err(map_contact_violation)?;
                }
                CustomerId(id)
            }
            None => insert_customer(&mut *tx, name, phone, email).await?,
        };

        tx.commit().await?;
        Ok(id)
    }

    pub async fn find(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, phone, email FROM customers WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    pub async fn update(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, RepositoryError> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(RepositoryError::Invalid("customer name cannot be empty".to_string()));
            }
        }

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT id, name, phone, email FROM customers WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(RepositoryError::NotFound { entity: "customer", id: id.0 });
        };

        let mut customer = row_to_customer(&row)?;
        if update.is_empty() {
            tx.commit().await?;
            return Ok(customer);
        }
        update.apply_to(&mut customer);

        sqlx::query(
            "UPDATE customers SET name = ?2, phone = ?3, email = ?4, updated_at = ?5 WHERE id = ?1",
        )
        .bind(id.0)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(map_contact_violation)?;

        tx.commit().await?;
        Ok(customer)
    }
}

async fn insert_customer(
    conn: &mut SqliteConnection,
    name: &str,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<CustomerId, RepositoryError> {
    let now = now_rfc3339();
    let result = sqlx::query(
        "INSERT INTO customers (name, phone, email, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
    )
    .bind(name)
    .bind(phone)
    .bind(email)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .map_err(map_contact_violation)?;

    Ok(CustomerId(result.last_insert_rowid()))
}

fn map_contact_violation(error: sqlx::Error) -> RepositoryError {
    match unique_violation(&error) {
        Some(message) if message.contains("customers.email") => {
            RepositoryError::DuplicateContact(ContactField::Email)
        }
        Some(message) if message.contains("customers.phone") => {
            RepositoryError::DuplicateContact(ContactField::Phone)
        }
        _ => RepositoryError::Database(error),
    }
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(row.try_get("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        phone: row.try_get("phone").map_err(decode_err)?,
        email: row.try_get("email").map_err(decode_err)?,
    })
}
