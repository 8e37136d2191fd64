use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_MENU_ITEMS: &[&str] = &[
    "Margherita Pizza",
    "Chicken Alfredo",
    "Veggie Burger",
    "Caesar Salad",
    "Chocolate Lava Cake",
    "Iced Tea",
    "Espresso",
];

const SEED_OFFERS: &[&str] = &["Lunch Combo", "Happy Hour Drinks", "Family Meal Deal"];

const SEED_TABLES: &[(&str, i64)] =
    &[("Table 1", 2), ("Table 2", 4), ("Table 3", 6), ("Table 4", 2), ("Table 5", 4)];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub menu_items: i64,
    pub offers: i64,
    pub tables: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

/// Reference catalog for the restaurant: menu, offers, venue info and tables.
pub struct CatalogSeed;

impl CatalogSeed {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/catalog_seed.sql");

    /// Loads the catalog. Rows that already exist are left as they are.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            menu_items: count(pool, "menu_items").await?,
            offers: count(pool, "offers").await?,
            tables: count(pool, "restaurant_tables").await?,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for name in SEED_MENU_ITEMS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM menu_items WHERE name = ?1)")
                    .bind(*name)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("menu:{name}"), exists == 1));
        }

        for name in SEED_OFFERS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM offers WHERE name = ?1)")
                    .bind(*name)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("offer:{name}"), exists == 1));
        }

        for &(table_number, capacity) in SEED_TABLES {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM restaurant_tables WHERE table_number = ?1 AND capacity = ?2)",
            )
            .bind(table_number)
            .bind(capacity)
            .fetch_one(pool)
            .await?;
            checks.push((format!("table:{table_number}"), exists == 1));
        }

        let info_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM restaurant_info WHERE id = 1)")
                .fetch_one(pool)
                .await?;
        checks.push(("restaurant-info".to_string(), info_exists == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
    let total: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(pool).await?;
    Ok(total)
}
