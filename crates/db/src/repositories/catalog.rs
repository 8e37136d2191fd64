use chrono::NaiveTime;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use bistro_core::booking::CatalogReader;
use bistro_core::domain::menu::{DietaryTag, MenuItem, MenuItemId};
use bistro_core::domain::venue::{Offer, RestaurantInfo};
use bistro_core::errors::BookingError;

use super::{decode_err, parse_decimal, RepositoryError};
use crate::DbPool;

const MENU_COLUMNS: &str = "id, name, description, category, price, ingredients, nutrition_info, \
                            preparation_notes, dietary_tags";

pub struct SqlCatalog {
    pool: DbPool,
}

impl SqlCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_menu(&self) -> Result<Vec<MenuItem>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {MENU_COLUMNS} FROM menu_items ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_menu_item).collect()
    }

    async fn load_menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {MENU_COLUMNS} FROM menu_items WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_menu_item).transpose()
    }

    async fn load_offers(&self) -> Result<Vec<Offer>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT name, description, discount, valid_from, valid_to, is_happy_hour
             FROM offers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_offer).collect()
    }

    async fn load_restaurant_info(&self) -> Result<Option<RestaurantInfo>, RepositoryError> {
        let row = sqlx::query(
            "SELECT name, address, phone, opening_hours FROM restaurant_info ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<RestaurantInfo, RepositoryError> {
            Ok(RestaurantInfo {
                name: row.try_get("name").map_err(decode_err)?,
                address: row.try_get("address").map_err(decode_err)?,
                phone: row.try_get("phone").map_err(decode_err)?,
                opening_hours: row.try_get("opening_hours").map_err(decode_err)?,
            })
        })
        .transpose()
    }
}

#[async_trait::async_trait]
impl CatalogReader for SqlCatalog {
    async fn menu_items(&self) -> Result<Vec<MenuItem>, BookingError> {
        Ok(self.load_menu().await?)
    }

    async fn menu_item(&self, id: MenuItemId) -> Result<Option<MenuItem>, BookingError> {
        Ok(self.load_menu_item(id).await?)
    }

    async fn offers(&self) -> Result<Vec<Offer>, BookingError> {
        Ok(self.load_offers().await?)
    }

    async fn restaurant_info(&self) -> Result<Option<RestaurantInfo>, BookingError> {
        Ok(self.load_restaurant_info().await?)
    }
}

fn row_to_menu_item(row: &SqliteRow) -> Result<MenuItem, RepositoryError> {
    let price_str: String = row.try_get("price").map_err(decode_err)?;
    let tags_str: String = row.try_get("dietary_tags").map_err(decode_err)?;

    Ok(MenuItem {
        id: MenuItemId(row.try_get("id").map_err(decode_err)?),
        name: row.try_get("name").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        category: row.try_get("category").map_err(decode_err)?,
        price: parse_decimal("price", &price_str)?,
        ingredients: row.try_get("ingredients").map_err(decode_err)?,
        nutrition_info: row.try_get("nutrition_info").map_err(decode_err)?,
        preparation_notes: row.try_get("preparation_notes").map_err(decode_err)?,
        dietary_tags: tags_str.split(',').filter_map(DietaryTag::parse).collect(),
    })
}

fn row_to_offer(row: &SqliteRow) -> Result<Offer, RepositoryError> {
    let discount_str: String = row.try_get("discount").map_err(decode_err)?;
    let from_str: String = row.try_get("valid_from").map_err(decode_err)?;
    let to_str: String = row.try_get("valid_to").map_err(decode_err)?;
    let is_happy_hour: i64 = row.try_get("is_happy_hour").map_err(decode_err)?;

    Ok(Offer {
        name: row.try_get("name").map_err(decode_err)?,
        description: row.try_get("description").map_err(decode_err)?,
        discount: parse_decimal("discount", &discount_str)?,
        valid_from: NaiveTime::parse_from_str(&from_str, "%H:%M").map_err(decode_err)?,
        valid_to: NaiveTime::parse_from_str(&to_str, "%H:%M").map_err(decode_err)?,
        is_happy_hour: is_happy_hour != 0,
    })
}
