use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuItemId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub ingredients: String,
    pub nutrition_info: String,
    pub preparation_notes: String,
    pub dietary_tags: Vec<DietaryTag>,
}

impl MenuItem {
    pub fn contains_ingredient(&self, ingredient: &str) -> bool {
        self.ingredients.to_lowercase().contains(&ingredient.trim().to_lowercase())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryTag {
    Vegetarian,
    Vegan,
    GlutenFree,
}

impl DietaryTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vegetarian => "vegetarian",
            Self::Vegan => "vegan",
            Self::GlutenFree => "gluten_free",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vegetarian" => Some(Self::Vegetarian),
            "vegan" => Some(Self::Vegan),
            "gluten_free" => Some(Self::GlutenFree),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Vegetarian => "vegetarian",
            Self::Vegan => "vegan",
            Self::GlutenFree => "gluten-free",
        }
    }
}

/// Criteria for narrowing the menu. Empty criteria match every item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MenuFilter {
    pub dietary: Option<DietaryTag>,
    pub max_price: Option<Decimal>,
    pub exclude_ingredients: Vec<String>,
}

impl MenuFilter {
    pub fn is_empty(&self) -> bool {
        self.dietary.is_none() && self.max_price.is_none() && self.exclude_ingredients.is_empty()
    }

    pub fn matches(&self, item: &MenuItem) -> bool {
        if let Some(tag) = self.dietary {
            if !item.dietary_tags.contains(&tag) {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if item.price > max_price {
                return false;
            }
        }
        !self.exclude_ingredients.iter().any(|ingredient| item.contains_ingredient(ingredient))
    }
}
