use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{AccountId, DomainError, DomainResult, Money, ProductId};

const MAX_NAME_LEN: usize = 200;

/// A catalog product and its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub owner_id: AccountId,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub price: Money,
    /// Units on hand; never negative in a committed state.
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Money,
    pub stock_quantity: i64,
}

impl NewProduct {
    /// Validate and turn into a product owned by `owner_id`.
    pub fn into_product(
        self,
        id: ProductId,
        owner_id: AccountId,
        now: DateTime<Utc>,
    ) -> DomainResult<Product> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if self.stock_quantity < 0 {
            return Err(DomainError::validation("stock_quantity must not be negative"));
        }

        // An empty image reference means "no image".
        let image = self.image.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(Product {
            id,
            owner_id,
            name,
            description: self.description.trim().to_string(),
            image,
            price: self.price,
            stock_quantity: self.stock_quantity,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewProduct {
        NewProduct {
            name: "  Mechanical keyboard ".to_string(),
            description: "tenkeyless".to_string(),
            image: Some("".to_string()),
            price: "89.90".parse().unwrap(),
            stock_quantity: 12,
        }
    }

    #[test]
    fn creates_trimmed_product() {
        let owner = AccountId::new();
        let p = draft().into_product(ProductId::new(), owner, Utc::now()).unwrap();
        assert_eq!(p.name, "Mechanical keyboard");
        assert_eq!(p.owner_id, owner);
        assert_eq!(p.image, None);
        assert!(p.is_in_stock());
    }

    #[test]
    fn rejects_blank_name() {
        let mut d = draft();
        d.name = "   ".to_string();
        let err = d.into_product(ProductId::new(), AccountId::new(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("name is required"));
    }

    #[test]
    fn rejects_negative_stock() {
        let mut d = draft();
        d.stock_quantity = -1;
        assert!(d.into_product(ProductId::new(), AccountId::new(), Utc::now()).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any non-negative stock with a non-blank name is accepted verbatim.
            #[test]
            fn accepts_non_negative_stock(stock in 0i64..1_000_000, name in "[a-z]{1,40}") {
                let d = NewProduct {
                    name: name.clone(),
                    description: String::new(),
                    image: None,
                    price: Money::ZERO,
                    stock_quantity: stock,
                };
                let p = d.into_product(ProductId::new(), AccountId::new(), Utc::now()).unwrap();
                prop_assert_eq!(p.stock_quantity, stock);
                prop_assert_eq!(p.name, name);
            }
        }
    }
}
