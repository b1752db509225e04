use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult, OrderId, OwnedResource, PrincipalId};

pub const MAX_ITEM_LEN: usize = 255;

/// Largest price with at most ten digits, in minor currency units.
pub const MAX_PRICE: u64 = 9_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub item: String,
    /// Price in smallest currency unit (e.g. cents).
    pub price: u64,
    pub created_at: DateTime<Utc>,
    /// `None` once the owning principal has been removed.
    pub owner: Option<PrincipalId>,
}

/// Validated input for a new order. The owner is not part of it: the access
/// layer always sets it to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    item: String,
    price: u64,
}

impl NewOrder {
    pub fn new(item: &str, price: u64) -> DomainResult<Self> {
        Ok(Self {
            item: validate_item(item)?,
            price: validate_price(price)?,
        })
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn price(&self) -> u64 {
        self.price
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub item: Option<String>,
    pub price: Option<u64>,
}

impl OrderPatch {
    /// A patch that replaces every field (PUT semantics).
    pub fn replace(draft: NewOrder) -> Self {
        Self {
            item: Some(draft.item),
            price: Some(draft.price),
        }
    }
}

fn validate_item(item: &str) -> DomainResult<String> {
    let item = item.trim();
    if item.is_empty() {
        return Err(DomainError::validation("item cannot be empty"));
    }
    if item.chars().count() > MAX_ITEM_LEN {
        return Err(DomainError::validation(format!(
            "item exceeds {MAX_ITEM_LEN} characters"
        )));
    }
    Ok(item.to_string())
}

fn validate_price(price: u64) -> DomainResult<u64> {
    if price > MAX_PRICE {
        return Err(DomainError::validation("price cannot have more than 10 digits"));
    }
    Ok(price)
}

impl OwnedResource for Order {
    type Id = OrderId;
    type Draft = NewOrder;
    type Patch = OrderPatch;

    fn id(&self) -> OrderId {
        self.id
    }

    fn owner(&self) -> Option<PrincipalId> {
        self.owner
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_draft(id: OrderId, owner: PrincipalId, draft: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            id,
            item: draft.item,
            price: draft.price,
            created_at: now,
            owner: Some(owner),
        }
    }

    /// Validates the whole patch before touching the order, so a rejected
    /// patch leaves it unchanged.
    fn apply_patch(&mut self, patch: OrderPatch) -> DomainResult<()> {
        let item = patch.item.as_deref().map(validate_item).transpose()?;
        let price = patch.price.map(validate_price).transpose()?;
        if let Some(item) = item {
            self.item = item;
        }
        if let Some(price) = price {
            self.price = price;
        }
        Ok(())
    }
}
