//! Synchronized record types.
//!
//! These are the records the sync layer moves between the remote store and
//! the local shadow store. Field names match the backend's row layout
//! (snake_case columns), so the same serde shape serves both stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::email::Email;
use crate::types::id::{LineId, ProductId, UserId};
use crate::types::price::Price;
use crate::types::role::Role;

/// One line of a shopping cart.
///
/// Invariants maintained by the cart operations (not by this type):
/// `quantity >= 1`, and at most one line per `(owner_id, product_id)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Line identifier; remote-space or local-space (see [`LineId`]).
    pub id: LineId,
    /// Owning user - the partition key for cart rows.
    pub owner_id: UserId,
    /// The product this line refers to.
    pub product_id: ProductId,
    /// Units of the product in the cart; always at least 1.
    pub quantity: u32,
    /// When the line was first added.
    pub added_at: DateTime<Utc>,
    /// When the line was last modified.
    pub updated_at: DateTime<Utc>,
    /// Denormalized product data captured at add-time.
    pub product: ProductSnapshot,
}

impl CartLine {
    /// Price of this line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Denormalized product data captured when a line is added.
///
/// Kept on the line so the cart still renders sensibly if the
/// authoritative product record changes or the remote store is
/// unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// The product's identifier.
    pub id: ProductId,
    /// Display name at add-time.
    pub name: String,
    /// Unit price at add-time.
    pub price: Price,
    /// Product image, if the listing had one.
    pub image_url: Option<String>,
    /// Sales unit (e.g., "kg", "crate", "dozen").
    pub unit: String,
}

/// An authenticated session.
///
/// Owned exclusively by the session subsystem; the cart subsystem only
/// ever sees the owner's [`UserId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The authenticated user's stable ID.
    pub user_id: UserId,
    /// Address the session was issued for.
    pub email: Email,
    /// When the access token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
    /// Token used to obtain a fresh access token.
    pub refresh_token: String,
}

impl SessionRecord {
    /// Whether the session's access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Marketplace profile, keyed 1:1 with [`SessionRecord::user_id`].
///
/// Created lazily on first successful sign-in if absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// The owning user's stable ID.
    pub user_id: UserId,
    /// Name shown across the marketplace.
    pub display_name: String,
    /// Account role.
    pub role: Role,
    /// Delivery/pickup address, if the user has set one.
    pub address: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::price::CurrencyCode;
    use rust_decimal::Decimal;

    fn snapshot(price_cents: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new("p-1"),
            name: "Heirloom tomatoes".to_owned(),
            price: Price::new(Decimal::new(price_cents, 2), CurrencyCode::USD),
            image_url: None,
            unit: "kg".to_owned(),
        }
    }

    #[test]
    fn test_line_total() {
        let now = Utc::now();
        let line = CartLine {
            id: LineId::mint_remote(),
            owner_id: UserId::new("u-1"),
            product_id: ProductId::new("p-1"),
            quantity: 4,
            added_at: now,
            updated_at: now,
            product: snapshot(325),
        };
        assert_eq!(line.line_total().amount, Decimal::new(1300, 2));
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = SessionRecord {
            user_id: UserId::new("u-1"),
            email: Email::parse("grower@fields.example").unwrap(),
            issued_at: now - chrono::Duration::hours(2),
            expires_at: now - chrono::Duration::hours(1),
            refresh_token: "rt".to_owned(),
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::hours(2)));
    }

    #[test]
    fn test_cart_line_serde_roundtrip() {
        let now = Utc::now();
        let line = CartLine {
            id: LineId::mint_local(),
            owner_id: UserId::new("u-1"),
            product_id: ProductId::new("p-1"),
            quantity: 2,
            added_at: now,
            updated_at: now,
            product: snapshot(199),
        };
        let json = serde_json::to_string(&line).unwrap();
        let back: CartLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
    }
}
