//! The cart domain.
//!
//! Thin merge/ID logic over the shared [`SyncCoordinator`]: idempotent
//! add (one line per `(owner, product)`, quantities accumulate), the
//! quantity floor (a quantity of 0 removes the line), and line-ID minting
//! in the namespace matching the current mode. Everything else - mode
//! latching, failover, caching - is the coordinator's job.

use std::sync::Arc;

use chrono::Utc;

use farmlink_core::{CartLine, CurrencyCode, LineId, Price, ProductSnapshot, UserId};

use crate::config::CacheConfig;
use crate::coordinator::{Change, SyncCoordinator, SyncRecord};
use crate::error::SyncError;
use crate::latch::ModeLatch;
use crate::notify::Notifier;
use crate::remote::RemoteAdapter;
use crate::store::StorageMedium;

impl SyncRecord for CartLine {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Cart summary for badges and the checkout header.
#[derive(Debug, Clone, PartialEq)]
pub struct CartTotals {
    /// Total units across all lines.
    pub item_count: u32,
    /// Sum of line totals.
    pub subtotal: Price,
}

impl CartTotals {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            item_count: 0,
            subtotal: Price::zero(CurrencyCode::USD),
        }
    }
}

/// The shopping-cart surface consumers hold.
pub struct CartService<A> {
    coordinator: SyncCoordinator<CartLine, A>,
}

impl<A> CartService<A>
where
    A: RemoteAdapter<CartLine>,
{
    #[must_use]
    pub fn new(
        remote: A,
        medium: Arc<dyn StorageMedium>,
        notifier: Arc<dyn Notifier>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            coordinator: SyncCoordinator::new("cart", remote, medium, notifier, cache),
        }
    }

    /// The cart domain's mode latch.
    #[must_use]
    pub const fn latch(&self) -> &ModeLatch {
        self.coordinator.latch()
    }

    /// All of the owner's cart lines.
    ///
    /// # Errors
    ///
    /// Auth and conflict failures only; infrastructure failures are
    /// served from the shadow store.
    pub async fn get_all(&self, owner: &UserId) -> Result<Vec<CartLine>, SyncError> {
        self.coordinator.read_all(owner).await
    }

    /// Item count and subtotal for the owner's cart.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub async fn totals(&self, owner: &UserId) -> Result<CartTotals, SyncError> {
        Ok(totals_of(&self.get_all(owner).await?))
    }

    /// Add `quantity` units of a product.
    ///
    /// If the owner already has a line for this product, its quantity is
    /// incremented; the cart never holds two lines for one product. A
    /// quantity of 0 is a no-op.
    ///
    /// # Errors
    ///
    /// Auth and conflict failures only; on infrastructure failure the
    /// line lands in the shadow store instead.
    pub async fn add(
        &self,
        owner: &UserId,
        product: &ProductSnapshot,
        quantity: u32,
    ) -> Result<(), SyncError> {
        if quantity == 0 {
            return Ok(());
        }

        let owner_id = owner.clone();
        let product = product.clone();
        // Mode at decision time picks the ID namespace; a line minted for
        // the remote store that ends up falling back locally keeps its
        // remote-space ID, exactly like a previously synced row.
        let local = self.latch().is_local();

        self.coordinator
            .mutate_with(owner, move |lines| {
                let now = Utc::now();
                lines
                    .into_iter()
                    .find(|line| line.product_id == product.id)
                    .map_or_else(
                        || {
                            let id = if local {
                                LineId::mint_local()
                            } else {
                                LineId::mint_remote()
                            };
                            Some(Change::Upsert(CartLine {
                                id,
                                owner_id,
                                product_id: product.id.clone(),
                                quantity,
                                added_at: now,
                                updated_at: now,
                                product,
                            }))
                        },
                        |mut line| {
                            line.quantity = line.quantity.saturating_add(quantity);
                            line.updated_at = now;
                            Some(Change::Upsert(line))
                        },
                    )
            })
            .await
    }

    /// Set a line's quantity. A quantity of 0 removes the line; an
    /// unknown line is a no-op.
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add).
    pub async fn set_quantity(
        &self,
        owner: &UserId,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<(), SyncError> {
        let line_id = line_id.clone();

        self.coordinator
            .mutate_with(owner, move |lines| {
                let mut line = lines.into_iter().find(|line| line.id == line_id)?;
                if quantity == 0 {
                    Some(Change::Remove(line.id.as_str().to_owned()))
                } else {
                    line.quantity = quantity;
                    line.updated_at = Utc::now();
                    Some(Change::Upsert(line))
                }
            })
            .await
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add).
    pub async fn remove(&self, owner: &UserId, line_id: &LineId) -> Result<(), SyncError> {
        self.coordinator
            .apply(owner, Change::Remove(line_id.as_str().to_owned()))
            .await
    }

    /// Empty the owner's cart.
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add).
    pub async fn clear(&self, owner: &UserId) -> Result<(), SyncError> {
        self.coordinator.apply(owner, Change::Clear).await
    }

    /// Re-initialize the cart after a fresh sign-in: back to remote mode,
    /// then fetch. A failing fetch immediately re-latches local.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub async fn reinitialize(&self, owner: &UserId) -> Result<Vec<CartLine>, SyncError> {
        self.coordinator.reinitialize(owner).await;
        self.get_all(owner).await
    }
}

/// Fold lines into badge/checkout totals.
///
/// A cart only ever holds one currency; a line in a different currency is
/// corrupted data and is excluded from the subtotal (logged) rather than
/// silently converted.
fn totals_of(lines: &[CartLine]) -> CartTotals {
    let item_count = lines.iter().map(|line| line.quantity).sum();

    let mut iter = lines.iter();
    let mut subtotal = iter
        .next()
        .map_or_else(|| Price::zero(CurrencyCode::USD), CartLine::line_total);
    for line in iter {
        match subtotal.checked_add(&line.line_total()) {
            Some(sum) => subtotal = sum,
            None => {
                tracing::warn!(line = %line.id, "cart line currency mismatch, excluded from subtotal");
            }
        }
    }

    CartTotals {
        item_count,
        subtotal,
    }
}
