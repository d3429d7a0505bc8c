//! Cart synchronization scenarios across remote/local failover.

use farmlink_core::{LineId, UserId};
use farmlink_integration_tests::{cart_harness, snapshot};
use farmlink_sync::error::SyncError;
use farmlink_sync::notify::NoticeKind;
use rust_decimal::Decimal;

fn owner() -> UserId {
    UserId::new("user-buyer")
}

// ============================================================================
// Scenarios
// ============================================================================

/// Remote mode, backend healthy: the add lands remotely and reads
/// reflect it.
#[tokio::test]
async fn add_lands_remotely_when_backend_is_healthy() {
    let h = cart_harness();
    let product = snapshot("p-1", "Heirloom tomatoes", 350);

    h.cart.add(&owner(), &product, 1).await.expect("add");

    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, product.id);
    assert_eq!(lines[0].quantity, 1);
    assert!(!lines[0].id.is_local());

    assert!(!h.cart.latch().is_local());
    assert_eq!(h.remote.rows().len(), 1);
}

/// The upsert hits an unreachable backend: the mode flips to local, the
/// line lands in the shadow store, reads still serve it, and the offline
/// notice fires exactly once.
#[tokio::test]
async fn add_falls_back_locally_when_backend_is_unreachable() {
    let h = cart_harness();
    let product = snapshot("p-1", "Heirloom tomatoes", 350);

    h.remote
        .fail_with(SyncError::Unreachable("connect timeout".to_owned()));

    h.cart.add(&owner(), &product, 1).await.expect("add");

    assert!(h.cart.latch().is_local());
    assert!(h.remote.rows().is_empty());

    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 1);

    assert_eq!(h.notifier.count_of(NoticeKind::OfflineFallback), 1);

    // Further offline activity does not repeat the notice.
    h.cart.add(&owner(), &product, 1).await.expect("add again");
    assert_eq!(h.notifier.count_of(NoticeKind::OfflineFallback), 1);
}

/// Repeated adds of one product in local mode merge into a single line
/// with the summed quantity.
#[tokio::test]
async fn local_adds_merge_into_one_line() {
    let h = cart_harness();
    let product = snapshot("p-1", "Heirloom tomatoes", 350);

    h.remote
        .fail_with(SyncError::Unreachable("down".to_owned()));

    h.cart.add(&owner(), &product, 1).await.expect("first add");
    h.cart.add(&owner(), &product, 2).await.expect("second add");

    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
}

/// An unauthorized fetch propagates, the latch stays remote, and nothing
/// lands locally.
#[tokio::test]
async fn unauthorized_fetch_propagates_without_fallback() {
    let h = cart_harness();

    h.remote.seed(vec![]);
    h.remote
        .fail_with(SyncError::Unauthorized("jwt expired".to_owned()));

    let err = h.cart.get_all(&owner()).await.expect_err("must propagate");
    assert!(matches!(err, SyncError::Unauthorized(_)));
    assert!(!h.cart.latch().is_local());
    assert_eq!(h.notifier.count_of(NoticeKind::Unauthorized), 1);
    assert_eq!(h.notifier.count_of(NoticeKind::OfflineFallback), 0);

    // Once the credential is fixed the same cart works, remote-served.
    h.remote.heal();
    assert!(h.cart.get_all(&owner()).await.expect("get_all").is_empty());
    assert!(!h.cart.latch().is_local());
}

// ============================================================================
// Merge and quantity invariants
// ============================================================================

/// Adding the same product twice yields one line with the summed
/// quantity, in remote mode too.
#[tokio::test]
async fn add_is_idempotent_per_product() {
    let h = cart_harness();
    let product = snapshot("p-1", "Seed potatoes", 1200);

    h.cart.add(&owner(), &product, 2).await.expect("add a");
    h.cart.add(&owner(), &product, 5).await.expect("add b");

    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 7);
    assert_eq!(h.remote.rows().len(), 1);
}

/// Setting quantity to zero removes the line; no zero-quantity line is
/// ever observable.
#[tokio::test]
async fn zero_quantity_removes_the_line() {
    let h = cart_harness();
    let product = snapshot("p-1", "Seed potatoes", 1200);

    h.cart.add(&owner(), &product, 2).await.expect("add");
    let line_id = h.cart.get_all(&owner()).await.expect("get_all")[0].id.clone();

    h.cart
        .set_quantity(&owner(), &line_id, 3)
        .await
        .expect("set to 3");
    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    assert_eq!(lines[0].quantity, 3);

    h.cart
        .set_quantity(&owner(), &line_id, 0)
        .await
        .expect("set to 0");
    assert!(h.cart.get_all(&owner()).await.expect("get_all").is_empty());
    assert!(h.remote.rows().is_empty());
}

/// A zero-quantity add is a no-op.
#[tokio::test]
async fn zero_quantity_add_is_a_noop() {
    let h = cart_harness();
    let product = snapshot("p-1", "Seed potatoes", 1200);

    h.cart.add(&owner(), &product, 0).await.expect("add 0");
    assert!(h.cart.get_all(&owner()).await.expect("get_all").is_empty());
    assert_eq!(h.remote.mutate_calls(), 0);
}

/// Once latched local, no call reaches the remote adapter until
/// re-initialization - even if the backend has recovered.
#[tokio::test]
async fn latch_is_monotonic_until_reinitialize() {
    let h = cart_harness();
    let product = snapshot("p-1", "Seed potatoes", 1200);

    h.remote
        .fail_with(SyncError::Unreachable("down".to_owned()));
    h.cart.add(&owner(), &product, 1).await.expect("add");
    assert!(h.cart.latch().is_local());

    // Backend recovers, but the latch must keep us local.
    h.remote.heal();
    let fetches = h.remote.fetch_calls();
    let mutations = h.remote.mutate_calls();

    h.cart.add(&owner(), &product, 1).await.expect("add");
    let line_id = h.cart.get_all(&owner()).await.expect("get_all")[0].id.clone();
    h.cart
        .set_quantity(&owner(), &line_id, 5)
        .await
        .expect("set");
    h.cart.remove(&owner(), &line_id).await.expect("remove");
    h.cart.get_all(&owner()).await.expect("get_all");

    assert_eq!(h.remote.fetch_calls(), fetches);
    assert_eq!(h.remote.mutate_calls(), mutations);

    // Re-initialization (fresh sign-in) is the only way back.
    h.remote.seed(vec![]);
    h.cart.reinitialize(&owner()).await.expect("reinitialize");
    assert!(!h.cart.latch().is_local());
    assert!(h.remote.fetch_calls() > fetches);
}

/// Lines minted while local carry the reserved namespace marker;
/// remote-mode lines never do.
#[tokio::test]
async fn local_ids_are_namespaced() {
    let h = cart_harness();

    h.cart
        .add(&owner(), &snapshot("p-1", "Tomatoes", 350), 1)
        .await
        .expect("remote add");
    h.remote
        .fail_with(SyncError::Unreachable("down".to_owned()));
    h.cart
        .add(&owner(), &snapshot("p-2", "Carrots", 180), 1)
        .await
        .expect("flips local");
    h.cart
        .add(&owner(), &snapshot("p-3", "Kale", 240), 1)
        .await
        .expect("local add");

    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    let local_line = lines
        .iter()
        .find(|l| l.product_id.as_str() == "p-3")
        .expect("line added while local");
    assert!(local_line.id.is_local());
    assert!(local_line.id.as_str().starts_with(LineId::LOCAL_PREFIX));
}

// ============================================================================
// Operations
// ============================================================================

#[tokio::test]
async fn totals_sum_lines_and_quantities() {
    let h = cart_harness();

    h.cart
        .add(&owner(), &snapshot("p-1", "Tomatoes", 350), 2)
        .await
        .expect("add tomatoes");
    h.cart
        .add(&owner(), &snapshot("p-2", "Carrots", 180), 3)
        .await
        .expect("add carrots");

    let totals = h.cart.totals(&owner()).await.expect("totals");
    assert_eq!(totals.item_count, 5);
    // 2 * 3.50 + 3 * 1.80
    assert_eq!(totals.subtotal.amount, Decimal::new(1240, 2));
}

#[tokio::test]
async fn totals_of_empty_cart_are_zero() {
    let h = cart_harness();
    let totals = h.cart.totals(&owner()).await.expect("totals");
    assert_eq!(totals.item_count, 0);
    assert_eq!(totals.subtotal.amount, Decimal::ZERO);
}

#[tokio::test]
async fn clear_empties_the_cart_in_both_modes() {
    let h = cart_harness();

    h.cart
        .add(&owner(), &snapshot("p-1", "Tomatoes", 350), 2)
        .await
        .expect("add");
    h.cart.clear(&owner()).await.expect("remote clear");
    assert!(h.cart.get_all(&owner()).await.expect("get_all").is_empty());
    assert!(h.remote.rows().is_empty());

    h.remote
        .fail_with(SyncError::Unreachable("down".to_owned()));
    h.cart
        .add(&owner(), &snapshot("p-2", "Carrots", 180), 1)
        .await
        .expect("local add");
    h.cart.clear(&owner()).await.expect("local clear");
    assert!(h.cart.get_all(&owner()).await.expect("get_all").is_empty());
}

/// A conflict on upsert surfaces to the caller and changes nothing.
#[tokio::test]
async fn conflict_is_surfaced_and_retryable() {
    let h = cart_harness();
    let product = snapshot("p-1", "Tomatoes", 350);

    h.cart.add(&owner(), &product, 1).await.expect("add");
    h.remote
        .fail_with(SyncError::Conflict("stale write".to_owned()));

    let err = h
        .cart
        .add(&owner(), &product, 1)
        .await
        .expect_err("conflict propagates");
    assert!(matches!(err, SyncError::Conflict(_)));
    assert!(!h.cart.latch().is_local());
    assert_eq!(h.notifier.count_of(NoticeKind::Conflict), 1);

    // Retry after the backend recovers succeeds.
    h.remote.heal();
    h.cart.add(&owner(), &product, 1).await.expect("retry");
    let lines = h.cart.get_all(&owner()).await.expect("get_all");
    assert_eq!(lines[0].quantity, 2);
}
