//! End-to-end navigation tests: screens are driven exactly the way the
//! transport does it, by decoding the token attached to a button and feeding
//! it back into the dispatcher.

use std::sync::Arc;

use kiosk_core::StoreError;
use kiosk_core::catalog::{CatalogStore, InventoryAllocator};
use kiosk_core::memory::MemoryStore;
use kiosk_core::nav::machine::{LEVEL_PURCHASE, LEVEL_QUANTITY, LEVEL_SUBCATEGORIES};
use kiosk_core::nav::{Button, CatalogToken, Label, Navigator, Screen, Session};

const BUYER: Session = Session { buyer_id: 42 };

fn navigator(store: &Arc<MemoryStore>, page_size: u32) -> Navigator {
    Navigator::new(store.clone(), store.clone(), page_size)
}

fn seeded() -> (Arc<MemoryStore>, i64, i64) {
    let store = Arc::new(MemoryStore::new());
    let cat = store.add_category("Accounts").unwrap();
    let sub = store.add_subcategory("Premium").unwrap();
    for n in 0..3 {
        // 10.00 per unit.
        store
            .add_item(cat, sub, 1000, "Premium account", &format!("login:pass{n}"))
            .unwrap();
    }
    (store, cat, sub)
}

fn literal_token(screen: &Screen, text: &str) -> CatalogToken {
    let button = screen
        .rows
        .iter()
        .flatten()
        .find(|b| matches!(&b.label, Label::Literal(l) if l == text))
        .unwrap_or_else(|| panic!("no literal button {text:?}"));
    CatalogToken::decode(&button.token).expect("button carries a valid token")
}

fn keyed_button<'a>(screen: &'a Screen, key: &str) -> &'a Button {
    screen
        .rows
        .iter()
        .flatten()
        .find(|b| matches!(&b.label, Label::Text(spec) if spec.key == key))
        .unwrap_or_else(|| panic!("no button with text key {key:?}"))
}

fn text_arg<'a>(screen: &'a Screen, name: &str) -> &'a str {
    screen
        .text
        .args
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("screen text has no arg {name:?}"))
}

/// Walk category -> subcategory -> quantity and return the confirm-screen
/// token for `quantity` units.
async fn walk_to_confirm(nav: &Navigator, quantity: u16) -> (Screen, CatalogToken) {
    let root = nav.dispatch(&BUYER, &CatalogToken::root()).await.unwrap();
    let category = literal_token(&root, "Accounts");
    assert_eq!(category.level, LEVEL_SUBCATEGORIES);

    let subcategories = nav.dispatch(&BUYER, &category).await.unwrap();
    let bucket = CatalogToken::decode(&keyed_button(&subcategories, "subcategory_button").token)
        .expect("subcategory button token");
    assert_eq!(bucket.level, LEVEL_QUANTITY);
    assert_eq!(bucket.unit_price, 1000);

    let quantities = nav.dispatch(&BUYER, &bucket).await.unwrap();
    let confirm = literal_token(&quantities, &quantity.to_string());
    let screen = nav.dispatch(&BUYER, &confirm).await.unwrap();
    (screen, confirm)
}

#[tokio::test]
async fn confirm_flow_end_to_end() {
    let (store, cat, sub) = seeded();
    let nav = navigator(&store, 10);

    let (confirm_screen, confirm_token) = walk_to_confirm(&nav, 2).await;
    assert_eq!(confirm_token.quantity, 2);
    assert_eq!(confirm_token.total_price, 2000);
    assert_eq!(text_arg(&confirm_screen, "total_price"), "20.00");

    let purchase = CatalogToken::decode(&keyed_button(&confirm_screen, "confirm").token).unwrap();
    assert_eq!(purchase.level, LEVEL_PURCHASE);
    assert!(purchase.confirmed);

    let done = nav.dispatch(&BUYER, &purchase).await.unwrap();
    assert_eq!(done.text.key, "purchase_success");
    assert_eq!(text_arg(&done, "total_price"), "20.00");
    assert!(text_arg(&done, "private_data").contains("login:pass"));

    assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 1);
    let buys = store.buys().unwrap();
    assert_eq!(buys.len(), 1);
    assert_eq!(buys[0].buyer_id, 42);
    assert_eq!(buys[0].item_ids.len(), 2);
}

#[tokio::test]
async fn stale_confirm_rerenders_with_fresh_stock() {
    let (store, cat, sub) = seeded();
    let nav = navigator(&store, 10);

    let (confirm_screen, _) = walk_to_confirm(&nav, 3).await;
    let purchase = CatalogToken::decode(&keyed_button(&confirm_screen, "confirm").token).unwrap();

    // Another buyer grabs 2 of the 3 items between screens.
    let stolen = store.allocate(7, cat, sub, 2).await.unwrap();

    let screen = nav.dispatch(&BUYER, &purchase).await.unwrap();
    assert_eq!(screen.text.key, "buy_confirmation_stock_changed");
    assert_eq!(text_arg(&screen, "available_quantity"), "1");

    // The concurrent buyer's rows stay sold, the remaining row stays unsold.
    for item in &stolen.items {
        assert!(store.item(item.id).unwrap().unwrap().is_sold);
    }
    assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 1);
    assert_eq!(store.buys().unwrap().len(), 1);
}

#[tokio::test]
async fn hostile_price_magnitudes_cannot_reach_quantity_select() {
    let (store, cat, sub) = seeded();
    let nav = navigator(&store, 10);

    // A forged payload with a near-i64::MAX unit price is rejected at decode.
    assert!(matches!(
        CatalogToken::decode(&format!("c1:2:{cat}:{sub}:922337203685477581:0:0:0:0")),
        Err(StoreError::MalformedToken(_))
    ));

    // Even a hand-built token with that magnitude fails cleanly in dispatch
    // instead of wrapping the total.
    let token = CatalogToken {
        level: LEVEL_QUANTITY,
        category_id: cat,
        subcategory_id: sub,
        unit_price: i64::MAX,
        ..CatalogToken::root()
    };
    assert!(matches!(
        nav.dispatch(&BUYER, &token).await,
        Err(StoreError::MalformedToken(_))
    ));
}

#[tokio::test]
async fn unknown_level_is_a_routing_error() {
    let (store, _, _) = seeded();
    let nav = navigator(&store, 10);
    let token = CatalogToken {
        level: 99,
        ..CatalogToken::root()
    };
    assert!(matches!(
        nav.dispatch(&BUYER, &token).await,
        Err(StoreError::UnknownLevel(99))
    ));
    // And the wire format happily carries levels nobody handles.
    let wild = CatalogToken::decode("c1:255:1:1:0:0:0:0:0").unwrap();
    assert!(matches!(
        nav.dispatch(&BUYER, &wild).await,
        Err(StoreError::UnknownLevel(255))
    ));
}

#[tokio::test]
async fn concurrent_allocations_never_share_an_item() {
    let store = Arc::new(MemoryStore::new());
    let cat = store.add_category("Keys").unwrap();
    let sub = store.add_subcategory("Steam").unwrap();
    for n in 0..5 {
        store.add_item(cat, sub, 500, "key", &format!("K-{n}")).unwrap();
    }

    let mut handles = Vec::new();
    for buyer in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.allocate(buyer, cat, sub, 2).await
        }));
    }

    let mut successes = 0;
    let mut claimed = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(allocation) => {
                successes += 1;
                claimed.extend(allocation.items.iter().map(|i| i.id));
            }
            Err(StoreError::InsufficientStock { .. }) | Err(StoreError::ConcurrentAllocation) => {}
            Err(e) => panic!("unexpected allocation error: {e}"),
        }
    }

    // floor(5 / 2) buyers can be served.
    assert_eq!(successes, 2);
    claimed.sort_unstable();
    claimed.dedup();
    assert_eq!(claimed.len(), 4, "an item was allocated twice");
    assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 1);
}

#[tokio::test]
async fn cancel_resets_to_subcategory_list_but_back_preserves_fields() {
    let (store, cat, _) = seeded();
    let nav = navigator(&store, 10);

    let (confirm_screen, confirm_token) = walk_to_confirm(&nav, 5).await;

    // Cancel: level 1 scoped to the category, everything else dropped.
    let cancel = CatalogToken::decode(&keyed_button(&confirm_screen, "cancel").token).unwrap();
    assert_eq!(cancel.level, LEVEL_SUBCATEGORIES);
    assert_eq!(cancel.category_id, cat);
    assert_eq!(cancel.subcategory_id, -1);
    assert_eq!(cancel.quantity, 0);
    assert_eq!(cancel.unit_price, 0);

    // Back: one level up, payload verbatim.
    let back = CatalogToken::decode(&keyed_button(&confirm_screen, "back").token).unwrap();
    assert_eq!(back.level, LEVEL_QUANTITY);
    assert_eq!(back.category_id, confirm_token.category_id);
    assert_eq!(back.subcategory_id, confirm_token.subcategory_id);
    assert_eq!(back.unit_price, confirm_token.unit_price);
    assert_eq!(back.quantity, confirm_token.quantity);
}

#[tokio::test]
async fn out_of_range_page_is_clamped_to_the_last_page() {
    let store = Arc::new(MemoryStore::new());
    for n in 0..12 {
        let cat = store.add_category(&format!("Category {n:02}")).unwrap();
        let sub = store.add_subcategory(&format!("Sub {n:02}")).unwrap();
        store.add_item(cat, sub, 100, "d", "p").unwrap();
    }
    let nav = navigator(&store, 5);

    let token = CatalogToken {
        page: 99,
        ..CatalogToken::root()
    };
    let screen = nav.dispatch(&BUYER, &token).await.unwrap();

    // 12 categories at 5 per page: pages 1..=3, and page 99 lands on 3/3.
    let pager = screen
        .rows
        .iter()
        .flatten()
        .find(|b| matches!(&b.label, Label::Literal(l) if l.contains('/')))
        .expect("pagination indicator");
    assert!(matches!(&pager.label, Label::Literal(l) if l == "3/3"));

    let listed = screen
        .rows
        .iter()
        .flatten()
        .filter(|b| CatalogToken::decode(&b.token).is_ok_and(|t| t.level == LEVEL_SUBCATEGORIES))
        .count();
    assert_eq!(listed, 2, "last page holds the two remaining categories");
}

#[tokio::test]
async fn sold_out_bucket_surfaces_not_found_at_quantity_select() {
    let (store, cat, sub) = seeded();
    let nav = navigator(&store, 10);

    let root = nav.dispatch(&BUYER, &CatalogToken::root()).await.unwrap();
    let category = literal_token(&root, "Accounts");
    let subcategories = nav.dispatch(&BUYER, &category).await.unwrap();
    let bucket = CatalogToken::decode(&keyed_button(&subcategories, "subcategory_button").token)
        .unwrap();

    // Everything sells out before the user taps the subcategory button.
    store.allocate(7, cat, sub, 3).await.unwrap();

    assert!(matches!(
        nav.dispatch(&BUYER, &bucket).await,
        Err(StoreError::NotFound)
    ));
}
