use super::*;

fn new_reservation(items: Vec<LineItem>) -> NewReservation {
    NewReservation {
        date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"),
        time: TimeSlot::from_hm(18, 30).expect("slot"),
        guests: 4,
        name: "Amina Davids".to_string(),
        email: "amina@example.com".to_string(),
        phone: "021 555 0101".to_string(),
        seating_area: Some(SeatingArea::Inside),
        table_number: 3,
        items,
    }
}

fn menu_item(name: &str, price_cents: i64, category: MenuCategory) -> NewMenuItem {
    NewMenuItem {
        name: name.to_string(),
        description: None,
        price_cents,
        category,
        image_url: None,
        is_spicy: false,
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn created_reservation_is_pending_and_visible_to_list() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create(&new_reservation(Vec::new()))
        .await
        .expect("create");
    assert_eq!(created.status, ReservationStatus::Pending);

    let listed = storage.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].time.to_string(), "18:30");
    assert_eq!(listed[0].seating_area, Some(SeatingArea::Inside));
}

#[tokio::test]
async fn lists_newest_first() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .create(&new_reservation(Vec::new()))
        .await
        .expect("first");
    let second = storage
        .create(&new_reservation(Vec::new()))
        .await
        .expect("second");

    let listed = storage.list().await.expect("list");
    let ids: Vec<ReservationId> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn line_items_are_stored_with_the_reservation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let items = vec![
        LineItem {
            menu_item_id: MenuItemId(7),
            quantity: 2,
        },
        LineItem {
            menu_item_id: MenuItemId(3),
            quantity: 1,
        },
    ];
    let created = storage
        .create(&new_reservation(items.clone()))
        .await
        .expect("create");

    let fetched = storage
        .get(created.id)
        .await
        .expect("get")
        .expect("some reservation");
    assert_eq!(fetched.items, items);
}

#[tokio::test]
async fn zero_quantity_line_item_rolls_back_the_reservation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let items = vec![LineItem {
        menu_item_id: MenuItemId(1),
        quantity: 0,
    }];
    storage
        .create(&new_reservation(items))
        .await
        .expect_err("zero quantity rejected");

    assert!(storage.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn appends_line_items_after_creation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create(&new_reservation(vec![LineItem {
            menu_item_id: MenuItemId(1),
            quantity: 1,
        }]))
        .await
        .expect("create");

    storage
        .create_line_items(
            created.id,
            &[LineItem {
                menu_item_id: MenuItemId(2),
                quantity: 3,
            }],
        )
        .await
        .expect("append");

    let fetched = storage.get(created.id).await.expect("get").expect("some");
    assert_eq!(fetched.items.len(), 2);
    assert_eq!(fetched.items[1].menu_item_id, MenuItemId(2));

    storage
        .create_line_items(ReservationId(999), &[])
        .await
        .expect_err("unknown reservation");
}

#[tokio::test]
async fn conditional_status_write_detects_stale_expectation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create(&new_reservation(Vec::new()))
        .await
        .expect("create");

    let applied = storage
        .update_status(
            created.id,
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
        )
        .await
        .expect("update");
    let StatusWrite::Applied(record) = applied else {
        panic!("expected applied write, got {applied:?}");
    };
    assert_eq!(record.status, ReservationStatus::Confirmed);

    let stale = storage
        .update_status(
            created.id,
            ReservationStatus::Pending,
            ReservationStatus::Cancelled,
        )
        .await
        .expect("update");
    let StatusWrite::Conflict(current) = stale else {
        panic!("expected conflict, got {stale:?}");
    };
    assert_eq!(current.status, ReservationStatus::Confirmed);

    let missing = storage
        .update_status(
            ReservationId(404),
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
        )
        .await
        .expect("update");
    assert_eq!(missing, StatusWrite::NotFound);
}

#[tokio::test]
async fn null_status_column_reads_as_pending() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create(&new_reservation(Vec::new()))
        .await
        .expect("create");
    sqlx::query("UPDATE reservations SET status = NULL WHERE id = ?")
        .bind(created.id.0)
        .execute(storage.pool())
        .await
        .expect("null status");

    let fetched = storage.get(created.id).await.expect("get").expect("some");
    assert_eq!(fetched.status, ReservationStatus::Pending);

    let write = storage
        .update_status(
            created.id,
            ReservationStatus::Pending,
            ReservationStatus::Cancelled,
        )
        .await
        .expect("update");
    assert!(matches!(write, StatusWrite::Applied(_)));
}

#[tokio::test]
async fn unrecognised_status_text_is_an_error_not_pending() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create(&new_reservation(Vec::new()))
        .await
        .expect("create");
    sqlx::query("UPDATE reservations SET status = 'Confirmed' WHERE id = ?")
        .bind(created.id.0)
        .execute(storage.pool())
        .await
        .expect("foreign status");

    let err = storage.get(created.id).await.expect_err("unknown status");
    assert!(format!("{err:#}").contains("'Confirmed'"));
    assert!(storage.list().await.is_err());
}

#[tokio::test]
async fn menu_items_round_trip_with_category() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut curry = menu_item("Cape Malay Curry", 14500, MenuCategory::Mains);
    curry.is_spicy = true;
    let curry_id = storage.insert_menu_item(&curry).await.expect("curry");
    storage
        .insert_menu_item(&menu_item("Koesisters", 4500, MenuCategory::Desserts))
        .await
        .expect("koesisters");

    let menu = storage.list_menu().await.expect("menu");
    assert_eq!(menu.len(), 2);
    assert_eq!(menu[0].id, curry_id);
    assert!(menu[0].is_spicy);
    assert_eq!(menu[1].category, MenuCategory::Desserts);
}

#[tokio::test]
async fn rejects_negative_menu_price() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert_menu_item(&menu_item("Refund", -1, MenuCategory::Drinks))
        .await
        .expect_err("negative price");
}

#[tokio::test]
async fn admin_credentials_verify_against_argon2_hash() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_admin("host", "admin123")
        .await
        .expect("admin");

    assert!(storage.verify_admin("host", "admin123").await.expect("verify"));
    assert!(!storage.verify_admin("host", "nope").await.expect("verify"));
    assert!(!storage.verify_admin("ghost", "admin123").await.expect("verify"));

    storage
        .create_admin("host", "other")
        .await
        .expect_err("duplicate admin");
}
