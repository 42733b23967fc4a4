//! Integration tests for the full login-and-booking flow
//!
//! Drives the service layer end to end against a temporary SQLite file:
//! lockout after repeated bad codes, then a fresh client booking two
//! back-to-back stays with a rejected overlap in between.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use villahost_backend::config::Config;
use villahost_backend::error::CoreError;
use villahost_backend::service::AdminService;

fn test_config(db_path: &str) -> Config {
    Config {
        database_path: db_path.to_string(),
        port: 0,
        jwt_secret: "integration-test-secret".to_string(),
        session_ttl_hours: 1,
        bcrypt_cost: 4,
        max_attempts: 4,
        attempt_window: Duration::from_secs(300),
        op_timeout: Duration::from_secs(5),
    }
}

fn setup() -> (Arc<AdminService>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap();
    let service = Arc::new(AdminService::from_config(test_config(db_path)).unwrap());
    service.owners().create_owner("o1", "7734").unwrap();
    (service, temp_file)
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn lockout_then_booking_flow() {
    let (service, _temp) = setup();

    // Bad codes until the window locks
    for _ in 0..4 {
        assert!(matches!(
            service.login("o1", "0000", "10.0.0.1").await,
            Err(CoreError::InvalidCode)
        ));
    }

    // Locked out now, correct code or not
    match service.login("o1", "7734", "10.0.0.1").await {
        Err(CoreError::RateLimited { retry_after }) => {
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= Duration::from_secs(300));
        }
        _ => panic!("expected lockout"),
    }

    // Different client address, same owner: unaffected
    let outcome = service.login("o1", "7734", "10.0.0.2").await.unwrap();
    let claims = service.authorize(&outcome.token).unwrap();
    assert_eq!(claims.name, "o1");

    let villa = service
        .create_villa(&claims, "Casa Sol".into(), "2 Cliff Rd".into(), 8)
        .await
        .unwrap();

    let first = service
        .reserve(
            &claims,
            villa.id,
            date("2024-06-01"),
            date("2024-06-05"),
            Some("AB-1".into()),
        )
        .await
        .unwrap();

    // Overlaps days 4 of the first stay
    match service
        .reserve(&claims, villa.id, date("2024-06-04"), date("2024-06-06"), None)
        .await
    {
        Err(CoreError::RangeConflict { existing }) => assert_eq!(existing.id, first.id),
        _ => panic!("expected conflict"),
    }

    // Back-to-back is fine: check-out day doubles as check-in day
    let second = service
        .reserve(&claims, villa.id, date("2024-06-05"), date("2024-06-07"), None)
        .await
        .unwrap();

    let ranges = service.list_ranges(&claims, villa.id).await.unwrap();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[0].id, first.id);
    assert_eq!(ranges[1].id, second.id);
}

#[tokio::test]
async fn rotation_forces_relogin() {
    let (service, _temp) = setup();

    let outcome = service.login("o1", "7734", "10.0.0.1").await.unwrap();
    let claims = service.authorize(&outcome.token).unwrap();

    let villa = service
        .create_villa(&claims, "Casa Sol".into(), "2 Cliff Rd".into(), 8)
        .await
        .unwrap();

    service.rotate_code(claims.sub, "8855").await.unwrap();

    // Old session is dead; store ops with it are rejected at authorize time
    assert!(matches!(
        service.authorize(&outcome.token),
        Err(CoreError::SessionRevoked)
    ));

    // Old code no longer works, new one does, villa survived
    assert!(matches!(
        service.login("o1", "7734", "10.0.0.3").await,
        Err(CoreError::InvalidCode)
    ));
    let fresh = service.login("o1", "8855", "10.0.0.3").await.unwrap();
    let fresh_claims = service.authorize(&fresh.token).unwrap();
    let villas = service.list_villas(&fresh_claims).await.unwrap();
    assert_eq!(villas.len(), 1);
    assert_eq!(villas[0].id, villa.id);
}

#[tokio::test]
async fn deleting_a_villa_cancels_its_bookings() {
    let (service, _temp) = setup();

    let outcome = service.login("o1", "7734", "10.0.0.1").await.unwrap();
    let claims = service.authorize(&outcome.token).unwrap();

    let villa = service
        .create_villa(&claims, "Casa Sol".into(), "2 Cliff Rd".into(), 8)
        .await
        .unwrap();
    service
        .reserve(&claims, villa.id, date("2024-07-01"), date("2024-07-10"), None)
        .await
        .unwrap();

    service.delete_villa(&claims, villa.id).await.unwrap();

    assert!(matches!(
        service.list_ranges(&claims, villa.id).await,
        Err(CoreError::VillaNotFound)
    ));
}
