//! Integration tests for MFA enrollment and backup code queries.

use chrono::Utc;
use uuid::Uuid;

use coachdesk_db::models::MfaState;
use coachdesk_db::queries::mfa;
use coachdesk_test_utils::TestDb;

#[tokio::test]
async fn begin_enrollment_only_resets_disabled_rows() {
    let db = TestDb::create().await;
    let user = Uuid::new_v4();

    let row = mfa::begin_enrollment(&db.pool, user, b"first-secret")
        .await
        .unwrap()
        .expect("new row is created");
    assert_eq!(row.state, MfaState::Pending);
    assert_eq!(row.secret.as_deref(), Some(&b"first-secret"[..]));

    // Pending rows are left alone.
    let again = mfa::begin_enrollment(&db.pool, user, b"second-secret").await.unwrap();
    assert!(again.is_none());

    let rows = mfa::transition_enrollment_state(
        &db.pool,
        user,
        MfaState::Pending,
        MfaState::Disabled,
        None,
    )
    .await
    .unwrap();
    assert_eq!(rows, 1);

    let row = mfa::begin_enrollment(&db.pool, user, b"second-secret")
        .await
        .unwrap()
        .expect("disabled row is reset");
    assert_eq!(row.secret.as_deref(), Some(&b"second-secret"[..]));

    db.drop_db().await;
}

#[tokio::test]
async fn disabling_clears_secret_and_replay_marker() {
    let db = TestDb::create().await;
    let user = Uuid::new_v4();
    mfa::begin_enrollment(&db.pool, user, b"secret").await.unwrap();

    let now = Utc::now();
    let rows = mfa::transition_enrollment_state(
        &db.pool,
        user,
        MfaState::Pending,
        MfaState::Enabled,
        Some(now),
    )
    .await
    .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(mfa::record_used_step(&db.pool, user, 100).await.unwrap(), 1);

    // Wrong `from` state.
    let rows = mfa::transition_enrollment_state(
        &db.pool,
        user,
        MfaState::Pending,
        MfaState::Disabled,
        None,
    )
    .await
    .unwrap();
    assert_eq!(rows, 0);

    mfa::transition_enrollment_state(&db.pool, user, MfaState::Enabled, MfaState::Disabled, None)
        .await
        .unwrap();
    let row = mfa::get_enrollment(&db.pool, user).await.unwrap().unwrap();
    assert_eq!(row.state, MfaState::Disabled);
    assert_eq!(row.secret, None);
    assert_eq!(row.last_used_step, None);
    assert_eq!(row.enabled_at, None);

    db.drop_db().await;
}

#[tokio::test]
async fn used_steps_only_move_forward() {
    let db = TestDb::create().await;
    let user = Uuid::new_v4();
    mfa::begin_enrollment(&db.pool, user, b"secret").await.unwrap();

    assert_eq!(mfa::record_used_step(&db.pool, user, 10).await.unwrap(), 1);
    assert_eq!(mfa::record_used_step(&db.pool, user, 10).await.unwrap(), 0);
    assert_eq!(mfa::record_used_step(&db.pool, user, 9).await.unwrap(), 0);
    assert_eq!(mfa::record_used_step(&db.pool, user, 11).await.unwrap(), 1);

    db.drop_db().await;
}

#[tokio::test]
async fn backup_codes_are_consumed_once() {
    let db = TestDb::create().await;
    let user = Uuid::new_v4();
    mfa::begin_enrollment(&db.pool, user, b"secret").await.unwrap();

    let hashes: Vec<String> = (0..3).map(|i| format!("hash-{i}")).collect();
    assert_eq!(mfa::insert_backup_codes(&db.pool, user, &hashes).await.unwrap(), 3);
    assert_eq!(mfa::count_unused_backup_codes(&db.pool, user).await.unwrap(), 3);

    assert_eq!(mfa::consume_backup_code(&db.pool, user, "hash-1").await.unwrap(), 1);
    assert_eq!(mfa::consume_backup_code(&db.pool, user, "hash-1").await.unwrap(), 0);
    assert_eq!(mfa::consume_backup_code(&db.pool, user, "unknown").await.unwrap(), 0);
    assert_eq!(
        mfa::consume_backup_code(&db.pool, Uuid::new_v4(), "hash-0").await.unwrap(),
        0
    );
    assert_eq!(mfa::count_unused_backup_codes(&db.pool, user).await.unwrap(), 2);

    assert_eq!(mfa::delete_backup_codes(&db.pool, user).await.unwrap(), 3);
    assert_eq!(mfa::count_unused_backup_codes(&db.pool, user).await.unwrap(), 0);

    db.drop_db().await;
}
