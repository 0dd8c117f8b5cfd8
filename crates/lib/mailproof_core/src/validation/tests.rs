use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};

use super::*;
use crate::clock::FixedClock;
use crate::models::{ProfileRow, ValidationTokenRow};
use crate::store::memory::{MemoryProfileStore, MemoryValidationTokenStore};
use crate::token::VerificationHash;

const TOKEN: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV:abc123abc123abc123abc123";
const TOKEN_ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
const SECRET: &str = "abc123abc123abc123abc123";
const FISCAL_CODE: &str = "AAAAAA00A00A000A";
const EMAIL: &str = "a@example.com";
const CALLBACK: &str = "https://app.example.com/";

struct Harness {
    tokens: Arc<MemoryValidationTokenStore>,
    profiles: Arc<MemoryProfileStore>,
    clock: Arc<FixedClock>,
    validator: EmailValidator,
}

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

fn attributes() -> Map<String, Value> {
    match json!({"isInboxEnabled": true, "acceptedTosVersion": 3}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn harness() -> Harness {
    let tokens = Arc::new(MemoryValidationTokenStore::new());
    let profiles = Arc::new(MemoryProfileStore::new());
    let clock = Arc::new(FixedClock::new(now()));
    let validator = EmailValidator::new(ValidationContext {
        tokens: tokens.clone(),
        profiles: profiles.clone(),
        callback_url: CallbackUrl::parse(CALLBACK).unwrap(),
        clock: clock.clone(),
    });
    Harness {
        tokens,
        profiles,
        clock,
        validator,
    }
}

/// Token record expiring at `invalid_after` plus a matching, unvalidated profile.
fn seeded(invalid_after: DateTime<Utc>) -> Harness {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        invalid_after,
    );
    h.profiles.insert(FISCAL_CODE, Some(EMAIL), false, attributes());
    h
}

fn invalid() -> ValidationOutcome {
    ValidationFailure::InvalidToken.into()
}

fn generic() -> ValidationOutcome {
    ValidationFailure::GenericError.into()
}

#[tokio::test]
async fn valid_token_validates_email() {
    let h = seeded(now() + Duration::hours(1));

    let (outcome, url) = h.validator.validate_and_redirect(TOKEN).await;

    assert_eq!(outcome, ValidationOutcome::Success);
    assert_eq!(
        url,
        "https://app.example.com/?result=success&time=1700000000000"
    );
    assert_eq!(h.profiles.update_calls(), 1);
    let latest = h.profiles.latest_row(FISCAL_CODE).unwrap();
    assert!(latest.is_email_validated);
    assert_eq!(latest.email.as_deref(), Some(EMAIL));
    assert_eq!(latest.attributes, Value::Object(attributes()));
}

#[tokio::test]
async fn expired_token_skips_the_profile_store() {
    let h = seeded(now() - Duration::hours(1));

    let (outcome, url) = h.validator.validate_and_redirect(TOKEN).await;

    assert_eq!(
        outcome,
        ValidationOutcome::Failure(ValidationFailure::TokenExpired)
    );
    assert_eq!(
        url,
        "https://app.example.com/?result=failure&error=TOKEN_EXPIRED&time=1700000000000"
    );
    assert_eq!(h.profiles.find_calls(), 0);
    assert_eq!(h.profiles.update_calls(), 0);
}

#[tokio::test]
async fn expiry_equal_to_now_is_still_valid() {
    let h = seeded(now());
    assert_eq!(
        h.validator.validate(TOKEN).await,
        ValidationOutcome::Success
    );
}

#[tokio::test]
async fn one_microsecond_past_expiry_is_expired() {
    let h = seeded(now());
    h.clock.advance(Duration::microseconds(1));
    assert_eq!(
        h.validator.validate(TOKEN).await,
        ValidationOutcome::Failure(ValidationFailure::TokenExpired)
    );
}

#[tokio::test]
async fn malformed_tokens_never_reach_the_stores() {
    let h = seeded(now() + Duration::hours(1));

    for raw in [
        "",
        "garbage",
        "01ARZ3NDEKTSV4RRFFQ69G5FAV",
        "01ARZ3NDEKTSV4RRFFQ69G5FAV:",
        ":abc123abc123abc123abc123",
        "01ARZ3NDEKTSV4RRFFQ69G5FA:abc123abc123abc123abc123",
        "01ARZ3NDEKTSV4RRFFQ69G5FAV:abc123abc123abc123abc12z",
        "01ARZ3NDEKTSV4RRFFQ69G5FAV:abc123abc123abc123abc123:x",
        "01ARZ3NDEKTSV4RRFFQ69G5FAV abc123abc123abc123abc123",
    ] {
        assert_eq!(h.validator.validate(raw).await, invalid(), "token {raw:?}");
    }

    assert_eq!(h.tokens.get_calls(), 0);
    assert_eq!(h.profiles.find_calls(), 0);
    assert_eq!(h.profiles.update_calls(), 0);
}

#[tokio::test]
async fn unknown_token_is_invalid() {
    let h = seeded(now() + Duration::hours(1));

    // Same id, different secret: the hash does not match.
    let outcome = h
        .validator
        .validate("01ARZ3NDEKTSV4RRFFQ69G5FAV:000000000000000000000000")
        .await;
    assert_eq!(outcome, invalid());

    // Different id, same secret.
    let outcome = h
        .validator
        .validate("01ARZ3NDEKTSV4RRFFQ69G5FAX:abc123abc123abc123abc123")
        .await;
    assert_eq!(outcome, invalid());

    assert_eq!(h.tokens.get_calls(), 2);
    assert_eq!(h.profiles.find_calls(), 0);
}

#[tokio::test]
async fn secret_hash_is_case_sensitive() {
    let h = seeded(now() + Duration::hours(1));
    let outcome = h
        .validator
        .validate("01ARZ3NDEKTSV4RRFFQ69G5FAV:ABC123ABC123ABC123ABC123")
        .await;
    assert_eq!(outcome, invalid());
}

#[tokio::test]
async fn undecodable_token_record_is_invalid() {
    let h = harness();
    h.tokens.insert_row(ValidationTokenRow {
        partition_key: TOKEN_ID.into(),
        row_key: VerificationHash::of_secret(SECRET).as_str().into(),
        fiscal_code: Some(FISCAL_CODE.into()),
        email: None,
        invalid_after: Some(now() + Duration::hours(1)),
    });

    assert_eq!(h.validator.validate(TOKEN).await, invalid());
    assert_eq!(h.profiles.find_calls(), 0);
}

#[tokio::test]
async fn token_store_failure_is_generic_error() {
    let h = seeded(now() + Duration::hours(1));
    h.tokens.set_failing(true);

    assert_eq!(h.validator.validate(TOKEN).await, generic());
    assert_eq!(h.profiles.find_calls(), 0);
}

#[tokio::test]
async fn missing_profile_is_generic_error() {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        now() + Duration::hours(1),
    );

    assert_eq!(h.validator.validate(TOKEN).await, generic());
    assert_eq!(h.profiles.find_calls(), 1);
    assert_eq!(h.profiles.update_calls(), 0);
}

#[tokio::test]
async fn profile_store_failure_is_generic_error_without_write() {
    let h = seeded(now() + Duration::hours(1));
    h.profiles.set_failing_reads(true);

    assert_eq!(h.validator.validate(TOKEN).await, generic());
    assert_eq!(h.profiles.update_calls(), 0);
    assert_eq!(h.profiles.version_count(FISCAL_CODE), 1);
}

#[tokio::test]
async fn undecodable_profile_is_generic_error() {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        now() + Duration::hours(1),
    );
    h.profiles.insert_row(ProfileRow {
        fiscal_code: FISCAL_CODE.into(),
        version: 0,
        email: Some(EMAIL.into()),
        is_email_validated: false,
        attributes: json!(42),
    });

    assert_eq!(h.validator.validate(TOKEN).await, generic());
    assert_eq!(h.profiles.update_calls(), 0);
}

#[tokio::test]
async fn email_mismatch_is_invalid_without_write() {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        now() + Duration::hours(1),
    );
    h.profiles.insert(FISCAL_CODE, Some("changed@example.com"), false, Map::new());

    assert_eq!(h.validator.validate(TOKEN).await, invalid());
    assert_eq!(h.profiles.update_calls(), 0);
}

#[tokio::test]
async fn email_comparison_is_case_sensitive() {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        now() + Duration::hours(1),
    );
    h.profiles.insert(FISCAL_CODE, Some("A@example.com"), false, Map::new());

    assert_eq!(h.validator.validate(TOKEN).await, invalid());
}

#[tokio::test]
async fn profile_without_email_is_invalid() {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        now() + Duration::hours(1),
    );
    h.profiles.insert(FISCAL_CODE, None, false, Map::new());

    assert_eq!(h.validator.validate(TOKEN).await, invalid());
    assert_eq!(h.profiles.update_calls(), 0);
}

#[tokio::test]
async fn update_failure_is_generic_error() {
    let h = seeded(now() + Duration::hours(1));
    h.profiles.set_failing_writes(true);

    assert_eq!(h.validator.validate(TOKEN).await, generic());
    assert_eq!(h.profiles.update_calls(), 1);
    assert!(!h.profiles.latest_row(FISCAL_CODE).unwrap().is_email_validated);
}

#[tokio::test]
async fn validating_twice_succeeds_twice() {
    let h = seeded(now() + Duration::hours(1));

    assert_eq!(

        h.validator.validate(TOKEN).await,

        ValidationOutcome::Success

    );
    assert_eq!(
        h.validator.validate(TOKEN).await,
        ValidationOutcome::Success
    );

    assert_eq!(h.profiles.update_calls(), 2);
    assert!(h.profiles.latest_row(FISCAL_CODE).unwrap().is_email_validated);
}

#[tokio::test]
async fn only_the_latest_profile_version_is_checked() {
    let h = harness();
    h.tokens.insert(
        TOKEN_ID,
        &VerificationHash::of_secret(SECRET),
        FISCAL_CODE,
        EMAIL,
        now() + Duration::hours(1),
    );
    h.profiles.insert(FISCAL_CODE, Some(EMAIL), false, Map::new());
    h.profiles.insert(FISCAL_CODE, Some("new@example.com"), false, Map::new());

    assert_eq!(h.validator.validate(TOKEN).await, invalid());
}

#[tokio::test]
async fn redirect_time_is_read_when_the_url_is_built() {
    let h = seeded(now() + Duration::hours(1));
    let outcome = h.validator.validate(TOKEN).await;

    h.clock.advance(Duration::milliseconds(250));
    assert_eq!(
        h.validator.redirect_url(outcome),
        "https://app.example.com/?result=success&time=1700000000250"
    );
}
