use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::{Role, UserId};

pub const CLAIM_ID: &str = "id";
pub const CLAIM_EMAIL: &str = "email";
pub const CLAIM_ROLE: &str = "role";
pub const CLAIM_NAME: &str = "name";
pub const CLAIM_EXP: &str = "exp";

/// Claims carried in the payload segment of a SlotBook token.
///
/// The client never verifies the token signature, so these claims describe
/// *who the server said we are*, not a proof of it.
///
/// The payload object is kept exactly as received and serializes back to the
/// same JSON. The recognized claims (`id`, `email`, `role`, `name`, `exp`) are
/// read through typed accessors; a claim that is missing or has an unexpected
/// shape reads as `None` instead of rejecting the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims {
    fields: Map<String, Value>,
}

impl Claims {
    pub fn new(id: UserId, email: impl Into<String>, role: Role) -> Self {
        let mut fields = Map::new();
        fields.insert(CLAIM_ID.to_string(), Value::from(id.get()));
        fields.insert(CLAIM_EMAIL.to_string(), Value::String(email.into()));
        fields.insert(CLAIM_ROLE.to_string(), Value::from(role.as_str()));
        Self { fields }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.fields
            .insert(CLAIM_NAME.to_string(), Value::String(name.into()));
        self
    }

    pub fn with_exp(mut self, exp_secs: i64) -> Self {
        self.fields
            .insert(CLAIM_EXP.to_string(), Value::from(exp_secs));
        self
    }

    /// Set (or overwrite) an arbitrary claim.
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// The raw `id` claim, whatever its JSON type.
    pub fn id(&self) -> Option<&Value> {
        self.get(CLAIM_ID)
    }

    /// The `id` claim when it is an integer.
    pub fn user_id(&self) -> Option<UserId> {
        self.id()?.as_i64().map(UserId::new)
    }

    pub fn email(&self) -> Option<&str> {
        self.get(CLAIM_EMAIL)?.as_str()
    }

    /// The `role` claim when it names a known role.
    pub fn role(&self) -> Option<Role> {
        self.get(CLAIM_ROLE)?.as_str()?.parse().ok()
    }

    pub fn name(&self) -> Option<&str> {
        self.get(CLAIM_NAME)?.as_str()
    }

    /// Expiry in seconds since the Unix epoch, when `exp` is a JSON number.
    ///
    /// Any other `exp` value is kept in the payload but reads as absent here.
    pub fn exp(&self) -> Option<&Number> {
        match self.get(CLAIM_EXP)? {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Expiry as a timestamp, when `exp` is numeric and within the range
    /// `DateTime<Utc>` can represent.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = self.exp()?.as_f64()? * 1000.0;
        if !millis.is_finite() || millis < i64::MIN as f64 || millis >= i64::MAX as f64 {
            return None;
        }
        DateTime::from_timestamp_millis(millis as i64)
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

/// Whether the claims are expired as of now.
///
/// See [`is_expired_at`].
pub fn is_expired(claims: &Claims) -> bool {
    is_expired_at(claims, Utc::now())
}

/// Whether the claims are expired as of `now`.
///
/// True iff `exp` is numeric and `exp * 1000 <= now` in milliseconds. Claims
/// without a numeric `exp` never expire on the client; the server remains the
/// authority.
pub fn is_expired_at(claims: &Claims, now: DateTime<Utc>) -> bool {
    match claims.exp().and_then(Number::as_f64) {
        Some(exp_secs) => exp_secs * 1000.0 <= now.timestamp_millis() as f64,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn claims_from(payload: Value) -> Claims {
        serde_json::from_value(payload).unwrap()
    }

    fn claims_with_exp(exp: Value) -> Claims {
        claims_from(json!({
            "id": 7,
            "email": "coach@example.com",
            "role": "trainer",
            "exp": exp,
        }))
    }

    #[test]
    fn missing_exp_is_not_expired() {
        let claims = Claims::new(UserId::new(1), "a@b.com", Role::Admin);
        assert!(!is_expired(&claims));
    }

    #[test]
    fn past_exp_is_expired() {
        let now = Utc::now();
        let claims = Claims::new(UserId::new(1), "a@b.com", Role::Admin)
            .with_exp((now - Duration::hours(1)).timestamp());
        assert!(is_expired_at(&claims, now));
    }

    #[test]
    fn future_exp_is_not_expired() {
        let now = Utc::now();
        let claims = Claims::new(UserId::new(1), "a@b.com", Role::Admin)
            .with_exp((now + Duration::hours(1)).timestamp());
        assert!(!is_expired_at(&claims, now));
    }

    #[test]
    fn exp_equal_to_now_is_expired() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let claims = claims_with_exp(json!(1_700_000_000));
        assert!(is_expired_at(&claims, now));
    }

    #[test]
    fn fractional_exp_compares_in_millis() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_400).unwrap();
        assert!(!is_expired_at(&claims_with_exp(json!(1_700_000_000.5)), now));
        assert!(is_expired_at(&claims_with_exp(json!(1_700_000_000.3)), now));
    }

    #[test]
    fn non_numeric_exp_is_kept_but_never_expires() {
        let payload = json!({"id": 7, "exp": "tomorrow"});
        let claims = claims_from(payload.clone());

        assert_eq!(claims.exp(), None);
        assert_eq!(claims.expires_at(), None);
        assert!(!is_expired(&claims));
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[test]
    fn typed_accessors_read_recognized_claims() {
        let claims = claims_from(json!({
            "id": 3,
            "email": "a@b.com",
            "role": "admin",
            "name": "Ann",
        }));

        assert_eq!(claims.user_id(), Some(UserId::new(3)));
        assert_eq!(claims.email(), Some("a@b.com"));
        assert_eq!(claims.role(), Some(Role::Admin));
        assert_eq!(claims.name(), Some("Ann"));
    }

    #[test]
    fn unexpected_claim_shapes_read_as_absent() {
        let payload = json!({
            "id": "u-42",
            "email": ["a@b.com"],
            "role": "owner",
        });
        let claims = claims_from(payload.clone());

        assert_eq!(claims.id(), Some(&json!("u-42")));
        assert_eq!(claims.user_id(), None);
        assert_eq!(claims.email(), None);
        assert_eq!(claims.role(), None);
        assert_eq!(claims.name(), None);
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[test]
    fn unknown_fields_round_trip() {
        let payload = json!({
            "id": 3,
            "email": "a@b.com",
            "role": "admin",
            "iat": 1_700_000_000,
            "tz": "Europe/Paris",
        });
        let claims = claims_from(payload.clone());
        assert_eq!(claims.get("tz"), Some(&json!("Europe/Paris")));
        assert_eq!(serde_json::to_value(&claims).unwrap(), payload);
    }

    #[test]
    fn expires_at_converts_seconds() {
        let claims = claims_with_exp(json!(1_700_000_000));
        assert_eq!(
            claims.expires_at(),
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn expires_at_is_none_out_of_range() {
        assert_eq!(claims_with_exp(json!(1e300)).expires_at(), None);
        assert_eq!(claims_with_exp(json!(-1e300)).expires_at(), None);
        assert_eq!(claims_with_exp(json!(u64::MAX)).expires_at(), None);

        // Far-future expiry still compares correctly.
        assert!(!is_expired(&claims_with_exp(json!(1e300))));
    }
}
