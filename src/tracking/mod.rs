use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::creative::CreativeId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod guard;
pub mod manager;
pub mod token;
pub use endpoints::*;

pub type ImpressionId = TypedId<Impression>;
pub type ClickId = TypedId<Click>;

/// Append-only record of an ad being displayed. Written exactly once per
/// redeemed impression token.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Impression {
    #[serde(rename = "_id")]
    pub id: ImpressionId,
    pub creative_id: CreativeId,
    pub campaign_id: CampaignId,
    pub user_id: String,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TypedIdMarker for Impression {
    fn tag() -> &'static str {
        "IMP"
    }
}

/// Append-only record of an ad being clicked. Written only on the first valid
/// redemption of a click token; duplicate redemptions still redirect.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Click {
    #[serde(rename = "_id")]
    pub id: ClickId,
    pub creative_id: CreativeId,
    pub campaign_id: CampaignId,
    pub user_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TypedIdMarker for Click {
    fn tag() -> &'static str {
        "CLK"
    }
}

/// Opaque user/device identifiers: at least one alphanumeric character,
/// alphanumeric plus `-`/`_` only, at most 100 characters.
pub fn is_valid_user_id(user_id: &str) -> bool {
    user_id.len() <= 100
        && user_id.chars().any(|c| c.is_ascii_alphanumeric())
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_user_ids() {
        assert!(is_valid_user_id("user-123"));
        assert!(is_valid_user_id("device_abc_xyz"));
        assert!(is_valid_user_id("a"));
    }

    #[test]
    fn rejects_malformed_user_ids() {
        assert!(!is_valid_user_id(""));
        assert!(!is_valid_user_id("---"));
        assert!(!is_valid_user_id("user 123"));
        assert!(!is_valid_user_id("user@host"));
        assert!(!is_valid_user_id(&"x".repeat(101)));
    }
}
