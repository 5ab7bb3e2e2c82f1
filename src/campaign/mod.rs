use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};
use crate::utils::optional_chrono_datetime_as_bson_datetime;

pub mod db;

pub type CampaignId = TypedId<Campaign>;
pub type AdvertiserId = TypedId<Advertiser>;

/// Advertisers are managed by an external admin system; campaigns only carry a
/// reference to one.
pub enum Advertiser {}

impl TypedIdMarker for Advertiser {
    fn tag() -> &'static str {
        "ADV"
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: CampaignId,
    pub advertiser_id: AdvertiserId,
    pub name: String,
    pub status: CampaignStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub priority: i32,
    pub impression_budget: i64,
    pub impressions_served: i64,
    #[serde(default)]
    pub target_countries: Vec<String>,
    #[serde(default)]
    pub target_states: Vec<String>,
    #[serde(default)]
    pub target_cities: Vec<String>,
    #[serde(default, with = "optional_chrono_datetime_as_bson_datetime")]
    pub last_served_at: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Campaign {
    pub fn is_geo_targeted(&self) -> bool {
        !self.target_countries.is_empty()
            || !self.target_states.is_empty()
            || !self.target_cities.is_empty()
    }
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CPN"
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use mongodb::bson;

    #[test]
    fn deserializes_documents_without_optional_fields() {
        let now = Utc::now();
        let campaign = Campaign {
            id: CampaignId::new(),
            advertiser_id: AdvertiserId::new(),
            name: "Glowing Beverage Blitz".to_string(),
            status: CampaignStatus::Active,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(30),
            priority: 5,
            impression_budget: 100,
            impressions_served: 0,
            target_countries: vec![],
            target_states: vec![],
            target_cities: vec![],
            last_served_at: None,
            created_at: now,
            modified_at: now,
        };

        // Documents written by other tools may skip never-set fields entirely.
        let mut document = bson::to_document(&campaign).unwrap();
        document.remove("last_served_at");
        document.remove("target_states");

        let parsed: Campaign = bson::from_document(document).unwrap();

        assert_eq!(parsed.id, campaign.id);
        assert_eq!(parsed.last_served_at, None);
        assert!(parsed.target_states.is_empty());
    }
}
