use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;

pub type CreativeId = TypedId<Creative>;

/// A single banner image belonging to a campaign. Only active creatives
/// participate in selection.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Creative {
    #[serde(rename = "_id")]
    pub id: CreativeId,
    pub campaign_id: CampaignId,
    pub name: String,
    pub image_url: String,
    pub image_width: i32,
    pub image_height: i32,
    pub click_url: String,
    pub alt_text: Option<String>,
    pub status: CreativeStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl TypedIdMarker for Creative {
    fn tag() -> &'static str {
        "CRT"
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreativeStatus {
    Active,
    Inactive,
}
