use actix_web::{post, web::Data, web::Json};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::config::Config;
use crate::creative::CreativeId;
use crate::database::Database;
use crate::error::Error;
use crate::tracking::is_valid_user_id;
use crate::tracking::token::TokenCodec;

use super::manager;
use super::select::AdContext;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LocationBody {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdRequestBody {
    pub user_id: String,
    pub placement: String,
    pub location: Option<LocationBody>,
}

#[derive(Debug, Serialize)]
pub struct AdBody {
    pub ad_id: CreativeId,
    pub campaign_id: CampaignId,
    pub image_url: String,
    pub image_width: i32,
    pub image_height: i32,
    pub click_url: String,
    pub alt_text: String,
    pub impression_tracking_token: String,
    pub click_tracking_token: String,
}

#[derive(Debug, Serialize)]
pub struct NoAdBody {
    pub fallback: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AdRequestResponse {
    Ad(Box<AdBody>),
    NoAd(NoAdBody),
}

#[post("/ads/request")]
pub async fn request_ad(
    db: Data<Box<dyn Database>>,
    codec: Data<TokenCodec>,
    config: Data<Config>,
    body: Json<AdRequestBody>,
) -> Result<Json<AdRequestResponse>, Error> {
    let body = body.into_inner();

    if !is_valid_user_id(&body.user_id) {
        return Err(Error::InvalidUserId {
            user_id: body.user_id,
        });
    }
    if body.placement.trim().is_empty() {
        return Err(Error::InvalidPlacement);
    }

    let context = ad_context(body.location);

    let selected = manager::select_ad(&**db.get_ref(), &codec, &context, config.selection_timeout).await?;

    let response = match selected {
        Some(ad) => AdRequestResponse::Ad(Box::new(AdBody {
            ad_id: ad.creative.id,
            campaign_id: ad.campaign.id,
            image_url: ad.creative.image_url,
            image_width: ad.creative.image_width,
            image_height: ad.creative.image_height,
            click_url: ad.creative.click_url,
            alt_text: ad.creative.alt_text.unwrap_or(ad.campaign.name),
            impression_tracking_token: ad.impression_token,
            click_tracking_token: ad.click_token,
        })),
        None => AdRequestResponse::NoAd(NoAdBody {
            fallback: "adsense",
            message: "No ad available, use fallback",
        }),
    };

    Ok(Json(response))
}

/// Normalizes the optional request location into match keys. Blank fields are
/// dropped entirely and two-letter country codes are uppercased to match the
/// ISO form used in targeting lists; state and city values are matched as
/// given.
fn ad_context(location: Option<LocationBody>) -> AdContext {
    let location = match location {
        Some(location) => location,
        None => return AdContext::default(),
    };

    let normalize = |field: Option<String>| {
        field
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    AdContext {
        country: normalize(location.country).map(|country| {
            if country.len() == 2 {
                country.to_uppercase()
            } else {
                country
            }
        }),
        state: normalize(location.state),
        city: normalize(location.city),
    }
}
