use actix_web::http::header;
use actix_web::{get, post, web::Data, web::Json, web::Path, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::campaign::CampaignId;
use crate::config::Config;
use crate::creative::CreativeId;
use crate::database::Database;
use crate::error::Error;
use crate::serving::LocationBody;

use super::guard::ReplayGuard;
use super::manager::{self, ClickRequest, ImpressionRequest};
use super::token::{TokenCodec, TokenPurpose};
use super::{ClickId, ImpressionId};

#[derive(Debug, Deserialize)]
pub struct ImpressionTrackingBody {
    pub ad_id: CreativeId,
    pub campaign_id: CampaignId,
    pub user_id: String,
    pub tracking_token: String,
    pub timestamp: DateTime<Utc>,
    pub location: Option<LocationBody>,
}

#[derive(Debug, Serialize)]
pub struct ImpressionTrackedBody {
    pub impression_id: ImpressionId,
    pub status: &'static str,
}

#[post("/ads/tracking/impression")]
pub async fn track_impression(
    db: Data<Box<dyn Database>>,
    codec: Data<TokenCodec>,
    guard: Data<ReplayGuard>,
    config: Data<Config>,
    body: Json<ImpressionTrackingBody>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    let (city, state) = match body.location {
        Some(location) => (location.city, location.state),
        None => (None, None),
    };

    let request = ImpressionRequest {
        creative_id: body.ad_id,
        campaign_id: body.campaign_id,
        user_id: body.user_id,
        tracking_token: body.tracking_token,
        timestamp: body.timestamp,
        city,
        state,
    };
    let impression_id = manager::track_impression(
        &**db.get_ref(),
        &codec,
        &guard,
        config.timestamp_tolerance_seconds,
        request,
    )
    .await?;

    Ok(HttpResponse::Created().json(ImpressionTrackedBody {
        impression_id,
        status: "tracked",
    }))
}

#[derive(Debug, Deserialize)]
pub struct ClickTrackingBody {
    pub ad_id: CreativeId,
    pub campaign_id: CampaignId,
    pub user_id: String,
    pub tracking_token: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ClickTrackedBody {
    pub click_id: Option<ClickId>,
    pub click_url: String,
    pub duplicate: bool,
}

#[post("/ads/tracking/click")]
pub async fn track_click(
    db: Data<Box<dyn Database>>,
    codec: Data<TokenCodec>,
    guard: Data<ReplayGuard>,
    config: Data<Config>,
    body: Json<ClickTrackingBody>,
) -> Result<Json<ClickTrackedBody>, Error> {
    let body = body.into_inner();

    let request = ClickRequest {
        creative_id: body.ad_id,
        campaign_id: body.campaign_id,
        user_id: body.user_id,
        tracking_token: body.tracking_token,
        timestamp: body.timestamp,
    };
    let outcome = manager::track_click(
        &**db.get_ref(),
        &codec,
        &guard,
        config.timestamp_tolerance_seconds,
        request,
    )
    .await?;

    Ok(Json(ClickTrackedBody {
        click_id: outcome.click_id(),
        duplicate: outcome.is_duplicate(),
        click_url: outcome.click_url().to_string(),
    }))
}

/// Click-through for clients that cannot POST, e.g. an `<a href>` wrapping the
/// banner. The token itself carries everything needed; the claims provide the
/// ids and serve time, and a synthetic user id stands in for the absent body.
#[get("/ads/tracking/click/{token}")]
pub async fn track_click_redirect(
    db: Data<Box<dyn Database>>,
    codec: Data<TokenCodec>,
    guard: Data<ReplayGuard>,
    config: Data<Config>,
    path: Path<String>,
) -> Result<HttpResponse, Error> {
    let token = path.into_inner();
    let claims = codec.verify(&token, TokenPurpose::Click)?;

    let user_id = format!(
        "redirect-{}",
        &Uuid::new_v4().to_simple().to_string()[..8]
    );
    let request = ClickRequest {
        creative_id: claims.creative_id,
        campaign_id: claims.campaign_id,
        user_id,
        tracking_token: token,
        timestamp: claims.issued_at(),
    };
    let outcome = manager::track_click(
        &**db.get_ref(),
        &codec,
        &guard,
        config.timestamp_tolerance_seconds,
        request,
    )
    .await?;

    Ok(HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, outcome.click_url().to_string()))
        .finish())
}
