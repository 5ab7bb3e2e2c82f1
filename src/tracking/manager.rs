use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::campaign::CampaignId;
use crate::creative::{Creative, CreativeId, CreativeStatus};
use crate::database::Database;
use crate::error::Error;

use super::guard::ReplayGuard;
use super::token::{TokenClaims, TokenCodec, TokenPurpose};
use super::{is_valid_user_id, Click, ClickId, Impression, ImpressionId};

#[derive(Clone, Debug)]
pub struct ImpressionRequest {
    pub creative_id: CreativeId,
    pub campaign_id: CampaignId,
    pub user_id: String,
    pub tracking_token: String,
    pub timestamp: DateTime<Utc>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ClickRequest {
    pub creative_id: CreativeId,
    pub campaign_id: CampaignId,
    pub user_id: String,
    pub tracking_token: String,
    pub timestamp: DateTime<Utc>,
}

/// A click redemption always resolves to a destination so the browser can be
/// redirected; only the first redemption of a token writes a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    Recorded { click_id: ClickId, click_url: String },
    Duplicate { click_url: String },
}

impl ClickOutcome {
    pub fn click_url(&self) -> &str {
        match self {
            ClickOutcome::Recorded { click_url, .. } => click_url,
            ClickOutcome::Duplicate { click_url } => click_url,
        }
    }

    pub fn click_id(&self) -> Option<ClickId> {
        match self {
            ClickOutcome::Recorded { click_id, .. } => Some(*click_id),
            ClickOutcome::Duplicate { .. } => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, ClickOutcome::Duplicate { .. })
    }
}

/// Records one impression for a verified, never-before-redeemed impression
/// token. The replay guard is consulted twice: an early read to reject obvious
/// replays before hitting the database, and an atomic consume immediately
/// before the insert so two concurrent redemptions cannot both record.
#[tracing::instrument(skip(db, codec, guard, request), fields(creative_id = %request.creative_id))]
pub async fn track_impression(
    db: &dyn Database,
    codec: &TokenCodec,
    guard: &ReplayGuard,
    tolerance_seconds: i64,
    request: ImpressionRequest,
) -> Result<ImpressionId, Error> {
    let claims = codec.verify(&request.tracking_token, TokenPurpose::Impression)?;
    check_claims(&claims, request.creative_id, request.campaign_id)?;

    if guard.seen(&request.tracking_token) {
        return Err(Error::DuplicateTrackingToken);
    }

    if !is_valid_user_id(&request.user_id) {
        return Err(Error::InvalidUserId {
            user_id: request.user_id,
        });
    }

    if !within_tolerance(request.timestamp, tolerance_seconds) {
        return Err(Error::StaleTimestamp {
            timestamp: request.timestamp,
        });
    }

    let creative = fetch_creative(db, claims.creative_id).await?;
    if creative.status != CreativeStatus::Active {
        return Err(Error::CreativeNotActive {
            creative_id: creative.id,
        });
    }
    assert_campaign_exists(db, claims.campaign_id).await?;

    if !guard.try_consume(&request.tracking_token) {
        return Err(Error::DuplicateTrackingToken);
    }

    let impression = Impression {
        id: ImpressionId::new(),
        creative_id: claims.creative_id,
        campaign_id: claims.campaign_id,
        user_id: request.user_id,
        city: request.city,
        state: request.state,
        timestamp: request.timestamp,
        created_at: Utc::now(),
    };

    if let Err(err) = db.impressions().insert_impression(&impression).await {
        // A retry of the same token must not be rejected as a duplicate when
        // nothing was recorded.
        guard.release(&request.tracking_token);
        return Err(err);
    }

    info!(impression_id = %impression.id, "recorded impression");
    Ok(impression.id)
}

/// Records one click for a verified click token and resolves its redirect
/// destination. Replayed tokens and stale timestamps degrade softly: the user
/// still gets their redirect, only the record is skipped or annotated.
#[tracing::instrument(skip(db, codec, guard, request), fields(creative_id = %request.creative_id))]
pub async fn track_click(
    db: &dyn Database,
    codec: &TokenCodec,
    guard: &ReplayGuard,
    tolerance_seconds: i64,
    request: ClickRequest,
) -> Result<ClickOutcome, Error> {
    let claims = codec.verify(&request.tracking_token, TokenPurpose::Click)?;
    check_claims(&claims, request.creative_id, request.campaign_id)?;

    let creative = fetch_creative(db, claims.creative_id).await?;
    if creative.status != CreativeStatus::Active {
        return Err(Error::CreativeNotActive {
            creative_id: creative.id,
        });
    }

    if guard.seen(&request.tracking_token) {
        info!("duplicate click token, redirecting without a record");
        return Ok(ClickOutcome::Duplicate {
            click_url: creative.click_url,
        });
    }

    if !is_valid_user_id(&request.user_id) {
        return Err(Error::InvalidUserId {
            user_id: request.user_id,
        });
    }

    if !within_tolerance(request.timestamp, tolerance_seconds) {
        warn!(timestamp = %request.timestamp, "click timestamp outside tolerance, recording anyway");
    }

    assert_campaign_exists(db, claims.campaign_id).await?;

    if !guard.try_consume(&request.tracking_token) {
        return Ok(ClickOutcome::Duplicate {
            click_url: creative.click_url,
        });
    }

    let click = Click {
        id: ClickId::new(),
        creative_id: claims.creative_id,
        campaign_id: claims.campaign_id,
        user_id: request.user_id,
        timestamp: request.timestamp,
        created_at: Utc::now(),
    };

    if let Err(err) = db.clicks().insert_click(&click).await {
        guard.release(&request.tracking_token);
        return Err(err);
    }

    info!(click_id = %click.id, "recorded click");
    Ok(ClickOutcome::Recorded {
        click_id: click.id,
        click_url: creative.click_url,
    })
}

fn check_claims(
    claims: &TokenClaims,
    request_creative_id: CreativeId,
    request_campaign_id: CampaignId,
) -> Result<(), Error> {
    if claims.creative_id != request_creative_id || claims.campaign_id != request_campaign_id {
        return Err(Error::TrackingTokenClaimMismatch {
            request_creative_id,
            request_campaign_id,
        });
    }
    Ok(())
}

fn within_tolerance(timestamp: DateTime<Utc>, tolerance_seconds: i64) -> bool {
    let skew = Utc::now() - timestamp;
    skew.num_seconds().abs() <= Duration::seconds(tolerance_seconds).num_seconds()
}

async fn fetch_creative(db: &dyn Database, creative_id: CreativeId) -> Result<Creative, Error> {
    db.creatives()
        .fetch_creative_by_id(creative_id)
        .await?
        .ok_or(Error::CreativeDoesNotExist { creative_id })
}

async fn assert_campaign_exists(db: &dyn Database, campaign_id: CampaignId) -> Result<(), Error> {
    db.campaigns()
        .fetch_campaign_by_id(campaign_id)
        .await?
        .map(|_| ())
        .ok_or(Error::CampaignDoesNotExist { campaign_id })
}
