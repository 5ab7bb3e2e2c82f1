use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::campaign::Campaign;
use crate::creative::Creative;
use crate::database::Database;
use crate::error::Error;
use crate::tracking::token::{TokenCodec, TokenPurpose};

use super::select::{self, AdContext};

#[derive(Clone, Debug)]
pub struct SelectedAd {
    pub campaign: Campaign,
    pub creative: Creative,
    pub impression_token: String,
    pub click_token: String,
}

/// Picks a campaign and creative for one request and issues its tracking
/// tokens: servable scan (under a deadline) → geo filter with fallback →
/// weighted campaign draw → uniform creative draw → token issuance → atomic
/// served-counter increment. Every "nothing to serve" outcome is `Ok(None)`,
/// never an error; the caller falls back to its alternate ad source.
#[tracing::instrument(skip(db, codec))]
pub async fn select_ad(
    db: &dyn Database,
    codec: &TokenCodec,
    context: &AdContext,
    deadline: Duration,
) -> Result<Option<SelectedAd>, Error> {
    let now = Utc::now();

    let campaigns = match timeout(deadline, db.campaigns().fetch_servable_campaigns(now)).await {
        Ok(campaigns) => campaigns?,
        Err(_) => {
            warn!("servable campaign scan missed its deadline, serving no ad");
            return Ok(None);
        }
    };

    let eligible = select::filter_geo(campaigns, context);

    let campaign = {
        let mut rng = rand::thread_rng();
        match select::weighted_pick(&mut rng, &eligible) {
            Some(campaign) => campaign.clone(),
            None => {
                debug!("no eligible campaigns, serving no ad");
                return Ok(None);
            }
        }
    };

    let creatives = db
        .creatives()
        .fetch_active_creatives_by_campaign(campaign.id)
        .await?;
    let creative = {
        let mut rng = rand::thread_rng();
        match select::pick_creative(&mut rng, creatives) {
            Some(creative) => creative,
            None => {
                debug!(campaign_id = ?campaign.id, "campaign has no active creatives, serving no ad");
                return Ok(None);
            }
        }
    };

    let impression_token = codec.issue(creative.id, campaign.id, now, TokenPurpose::Impression)?;
    let click_token = codec.issue(creative.id, campaign.id, now, TokenPurpose::Click)?;

    // The check above and this increment are not one transaction, so a burst
    // of concurrent selections can overshoot the budget by at most the number
    // of requests in flight.
    let served = db
        .campaigns()
        .increment_impressions_served(campaign.id, now)
        .await?;
    if served > campaign.impression_budget {
        warn!(
            campaign_id = ?campaign.id,
            served,
            budget = campaign.impression_budget,
            "campaign served past its impression budget"
        );
    }

    Ok(Some(SelectedAd {
        campaign,
        creative,
        impression_token,
        click_token,
    }))
}
