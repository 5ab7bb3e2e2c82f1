use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Database;

use crate::database::MongoCampaignStore;
use crate::error::Error;

use super::{Campaign, CampaignId};

const CAMPAIGNS: &str = "campaigns";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CAMPAIGNS,
            "indexes": [
                { "key": { "status": 1, "start_date": 1, "end_date": 1 }, "name": "by_serving_window" },
                { "key": { "priority": -1 }, "name": "by_priority" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    /// Campaigns that pass the status/window/budget predicate at `now`. Geo
    /// targeting is applied by the caller.
    async fn fetch_servable_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, Error>;

    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error>;

    /// Advances the served counter by one and refreshes `last_served_at` as a
    /// single server-side update, returning the new count. This is the only
    /// write path for the counter; a read-modify-write here would lose
    /// increments under concurrent selections.
    async fn increment_impressions_served(
        &self,
        campaign_id: CampaignId,
        now: DateTime<Utc>,
    ) -> Result<i64, Error>;
}

#[async_trait]
impl CampaignStore for MongoCampaignStore {
    #[tracing::instrument(skip(self))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.insert_one(campaign, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_servable_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, Error> {
        let now = bson::DateTime::from_chrono(now);
        let campaigns: Vec<Campaign> = self
            .find(
                bson::doc! {
                    "status": "active",
                    "start_date": { "$lte": now },
                    "end_date": { "$gt": now },
                    "$expr": { "$lt": ["$impressions_served", "$impression_budget"] },
                },
                None,
            )
            .await?
            .try_collect()
            .await?;

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        let campaign: Option<Campaign> =
            self.find_one(bson::doc! { "_id": campaign_id }, None).await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn increment_impressions_served(
        &self,
        campaign_id: CampaignId,
        now: DateTime<Utc>,
    ) -> Result<i64, Error> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let campaign: Option<Campaign> = self
            .find_one_and_update(
                bson::doc! { "_id": campaign_id },
                bson::doc! {
                    "$inc": { "impressions_served": 1 },
                    "$set": { "last_served_at": bson::DateTime::from_chrono(now) },
                },
                options,
            )
            .await?;

        campaign
            .map(|campaign| campaign.impressions_served)
            .ok_or(Error::CampaignDoesNotExist { campaign_id })
    }
}
