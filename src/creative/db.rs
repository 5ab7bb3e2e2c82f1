use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson;
use mongodb::Database;

use crate::campaign::CampaignId;
use crate::database::MongoCreativeStore;
use crate::error::Error;

use super::{Creative, CreativeId};

const CREATIVES: &str = "creatives";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CREATIVES,
            "indexes": [
                { "key": { "campaign_id": 1, "status": 1 }, "name": "by_campaign_id" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait CreativeStore: Send + Sync {
    async fn insert_creative(&self, creative: &Creative) -> Result<(), Error>;

    async fn fetch_creative_by_id(
        &self,
        creative_id: CreativeId,
    ) -> Result<Option<Creative>, Error>;

    async fn fetch_active_creatives_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Creative>, Error>;
}

#[async_trait]
impl CreativeStore for MongoCreativeStore {
    #[tracing::instrument(skip(self))]
    async fn insert_creative(&self, creative: &Creative) -> Result<(), Error> {
        self.insert_one(creative, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_creative_by_id(
        &self,
        creative_id: CreativeId,
    ) -> Result<Option<Creative>, Error> {
        let creative: Option<Creative> =
            self.find_one(bson::doc! { "_id": creative_id }, None).await?;

        Ok(creative)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_active_creatives_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Creative>, Error> {
        let creatives: Vec<Creative> = self
            .find(
                bson::doc! { "campaign_id": campaign_id, "status": "active" },
                None,
            )
            .await?
            .try_collect()
            .await?;

        Ok(creatives)
    }
}
