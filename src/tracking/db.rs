use async_trait::async_trait;
use mongodb::bson;
use mongodb::Database;

use crate::database::{MongoClickStore, MongoImpressionStore};
use crate::error::Error;

use super::{Click, Impression};

const IMPRESSIONS: &str = "impressions";
const CLICKS: &str = "clicks";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": IMPRESSIONS,
            "indexes": [
                { "key": { "campaign_id": 1, "timestamp": 1 }, "name": "by_campaign_timestamp" },
                { "key": { "user_id": 1, "campaign_id": 1, "timestamp": 1 }, "name": "by_user_campaign" },
            ]
        },
        None,
    )
    .await?;

    db.run_command(
        bson::doc! {
            "createIndexes": CLICKS,
            "indexes": [
                { "key": { "campaign_id": 1, "timestamp": 1 }, "name": "by_campaign_timestamp" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait ImpressionStore: Send + Sync {
    async fn insert_impression(&self, impression: &Impression) -> Result<(), Error>;
}

#[async_trait]
impl ImpressionStore for MongoImpressionStore {
    #[tracing::instrument(skip(self))]
    async fn insert_impression(&self, impression: &Impression) -> Result<(), Error> {
        self.insert_one(impression, None).await?;

        Ok(())
    }
}

#[async_trait]
pub trait ClickStore: Send + Sync {
    async fn insert_click(&self, click: &Click) -> Result<(), Error>;
}

#[async_trait]
impl ClickStore for MongoClickStore {
    #[tracing::instrument(skip(self))]
    async fn insert_click(&self, click: &Click) -> Result<(), Error> {
        self.insert_one(click, None).await?;

        Ok(())
    }
}
