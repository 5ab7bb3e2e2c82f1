use async_trait::async_trait;
use mongodb::{Collection, Database as MongoDb};

use crate::campaign::db::CampaignStore;
use crate::campaign::Campaign;
use crate::creative::db::CreativeStore;
use crate::creative::Creative;
use crate::error::Error;
use crate::tracking::db::{ClickStore, ImpressionStore};
use crate::tracking::{Click, Impression};
use crate::{campaign, creative, tracking};

pub type MongoCampaignStore = Collection<Campaign>;
pub type MongoCreativeStore = Collection<Creative>;
pub type MongoImpressionStore = Collection<Impression>;
pub type MongoClickStore = Collection<Click>;

/// The storage collaborator: per-entity stores plus database-wide operations.
/// Managers only see this trait so tests can substitute `test::MockDatabase`.
#[async_trait]
pub trait Database: Send + Sync {
    fn campaigns(&self) -> &dyn CampaignStore;
    fn creatives(&self) -> &dyn CreativeStore;
    fn impressions(&self) -> &dyn ImpressionStore;
    fn clicks(&self) -> &dyn ClickStore;
    async fn drop(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    campaigns: Collection<Campaign>,
    creatives: Collection<Creative>,
    impressions: Collection<Impression>,
    clicks: Collection<Click>,
    db: MongoDb,
}

impl MongoDatabase {
    pub async fn initialize(db: MongoDb) -> Result<MongoDatabase, Error> {
        campaign::db::initialize(&db).await?;
        creative::db::initialize(&db).await?;
        tracking::db::initialize(&db).await?;

        Ok(MongoDatabase {
            campaigns: db.collection("campaigns"),
            creatives: db.collection("creatives"),
            impressions: db.collection("impressions"),
            clicks: db.collection("clicks"),
            db,
        })
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }

    fn creatives(&self) -> &dyn CreativeStore {
        &self.creatives
    }

    fn impressions(&self) -> &dyn ImpressionStore {
        &self.impressions
    }

    fn clicks(&self) -> &dyn ClickStore {
        &self.clicks
    }

    async fn drop(&self) -> Result<(), Error> {
        self.db.drop(None).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    use chrono::{DateTime, Utc};

    use crate::campaign::CampaignId;
    use crate::creative::CreativeId;

    /// Mock database whose store behavior is set per-test through `on_*`
    /// closure hooks. Unhooked calls panic so tests fail loudly when a manager
    /// touches a store it should not.
    pub struct MockDatabase {
        pub campaigns: MockCampaignStore,
        pub creatives: MockCreativeStore,
        pub impressions: MockImpressionStore,
        pub clicks: MockClickStore,
    }

    impl MockDatabase {
        pub fn new() -> MockDatabase {
            MockDatabase {
                campaigns: MockCampaignStore::new(),
                creatives: MockCreativeStore::new(),
                impressions: MockImpressionStore::new(),
                clicks: MockClickStore::new(),
            }
        }
    }

    #[async_trait]
    impl Database for MockDatabase {
        fn campaigns(&self) -> &dyn CampaignStore {
            &self.campaigns
        }

        fn creatives(&self) -> &dyn CreativeStore {
            &self.creatives
        }

        fn impressions(&self) -> &dyn ImpressionStore {
            &self.impressions
        }

        fn clicks(&self) -> &dyn ClickStore {
            &self.clicks
        }

        async fn drop(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    pub struct MockCampaignStore {
        pub on_insert_campaign: Box<dyn Fn(&Campaign) -> Result<(), Error> + Send + Sync>,
        pub on_fetch_servable_campaigns:
            Box<dyn Fn(DateTime<Utc>) -> Result<Vec<Campaign>, Error> + Send + Sync>,
        pub on_fetch_campaign_by_id:
            Box<dyn Fn(CampaignId) -> Result<Option<Campaign>, Error> + Send + Sync>,
        pub on_increment_impressions_served:
            Box<dyn Fn(CampaignId, DateTime<Utc>) -> Result<i64, Error> + Send + Sync>,
    }

    impl MockCampaignStore {
        fn new() -> MockCampaignStore {
            MockCampaignStore {
                on_insert_campaign: Box::new(|_| panic!("insert_campaign is not mocked")),
                on_fetch_servable_campaigns: Box::new(|_| {
                    panic!("fetch_servable_campaigns is not mocked")
                }),
                on_fetch_campaign_by_id: Box::new(|_| panic!("fetch_campaign_by_id is not mocked")),
                on_increment_impressions_served: Box::new(|_, _| {
                    panic!("increment_impressions_served is not mocked")
                }),
            }
        }
    }

    #[async_trait]
    impl CampaignStore for MockCampaignStore {
        async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
            (self.on_insert_campaign)(campaign)
        }

        async fn fetch_servable_campaigns(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<Campaign>, Error> {
            (self.on_fetch_servable_campaigns)(now)
        }

        async fn fetch_campaign_by_id(
            &self,
            campaign_id: CampaignId,
        ) -> Result<Option<Campaign>, Error> {
            (self.on_fetch_campaign_by_id)(campaign_id)
        }

        async fn increment_impressions_served(
            &self,
            campaign_id: CampaignId,
            now: DateTime<Utc>,
        ) -> Result<i64, Error> {
            (self.on_increment_impressions_served)(campaign_id, now)
        }
    }

    pub struct MockCreativeStore {
        pub on_insert_creative: Box<dyn Fn(&Creative) -> Result<(), Error> + Send + Sync>,
        pub on_fetch_creative_by_id:
            Box<dyn Fn(CreativeId) -> Result<Option<Creative>, Error> + Send + Sync>,
        pub on_fetch_active_creatives_by_campaign:
            Box<dyn Fn(CampaignId) -> Result<Vec<Creative>, Error> + Send + Sync>,
    }

    impl MockCreativeStore {
        fn new() -> MockCreativeStore {
            MockCreativeStore {
                on_insert_creative: Box::new(|_| panic!("insert_creative is not mocked")),
                on_fetch_creative_by_id: Box::new(|_| panic!("fetch_creative_by_id is not mocked")),
                on_fetch_active_creatives_by_campaign: Box::new(|_| {
                    panic!("fetch_active_creatives_by_campaign is not mocked")
                }),
            }
        }
    }

    #[async_trait]
    impl CreativeStore for MockCreativeStore {
        async fn insert_creative(&self, creative: &Creative) -> Result<(), Error> {
            (self.on_insert_creative)(creative)
        }

        async fn fetch_creative_by_id(
            &self,
            creative_id: CreativeId,
        ) -> Result<Option<Creative>, Error> {
            (self.on_fetch_creative_by_id)(creative_id)
        }

        async fn fetch_active_creatives_by_campaign(
            &self,
            campaign_id: CampaignId,
        ) -> Result<Vec<Creative>, Error> {
            (self.on_fetch_active_creatives_by_campaign)(campaign_id)
        }
    }

    pub struct MockImpressionStore {
        pub on_insert_impression: Box<dyn Fn(&Impression) -> Result<(), Error> + Send + Sync>,
    }

    impl MockImpressionStore {
        fn new() -> MockImpressionStore {
            MockImpressionStore {
                on_insert_impression: Box::new(|_| panic!("insert_impression is not mocked")),
            }
        }
    }

    #[async_trait]
    impl ImpressionStore for MockImpressionStore {
        async fn insert_impression(&self, impression: &Impression) -> Result<(), Error> {
            (self.on_insert_impression)(impression)
        }
    }

    pub struct MockClickStore {
        pub on_insert_click: Box<dyn Fn(&Click) -> Result<(), Error> + Send + Sync>,
    }

    impl MockClickStore {
        fn new() -> MockClickStore {
            MockClickStore {
                on_insert_click: Box::new(|_| panic!("insert_click is not mocked")),
            }
        }
    }

    #[async_trait]
    impl ClickStore for MockClickStore {
        async fn insert_click(&self, click: &Click) -> Result<(), Error> {
            (self.on_insert_click)(click)
        }
    }
}
