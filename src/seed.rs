use chrono::{Duration, Utc};
use tracing::info;

use crate::campaign::{Campaign, CampaignStatus};
use crate::creative::{Creative, CreativeStatus};
use crate::database::Database;
use crate::error::Error;

/// Drops the database and loads a small demo catalog. Development only.
pub async fn seed(db: &dyn Database) -> Result<(), Error> {
    db.drop().await?;

    let now = Utc::now();

    let evergreen = Campaign {
        id: "CPN-423B229A-DBBF-4D78-BE97-6A4268A97652".parse().unwrap(),
        advertiser_id: "ADV-36C26E4F-6B99-4A60-BE0C-C777C2FF2B27".parse().unwrap(),
        name: "Glowing Beverage Blitz".to_string(),
        status: CampaignStatus::Active,
        start_date: now - Duration::days(7),
        end_date: now + Duration::days(90),
        priority: 8,
        impression_budget: 100_000,
        impressions_served: 0,
        target_countries: vec![],
        target_states: vec![],
        target_cities: vec![],
        last_served_at: None,
        created_at: now,
        modified_at: now,
    };
    let regional = Campaign {
        id: "CPN-9C29F6B7-3E1B-4C4E-B646-639EB3C8E34C".parse().unwrap(),
        advertiser_id: "ADV-36C26E4F-6B99-4A60-BE0C-C777C2FF2B27".parse().unwrap(),
        name: "Empire State Espresso".to_string(),
        status: CampaignStatus::Active,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(30),
        priority: 5,
        impression_budget: 10_000,
        impressions_served: 0,
        target_countries: vec!["US".to_string()],
        target_states: vec!["NY".to_string()],
        target_cities: vec![],
        last_served_at: None,
        created_at: now,
        modified_at: now,
    };
    let paused = Campaign {
        id: "CPN-16E77539-8873-4C8A-BCA3-2036010474AD".parse().unwrap(),
        advertiser_id: "ADV-D9D9498D-64B8-4591-A43C-A2B1A8EF6D01".parse().unwrap(),
        name: "Midnight Mattress Markdown".to_string(),
        status: CampaignStatus::Paused,
        start_date: now - Duration::days(14),
        end_date: now + Duration::days(14),
        priority: 10,
        impression_budget: 50_000,
        impressions_served: 1_204,
        target_countries: vec![],
        target_states: vec![],
        target_cities: vec![],
        last_served_at: Some(now - Duration::days(3)),
        created_at: now,
        modified_at: now,
    };

    for campaign in [&evergreen, &regional, &paused] {
        db.campaigns().insert_campaign(campaign).await?;
    }

    let creatives = vec![
        Creative {
            id: "CRT-07AD1F11-8A82-4BFF-A1DA-8EB1B3C6F823".parse().unwrap(),
            campaign_id: evergreen.id,
            name: "Leaderboard".to_string(),
            image_url: "https://cdn.example.com/beverage/leaderboard.jpg".to_string(),
            image_width: 728,
            image_height: 90,
            click_url: "https://beverage.example.com/offers".to_string(),
            alt_text: Some("Glowing beverages on ice".to_string()),
            status: CreativeStatus::Active,
            created_at: now,
            modified_at: now,
        },
        Creative {
            id: "CRT-20C2A1E0-0F86-43B7-9D97-C8C1F2D8E915".parse().unwrap(),
            campaign_id: evergreen.id,
            name: "Medium Rectangle".to_string(),
            image_url: "https://cdn.example.com/beverage/rectangle.jpg".to_string(),
            image_width: 300,
            image_height: 250,
            click_url: "https://beverage.example.com/offers".to_string(),
            alt_text: None,
            status: CreativeStatus::Active,
            created_at: now,
            modified_at: now,
        },
        Creative {
            id: "CRT-5F0006AA-0B82-47AA-B7D7-0D2E2A1C8E77".parse().unwrap(),
            campaign_id: regional.id,
            name: "Skyscraper".to_string(),
            image_url: "https://cdn.example.com/espresso/skyscraper.jpg".to_string(),
            image_width: 160,
            image_height: 600,
            click_url: "https://espresso.example.com/ny".to_string(),
            alt_text: Some("Espresso over the skyline".to_string()),
            status: CreativeStatus::Active,
            created_at: now,
            modified_at: now,
        },
        Creative {
            id: "CRT-A7E2B1C9-20F2-4A4B-9B70-3E98F6D3C210".parse().unwrap(),
            campaign_id: regional.id,
            name: "Retired Banner".to_string(),
            image_url: "https://cdn.example.com/espresso/retired.jpg".to_string(),
            image_width: 468,
            image_height: 60,
            click_url: "https://espresso.example.com/ny".to_string(),
            alt_text: None,
            status: CreativeStatus::Inactive,
            created_at: now,
            modified_at: now,
        },
    ];

    for creative in &creatives {
        db.creatives().insert_creative(creative).await?;
    }

    info!(
        campaigns = 3,
        creatives = creatives.len(),
        "seeded demo catalog"
    );
    Ok(())
}
