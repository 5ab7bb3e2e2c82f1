use rand::Rng;

use crate::campaign::Campaign;
use crate::creative::Creative;

/// Geo fields supplied with an ad request. Absent fields simply do not
/// participate in targeting.
#[derive(Clone, Debug, Default)]
pub struct AdContext {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

/// A campaign with no targeting matches every context. A targeted campaign
/// matches if any supplied context field is contained in the corresponding
/// target set (OR across dimensions).
pub fn geo_matches(campaign: &Campaign, context: &AdContext) -> bool {
    if !campaign.is_geo_targeted() {
        return true;
    }

    let by_country = matches!(&context.country, Some(country) if campaign.target_countries.iter().any(|t| t == country));
    let by_state = matches!(&context.state, Some(state) if campaign.target_states.iter().any(|t| t == state));
    let by_city = matches!(&context.city, Some(city) if campaign.target_cities.iter().any(|t| t == city));

    by_country || by_state || by_city
}

/// Applies geo targeting to an already-servable set. If the filter empties a
/// non-empty set, the unfiltered set is served instead: showing something
/// beats showing nothing. An empty input stays empty so callers fall back to
/// their alternate ad source.
pub fn filter_geo(campaigns: Vec<Campaign>, context: &AdContext) -> Vec<Campaign> {
    let (matched, unmatched): (Vec<Campaign>, Vec<Campaign>) = campaigns
        .into_iter()
        .partition(|campaign| geo_matches(campaign, context));

    if matched.is_empty() {
        unmatched
    } else {
        matched
    }
}

/// Priorities at or below zero still get weight 1 so every eligible campaign
/// has a non-zero chance.
pub fn draw_weight(priority: i32) -> u32 {
    priority.max(1) as u32
}

/// Single weighted random draw; over many draws a campaign's share approaches
/// weight / total weight. No fairness state beyond the draw itself.
pub fn weighted_pick<'a, R: Rng>(rng: &mut R, campaigns: &'a [Campaign]) -> Option<&'a Campaign> {
    let total: u32 = campaigns
        .iter()
        .map(|campaign| draw_weight(campaign.priority))
        .sum();
    if total == 0 {
        return None;
    }

    let mut roll = rng.gen_range(0..total);
    for campaign in campaigns {
        let weight = draw_weight(campaign.priority);
        if roll < weight {
            return Some(campaign);
        }
        roll -= weight;
    }

    None
}

/// Uniform draw among the chosen campaign's active creatives.
pub fn pick_creative<R: Rng>(rng: &mut R, mut creatives: Vec<Creative>) -> Option<Creative> {
    if creatives.is_empty() {
        return None;
    }

    let index = rng.gen_range(0..creatives.len());
    Some(creatives.swap_remove(index))
}
