//! Global settings singleton: campaign switches and start dates.

use crate::domain::{Campaign, Day};
use serde::{Deserialize, Serialize};

/// Activation state of one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignState {
    pub is_active: bool,
    /// Set when the campaign was switched on; decay is measured from here.
    pub start_date: Option<Day>,
}

impl CampaignState {
    pub fn inactive() -> Self {
        CampaignState {
            is_active: false,
            start_date: None,
        }
    }
}

/// The settings singleton, mutated by the admin surface and read by the
/// points calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub total_pools: i64,
    pub bootstrapping: CampaignState,
    pub early_season: CampaignState,
    pub meme_season: CampaignState,
}

impl GlobalSettings {
    pub fn campaign(&self, campaign: Campaign) -> CampaignState {
        match campaign {
            Campaign::Bootstrapping => self.bootstrapping,
            Campaign::EarlySeason => self.early_season,
            Campaign::MemeSeason => self.meme_season,
        }
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            total_pools: 0,
            bootstrapping: CampaignState::inactive(),
            early_season: CampaignState::inactive(),
            meme_season: CampaignState::inactive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_all_inactive() {
        let settings = GlobalSettings::default();
        for campaign in Campaign::ALL {
            assert!(!settings.campaign(campaign).is_active);
            assert!(settings.campaign(campaign).start_date.is_none());
        }
    }
}
