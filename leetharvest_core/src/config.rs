use crate::{Error, Result};

/// Tunables for a harvest pass.
///
/// The defaults are the production values; tests construct zero-delay
/// variants via struct update syntax.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Page size for the submission-history listing.
    pub page_size: usize,
    /// Upper bound on problems processed concurrently.
    pub max_in_flight: usize,
    /// Courtesy pause between history pages.
    pub page_delay_ms: u64,
    /// Courtesy pause after each submission-detail fetch.
    pub detail_delay_ms: u64,
    /// Courtesy pause after each problem settles.
    pub item_delay_ms: u64,
    /// Skip problems whose output file already exists.
    pub resume: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_in_flight: 25,
            page_delay_ms: 200,
            detail_delay_ms: 100,
            item_delay_ms: 100,
            resume: false,
        }
    }
}

impl HarvestConfig {
    #[tracing::instrument]
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidInput("page_size must be > 0".to_string()));
        }
        if self.max_in_flight == 0 {
            return Err(Error::InvalidInput(
                "max_in_flight must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(HarvestConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_bounds_rejected() {
        let cfg = HarvestConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidInput(_))));

        let cfg = HarvestConfig {
            max_in_flight: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidInput(_))));
    }
}
