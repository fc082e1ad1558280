//! Explicit call context.
//!
//! The wider platform routes requests per region; inside the settlement core
//! the region travels as an explicit parameter on every operation instead of
//! ambient thread-local state, so nothing here depends on call-site globals.

use serde::{Deserialize, Serialize};

/// Region/tenant tag threaded through every core call. Carried into audit
/// fields and structured logs; the core never branches on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionContext {
    pub region: String,
}

impl RegionContext {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl Default for RegionContext {
    fn default() -> Self {
        Self {
            region: "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_the_region_tag() {
        let ctx = RegionContext::new("sn");
        assert_eq!(ctx.region, "sn");
        assert_eq!(RegionContext::default().region, "default");
    }
}
