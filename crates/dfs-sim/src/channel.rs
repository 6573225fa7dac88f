//! Channel plan for the simulated wireless stack

use serde::{Deserialize, Serialize};

/// One channel in a plan, as configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Center frequency in MHz
    pub frequency: u32,
    /// Whether radar detection rules apply on this channel
    pub dfs: bool,
}

impl ChannelSpec {
    /// A channel without radar obligations
    pub fn non_dfs(frequency: u32) -> Self {
        Self {
            frequency,
            dfs: false,
        }
    }

    /// A channel subject to radar detection
    pub fn dfs(frequency: u32) -> Self {
        Self {
            frequency,
            dfs: true,
        }
    }
}

/// The 20 MHz 5 GHz channels of a typical regulatory domain: UNII-1 without
/// DFS, UNII-2 and UNII-2e with DFS
pub fn default_5ghz_plan() -> Vec<ChannelSpec> {
    let unii1 = [5180, 5200, 5220, 5240].map(ChannelSpec::non_dfs);
    let unii2 = [5260, 5280, 5300, 5320].map(ChannelSpec::dfs);
    let unii2e = [
        5500, 5520, 5540, 5560, 5580, 5600, 5620, 5640, 5660, 5680, 5700,
    ]
    .map(ChannelSpec::dfs);

    unii1.into_iter().chain(unii2).chain(unii2e).collect()
}

/// Live state of one channel in the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimChannel {
    /// Center frequency in MHz
    pub frequency: u32,
    /// Whether radar detection rules apply
    pub dfs: bool,
    /// Whether the channel is currently on the NOL
    pub in_nol: bool,
}

impl SimChannel {
    /// Whether the channel may be used right now
    pub fn is_usable(&self) -> bool {
        !self.in_nol
    }
}

impl From<ChannelSpec> for SimChannel {
    fn from(spec: ChannelSpec) -> Self {
        Self {
            frequency: spec.frequency,
            dfs: spec.dfs,
            in_nol: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = default_5ghz_plan();
        assert_eq!(plan.len(), 19);
        assert!(!plan[0].dfs);
        assert_eq!(plan[0].frequency, 5180);
        assert!(plan.iter().filter(|c| c.dfs).all(|c| c.frequency >= 5260));
    }

    #[test]
    fn test_channel_json_shape() {
        let spec: ChannelSpec = serde_json::from_str(r#"{"frequency":5500,"dfs":true}"#).unwrap();
        assert_eq!(spec, ChannelSpec::dfs(5500));
        assert!(SimChannel::from(spec).is_usable());
    }
}
