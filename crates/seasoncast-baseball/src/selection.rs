// Feature-set policy: which prior-season statistics feed each target.

use std::collections::{BTreeSet, HashMap};

use seasoncast_core::catalog::{CatalogError, TargetStat};
use tracing::info;

/// Whether a target's own previous-season value is one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorValue {
    Included,
    Excluded,
}

/// Ordered inputs for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub target: TargetStat,
    pub inputs: Vec<String>,
    pub prior_value: PriorValue,
}

impl FeatureSet {
    fn new(target: TargetStat, inputs: &[&str]) -> Self {
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let prior_value = prior_value_of(target, &inputs);
        Self {
            target,
            inputs,
            prior_value,
        }
    }
}

fn prior_value_of(target: TargetStat, inputs: &[String]) -> PriorValue {
    if inputs.iter().any(|i| i == target.column()) {
        PriorValue::Included
    } else {
        PriorValue::Excluded
    }
}

/// Target statistic to curated input list. Owned and passed explicitly; one
/// policy is fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePolicy {
    sets: HashMap<TargetStat, FeatureSet>,
}

impl FeaturePolicy {
    /// The canonical table. HR, AVG and OPS include the target's prior value;
    /// wRC+ projects from its wOBA components only.
    pub fn canonical() -> Self {
        let sets = [
            FeatureSet::new(
                TargetStat::Hr,
                &[
                    "Age", "PA", "HR", "ISO", "FB%", "HR/FB", "Barrel%", "HardHit%", "EV", "Pull%",
                ],
            ),
            FeatureSet::new(
                TargetStat::Avg,
                &[
                    "Age", "PA", "AVG", "K%", "Contact%", "BABIP", "LD%", "Hard%", "Soft%", "xBA",
                ],
            ),
            FeatureSet::new(
                TargetStat::Ops,
                &[
                    "Age", "PA", "OPS", "wRC+", "BB%", "K%", "ISO", "BABIP", "HardHit%",
                    "Barrel%", "xwOBA",
                ],
            ),
            FeatureSet::new(
                TargetStat::WrcPlus,
                &[
                    "Age", "PA", "wOBA", "BB%", "K%", "ISO", "AVG", "BABIP", "Barrel%", "HardHit%",
                ],
            ),
        ];
        Self {
            sets: sets.into_iter().map(|s| (s.target, s)).collect(),
        }
    }

    /// Canonical table with per-target input lists replaced. Keys are target
    /// names as written in configuration.
    pub fn with_overrides(overrides: &HashMap<String, Vec<String>>) -> Result<Self, CatalogError> {
        let mut policy = Self::canonical();
        for (name, inputs) in overrides {
            let target: TargetStat = name.parse()?;
            let prior_value = prior_value_of(target, inputs);
            info!(
                "feature override for {}: {} inputs, prior value {:?}",
                target,
                inputs.len(),
                prior_value
            );
            policy.sets.insert(
                target,
                FeatureSet {
                    target,
                    inputs: inputs.clone(),
                    prior_value,
                },
            );
        }
        Ok(policy)
    }

    /// The feature set for `target`.
    pub fn feature_set(&self, target: TargetStat) -> &FeatureSet {
        // Every constructor populates all four targets.
        &self.sets[&target]
    }

    /// Ordered input statistic names for `target`.
    pub fn select(&self, target: TargetStat) -> &[String] {
        &self.feature_set(target).inputs
    }

    /// Parse a target name and select its inputs.
    pub fn select_by_name(&self, name: &str) -> Result<&[String], CatalogError> {
        let target: TargetStat = name.parse()?;
        Ok(self.select(target))
    }

    /// Every statistic any feature set or target refers to, sorted.
    pub fn tracked_statistics(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        for set in self.sets.values() {
            names.extend(set.inputs.iter().cloned());
            names.insert(set.target.column().to_string());
        }
        names.into_iter().collect()
    }
}

impl Default for FeaturePolicy {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_table_covers_every_target() {
        let policy = FeaturePolicy::canonical();
        for target in TargetStat::ALL {
            assert!(!policy.select(target).is_empty(), "{target} has no inputs");
        }
        assert_eq!(policy.select(TargetStat::Hr)[2], "HR");
        assert_eq!(policy.select(TargetStat::Ops).len(), 11);
    }

    #[test]
    fn prior_value_flag_matches_inputs() {
        let policy = FeaturePolicy::canonical();
        for target in TargetStat::ALL {
            let set = policy.feature_set(target);
            let contains = set.inputs.iter().any(|i| i == target.column());
            assert_eq!(contains, set.prior_value == PriorValue::Included, "{target}");
        }
        assert_eq!(policy.feature_set(TargetStat::WrcPlus).prior_value, PriorValue::Excluded);
        assert_eq!(policy.feature_set(TargetStat::Hr).prior_value, PriorValue::Included);
    }

    #[test]
    fn select_by_name_rejects_unknown_target() {
        let policy = FeaturePolicy::canonical();
        let err = policy.select_by_name("FOO").unwrap_err();
        assert_eq!(err, CatalogError::UnknownTargetStatistic("FOO".into()));
        assert_eq!(policy.select_by_name("wrc_plus").unwrap().len(), 10);
    }

    #[test]
    fn overrides_replace_inputs_and_recompute_flag() {
        let overrides = HashMap::from([(
            "wRC+".to_string(),
            vec!["Age".to_string(), "wRC+".to_string()],
        )]);
        let policy = FeaturePolicy::with_overrides(&overrides).unwrap();
        let set = policy.feature_set(TargetStat::WrcPlus);
        assert_eq!(set.inputs, vec!["Age", "wRC+"]);
        assert_eq!(set.prior_value, PriorValue::Included);
        assert_eq!(policy.select(TargetStat::Hr), FeaturePolicy::canonical().select(TargetStat::Hr));
    }

    #[test]
    fn overrides_with_unknown_target_fail() {
        let overrides = HashMap::from([("SB".to_string(), vec!["Age".to_string()])]);
        assert!(FeaturePolicy::with_overrides(&overrides).is_err());
    }

    #[test]
    fn tracked_statistics_include_targets() {
        let tracked = FeaturePolicy::canonical().tracked_statistics();
        for name in ["HR", "AVG", "OPS", "wRC+", "xBA", "Pull%"] {
            assert!(tracked.iter().any(|t| t == name), "{name} not tracked");
        }
    }
}
