//! Exhaustive hyperparameter grids

use crate::error::{PipelineError, Result};
use crate::training::{ParamSet, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name → candidate values. Names iterate in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterGrid(BTreeMap<String, Vec<ParamValue>>);

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a parameter axis
    pub fn with<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<ParamValue>) {
        self.0.insert(name.into(), values);
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.0.get(name).map(|v| v.as_slice())
    }

    /// Every axis needs at least one candidate
    pub fn validate(&self) -> Result<()> {
        for (name, values) in &self.0 {
            if values.is_empty() {
                return Err(PipelineError::ConfigError(format!(
                    "hyperparameter '{}' has no candidate values",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Number of configurations: product of candidate counts (1 for an empty grid)
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product in enumeration order: the last name varies fastest.
    ///
    /// An empty grid yields a single configuration of family defaults.
    pub fn combinations(&self) -> Result<Vec<ParamSet>> {
        self.validate()?;

        let axes: Vec<(&String, &Vec<ParamValue>)> = self.0.iter().collect();
        let total = self.len();
        let mut combos = Vec::with_capacity(total);

        for mut index in 0..total {
            let mut params = ParamSet::new();
            // Decode `index` in mixed radix, least significant digit = last axis
            for (name, values) in axes.iter().rev() {
                params.insert(name.as_str(), values[index % values.len()].clone());
                index /= values.len();
            }
            combos.push(params);
        }

        Ok(combos)
    }
}

impl FromIterator<(String, Vec<ParamValue>)> for HyperparameterGrid {
    fn from_iter<I: IntoIterator<Item = (String, Vec<ParamValue>)>>(iter: I) -> Self {
        HyperparameterGrid(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_order() {
        let grid = HyperparameterGrid::new()
            .with("max_depth", [3usize, 5])
            .with("c", [0.1, 1.0, 10.0]);

        let combos = grid.combinations().unwrap();
        assert_eq!(combos.len(), 6);
        assert_eq!(grid.len(), 6);

        // "c" sorts before "max_depth", so max_depth varies fastest
        let rendered: Vec<String> = combos.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "c=0.1, max_depth=3",
                "c=0.1, max_depth=5",
                "c=1, max_depth=3",
                "c=1, max_depth=5",
                "c=10, max_depth=3",
                "c=10, max_depth=5",
            ]
        );
    }

    #[test]
    fn test_size_is_product_of_counts() {
        let grid = HyperparameterGrid::new()
            .with("a", [1i64, 2])
            .with("b", [true, false])
            .with("c", ["x", "y", "z"]);
        assert_eq!(grid.combinations().unwrap().len(), 12);
    }

    #[test]
    fn test_empty_axis_rejected() {
        let mut grid = HyperparameterGrid::new();
        grid.insert("c", vec![]);
        assert!(matches!(grid.combinations(), Err(PipelineError::ConfigError(_))));
    }

    #[test]
    fn test_empty_grid_is_single_default_config() {
        let combos = HyperparameterGrid::new().combinations().unwrap();
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn test_json_shape() {
        let grid: HyperparameterGrid =
            serde_json::from_str(r#"{"max_depth": [null, 4], "max_features": ["sqrt"]}"#).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.values("max_depth").unwrap()[0], ParamValue::Null);
    }
}
