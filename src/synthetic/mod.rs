//! Synthetic data generation module
//!
//! Produces bank-customer tables shaped like the churn workflow's input, with
//! an exact positive rate and a learnable relationship between features and
//! the label.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const GEOGRAPHIES: [&str; 3] = ["France", "Germany", "Spain"];
pub const GENDERS: [&str; 2] = ["Female", "Male"];

const SURNAMES: [&str; 12] = [
    "Hargrave", "Hill", "Onio", "Boni", "Mitchell", "Chu", "Bartlett", "Obinna", "He", "Bearce",
    "Andrews", "Kay",
];

/// Generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnGenerator {
    pub n_rows: usize,
    /// Share of rows labelled 1; rounded to a whole number of rows
    pub positive_rate: f64,
    pub seed: u64,
}

impl Default for ChurnGenerator {
    fn default() -> Self {
        Self {
            n_rows: 1000,
            positive_rate: 0.2,
            seed: 42,
        }
    }
}

impl ChurnGenerator {
    pub fn new(n_rows: usize, positive_rate: f64, seed: u64) -> Self {
        Self {
            n_rows,
            positive_rate,
            seed,
        }
    }

    fn n_positive(&self) -> Result<usize> {
        if !(self.positive_rate > 0.0 && self.positive_rate < 1.0) {
            return Err(PipelineError::ValidationError(format!(
                "positive_rate must be in (0, 1), got {}",
                self.positive_rate
            )));
        }
        let n_pos = (self.n_rows as f64 * self.positive_rate).round() as usize;
        if n_pos == 0 || n_pos >= self.n_rows {
            return Err(PipelineError::ValidationError(format!(
                "{} rows at positive_rate {} leave a class empty",
                self.n_rows, self.positive_rate
            )));
        }
        Ok(n_pos)
    }

    /// Build the table. Columns follow the bank churn layout, label `Exited`.
    pub fn generate(&self) -> Result<DataFrame> {
        let n = self.n_rows;
        let n_pos = self.n_positive()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let normal = |mean: f64, std: f64| {
            Normal::new(mean, std).map_err(|e| PipelineError::ConfigError(e.to_string()))
        };
        let credit_dist = normal(650.0, 95.0)?;
        let age_dist = normal(38.0, 10.0)?;
        let balance_dist = normal(120_000.0, 30_000.0)?;
        let noise_dist = normal(0.0, 0.8)?;

        let mut credit_score = Vec::with_capacity(n);
        let mut geography = Vec::with_capacity(n);
        let mut gender = Vec::with_capacity(n);
        let mut age = Vec::with_capacity(n);
        let mut tenure = Vec::with_capacity(n);
        let mut balance = Vec::with_capacity(n);
        let mut products = Vec::with_capacity(n);
        let mut has_card = Vec::with_capacity(n);
        let mut active = Vec::with_capacity(n);
        let mut salary = Vec::with_capacity(n);
        let mut surname = Vec::with_capacity(n);
        let mut risk = Vec::with_capacity(n);

        for i in 0..n {
            // The first rows cover every category so each level is always present
            let geo = if i < GEOGRAPHIES.len() {
                i
            } else {
                match rng.gen_range(0..4) {
                    0 | 1 => 0,
                    2 => 1,
                    _ => 2,
                }
            };
            let sex = if i < GENDERS.len() { i } else { rng.gen_range(0..2) };
            let a = rng.sample(age_dist).round().clamp(18.0, 92.0);
            let b = if rng.gen_bool(0.35) {
                0.0
            } else {
                (rng.sample(balance_dist).max(0.0) * 100.0).round() / 100.0
            };
            let p: i64 = match rng.gen_range(0..100) {
                0..=49 => 1,
                50..=94 => 2,
                95..=97 => 3,
                _ => 4,
            };
            let is_active = rng.gen_bool(0.5);

            let mut z = 0.06 * (a - 38.0) + rng.sample(noise_dist);
            z += if geo == 1 { 0.7 } else { 0.0 };
            z += if sex == 0 { 0.35 } else { 0.0 };
            z -= if is_active { 0.8 } else { 0.0 };
            z += match p {
                1 => 0.2,
                2 => -0.6,
                _ => 1.5,
            };
            z += b / 200_000.0;

            credit_score.push(rng.sample(credit_dist).round().clamp(350.0, 850.0) as i64);
            geography.push(GEOGRAPHIES[geo]);
            gender.push(GENDERS[sex]);
            age.push(a as i64);
            tenure.push(rng.gen_range(0..=10i64));
            balance.push(b);
            products.push(p);
            has_card.push(i64::from(rng.gen_bool(0.7)));
            active.push(i64::from(is_active));
            salary.push((rng.gen_range(10.0..200_000.0_f64) * 100.0).round() / 100.0);
            surname.push(SURNAMES[rng.gen_range(0..SURNAMES.len())]);
            risk.push(z);
        }

        // The n_pos riskiest customers churn, earlier rows winning ties
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| risk[b].total_cmp(&risk[a]));
        let mut exited = vec![0i64; n];
        for &i in order.iter().take(n_pos) {
            exited[i] = 1;
        }

        let row_number: Vec<i64> = (1..=n as i64).collect();
        let customer_id: Vec<i64> = row_number.iter().map(|r| 15_600_000 + r * 7).collect();

        let df = df!(
            "RowNumber" => row_number,
            "CustomerId" => customer_id,
            "Surname" => surname,
            "CreditScore" => credit_score,
            "Geography" => geography,
            "Gender" => gender,
            "Age" => age,
            "Tenure" => tenure,
            "Balance" => balance,
            "NumOfProducts" => products,
            "HasCrCard" => has_card,
            "IsActiveMember" => active,
            "EstimatedSalary" => salary,
            "Exited" => exited
        )?;

        info!(rows = n, positives = n_pos, seed = self.seed, "Generated synthetic churn table");
        Ok(df)
    }
}

/// Shorthand for `ChurnGenerator::new(..).generate()`
pub fn synthetic_churn(n_rows: usize, positive_rate: f64, seed: u64) -> Result<DataFrame> {
    ChurnGenerator::new(n_rows, positive_rate, seed).generate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_positive_count() {
        let df = synthetic_churn(1000, 0.2, 7).unwrap();
        let exited = df.column("Exited").unwrap().as_materialized_series().clone();
        let positives: i64 = exited.i64().unwrap().into_no_null_iter().sum();
        assert_eq!(df.height(), 1000);
        assert_eq!(positives, 200);
    }

    #[test]
    fn test_category_cardinality() {
        let df = synthetic_churn(50, 0.3, 1).unwrap();
        let geo = df.column("Geography").unwrap().as_materialized_series().n_unique().unwrap();
        let sex = df.column("Gender").unwrap().as_materialized_series().n_unique().unwrap();
        assert_eq!(geo, 3);
        assert_eq!(sex, 2);
    }

    #[test]
    fn test_seeded_output_repeats() {
        let a = synthetic_churn(40, 0.25, 9).unwrap();
        let b = synthetic_churn(40, 0.25, 9).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn test_rejects_empty_class() {
        assert!(matches!(
            synthetic_churn(10, 0.01, 0),
            Err(PipelineError::ValidationError(_))
        ));
        assert!(synthetic_churn(10, 1.0, 0).is_err());
    }
}
