//! Random number generator quality check.
//!
//! For each range width `w`, draws `n * w` values from `[min, min + w - 1]`,
//! counts them per value and computes Pearson's chi-squared statistic
//! against the uniform distribution (`w - 1` degrees of freedom).

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::config::SelfTestConfig;
use crate::random::RandomSource;

/// Values requested from the source per batch call.
const BATCH: usize = 1 << 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RngTestError {
    #[error("test plan is empty: widths {min_width}..={max_width}, {samples_per_bin} samples per bin")]
    EmptyPlan {
        min_width: i32,
        max_width: i32,
        samples_per_bin: usize,
    },

    #[error("{samples_per_bin} samples per bin overflows at width {max_width}")]
    TooManySamples { max_width: i32, samples_per_bin: usize },

    #[error("width {width}: drew {value}, outside the requested range")]
    OutOfRange { width: i32, value: i32 },

    #[error("width {width}: asked for {expected} values, got {got}")]
    ShortBatch { width: i32, expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RngTestPlan {
    pub samples_per_bin: usize,
    pub min: i32,
    pub min_width: i32,
    pub max_width: i32,
}

impl Default for RngTestPlan {
    fn default() -> Self {
        Self::from(&SelfTestConfig::default())
    }
}

impl From<&SelfTestConfig> for RngTestPlan {
    fn from(config: &SelfTestConfig) -> Self {
        Self {
            samples_per_bin: config.rng_samples_per_bin,
            min: config.rng_min,
            min_width: config.rng_min_width,
            max_width: config.rng_max_width,
        }
    }
}

/// Result for one range width.
#[derive(Debug, Clone, PartialEq)]
pub struct WidthResult {
    pub width: i32,
    pub samples: usize,
    /// Occurrences per drawn value; every value in range has an entry.
    pub histogram: BTreeMap<i32, u64>,
    pub chi_squared: f64,
}

impl WidthResult {
    pub fn degrees_of_freedom(&self) -> i32 {
        self.width - 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RngReport {
    pub plan: RngTestPlan,
    pub rows: Vec<WidthResult>,
}

pub fn run<R: RandomSource + ?Sized>(rng: &R, plan: &RngTestPlan) -> Result<RngReport, RngTestError> {
    let empty = plan.samples_per_bin == 0
        || plan.min_width < 1
        || plan.min_width > plan.max_width
        || plan.min.checked_add(plan.max_width - 1).is_none();
    if empty {
        return Err(RngTestError::EmptyPlan {
            min_width: plan.min_width,
            max_width: plan.max_width,
            samples_per_bin: plan.samples_per_bin,
        });
    }

    // Widths are checked positive above; the largest width bounds every product.
    if plan.samples_per_bin.checked_mul(plan.max_width as usize).is_none() {
        return Err(RngTestError::TooManySamples {
            max_width: plan.max_width,
            samples_per_bin: plan.samples_per_bin,
        });
    }

    let rows = (plan.min_width..=plan.max_width)
        .map(|width| test_width(rng, plan, width))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RngReport {
        plan: plan.clone(),
        rows,
    })
}

fn test_width<R: RandomSource + ?Sized>(rng: &R, plan: &RngTestPlan, width: i32) -> Result<WidthResult, RngTestError> {
    let max = plan.min + width - 1;
    let samples = plan.samples_per_bin * width as usize;
    let mut histogram: BTreeMap<i32, u64> = (plan.min..=max).map(|value| (value, 0)).collect();

    let mut remaining = samples;
    while remaining > 0 {
        let expected = remaining.min(BATCH);
        let batch = rng.draw_batch(expected, plan.min, max);
        if batch.len() != expected {
            return Err(RngTestError::ShortBatch {
                width,
                expected,
                got: batch.len(),
            });
        }
        for value in batch {
            match histogram.get_mut(&value) {
                Some(count) => *count += 1,
                None => return Err(RngTestError::OutOfRange { width, value }),
            }
        }
        remaining -= expected;
    }

    let chi_squared = chi_squared(&histogram, samples);
    Ok(WidthResult {
        width,
        samples,
        histogram,
        chi_squared,
    })
}

/// Pearson's chi-squared statistic of `histogram` against a uniform distribution.
pub fn chi_squared(histogram: &BTreeMap<i32, u64>, samples: usize) -> f64 {
    if histogram.is_empty() || samples == 0 {
        return 0.0;
    }
    let expected = samples as f64 / histogram.len() as f64;
    histogram
        .values()
        .map(|&observed| {
            let delta = observed as f64 - expected;
            delta * delta / expected
        })
        .sum()
}

impl fmt::Display for RngReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.plan.min + self.plan.max_width - 1;
        for value in self.plan.min..=last {
            write!(f, "{value}")?;
            for row in &self.rows {
                match row.histogram.get(&value) {
                    Some(count) => write!(f, "\t{count}")?,
                    None => write!(f, "\t")?,
                }
            }
            writeln!(f)?;
        }

        write!(f, "\nChi^2 =")?;
        for row in &self.rows {
            write!(f, "\t{:.3}", row.chi_squared)?;
        }
        write!(f, "\nk =")?;
        for row in &self.rows {
            write!(f, "\t{}", row.degrees_of_freedom())?;
        }
        writeln!(f)
    }
}
