//! Password hash throughput benchmark.

use std::fmt;
use std::time::{Duration, Instant};

use crate::auth::PasswordHasher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashBenchPlan {
    pub iterations: u32,
    pub password: String,
    pub salt: String,
}

impl HashBenchPlan {
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations,
            ..Self::default()
        }
    }
}

impl Default for HashBenchPlan {
    fn default() -> Self {
        Self {
            iterations: 5_000,
            password: "aaaaaa".to_string(),
            salt: "aaaaaaaaaaaaaaaa".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashBenchReport {
    pub iterations: u32,
    pub elapsed: Duration,
}

impl fmt::Display for HashBenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hashes in {:.3} secs", self.iterations, self.elapsed.as_secs_f64())
    }
}

/// Hash the fixed password `plan.iterations` times and time it.
pub fn run<H: PasswordHasher + ?Sized>(hasher: &H, plan: &HashBenchPlan) -> HashBenchReport {
    let started = Instant::now();
    for _ in 0..plan.iterations {
        std::hint::black_box(hasher.compute_hash(&plan.password, &plan.salt));
    }
    HashBenchReport {
        iterations: plan.iterations,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingHasher(AtomicU32);

    impl PasswordHasher for CountingHasher {
        fn compute_hash(&self, password: &str, salt: &str) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            format!("{salt}{password}")
        }
    }

    #[test]
    fn hashes_requested_number_of_times() {
        let hasher = CountingHasher::default();
        let report = run(&hasher, &HashBenchPlan::with_iterations(37));
        assert_eq!(report.iterations, 37);
        assert_eq!(hasher.0.load(Ordering::SeqCst), 37);
    }

    #[test]
    fn report_mentions_seconds() {
        let report = HashBenchReport {
            iterations: 5_000,
            elapsed: Duration::from_millis(1_250),
        };
        assert_eq!(report.to_string(), "5000 hashes in 1.250 secs");
    }
}
