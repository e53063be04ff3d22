#![warn(missing_docs)]
//! Steadybench Statistical Helpers
//!
//! Small, allocation-free statistics over timing samples:
//! - Arithmetic mean
//! - Bessel-corrected sample standard deviation (corrected two-pass)
//! - A combined summary used by the text reports

mod summary;

pub use summary::{StatsError, Summary, mean, stdev, summarize};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let values = [1.0, 3.0];
        assert!((mean(&values).unwrap() - 2.0).abs() < f64::EPSILON);
        assert!(stdev(&values).is_ok());
        assert_eq!(summarize(&values).count, 2);
    }
}
