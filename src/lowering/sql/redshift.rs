//! Amazon Redshift backend.

use super::SqlBackend;
use crate::error::Result;

/// Redshift: PostgreSQL syntax with a native `MEDIAN` and `DATEDIFF`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redshift;

impl SqlBackend for Redshift {
    fn id(&self) -> &'static str {
        "redshift"
    }

    fn age(&self, arg: &str) -> Result<String> {
        Ok(format!(
            "(DATEDIFF('YEAR', {arg}, CURRENT_DATE) - CASE WHEN \
             extract('month' from CURRENT_DATE) + extract('day' from CURRENT_DATE)/100.0 < \
             extract('month' from {arg}) + extract('day' from {arg})/100.0 THEN 1 ELSE 0 END)"
        ))
    }

    fn median(&self, arg: &str) -> Result<String> {
        Ok(format!("MEDIAN({arg})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_and_age() {
        assert_eq!(Redshift.median("\"x\"").unwrap(), "MEDIAN(\"x\")");
        let age = Redshift.age("\"b\"").unwrap();
        assert!(age.starts_with("(DATEDIFF('YEAR', \"b\", CURRENT_DATE) - CASE WHEN"));
        assert!(age.ends_with("THEN 1 ELSE 0 END)"));
    }
}
