//! Smart code shape checks
//!
//! A smart code such as `HERA.CRM.ACCOUNT.ENTERPRISE.ACTIVE.v1` is a
//! classification tag. Nothing interprets its segments; the entity API only
//! checks that it is well formed.

use regex::Regex;
use std::sync::OnceLock;

fn smart_code_regex() -> &'static Regex {
    static SMART_CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    SMART_CODE_REGEX.get_or_init(|| {
        Regex::new(r"^HERA(\.[A-Z0-9_]+){3,8}\.v[0-9]+$").expect("smart code regex is valid")
    })
}

/// Whether a smart code is well formed
pub fn is_valid(code: &str) -> bool {
    smart_code_regex().is_match(code)
}

/// `validator` hook for smart code fields
pub fn validate(code: &str) -> Result<(), validator::ValidationError> {
    if is_valid(code) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("smart_code");
        err.message = Some(
            format!(
                "'{}' is not a smart code (expected HERA.<SEGMENTS>.v<version>)",
                code
            )
            .into(),
        );
        Err(err)
    }
}
