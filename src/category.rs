//! Category resolution — the single place that interprets caller-facing
//! category strings.
//!
//! The original system unioned `"suite"` with its subtypes ad hoc inside
//! individual query filters; here every query path goes through
//! [`resolve`], so alias logic exists exactly once.

use crate::model::ResourceType;

/// Concrete types satisfying the generic "suite" category.
const SUITE_TYPES: [ResourceType; 3] = [
    ResourceType::StandardSuite,
    ResourceType::StandardPlusSuite,
    ResourceType::VipSuite,
];

/// Resolve a caller-supplied category (case-insensitive) to the set of
/// concrete resource types that satisfy it.
///
/// A generic category expands to every subtype bearing that root; a
/// concrete type name resolves to itself. Unknown categories resolve to
/// the EMPTY set — "no matching resources", never an error, and never
/// "everything".
pub fn resolve(category: &str) -> Vec<ResourceType> {
    let trimmed = category.trim();
    if trimmed.to_ascii_uppercase() == "SUITE" {
        return SUITE_TYPES.to_vec();
    }
    match ResourceType::parse(trimmed) {
        Some(t) => vec![t],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_suite_expands_to_all_subtypes() {
        let types = resolve("suite");
        assert_eq!(types.len(), 3);
        assert!(types.contains(&ResourceType::StandardSuite));
        assert!(types.contains(&ResourceType::StandardPlusSuite));
        assert!(types.contains(&ResourceType::VipSuite));
    }

    #[test]
    fn generic_suite_is_case_insensitive() {
        assert_eq!(resolve("SUITE"), resolve("suite"));
        assert_eq!(resolve("Suite"), resolve("suite"));
    }

    #[test]
    fn concrete_type_resolves_to_itself() {
        assert_eq!(resolve("STANDARD_SUITE"), vec![ResourceType::StandardSuite]);
        assert_eq!(resolve("vip_suite"), vec![ResourceType::VipSuite]);
        assert_eq!(resolve("KENNEL"), vec![ResourceType::Kennel]);
        assert_eq!(resolve("grooming_table"), vec![ResourceType::GroomingTable]);
    }

    #[test]
    fn unknown_category_is_empty_not_everything() {
        // Returning "everything" here would silently offer every unit in the
        // building to a typo'd category — the empty set is load-bearing.
        assert!(resolve("nonexistent").is_empty());
        assert!(resolve("").is_empty());
        assert!(resolve("suites").is_empty());
        assert!(resolve("kennels").is_empty());
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(resolve("  suite "), resolve("suite"));
        assert_eq!(resolve(" RUN"), vec![ResourceType::Run]);
    }
}
