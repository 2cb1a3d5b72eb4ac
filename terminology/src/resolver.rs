// terminology/src/resolver.rs
//! Injected capability for code↔display lookups.
//!
//! The real lookup services (disorder/gene/phenotype code search over the
//! network) live outside this workspace; the converters only need a
//! synchronous display resolution and a code system per term category, and
//! must keep working when lookups fail.

use crate::systems;

pub trait TerminologyResolver {
    /// Resolves a code to its display string, or `None` when the code is
    /// unknown to this resolver.
    fn code_to_display(&self, system: &str, code: &str) -> Option<String>;

    /// Display string for export; degrades to the code itself so that a
    /// failed lookup never fails the export.
    fn display_or_code(&self, system: &str, code: &str) -> String {
        self.code_to_display(system, code)
            .unwrap_or_else(|| code.to_string())
    }

    /// True when the code has a real display distinct from the bare code;
    /// exporters emit a coding in that case and plain text otherwise.
    fn has_display(&self, system: &str, code: &str) -> bool {
        match self.code_to_display(system, code) {
            Some(display) => display != code,
            None => false,
        }
    }

    fn disorder_system(&self) -> &str {
        systems::OMIM
    }

    fn phenotype_system(&self) -> &str {
        systems::HPO
    }

    fn gene_system(&self) -> &str {
        systems::HGNC
    }
}

/// Resolver that knows no codes; every lookup degrades to the code itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl TerminologyResolver for NullResolver {
    fn code_to_display(&self, _system: &str, _code: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OneDisorder;

    impl TerminologyResolver for OneDisorder {
        fn code_to_display(&self, system: &str, code: &str) -> Option<String> {
            (system == systems::OMIM && code == "603903").then(|| "Sickle cell anemia".to_string())
        }
    }

    #[test]
    fn should_degrade_to_code_on_miss() {
        let resolver = NullResolver;
        assert_eq!(resolver.display_or_code(systems::OMIM, "603903"), "603903");
        assert!(!resolver.has_display(systems::OMIM, "603903"));
    }

    #[test]
    fn should_resolve_known_codes() {
        let resolver = OneDisorder;
        assert_eq!(
            resolver.display_or_code(systems::OMIM, "603903"),
            "Sickle cell anemia"
        );
        assert!(resolver.has_display(systems::OMIM, "603903"));
    }
}
