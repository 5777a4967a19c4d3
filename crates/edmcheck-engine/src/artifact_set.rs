//! Error collection of one validated artifact
//!
//! Errors are grouped by class. A validation pass owns one or more
//! classes: it clears them, re-adds what it finds and marks them clean.
//! Nothing is patched in place.

use std::collections::HashSet;

use edmcheck_core::{ErrorClass, ErrorInfo, Severity};

/// Errors of an artifact plus per-class dirty flags
#[derive(Debug, Clone)]
pub struct ArtifactErrorSet {
    errors: Vec<ErrorInfo>,
    seen: HashSet<ErrorInfo>,
    dirty: ErrorClass,
}

impl ArtifactErrorSet {
    /// An empty set; every class starts dirty
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            seen: HashSet::new(),
            dirty: ErrorClass::ALL,
        }
    }

    /// Add an error; a structurally equal error is only kept once
    ///
    /// Returns `false` if the error was already present.
    pub fn add_error(&mut self, error: ErrorInfo) -> bool {
        if !self.seen.insert(error.clone()) {
            return false;
        }
        self.errors.push(error);
        true
    }

    /// Every error, in insertion order
    pub fn errors(&self) -> &[ErrorInfo] {
        &self.errors
    }

    /// Errors whose class is part of `mask`
    pub fn errors_for_class(&self, mask: ErrorClass) -> Vec<&ErrorInfo> {
        self.errors
            .iter()
            .filter(|error| mask.intersects(error.class()))
            .collect()
    }

    /// Remove every error whose class is part of `mask`
    pub fn clear_errors(&mut self, mask: ErrorClass) {
        self.errors.retain(|error| !mask.intersects(error.class()));
        self.seen.retain(|error| !mask.intersects(error.class()));
    }

    /// Whether any class selected by `mask` needs revalidation
    pub fn is_validity_dirty_for_error_class(&self, mask: ErrorClass) -> bool {
        self.dirty.intersects(mask)
    }

    pub fn set_validity_dirty_for_error_class(&mut self, mask: ErrorClass, dirty: bool) {
        self.dirty.set(mask, dirty);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|e| e.severity() == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.errors.iter().filter(|e| e.severity() == Severity::Warning).count()
    }
}

impl Default for ArtifactErrorSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edmcheck_core::{ErrorItem, ObjectId};
    use pretty_assertions::assert_eq;

    fn error(code: i32, class: ErrorClass) -> ErrorInfo {
        ErrorInfo::new(Severity::Error, format!("code {}", code), ErrorItem::Object(ObjectId(1)), code, class)
    }

    #[test]
    fn starts_dirty_for_every_class() {
        let set = ArtifactErrorSet::new();
        for class in ErrorClass::SINGLES {
            assert!(set.is_validity_dirty_for_error_class(class));
        }
        assert!(set.is_empty());
    }

    #[test]
    fn duplicate_errors_are_ignored() {
        let mut set = ArtifactErrorSet::new();
        assert!(set.add_error(error(1, ErrorClass::ESCHER_CSDL)));
        assert!(!set.add_error(error(1, ErrorClass::ESCHER_CSDL)));
        assert!(set.add_error(error(1, ErrorClass::ESCHER_MSL)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn clearing_a_mask_keeps_other_classes() {
        let mut set = ArtifactErrorSet::new();
        set.add_error(error(1, ErrorClass::ESCHER_CSDL));
        set.add_error(error(2, ErrorClass::ESCHER_MSL));
        set.add_error(error(3, ErrorClass::RUNTIME_CSDL));

        set.clear_errors(ErrorClass::ESCHER_ALL);
        assert_eq!(set.errors(), &[error(3, ErrorClass::RUNTIME_CSDL)]);

        // A cleared error can be added again
        assert!(set.add_error(error(1, ErrorClass::ESCHER_CSDL)));
        assert_eq!(set.errors_for_class(ErrorClass::ESCHER_ALL).len(), 1);
    }

    #[test]
    fn dirty_check_is_any_of_mask() {
        let mut set = ArtifactErrorSet::new();
        set.set_validity_dirty_for_error_class(ErrorClass::RUNTIME_CSDL | ErrorClass::RUNTIME_SSDL, false);

        assert!(!set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_CSDL | ErrorClass::RUNTIME_SSDL));
        assert!(set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_SSDL | ErrorClass::RUNTIME_MSL));

        set.set_validity_dirty_for_error_class(ErrorClass::RUNTIME_SSDL, true);
        assert!(set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_SSDL));
        assert!(!set.is_validity_dirty_for_error_class(ErrorClass::RUNTIME_CSDL));
    }
}
