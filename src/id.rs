//! Primary key generation for records created without an `_id`

use uuid::Uuid;

/// Produces opaque, collision-resistant record identifiers
///
/// Ids are hyphenated UUID v7 strings, so ids from one process sort by
/// creation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids = IdGenerator::new();
        let generated: HashSet<String> = (0..1000).map(|_| ids.generate()).collect();
        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn test_generated_id_is_uuid_v7() {
        let id = IdGenerator::new().generate();
        assert_eq!(id.len(), 36);
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn test_generated_ids_sort_by_creation() {
        let ids = IdGenerator::new();
        let first = ids.generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ids.generate();
        assert!(first < second);
    }
}
