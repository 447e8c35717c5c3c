use uuid::Uuid;

/// Maps a record identifier to its deterministic cluster resource name. Every workload,
/// service, and document this controller touches is named by this function and only this
/// function — there is no second naming path, which is what keeps creation and deletion
/// addressing the same resource (see `SPEC_FULL.md` §9 on the source's deletion bug).
pub fn name(id: Uuid) -> String {
    format!("gs-{id}")
}

/// The inverse of [`name`]: recovers the identifier from a resource name this controller
/// produced, if it carries the `gs-` prefix and a syntactically valid UUID. Used by the
/// reconciler's remnant scan (`SPEC_FULL.md` §9) to reverse-map cluster objects back to
/// records.
pub fn parse_name(resource_name: &str) -> Option<Uuid> {
    resource_name.strip_prefix("gs-").and_then(|id| Uuid::parse_str(id).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_prefixed_and_deterministic() {
        let id = Uuid::nil();
        assert_eq!(name(id), format!("gs-{id}"));
        assert_eq!(name(id), name(id));
    }

    #[test]
    fn name_is_injective() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        assert_ne!(name(a), name(b));
    }

    #[test]
    fn parse_name_round_trips() {
        let id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        assert_eq!(parse_name(&name(id)), Some(id));
    }

    #[test]
    fn parse_name_rejects_foreign_resources() {
        assert_eq!(parse_name("some-other-service"), None);
        assert_eq!(parse_name("gs-not-a-uuid"), None);
    }
}
