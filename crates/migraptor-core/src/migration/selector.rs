//! Project selection.

use crate::models::Project;

/// Decide whether `project` takes part in the migration.
///
/// With no filter every project qualifies. Otherwise a project qualifies when
/// its path is listed, or when it has no container registry and the whole
/// hierarchy is being preserved: such projects cost nothing to carry along.
pub fn should_migrate(project: &Project, filter: &[String], preserve_hierarchy: bool) -> bool {
    if filter.is_empty() {
        return true;
    }

    if filter.iter().any(|path| path == &project.path) {
        return true;
    }

    !project.container_registry_enabled && preserve_hierarchy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(path: &str, registry: bool) -> Project {
        Project {
            id: 1,
            name: path.to_uppercase(),
            path: path.to_string(),
            path_with_namespace: format!("eng/{}", path),
            container_registry_enabled: registry,
            archived: false,
            registry_repository_ids: Vec::new(),
        }
    }

    #[test]
    fn test_empty_filter_selects_everything() {
        for registry in [true, false] {
            for preserve in [true, false] {
                assert!(should_migrate(&project("a", registry), &[], preserve));
            }
        }
    }

    #[test]
    fn test_listed_project_is_selected() {
        let filter = vec!["a".to_string(), "c".to_string()];
        assert!(should_migrate(&project("a", true), &filter, false));
        assert!(should_migrate(&project("c", true), &filter, true));
    }

    #[test]
    fn test_unlisted_project_needs_no_registry_and_preserved_hierarchy() {
        let filter = vec!["a".to_string()];
        assert!(should_migrate(&project("b", false), &filter, true));
        assert!(!should_migrate(&project("b", false), &filter, false));
        assert!(!should_migrate(&project("b", true), &filter, true));
        assert!(!should_migrate(&project("b", true), &filter, false));
    }

    #[test]
    fn test_filter_matches_path_not_name() {
        let filter = vec!["A".to_string()];
        assert!(!should_migrate(&project("a", true), &filter, true));
    }
}
