//! Artifact classification of output paths

use std::path::Path;

use serde::Serialize;

use super::planner::OutputPolicy;

/// What kind of file an output path holds; decides disposition and merge rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Rust model file under one of the entity directories
    Entity,
    /// Any other Rust source file
    Source,
    /// Mapper XML document (`<mapper>` or legacy `<sqlMap>`)
    Mapper,
    /// File with the protected suffix; never rewritten once it exists
    Protected,
    /// Everything else; overwritten wholesale
    Generic,
}

impl ArtifactKind {
    /// Classify an output path.
    ///
    /// XML files are only recognized as mappers from their content, so `text`
    /// should be the rendered output when it is available.
    pub fn classify(path: &Path, text: Option<&str>, policy: &OutputPolicy) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if file_name.ends_with(policy.protected_suffix.as_str()) {
            return ArtifactKind::Protected;
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => {
                let in_entity_dir = path
                    .parent()
                    .and_then(Path::file_name)
                    .map(|dir| policy.entity_dirs.iter().any(|d| dir == d.as_str()))
                    .unwrap_or(false);
                if in_entity_dir {
                    ArtifactKind::Entity
                } else {
                    ArtifactKind::Source
                }
            }
            Some("xml") if text.is_some_and(is_mapper_document) => ArtifactKind::Mapper,
            _ => ArtifactKind::Generic,
        }
    }

    /// Whether existing files of this kind are merged rather than overwritten
    pub fn is_merge_eligible(self) -> bool {
        matches!(
            self,
            ArtifactKind::Entity | ArtifactKind::Source | ArtifactKind::Mapper
        )
    }
}

/// Whether XML text is a mapper document in either dialect
pub fn is_mapper_document(text: &str) -> bool {
    text.contains("<mapper") || text.contains("<sqlMap")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OutputPolicy {
        OutputPolicy {
            replace_file: true,
            protected_suffix: "_dto.rs".into(),
            entity_dirs: vec!["models".into()],
        }
    }

    #[test]
    fn test_classify_rust() {
        let p = policy();
        assert_eq!(
            ArtifactKind::classify(Path::new("app/src/models/user.rs"), None, &p),
            ArtifactKind::Entity
        );
        assert_eq!(
            ArtifactKind::classify(Path::new("app/src/dao/user.rs"), None, &p),
            ArtifactKind::Source
        );
        assert_eq!(
            ArtifactKind::classify(Path::new("app/src/models/user_dto.rs"), None, &p),
            ArtifactKind::Protected
        );
    }

    #[test]
    fn test_classify_xml_by_content() {
        let p = policy();
        let path = Path::new("mappers/user.xml");
        assert_eq!(
            ArtifactKind::classify(path, Some("<mapper namespace=\"x\"></mapper>"), &p),
            ArtifactKind::Mapper
        );
        assert_eq!(
            ArtifactKind::classify(path, Some("<sqlMap></sqlMap>"), &p),
            ArtifactKind::Mapper
        );
        assert_eq!(
            ArtifactKind::classify(path, Some("<project/>"), &p),
            ArtifactKind::Generic
        );
        assert_eq!(ArtifactKind::classify(path, None, &p), ArtifactKind::Generic);
    }

    #[test]
    fn test_merge_eligibility() {
        assert!(ArtifactKind::Entity.is_merge_eligible());
        assert!(ArtifactKind::Mapper.is_merge_eligible());
        assert!(!ArtifactKind::Protected.is_merge_eligible());
        assert!(!ArtifactKind::Generic.is_merge_eligible());
    }
}
