//! Project Reference Discoverer — bootstraps allowed-path sets by parsing
//! whichever build file a project root actually has.
//!
//! Discovery is deliberately best-effort: any single parser failure yields
//! an empty reference list for that file rather than aborting the whole
//! scan, since a malformed build file in one corner of a monorepo
//! shouldn't prevent registering the rest of the project.

mod extractors;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use extractors::ProjectType;

/// A single discovered reference to another project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReference {
    /// Absolute path to the referenced project file or directory.
    pub path: PathBuf,
    /// True when `path` is not a descendant of the discovery root.
    pub is_external: bool,
}

/// Result of discovering references from a project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub references: Vec<ProjectReference>,
    pub external_directories: Vec<PathBuf>,
    pub primary_project_file: Option<PathBuf>,
    pub project_type: Option<ProjectType>,
}

/// Build-file priority order, highest first. The first file found at
/// `root_path`'s top level that also satisfies its "declares workspace
/// members" predicate (where applicable) wins.
const PRIORITY: &[ProjectType] = &[
    ProjectType::Sln,
    ProjectType::Slnx,
    ProjectType::CodeWorkspace,
    ProjectType::PackageJson,
    ProjectType::GoWork,
    ProjectType::CargoWorkspace,
    ProjectType::Pom,
    ProjectType::TsConfig,
    ProjectType::Csproj,
    ProjectType::Fsproj,
];

/// Discover project references rooted at `root_path`.
pub fn discover_references(root_path: &Path) -> DiscoveryResult {
    let Some((primary_path, project_type)) = find_primary_project_file(root_path) else {
        return DiscoveryResult::default();
    };

    let raw_refs = extractors::extract(&primary_path, project_type).unwrap_or_default();

    let mut references: Vec<ProjectReference> = Vec::new();
    let mut seen: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();

    for r in raw_refs {
        let abs = absolutize(&r, root_path);
        if seen.insert(abs.clone()) {
            references.push(make_reference(abs, root_path));
        }

        // Solution-style files: descend one level into each contained
        // project file's own references.
        if matches!(project_type, ProjectType::Sln | ProjectType::Slnx) {
            let inner_abs = absolutize(&r, root_path);
            if inner_abs.exists() {
                if let Some(inner_type) = extractors::project_type_of_path(&inner_abs) {
                    if let Ok(inner_refs) = extractors::extract(&inner_abs, inner_type) {
                        for ir in inner_refs {
                            let ir_abs = absolutize(&ir, inner_abs.parent().unwrap_or(root_path));
                            if seen.insert(ir_abs.clone()) {
                                references.push(make_reference(ir_abs, root_path));
                            }
                        }
                    }
                }
            }
        }
    }

    let external_directories: Vec<PathBuf> = {
        let mut dirs: Vec<PathBuf> = references
            .iter()
            .filter(|r| r.is_external)
            .map(|r| dir_of(&r.path))
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    };

    DiscoveryResult {
        references,
        external_directories,
        primary_project_file: Some(primary_path),
        project_type: Some(project_type),
    }
}

fn make_reference(path: PathBuf, root: &Path) -> ProjectReference {
    let is_external = !path.starts_with(root);
    ProjectReference { path, is_external }
}

fn dir_of(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf())
    }
}

fn absolutize(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    }
}

/// Lexical `..`/`.` normalization without touching the filesystem (paths
/// may legitimately not exist yet, e.g. a referenced project that was
/// deleted after the solution file was last updated).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn find_primary_project_file(root_path: &Path) -> Option<(PathBuf, ProjectType)> {
    let entries: Vec<PathBuf> = std::fs::read_dir(root_path)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();

    for candidate_type in PRIORITY {
        if let Some(found) = find_candidate(&entries, *candidate_type) {
            return Some((found, *candidate_type));
        }
    }
    None
}

fn find_candidate(entries: &[PathBuf], project_type: ProjectType) -> Option<PathBuf> {
    let matches: Vec<&PathBuf> = entries
        .iter()
        .filter(|p| extractors::project_type_of_path(p) == Some(project_type))
        .collect();

    match project_type {
        ProjectType::PackageJson | ProjectType::CargoWorkspace | ProjectType::Pom | ProjectType::TsConfig => {
            matches
                .into_iter()
                .find(|p| extractors::declares_workspace(p, project_type))
                .cloned()
        }
        _ => matches.first().map(|p| (*p).clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempdir().unwrap();
        let result = discover_references(dir.path());
        assert!(result.references.is_empty());
        assert!(result.primary_project_file.is_none());
    }

    #[test]
    fn cargo_workspace_without_members_is_not_primary() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        let result = discover_references(dir.path());
        assert!(result.primary_project_file.is_none());
    }

    #[test]
    fn cargo_workspace_with_members_discovered() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("crates/a")).unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[workspace]\nmembers = [\"crates/a\"]\n",
        )
        .unwrap();
        let result = discover_references(dir.path());
        assert_eq!(result.project_type, Some(ProjectType::CargoWorkspace));
        assert_eq!(result.references.len(), 1);
        assert!(!result.references[0].is_external);
    }

    #[test]
    fn external_reference_marked() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            format!(
                "[workspace]\nmembers = [\"{}\"]\n",
                outside.path().display().to_string().replace('\\', "\\\\")
            ),
        )
        .unwrap();
        let result = discover_references(dir.path());
        assert_eq!(result.references.len(), 1);
        assert!(result.references[0].is_external);
        assert_eq!(result.external_directories.len(), 1);
    }

    #[test]
    fn priority_prefers_sln_over_cargo_toml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.sln"), "").unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[workspace]\nmembers = [\"x\"]\n",
        )
        .unwrap();
        let result = discover_references(dir.path());
        assert_eq!(result.project_type, Some(ProjectType::Sln));
    }
}
