//! Format-specific reference extractors. Each extractor returns referenced
//! paths relative to (or absolute from) its own file; the caller
//! absolutizes and dedups. Parsing is best-effort — any parse failure
//! returns an empty `Vec` rather than propagating an error, per the
//! discoverer's "one bad file doesn't abort the scan" contract.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recognized primary build-file formats, in discovery priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Sln,
    Slnx,
    CodeWorkspace,
    PackageJson,
    GoWork,
    CargoWorkspace,
    Pom,
    TsConfig,
    Csproj,
    Fsproj,
}

pub fn project_type_of_path(path: &Path) -> Option<ProjectType> {
    let name = path.file_name()?.to_str()?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match (name, ext) {
        (_, "sln") => Some(ProjectType::Sln),
        (_, "slnx") => Some(ProjectType::Slnx),
        (_, "csproj") => Some(ProjectType::Csproj),
        (_, "fsproj") => Some(ProjectType::Fsproj),
        ("package.json", _) => Some(ProjectType::PackageJson),
        ("go.work", _) => Some(ProjectType::GoWork),
        ("Cargo.toml", _) => Some(ProjectType::CargoWorkspace),
        ("pom.xml", _) => Some(ProjectType::Pom),
        ("tsconfig.json", _) => Some(ProjectType::TsConfig),
        _ if name.ends_with(".code-workspace") => Some(ProjectType::CodeWorkspace),
        _ => None,
    }
}

/// Whether `path` (of `project_type`) actually declares workspace members —
/// for formats where the file can exist without being a workspace root
/// (`package.json` without `workspaces`, `Cargo.toml` without
/// `[workspace]`, `pom.xml` without `<modules>`, `tsconfig.json` without
/// `references`).
pub fn declares_workspace(path: &Path, project_type: ProjectType) -> bool {
    match project_type {
        ProjectType::PackageJson => package_json_workspaces(path).map(|v| !v.is_empty()).unwrap_or(false),
        ProjectType::CargoWorkspace => cargo_workspace_members(path).map(|v| !v.is_empty()).unwrap_or(false)
            || cargo_declares_empty_workspace(path),
        ProjectType::Pom => pom_modules(path).map(|v| !v.is_empty()).unwrap_or(false),
        ProjectType::TsConfig => tsconfig_references(path).map(|v| !v.is_empty()).unwrap_or(false),
        _ => true,
    }
}

fn cargo_declares_empty_workspace(path: &Path) -> bool {
    let Ok(text) = std::fs::read_to_string(path) else { return false };
    let Ok(value) = text.parse::<toml::Value>() else { return false };
    value.get("workspace").is_some()
}

/// Extract raw (possibly relative) reference paths from a build file.
/// Never fails outward — any internal error collapses to an empty `Vec`.
pub fn extract(path: &Path, project_type: ProjectType) -> Result<Vec<PathBuf>, ()> {
    let refs = match project_type {
        ProjectType::Sln => sln_references(path),
        ProjectType::Slnx => slnx_references(path),
        ProjectType::CodeWorkspace => code_workspace_folders(path),
        ProjectType::PackageJson => package_json_workspaces(path)
            .map(|patterns| expand_workspace_patterns(path, &patterns)),
        ProjectType::GoWork => go_work_uses(path),
        ProjectType::CargoWorkspace => cargo_workspace_members(path)
            .map(|patterns| expand_workspace_patterns(path, &patterns)),
        ProjectType::Pom => pom_modules(path),
        ProjectType::TsConfig => tsconfig_references(path),
        ProjectType::Csproj => csproj_project_references(path),
        ProjectType::Fsproj => csproj_project_references(path),
    };
    Ok(refs.unwrap_or_default())
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Expand a single trailing `*` wildcard one directory level, filtering to
/// entries that actually contain the manifest implied by the pattern's
/// parent directory (best-effort: any dir containing a recognizable
/// manifest file is kept).
fn expand_workspace_patterns(manifest_path: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let base = base_dir(manifest_path);
    let mut out = Vec::new();
    for pattern in patterns {
        if let Some(prefix) = pattern.strip_suffix("/*").or_else(|| pattern.strip_suffix("\\*")) {
            let dir = base.join(prefix);
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_dir() && has_any_manifest(&p) {
                    out.push(p);
                }
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    out
}

fn has_any_manifest(dir: &Path) -> bool {
    ["package.json", "Cargo.toml", "pom.xml"]
        .iter()
        .any(|name| dir.join(name).exists())
}

fn package_json_workspaces(path: &Path) -> Option<Vec<String>> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    let workspaces = value.get("workspaces")?;
    match workspaces {
        Value::Array(arr) => Some(
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        Value::Object(obj) => {
            let packages = obj.get("packages")?.as_array()?;
            Some(
                packages
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            )
        }
        _ => None,
    }
}

fn cargo_workspace_members(path: &Path) -> Option<Vec<String>> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: toml::Value = text.parse().ok()?;
    let workspace = value.get("workspace")?;
    let members = workspace.get("members")?.as_array()?;
    Some(
        members
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
    )
}

fn go_work_uses(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut out = Vec::new();
    let mut in_block = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("use (") {
            in_block = true;
            continue;
        }
        if in_block {
            if trimmed == ")" {
                in_block = false;
                continue;
            }
            if !trimmed.is_empty() {
                out.push(PathBuf::from(trimmed));
            }
        } else if let Some(rest) = trimmed.strip_prefix("use ") {
            out.push(PathBuf::from(rest.trim()));
        }
    }
    Some(out)
}

fn tsconfig_references(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    let references = value.get("references")?.as_array()?;
    Some(
        references
            .iter()
            .filter_map(|r| r.get("path").and_then(|p| p.as_str()).map(PathBuf::from))
            .collect(),
    )
}

fn code_workspace_folders(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    let folders = value.get("folders")?.as_array()?;
    Some(
        folders
            .iter()
            .filter_map(|f| f.get("path").and_then(|p| p.as_str()).map(PathBuf::from))
            .collect(),
    )
}

/// `.sln` is a line-oriented text format, not XML. Project entries look
/// like: `Project("{GUID}") = "Name", "relative\path\Proj.csproj", "{GUID}"`
fn sln_references(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut out = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with("Project(") {
            continue;
        }
        let parts: Vec<&str> = trimmed.split(',').collect();
        if parts.len() < 2 {
            continue;
        }
        let raw = parts[1].trim().trim_matches('"');
        if raw.ends_with(".csproj") || raw.ends_with(".fsproj") || raw.ends_with(".vcxproj") {
            out.push(PathBuf::from(raw.replace('\\', "/")));
        }
    }
    Some(out)
}

/// `.slnx` is the newer XML-based solution format:
/// `<Solution><Project Path="..."/></Solution>`
fn slnx_references(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    xml_attr_values(&text, "Project", "Path")
}

fn pom_modules(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    xml_element_texts(&text, "module").map(|texts| texts.into_iter().map(PathBuf::from).collect())
}

fn csproj_project_references(path: &Path) -> Option<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).ok()?;
    xml_attr_values(&text, "ProjectReference", "Include")
}

/// Minimal quick-xml based attribute scraper: find every `<tag ... attr="value" .../>`
/// and return the attribute values, in document order. Tolerant of
/// self-closing and open/close element forms.
fn xml_attr_values(xml: &str, tag: &str, attr: &str) -> Option<Vec<PathBuf>> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == tag.as_bytes() {
                    for a in e.attributes().flatten() {
                        if a.key.local_name().as_ref() == attr.as_bytes() {
                            if let Ok(v) = a.unescape_value() {
                                out.push(PathBuf::from(v.replace('\\', "/")));
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }
    Some(out)
}

fn xml_element_texts(xml: &str, tag: &str) -> Option<Vec<String>> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = Vec::new();
    let mut in_tag = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                in_tag = e.local_name().as_ref() == tag.as_bytes();
            }
            Ok(Event::Text(t)) => {
                if in_tag {
                    if let Ok(text) = t.unescape() {
                        out.push(text.into_owned());
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == tag.as_bytes() {
                    in_tag = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }
    Some(out)
}
