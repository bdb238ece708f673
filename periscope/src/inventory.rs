//! Script tree inventory for upload to the control plane.
//!
//! Walks the script root, hashes every script file, and extracts a
//! structural summary (top-level functions, groups and their direct
//! methods) with the script parser. The control plane uses the hashes to
//! skip files it already ingested and the summaries to offer trace targets
//! in its UI.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use periscope_script::ast::{Item, Module};
use periscope_script::host::ScriptHost;
use periscope_script::parse::parse_module;
use periscope_wire::{FileRecord, FileSummary, FunctionInfo, GroupInfo};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

const SCRIPT_EXTENSION: &str = "psc";

/// Walks `root` and produces one record per parseable script file, sorted
/// by relative name.
///
/// Files matching an `exclude` entry (exact relative path, or anything
/// under it when the entry names a directory) are skipped. Unreadable and
/// unparseable files are skipped with a warning; a half-saved script must
/// not take the whole inventory down.
pub fn scan(root: &Path, exclude: &[String]) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SCRIPT_EXTENSION) {
            continue;
        }
        let name = relative_name(root, path)?;
        if is_excluded(&name, exclude) {
            debug!("Skipping excluded script {name}");
            continue;
        }

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                warn!("Skipping unreadable script {name}: {err}");
                continue;
            }
        };
        let module = match parse_module(&source) {
            Ok(module) => module,
            Err(err) => {
                warn!("Skipping unparseable script {name}: {err}");
                continue;
            }
        };

        records.push(FileRecord {
            hash: format!("{:x}", Sha256::digest(source.as_bytes())),
            lines: source.lines().count() as u32,
            summary: summarize(&module),
            source,
            name,
        });
    }
    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

/// Loads every script under `root` into `host`, returning how many loaded.
///
/// Module paths derive from relative file names (`worker/tasks.psc` loads
/// as `worker.tasks`). Files that fail to parse or load are skipped with a
/// warning, matching [`scan`].
pub fn load_tree(host: &Arc<ScriptHost>, root: &Path, exclude: &[String]) -> Result<usize> {
    let mut loaded = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(SCRIPT_EXTENSION) {
            continue;
        }
        let name = relative_name(root, path)?;
        if is_excluded(&name, exclude) {
            continue;
        }
        let module_path = match name.strip_suffix(".psc") {
            Some(stem) => stem.replace('/', "."),
            None => continue,
        };
        match host.load_file(&module_path, path) {
            Ok(()) => loaded += 1,
            Err(err) => warn!("Skipping script {name}: {err}"),
        }
    }
    Ok(loaded)
}

/// Structural summary of a parsed module: top-level functions, and groups
/// with their direct methods. Groups nested inside groups are not listed,
/// mirroring how trace targets are addressed (one optional parent group).
#[must_use]
pub fn summarize(module: &Module) -> FileSummary {
    let mut summary = FileSummary::default();
    for item in &module.items {
        match item {
            Item::Function(func) => summary.functions.push(FunctionInfo {
                name: func.name.clone(),
                start_line: func.line,
                end_line: func.end_line,
            }),
            Item::Group(group) => {
                let methods = group
                    .items
                    .iter()
                    .filter_map(|member| match member {
                        Item::Function(func) => Some(FunctionInfo {
                            name: func.name.clone(),
                            start_line: func.line,
                            end_line: func.end_line,
                        }),
                        Item::Group(_) => None,
                    })
                    .collect();
                summary.groups.push(GroupInfo {
                    name: group.name.clone(),
                    start_line: group.line,
                    end_line: group.end_line,
                    methods,
                });
            }
        }
    }
    summary
}

fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("Path {} escapes script root", path.display()))?;
    let name = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(name)
}

fn is_excluded(relative: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|entry| {
        let entry = entry.trim_end_matches('/');
        relative == entry
            || relative
                .strip_prefix(entry)
                .map_or(false, |rest| rest.starts_with('/'))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_script(root: &Path, name: &str, source: &str) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create script directory");
        }
        fs::write(path, source).expect("Failed to write script");
    }

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_script(
            dir.path(),
            "counter.psc",
            "group Counter {\n    fn update(count) {\n        return count + 1;\n    }\n}\n\nfn shift(value) {\n    return value + 100;\n}\n",
        );
        write_script(dir.path(), "worker/tasks.psc", "fn run(job) {\n    return job;\n}\n");
        write_script(dir.path(), "notes.txt", "not a script\n");
        dir
    }

    #[test]
    fn test_scan_collects_sorted_records() {
        let dir = sample_tree();
        let records = scan(dir.path(), &[]).expect("Failed to scan");

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["counter.psc", "worker/tasks.psc"]);

        let counter = &records[0];
        assert_eq!(counter.hash.len(), 64);
        assert_eq!(counter.lines, 9);
        assert_eq!(counter.summary.functions.len(), 1);
        assert_eq!(counter.summary.functions[0].name, "shift");
        assert_eq!(counter.summary.groups.len(), 1);
        assert_eq!(counter.summary.groups[0].name, "Counter");
        assert_eq!(counter.summary.groups[0].methods[0].name, "update");
    }

    #[test]
    fn test_scan_skips_unparseable_files() {
        let dir = sample_tree();
        write_script(dir.path(), "broken.psc", "fn oops( {\n");

        let records = scan(dir.path(), &[]).expect("Failed to scan");
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["counter.psc", "worker/tasks.psc"]);
    }

    #[test]
    fn test_scan_honors_excludes() {
        let dir = sample_tree();

        let records = scan(dir.path(), &["worker".to_string()]).expect("Failed to scan");
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["counter.psc"]);

        let records = scan(dir.path(), &["counter.psc".to_string()]).expect("Failed to scan");
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["worker/tasks.psc"]);
    }

    #[test]
    fn test_load_tree_registers_modules() {
        let dir = sample_tree();
        let host = Arc::new(ScriptHost::new());

        let loaded = load_tree(&host, dir.path(), &[]).expect("Failed to load tree");
        assert_eq!(loaded, 2);
        assert!(host.has_module("counter"));
        assert!(host.has_module("worker.tasks"));
        assert!(!host.has_module("notes"));
    }

    #[test]
    fn test_hash_changes_with_content() {
        let dir = sample_tree();
        let before = scan(dir.path(), &[]).expect("Failed to scan");
        write_script(dir.path(), "worker/tasks.psc", "fn run(job) {\n    return job + 1;\n}\n");
        let after = scan(dir.path(), &[]).expect("Failed to scan");

        assert_eq!(before[0].hash, after[0].hash);
        assert_ne!(before[1].hash, after[1].hash);
    }
}
