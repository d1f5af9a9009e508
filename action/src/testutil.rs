use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use repo::{Architecture, BuildInfo, OutputPackage, OutputPackageBase, Version};
use walkdir::WalkDir;

use crate::{ActionState, Shared, Task, TaskRef};

/// Write a package metadata file readable by `JsonPackageReader`.
pub fn write_package(
    dir: &Path,
    name: &str,
    base: &str,
    version: &str,
    arch: &str,
    installed: &[&str],
) -> Result<PathBuf> {
    let path = dir.join(format!("{name}-{version}-{arch}.pkg.tar.zst"));
    let json = serde_json::json!({
        "pkginfo": {"name": name, "base": base, "version": version, "arch": arch},
        "buildinfo": {"installed": installed},
        "files": [format!("usr/share/{name}/README")],
    });
    fs::write(&path, serde_json::to_vec(&json)?)?;
    Ok(path)
}

pub fn pkgbase(base: &str, names: &[&str], version: &str, arch: Architecture) -> Result<OutputPackageBase> {
    let packages = names
        .iter()
        .map(|name| OutputPackage {
            name: name.to_string(),
            filename: format!("{name}-{version}-{arch}.pkg.tar.zst"),
            arch,
            desc: None,
            url: None,
            depends: Vec::new(),
            files: Vec::new(),
            csize: 0,
        })
        .collect();
    Ok(OutputPackageBase {
        base: base.to_owned(),
        version: Version::new(version)?,
        packages,
        buildinfo: BuildInfo::default(),
        source_url: None,
    })
}

pub fn as_ref<T: Task + 'static>(task: &Shared<T>) -> TaskRef {
    task.clone()
}

pub fn state<T: Task>(task: &Shared<T>) -> ActionState {
    task.borrow().state()
}

/// Relative paths of every file, symlink and directory below `dir`, sorted.
pub fn tree(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        out.push(entry.path().strip_prefix(dir)?.to_string_lossy().into_owned());
    }
    out.sort();
    Ok(out)
}
