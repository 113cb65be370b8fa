//! Discovery of installed third-party packages.

use std::path::Path;

use keel_graph::PackageRef;

/// Lists the packages installed in `packages_root`, sorted by name.
///
/// Scoped packages (`@scope/name`) are listed individually. Hidden
/// directories such as `.bin` are skipped. A missing directory yields an
/// empty list.
pub fn installed_packages(project_root: &Path, packages_root: &Path) -> std::io::Result<Vec<PackageRef>> {
    let mut packages = Vec::new();
    if !packages_root.is_dir() {
        return Ok(packages);
    }

    for entry in std::fs::read_dir(packages_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if name.starts_with('@') {
            for scoped in std::fs::read_dir(entry.path())? {
                let scoped = scoped?;
                if scoped.file_type()?.is_dir() {
                    let full = format!("{name}/{}", scoped.file_name().to_string_lossy());
                    packages.push(package_ref(project_root, packages_root, full));
                }
            }
        } else {
            packages.push(package_ref(project_root, packages_root, name));
        }
    }

    packages.sort();
    Ok(packages)
}

fn package_ref(project_root: &Path, packages_root: &Path, name: String) -> PackageRef {
    let dir = packages_root.join(&name);
    let relative = dir.strip_prefix(project_root).unwrap_or(&dir);
    let root = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    PackageRef { name, root }
}
