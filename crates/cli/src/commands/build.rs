//! `flash build` — scan the project, write the manifest, generate
//! handlers.

use std::path::Path;

use flash_build::handlers::{generate_handlers, BUILD_DIR};
use flash_build::{build_manifest, ProjectScanner};
use flash_domain::manifest::MANIFEST_FILENAME;

pub fn run(path: &str, name: Option<&str>) -> anyhow::Result<()> {
    let root = Path::new(path);
    let project_name = match name {
        Some(name) => name.to_string(),
        None => root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "flash-project".into()),
    };

    println!("Scanning {} …", root.display());
    let scan = ProjectScanner::new(root).scan()?;
    if scan.functions.is_empty() {
        anyhow::bail!(
            "no annotated callables found under {}; decorate a function with @remote",
            root.display()
        );
    }
    println!(
        "  {} function{} across {} resource{}",
        scan.functions.len(),
        crate::format::plural(scan.functions.len()),
        scan.resources.len(),
        crate::format::plural(scan.resources.len()),
    );

    let manifest = build_manifest(&project_name, &scan)?;
    let manifest_path = root.join(".flash").join(MANIFEST_FILENAME);
    manifest.save(&manifest_path)?;
    println!("Wrote {}", manifest_path.display());

    let build_dir = root.join(BUILD_DIR);
    let written = generate_handlers(&manifest, &build_dir)?;
    println!(
        "Generated {} handler file{} in {}",
        written.len(),
        crate::format::plural(written.len()),
        build_dir.display()
    );
    Ok(())
}
