use std::fs;
use std::path::{Path, PathBuf};

fn rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

fn rel(path: &Path) -> String {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    rel.replace('\\', "/")
}

#[test]
fn system_module_does_not_depend_on_presentation() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/system");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        for forbidden in ["crate::report", "crate::format", "println!", "clap::"] {
            if content.contains(forbidden) {
                violations.push(format!(
                    "{} uses forbidden dependency `{}`",
                    rel(&file),
                    forbidden
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "System layering violations:\n{}",
        violations.join("\n")
    );
}

#[test]
fn samplers_read_through_the_filesystem_seam() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/system");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let rel_path = rel(&file);
        if rel_path == "src/system/fs.rs" {
            continue;
        }
        let content = fs::read_to_string(&file).unwrap_or_default();
        for forbidden in ["std::fs::", "File::open"] {
            if content.contains(forbidden) {
                violations.push(format!("{rel_path} bypasses FileSystem via `{forbidden}`"));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Direct filesystem access outside the seam:\n{}",
        violations.join("\n")
    );
}

#[test]
fn libc_is_scoped_to_the_capacity_helper() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        if !content.contains("libc::") && !content.contains("target_os") {
            continue;
        }

        let rel_path = rel(&file);
        if rel_path != "src/bin/procsnap-df.rs" {
            violations.push(format!(
                "{} uses libc or a target_os cfg outside the helper binary",
                rel_path
            ));
        }
    }

    assert!(
        violations.is_empty(),
        "Unexpected platform code:\n{}",
        violations.join("\n")
    );
}
