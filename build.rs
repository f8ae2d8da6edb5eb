use std::path::{Path, PathBuf};
use std::process::Command;

const MAX_LINES: usize = 750;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");
    println!("cargo:rerun-if-changed=.git/packed-refs");

    let sha = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TERMHOST_GIT_SHA={}", sha);

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set");
    let root = PathBuf::from(&manifest_dir);
    let mut files = Vec::new();
    collect_rust_files(&root.join("src"), &mut files);
    files.sort();

    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }

    enforce_line_limits(&root, &files);
    enforce_no_dead_code_allows(&root, &files);
    enforce_serial_for_env_mutations(&root, &files);
}

fn collect_rust_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
            files.push(path);
        }
    }
}

fn report(root: &Path, title: &str, violations: &[(PathBuf, usize, String)], hint: &[&str]) {
    eprintln!("\n========================================");
    eprintln!("{}", title);
    eprintln!("========================================");
    eprintln!();
    for (path, line_num, message) in violations {
        let rel_path = path.strip_prefix(root).unwrap_or(path);
        eprintln!("  {}:{}", rel_path.display(), line_num);
        eprintln!("    {}", message.trim());
        eprintln!();
    }
    eprintln!("========================================");
    for line in hint {
        eprintln!("{}", line);
    }
    eprintln!("========================================\n");
}

fn enforce_line_limits(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files {
        match std::fs::read_to_string(file) {
            Ok(content) => {
                let count = content.lines().filter(|l| !l.trim().is_empty()).count();
                if count > MAX_LINES {
                    violations.push((
                        file.clone(),
                        count,
                        format!("{} lines (exceeds by {})", count, count - MAX_LINES),
                    ));
                }
            }
            Err(e) => println!("cargo:warning=Could not read file {}: {}", file.display(), e),
        }
    }

    if !violations.is_empty() {
        report(
            root,
            &format!("FILE LINE LIMIT EXCEEDED (max {} lines)", MAX_LINES),
            &violations,
            &["Please split these files into smaller modules."],
        );
        panic!(
            "Build failed: {} file(s) exceed the {} line limit",
            violations.len(),
            MAX_LINES
        );
    }
}

fn enforce_no_dead_code_allows(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        for (line_num, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if (trimmed.starts_with("#[allow(") || trimmed.starts_with("#![allow("))
                && trimmed.contains("dead_code")
            {
                violations.push((file.clone(), line_num + 1, line.to_string()));
            }
        }
    }

    if !violations.is_empty() {
        report(
            root,
            "#[allow(dead_code)] IS NOT ALLOWED",
            &violations,
            &[
                "Delete unused code, or gate test-only code with #[cfg(test)].",
            ],
        );
        panic!(
            "Build failed: {} #[allow(dead_code)] occurrence(s) found. Remove the dead code.",
            violations.len()
        );
    }
}

/// Requires #[serial] for tests that mutate environment variables.
fn enforce_serial_for_env_mutations(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();

    for file in files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();

        let mut in_test_fn = false;
        let mut test_fn_start = 0;
        let mut test_fn_name = String::new();
        let mut has_serial = false;
        let mut brace_depth = 0i32;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();

            if trimmed == "#[serial]" || trimmed == "#[serial_test::serial]" {
                has_serial = true;
            }

            if trimmed == "#[test]" || trimmed.starts_with("#[tokio::test") {
                for next in lines.iter().skip(i + 1).take(4) {
                    if let Some(fn_pos) = next.find("fn ") {
                        test_fn_start = i + 1;
                        let after_fn = next.get(fn_pos + 3..).unwrap_or_default();
                        test_fn_name = after_fn
                            .split('(')
                            .next()
                            .unwrap_or_default()
                            .trim()
                            .to_string();
                        in_test_fn = true;
                        brace_depth = 0;
                        break;
                    }
                }
            }

            if !in_test_fn {
                continue;
            }
            for c in line.chars() {
                if c == '{' {
                    brace_depth += 1;
                } else if c == '}' {
                    brace_depth -= 1;
                    if brace_depth == 0 {
                        in_test_fn = false;
                        has_serial = false;
                    }
                }
            }

            let mutates_env = !trimmed.starts_with("//")
                && (trimmed.contains("env::set_var") || trimmed.contains("env::remove_var"));
            if in_test_fn && !has_serial && mutates_env {
                violations.push((
                    file.clone(),
                    test_fn_start,
                    format!("test `{}` mutates env without #[serial]", test_fn_name),
                ));
                in_test_fn = false;
            }
        }
    }

    if !violations.is_empty() {
        report(
            root,
            "ENV MUTATIONS REQUIRE #[serial]",
            &violations,
            &[
                "Environment variables are global state. Add #[serial] from serial_test:",
                "",
                "    #[test]",
                "    #[serial]",
                "    fn test_with_env_var() { ... }",
            ],
        );
        panic!(
            "Build failed: {} test(s) mutate env vars without #[serial].",
            violations.len()
        );
    }
}
