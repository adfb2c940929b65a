use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::tempdir;

use weft::WeftError;
use weft_cli::{Args, run};

/// Collects all .ncl files from a directory
fn collect_ncl_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("ncl")
            })
            .collect()
    } else {
        Vec::new()
    };

    // Sort for consistent test output
    files.sort();
    files
}

/// Demos are at workspace root, relative to workspace not the crate
fn demos_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
}

fn args(input: &Path, output: &Path) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        output: Some(output.to_string_lossy().to_string()),
        config: None,
        log_level: "off".to_string(),
    }
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let valid_demos = collect_ncl_files(&demos_path());

    assert!(!valid_demos.is_empty(), "No valid demos found in demos/");

    let mut failed_demos = Vec::new();

    for demo_path in &valid_demos {
        let output_path = temp_dir.path().join(demo_path.file_name().unwrap());

        match run(&args(demo_path, &output_path)) {
            Ok(()) => {
                let written = fs::read_to_string(&output_path).unwrap();
                assert!(written.starts_with("<?xml"), "{}", demo_path.display());
            }
            Err(e) => failed_demos.push((demo_path.clone(), e)),
        }
    }

    if !failed_demos.is_empty() {
        eprintln!("\nValid demos that failed:");
        for (path, err) in &failed_demos {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} valid demo(s) failed unexpectedly", failed_demos.len());
    }

    println!("✅ All {} valid demos passed", valid_demos.len());
}

#[test]
fn e2e_smoke_test_error_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let error_demos = collect_ncl_files(&demos_path().join("errors"));

    assert!(
        !error_demos.is_empty(),
        "No error demos found in demos/errors/"
    );

    let mut unexpectedly_succeeded = Vec::new();

    for demo_path in &error_demos {
        let output_path = temp_dir
            .path()
            .join(format!("error_{}", demo_path.file_name().unwrap().to_string_lossy()));

        if run(&args(demo_path, &output_path)).is_ok() {
            unexpectedly_succeeded.push(demo_path.clone());
        }
    }

    if !unexpectedly_succeeded.is_empty() {
        eprintln!("\nError demos that unexpectedly succeeded:");
        for path in &unexpectedly_succeeded {
            eprintln!("  - {}", path.display());
        }
        panic!(
            "{} error demo(s) succeeded unexpectedly",
            unexpectedly_succeeded.len()
        );
    }

    println!(
        "✅ All {} error demos failed as expected",
        error_demos.len()
    );
}

#[test]
fn e2e_unresolved_output_is_still_written() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = demos_path().join("errors").join("unresolved.ncl");
    let output = temp_dir.path().join("unresolved.ncl");

    let err = run(&args(&input, &output)).unwrap_err();
    assert!(matches!(&err, WeftError::Unresolved(refs) if refs.len() == 1));

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.contains("<media id='video' src='a.mp4' descriptor='missing'/>"));
}

#[test]
fn e2e_circular_import_writes_nothing() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = demos_path().join("errors").join("circular_a.ncl");
    let output = temp_dir.path().join("circular.ncl");

    let err = run(&args(&input, &output)).unwrap_err();
    assert!(matches!(err, WeftError::CircularImport { ref chain } if chain.len() == 3));
    assert!(!output.exists());
}

#[test]
fn e2e_config_controls_serialization() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config = temp_dir.path().join("config.toml");
    fs::write(
        &config,
        "[serializer]\nquote = \"double\"\nindent = 4\nxml_declaration = false\n",
    )
    .unwrap();
    let output = temp_dir.path().join("hello.ncl");

    let mut args = args(&demos_path().join("hello.ncl"), &output);
    args.config = Some(config.to_string_lossy().to_string());
    run(&args).unwrap();

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("<ncl id=\"hello\">\n    <head>\n"));
    assert!(written.contains("<descriptor id=\"fullScreen\" region=\"screen\" transIn=\"fade\"/>"));
}
