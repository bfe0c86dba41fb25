use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use whitelabel_validator::builders::names::NameTreeValidator;
use whitelabel_validator::builders::reporter::{TextReportGenerator, default_report_paths, write_report};
use whitelabel_validator::builders::validator::{ConfigValidator, StandardValidator};
use whitelabel_validator::core::config::{ForbiddenPatternsConfig, MappingConfig, load_document};
use whitelabel_validator::core::engine::SourceValidator;
use whitelabel_validator::core::entries::{is_zip_file, prefixed_entry_names};

const MAPPING: &str = r#"[
  {"origin": "brand2", "replacement": "sonic", "originTokenized": "brand2", "replacementTokenized": "sonic"}
]"#;

const FILTER: &str = r#"{
  "includeDirs": ["**"],
  "excludeDirs": ["build/**"],
  "includeFiles": ["*"],
  "excludeFiles": []
}"#;

const FORBIDDEN: &str = r#"{
  "contains": ["copyright"],
  "patterns": ["(?i)copyright.*acme"],
  "exceptions": ["brand2u"],
  "restricted": "brand2"
}"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Config documents under `config/`, the project under `project/`.
fn setup_project() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let project = dir.path().join("project");

    write(&config, "mapping.json", MAPPING);
    write(&config, "filter.json", FILTER);
    write(&config, "forbidden.json", FORBIDDEN);

    write(&project, ".wlignore.json", r#"{"excludeFiles": ["*.log"]}"#);
    write(&project, "README.txt", "Copyright (c) ACME corp\nplain line\n");
    write(&project, "brand2u.txt", "brand2u rocks\n");
    write(&project, "build/Generated.java", "class brand2 {}\n");
    write(&project, "debug.log", "brand2 started\n");
    write(
        &project,
        "src/org/brand2/Brand2Client.java",
        "package org.brand2;\n\npublic class Brand2Client {\n}\n",
    );
    (dir, config, project)
}

fn validator(config: &Path, project: &Path) -> SourceValidator {
    SourceValidator::new(
        project,
        config.join("mapping.json"),
        config.join("filter.json"),
        config.join("forbidden.json"),
    )
    .unwrap()
}

#[test]
fn test_core_workflow() {
    let (_dir, config, project) = setup_project();

    // 1. Validate
    let result = validator(&config, &project).validate().unwrap();

    // 2. File names
    assert_eq!(result.file_name_problems.len(), 1);
    assert_eq!(result.file_name_problems["Brand2Client.java"], "SonicClient.java");

    // 3. Contents
    let java = &result.file_content_problems[&PathBuf::from("src/org/brand2/Brand2Client.java")];
    assert_eq!(java.len(), 2);
    assert!(java.iter().any(|p| p.problem_token == "brand2"
        && (p.line, p.start_position, p.end_position) == (1, 12, 18)));
    assert!(java.iter().any(|p| p.problem_token == "Brand2Client"
        && p.suggested_replacement == "SonicClient"
        && p.line == 3));

    let readme = &result.file_content_problems[&PathBuf::from("README.txt")];
    assert_eq!(readme.len(), 1);
    assert_eq!(readme[0].problem_token, "Copyright (c) ACME");
    assert_eq!(readme[0].line, 1);

    assert_eq!(result.file_content_problems.len(), 2);
    assert_eq!(result.suggested_replacements["Brand2Client"], "SonicClient");

    // 4. Skipped by the global filter and by the local override
    assert!(result.skipped_files_and_folders.contains(&PathBuf::from("build/Generated.java")));
    assert!(result.skipped_files_and_folders.contains(&PathBuf::from("debug.log")));
    assert_eq!(result.skipped_files_and_folders.len(), 2);
}

#[test]
fn test_report_is_written() {
    let (dir, config, project) = setup_project();
    let result = validator(&config, &project).validate().unwrap();

    let (errors, success) = default_report_paths(&dir.path().join("reports"));
    let written = write_report(&TextReportGenerator::new(), &result, &errors, &success, "2.0.1").unwrap();

    assert_eq!(written, errors);
    let report = fs::read_to_string(errors).unwrap();
    assert!(report.starts_with("Version 2.0.1\n"));
    assert!(report.contains("Rename Brand2Client.java -> SonicClient.java"));
    assert!(report.contains("======== README.txt ===="));
}

#[test]
fn test_missing_config_fails_fast() {
    let (_dir, config, project) = setup_project();
    let err = SourceValidator::new(
        &project,
        config.join("missing.json"),
        config.join("filter.json"),
        config.join("forbidden.json"),
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_yaml_config_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "mapping.yaml",
        "- origin: brand2all\n  replacement: sonic\n  originTokenized: brand2,all\n  replacementTokenized: sonic\n",
    );
    write(
        dir.path(),
        "forbidden.yaml",
        "contains: [copyright]\npatterns: ['(?i)copyright.*acme']\nexceptions: [BRAND2]\nrestricted: brand2\n",
    );

    let mappings: Vec<MappingConfig> = load_document(&dir.path().join("mapping.yaml")).unwrap();
    let forbidden: ForbiddenPatternsConfig = load_document(&dir.path().join("forbidden.yaml")).unwrap();
    let issues = StandardValidator::new().validate_config(&mappings, &forbidden).unwrap();

    assert_eq!(issues.len(), 2, "{:?}", issues);
    assert!(issues[0].contains("tokenizes into 2 words but its replacement into 1"));
    assert!(issues[1].contains("equals the restricted token"));
}

#[test]
fn test_archive_names_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    // The extension does not matter, only the signature.
    let archive = dir.path().join("bundle.dist");
    let mut writer = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
    let options = zip::write::FileOptions::default();
    writer.add_directory("brand2/", options).unwrap();
    writer.start_file("brand2/app.txt", options).unwrap();
    writer.write_all(b"hello").unwrap();
    writer.start_file("lib/brand2u.jar", options).unwrap();
    writer.write_all(b"jar").unwrap();
    writer.finish().unwrap();

    assert!(is_zip_file(&archive).unwrap());
    let names = prefixed_entry_names(&archive).unwrap();
    let validator = NameTreeValidator::new("^(?!.*(brand2(?![Uu]))).*$").unwrap();
    let problems = validator.validate(&names);

    assert_eq!(
        problems,
        vec!["/bundle.dist/brand2 does not match ^(?!.*(brand2(?![Uu]))).*$".to_string()]
    );
}
