#[cfg(test)]
mod tests {
    use crate::builders::patterns::RuleSet;
    use crate::core::config::{
        CopyrightSettings, FileFilterConfig, ForbiddenPatternsConfig, MappingConfig, StaticConfig,
    };
    use crate::core::engine::SourceValidator;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn brand2all_mapping() -> MappingConfig {
        MappingConfig {
            origin: "brand2all".to_string(),
            replacement: "sonic".to_string(),
            origin_tokenized: "brand2,all".to_string(),
            replacement_tokenized: "sonic".to_string(),
        }
    }

    fn project_config() -> StaticConfig {
        StaticConfig {
            mappings: vec![
                brand2all_mapping(),
                MappingConfig {
                    origin: "brand2".to_string(),
                    replacement: "sonic".to_string(),
                    origin_tokenized: "brand2".to_string(),
                    replacement_tokenized: "sonic".to_string(),
                },
            ],
            filter: FileFilterConfig {
                include_dirs: vec!["**".to_string()],
                exclude_dirs: vec!["target/**".to_string()],
                include_files: vec!["*".to_string()],
                ..Default::default()
            },
            forbidden_patterns: ForbiddenPatternsConfig {
                contains: vec!["copyright".to_string()],
                patterns: vec!["(?i)copyright.*acme".to_string()],
                exceptions: vec!["brand2u".to_string()],
                restricted: "brand2".to_string(),
            },
        }
    }

    #[test]
    fn test_expanded_rules_with_exceptions() {
        let rules = RuleSet::new(&[brand2all_mapping()], "brand2", &["brand2u".to_string()]).unwrap();
        assert_eq!(rules.as_mapping().len(), 5);

        let problem = rules
            .test_token("org.octopusden.brand2u.zenit.brand2all", 1, 0, 0)
            .unwrap();
        assert_eq!(problem.validation_problem, "brand2all");
        assert_eq!(problem.suggested_replacement, "org.octopusden.brand2u.zenit.sonic");

        let problem = rules.test_token("BRAND2AllService", 1, 0, 0).unwrap();
        assert_eq!(problem.validation_problem, "BRAND2All");
        assert_eq!(problem.suggested_replacement, "SonicService");

        assert!(rules.test_token("org.octopusden.BRAND2U.zenit", 1, 0, 0).is_none());
    }

    #[test]
    fn test_validate_in_memory_project() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "use brand2 here\n").unwrap();
        fs::write(root.join("b.properties"), "name=Brand2\n").unwrap();
        fs::write(root.join("c.txt"), "Copyright 2020 ACME\n").unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("target/out.txt"), "brand2\n").unwrap();

        let settings = CopyrightSettings {
            threads: 2,
            ..Default::default()
        };
        let validator = SourceValidator::from_provider(root, &project_config(), settings).unwrap();
        let result = validator.validate().unwrap();

        assert!(result.file_name_problems.is_empty());
        assert_eq!(result.skipped_files_and_folders, vec![PathBuf::from("target/out.txt")]);

        let a = &result.file_content_problems[&PathBuf::from("a.txt")];
        assert_eq!(a.len(), 1);
        assert_eq!((a[0].line, a[0].start_position, a[0].end_position), (1, 4, 10));

        let b = &result.file_content_problems[&PathBuf::from("b.properties")];
        assert_eq!(b[0].problem_token, "Brand2");
        assert_eq!(b[0].start_position, 5);

        let c = &result.file_content_problems[&PathBuf::from("c.txt")];
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].broken_regex, "(?i)copyright.*acme");
        assert_eq!(c[0].problem_token, "Copyright 2020 ACME");

        let expected: BTreeMap<String, String> = [
            ("brand2", "sonic"),
            ("Brand2", "Sonic"),
            ("Copyright 2020 ACME", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(result.suggested_replacements, expected);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_clean_project_is_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "brand2u is allowed\n").unwrap();
        let validator =
            SourceValidator::from_provider(dir.path(), &project_config(), CopyrightSettings::default())
                .unwrap();
        let result = validator.validate().unwrap();
        assert!(result.is_empty(), "{:?}", result);
    }
}
