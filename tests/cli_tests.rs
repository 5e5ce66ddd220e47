// Тесты разбора аргументов командной строки

#[cfg(test)]
mod tests {
    use autoscript::vm::{parse_args, version, CliArgs, RunConfig, INTERNAL_SCRIPT, INTERNAL_SCRIPT_PATH};

    // Вспомогательная функция: имя программы + аргументы
    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("autoscript")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_no_arguments_runs_internal_script() {
        assert_eq!(parse_args(args(&[])), Ok(CliArgs::Run(RunConfig::default())));
        assert!(INTERNAL_SCRIPT.contains("#include \"main.au3\""));
        assert_ne!(INTERNAL_SCRIPT_PATH, "main.au3");
    }

    #[test]
    fn test_scripts_keep_their_order() {
        let expected = RunConfig {
            scripts: vec!["b.au3".to_string(), "a.au3".to_string()],
            ..RunConfig::default()
        };
        assert_eq!(parse_args(args(&["b.au3", "a.au3"])), Ok(CliArgs::Run(expected)));
    }

    #[test]
    fn test_absolute_paths_are_scripts() {
        match parse_args(args(&["/tmp/job.au3"])) {
            Ok(CliArgs::Run(config)) => assert_eq!(config.scripts, vec!["/tmp/job.au3".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_switches_are_case_insensitive() {
        match parse_args(args(&["/DEBUG", "x.au3", "/ErrorStdout"])) {
            Ok(CliArgs::Run(config)) => {
                assert!(config.debug);
                assert!(config.error_stdout);
                assert_eq!(config.scripts, vec!["x.au3".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(args(&["/help"])), Ok(CliArgs::Help));
        assert_eq!(parse_args(args(&["/?"])), Ok(CliArgs::Help));
        assert_eq!(parse_args(args(&["x.au3", "/Version"])), Ok(CliArgs::Version));
        assert!(!version().is_empty());
    }

    #[test]
    fn test_unknown_switch_is_rejected() {
        let err = parse_args(args(&["/fast"])).unwrap_err();
        assert!(err.contains("Unknown option: /fast"));
    }
}
