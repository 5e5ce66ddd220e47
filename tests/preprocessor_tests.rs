// Тесты препроцессора: таблицы вызовов, циклов и функций, структура блоков, #include

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use autoscript::lexer::{Lexer, TokenKind};
    use autoscript::preprocessor::{LoopKind, Preprocessor, Program};
    use autoscript::{LangError, Vm};

    // Вспомогательная функция: лексер + препроцессор
    fn preprocess(source: &str) -> Result<Program, LangError> {
        let tokens = Lexer::new(source).tokenize().expect("source should lex");
        Preprocessor::new("test.au3").run(tokens)
    }

    // Вспомогательная функция для проверки ошибки препроцессора
    fn assert_preprocess_error(source: &str, fragment: &str) {
        match preprocess(source) {
            Ok(_) => panic!("Expected preprocess error containing '{}'\nscript:\n{}", fragment, source),
            Err(e) => {
                assert!(matches!(e, LangError::PreprocessError { .. }), "got {}", e);
                assert!(e.message().contains(fragment), "expected '{}' in '{}'", fragment, e.message());
            }
        }
    }

    fn write_script(dir: &Path, name: &str, source: &str) {
        fs::write(dir.join(name), source).expect("write script");
    }

    fn run_file(path: &Path) -> Result<Vm, LangError> {
        let mut vm = Vm::from_file(path)?;
        vm.set_echo(false);
        vm.run()?;
        Ok(vm)
    }

    // ========== Таблицы программы ==========

    #[test]
    fn test_tables_are_built() {
        let source = "Func Add($a, $b = 1)
    Return $a + $b
EndFunc
For $i = 1 To 3
    ConsoleWrite(Add($i))
Next";
        let program = preprocess(source).expect("should preprocess");

        assert_eq!(program.functions.len(), 1);
        let add = program.function("ADD").expect("Add should be registered");
        assert_eq!(add.name, "Add");
        assert_eq!(add.params.len(), 2);
        assert_eq!(add.required_params(), 1);
        assert_eq!(add.params[0].name, "a");

        assert_eq!(program.calls.len(), 2);
        let names: Vec<&str> = program.calls.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Add") && names.contains(&"ConsoleWrite"), "got {:?}", names);

        assert_eq!(program.loops.len(), 1);
        assert_eq!(program.loops[0].index, "i");
        assert!(matches!(program.loops[0].kind, LoopKind::Range { step: None, .. }));
    }

    #[test]
    fn test_top_level_stream_keeps_only_executable_tokens() {
        let program = preprocess("Func F()\nEndFunc\nFor $x In $list\nNext\nF()").expect("should preprocess");
        let kinds: Vec<TokenKind> = program.tokens.iter().map(|t| t.kind).collect();
        assert!(!kinds.contains(&TokenKind::Func));
        assert!(!kinds.contains(&TokenKind::EndFunc));
        assert!(!kinds.contains(&TokenKind::Next));
        assert!(kinds.iter().any(|k| matches!(k, TokenKind::Loop(_))));
        assert!(kinds.iter().any(|k| matches!(k, TokenKind::UserCall(_))));
        assert!(matches!(program.loops[0].kind, LoopKind::Each { .. }));
    }

    #[test]
    fn test_native_and_user_call_sites_are_told_apart() {
        let program = preprocess("ConsoleWrite(1)\nMine(2)").expect("should preprocess");
        let kinds: Vec<TokenKind> = program.tokens.iter().map(|t| t.kind).collect();
        assert!(matches!(kinds[0], TokenKind::Call(_)));
        assert!(matches!(kinds[2], TokenKind::UserCall(_)));
    }

    #[test]
    fn test_call_arguments_are_split_on_top_level_separators() {
        let program = preprocess("F(1, G(2, 3), [4, 5])").expect("should preprocess");
        let outer = program.calls.iter().find(|c| c.name == "F").expect("F call site");
        assert_eq!(outer.args.len(), 3);
        let inner = program.calls.iter().find(|c| c.name == "G").expect("G call site");
        assert_eq!(inner.args.len(), 2);
    }

    #[test]
    fn test_nested_for_loops_get_own_descriptors() {
        let program = preprocess("For $i = 1 To 2\n    For $j = 1 To 2 Step 1\n    Next\nNext").expect("should preprocess");
        assert_eq!(program.loops.len(), 2);
        let outer = program.loops.iter().find(|l| l.index == "i").expect("outer loop");
        assert!(outer.body.iter().any(|t| matches!(t.kind, TokenKind::Loop(_))));
    }

    #[test]
    fn test_line_continuations_are_joined() {
        let program = preprocess("$x = 1 + _ ; still going\n    2").expect("should preprocess");
        assert!(program.tokens.iter().all(|t| t.kind != TokenKind::Extend && t.kind != TokenKind::Eol));
    }

    // ========== Ошибки препроцессора ==========

    #[test]
    fn test_duplicate_function_is_rejected() {
        assert_preprocess_error("Func F()\nEndFunc\nFunc f()\nEndFunc", "already defined");
    }

    #[test]
    fn test_function_syntax_errors() {
        assert_preprocess_error("EndFunc", "EndFunc without matching Func");
        assert_preprocess_error("Func F()\n    $x = 1\n", "unexpected end of func");
        assert_preprocess_error("Func F($a = 1, $b)\nEndFunc", "follows an optional parameter");
        assert_preprocess_error("Func F($a, $a)\nEndFunc", "duplicate parameter");
        assert_preprocess_error("Func F()\n    Func G()\n    EndFunc\nEndFunc", "nested Func");
    }

    #[test]
    fn test_empty_call_argument_is_rejected() {
        assert_preprocess_error("F(1,,2)", "empty argument");
        assert_preprocess_error("F(1, 2,)", "empty argument");
    }

    #[test]
    fn test_for_syntax_errors() {
        assert_preprocess_error("For $i = 1 To 3\n    ConsoleWrite($i)\n", "For without matching Next");
        assert_preprocess_error("Next", "Next without matching For");
        assert_preprocess_error("For $i = 1\nNext", "expected To");
    }

    #[test]
    fn test_unbalanced_blocks_are_rejected() {
        assert_preprocess_error("If 1 Then\n    $x = 1\n", "without matching");
        assert_preprocess_error("While 1\n    $x = 1\nEndIf", "closes");
        assert_preprocess_error("WEnd", "without matching opener");
        assert_preprocess_error("Else", "Else without matching If");
        assert_preprocess_error("Case 1", "Case outside of Switch or Select");
        assert_preprocess_error("If 1\n    $x = 1\nEndIf", "If without Then");
    }

    #[test]
    fn test_blocks_inside_function_bodies_are_checked() {
        assert_preprocess_error("Func F()\n    If 1 Then\nEndFunc", "without matching");
    }

    #[test]
    fn test_single_line_if_needs_no_endif() {
        assert!(preprocess("If 1 Then $x = 1\n$y = 2").is_ok());
        assert!(preprocess("If 1 Then $x = 1 EndIf").is_ok());
    }

    #[test]
    fn test_unsupported_constructs() {
        assert_preprocess_error("With $obj\nEndWith", "not supported");
        assert_preprocess_error("Volatile $x = 1", "not supported");
    }

    #[test]
    fn test_library_include_is_rejected() {
        assert_preprocess_error("#include <Array.au3>", "library includes");
    }

    #[test]
    fn test_missing_include_file() {
        assert_preprocess_error("#include \"does-not-exist.au3\"", "cannot include");
    }

    // ========== #include ==========

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir(dir.path().join("lib")).expect("lib dir");
        write_script(dir.path(), "lib/helpers.au3", "Func Helper()\n    Return \"helped\"\nEndFunc\n");
        write_script(dir.path(), "main.au3", "#include \"lib/helpers.au3\"\nConsoleWrite(Helper())\n");

        let vm = run_file(&dir.path().join("main.au3")).expect("script should run");
        assert_eq!(vm.stdout(), "helped");
    }

    #[test]
    fn test_include_once_is_loaded_a_single_time() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "once.au3", "#include-once\nConsoleWrite(\"loaded \")\nFunc Shared()\nEndFunc\n");
        write_script(
            dir.path(),
            "main.au3",
            "#include \"once.au3\"\n#include \"once.au3\"\nConsoleWrite(\"main\")\n",
        );

        let vm = run_file(&dir.path().join("main.au3")).expect("script should run");
        assert_eq!(vm.stdout(), "loaded main");
    }

    #[test]
    fn test_plain_include_twice_duplicates_functions() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "twice.au3", "Func Shared()\nEndFunc\n");
        write_script(dir.path(), "main.au3", "#include \"twice.au3\"\n#include \"twice.au3\"\n");

        let err = run_file(&dir.path().join("main.au3")).err().expect("duplicate function expected");
        assert!(err.message().contains("already defined"), "got {}", err);
    }

    #[test]
    fn test_include_cycle_is_detected() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_script(dir.path(), "a.au3", "#include \"b.au3\"\n");
        write_script(dir.path(), "b.au3", "#include \"a.au3\"\n");

        let err = run_file(&dir.path().join("a.au3")).err().expect("cycle expected");
        assert!(matches!(err, LangError::PreprocessError { .. }), "got {}", err);
        assert!(err.message().contains("cycle"), "got {}", err);
    }

    #[test]
    fn test_include_must_start_a_line() {
        assert_preprocess_error("$x = 1 #include \"a.au3\"", "unexpected flag");
    }
}
