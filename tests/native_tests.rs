// Тесты встроенных функций: строки, математика, типы, файлы, таймеры, макросы

#[cfg(test)]
mod tests {
    use std::fs;

    use autoscript::common::error::ErrorType;
    use autoscript::vm::natives;
    use autoscript::{Value, Vm};

    // Вспомогательная функция: запускает скрипт без эха в консоль
    fn run_script(source: &str) -> Vm {
        let mut vm = Vm::new("test.au3", source).expect("script should lex");
        vm.set_echo(false);
        if let Err(e) = vm.run() {
            panic!("Error: {}\nscript:\n{}", e, source);
        }
        vm
    }

    fn assert_output(source: &str, expected: &str) {
        let vm = run_script(source);
        assert_eq!(vm.stdout(), expected, "script:\n{}", source);
    }

    // Путь во временном каталоге в виде строки для вставки в скрипт
    fn script_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    // ========== Реестр ==========

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        assert!(natives::lookup("consolewrite").is_some());
        assert!(natives::lookup("STRINGLEN").is_some());
        assert!(natives::lookup("NoSuchThing").is_none());
        assert_eq!(natives::lookup("stringmid").map(|f| f.name), Some("StringMid"));
    }

    #[test]
    fn test_registry_names_are_sorted() {
        let names = natives::names();
        assert!(names.contains(&"InetRead"));
        assert!(names.contains(&"TimerDiff"));
        let mut sorted = names.clone();
        sorted.sort_by_key(|name| name.to_lowercase());
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_native_defaults_are_declared() {
        let mid = natives::lookup("StringMid").expect("StringMid");
        assert_eq!(mid.params.len(), 3);
        assert_eq!(mid.required(), 2);
    }

    // ========== Строки ==========

    #[test]
    fn test_string_basics() {
        assert_output("ConsoleWrite(StringLen(\"hello\"))", "5");
        assert_output("ConsoleWrite(StringUpper(\"abc\") & StringLower(\"DEF\"))", "ABCdef");
        assert_output("ConsoleWrite(StringLeft(\"hello\", 2) & \"|\" & StringRight(\"hello\", 3))", "he|llo");
        assert_output("ConsoleWrite(StringLeft(\"hi\", 10) & \"|\" & StringLeft(\"hi\", -1) & \"|\")", "hi||");
    }

    #[test]
    fn test_string_mid() {
        assert_output("ConsoleWrite(StringMid(\"Hello\", 2, 3))", "ell");
        assert_output("ConsoleWrite(StringMid(\"Hello\", 3))", "llo");
        assert_output("ConsoleWrite(\"[\" & StringMid(\"Hello\", 9) & \"]\")", "[]");
    }

    #[test]
    fn test_string_in_str() {
        assert_output("ConsoleWrite(StringInStr(\"Hello hello\", \"hello\"))", "1");
        assert_output("ConsoleWrite(StringInStr(\"Hello hello\", \"hello\", 1))", "7");
        assert_output("ConsoleWrite(StringInStr(\"a-b-c\", \"-\", 0, -1))", "4");
        assert_output("ConsoleWrite(StringInStr(\"abc\", \"z\"))", "0");
    }

    #[test]
    fn test_string_replace_counts_in_extended() {
        assert_output("$r = StringReplace(\"aXbxc\", \"x\", \"-\")\nConsoleWrite($r & @extended)", "a-b-c2");
        assert_output("ConsoleWrite(StringReplace(\"aXbxc\", \"x\", \"-\", 0, 1))", "aXb-c");
        assert_output("ConsoleWrite(StringReplace(\"aaa\", \"a\", \"b\", 1))", "baa");
        assert_output("ConsoleWrite(StringReplace(\"aaa\", \"a\", \"b\", -1))", "aab");
        assert_output("ConsoleWrite(StringReplace(\"1+1\", \"+\", \"*\"))", "1*1");
    }

    #[test]
    fn test_string_split() {
        assert_output(
            "$p = StringSplit(\"a,b,c\", \",\")\nConsoleWrite($p[0] & $p[1] & $p[3])",
            "3ac",
        );
        assert_output(
            "$p = StringSplit(\"a;b,c\", \";,\")\nConsoleWrite($p[0] & $p[2])",
            "3b",
        );
        assert_output(
            "$p = StringSplit(\"a::b\", \"::\", 1 + 2)\nConsoleWrite(UBound($p) & $p[0] & $p[1])",
            "2ab",
        );
    }

    #[test]
    fn test_string_split_without_delimiter_sets_error() {
        assert_output("$p = StringSplit(\"abc\", \",\")\nConsoleWrite(@error & $p[0] & $p[1])", "11abc");
    }

    #[test]
    fn test_string_strip_ws() {
        assert_output("ConsoleWrite(\"[\" & StringStripWS(\"  a  b  \", 1) & \"]\")", "[a  b  ]");
        assert_output("ConsoleWrite(\"[\" & StringStripWS(\"  a  b  \", 3) & \"]\")", "[a  b]");
        assert_output("ConsoleWrite(\"[\" & StringStripWS(\"  a  b  \", 7) & \"]\")", "[a b]");
        assert_output("ConsoleWrite(\"[\" & StringStripWS(\"  a  b  \", 8) & \"]\")", "[ab]");
    }

    #[test]
    fn test_string_regexp() {
        assert_output("ConsoleWrite(StringRegExp(\"abc123\", \"\\d+\"))", "1");
        assert_output("ConsoleWrite(StringRegExp(\"abc\", \"\\d+\"))", "0");
        assert_output(
            "$m = StringRegExp(\"abc123def45\", \"\\d+\", 3)\nConsoleWrite(UBound($m) & \":\" & $m[0] & \",\" & $m[1])",
            "2:123,45",
        );
        assert_output(
            "$m = StringRegExp(\"key=value\", \"(\\w+)=(\\w+)\", 1)\nConsoleWrite($m[1] & \"<-\" & $m[0])",
            "value<-key",
        );
    }

    #[test]
    fn test_string_regexp_errors() {
        assert_output("$r = StringRegExp(\"abc\", \"(\", 1)\nConsoleWrite($r & @error)", "02");
        assert_output("$r = StringRegExp(\"abc\", \"\\d\", 1)\nConsoleWrite($r & @error)", "01");
    }

    // ========== Математика ==========

    #[test]
    fn test_round() {
        assert_output("ConsoleWrite(Round(3.14159, 2))", "3.14");
        assert_output("ConsoleWrite(Round(2.5))", "3");
        assert_output("ConsoleWrite(Round(-1.234, 1))", "-1.2");
    }

    #[test]
    fn test_mod_abs_sqrt() {
        assert_output("ConsoleWrite(Mod(10, 3) & \",\" & Mod(-7, 3) & \",\" & Mod(7.5, 2))", "1,-1,1.5");
        assert_output("ConsoleWrite(Abs(-4) & \",\" & Abs(2.5) & \",\" & Abs(\"-3\"))", "4,2.5,3");
        assert_output("ConsoleWrite(Sqrt(16) & \",\" & Sqrt(2))", "4,1.4142135623731");
    }

    #[test]
    fn test_math_failures_set_error() {
        assert_output("$r = Sqrt(-1)\nConsoleWrite($r & @error)", "01");
        assert_output("$r = Mod(1, 0)\nConsoleWrite($r & @error)", "01");
    }

    #[test]
    fn test_random_integer_range() {
        for _ in 0..20 {
            let vm = run_script("$r = Random(1, 6, 1)");
            match vm.get_variable("r") {
                Some(Value::Number(n)) => assert!((1..=6).contains(&n), "out of range: {}", n),
                other => panic!("expected integer, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_random_float_range() {
        for _ in 0..20 {
            let vm = run_script("$r = Random()\n$s = Random(10)");
            match (vm.get_variable("r"), vm.get_variable("s")) {
                (Some(Value::Double(r)), Some(Value::Double(s))) => {
                    assert!((0.0..1.0).contains(&r), "out of range: {}", r);
                    assert!((0.0..10.0).contains(&s), "out of range: {}", s);
                }
                other => panic!("expected doubles, got {:?}", other),
            }
        }
        assert_output("$r = Random(5, 1)\nConsoleWrite($r & @error)", "01");
    }

    // ========== Типы и преобразования ==========

    #[test]
    fn test_number_and_int() {
        assert_output("ConsoleWrite(Number(\" 42 \") + 1)", "43");
        assert_output("ConsoleWrite(Number(\"12.5\"))", "12.5");
        assert_output("ConsoleWrite(Number(\"abc\"))", "0");
        assert_output("ConsoleWrite(Int(3.9) & Int(\"7\"))", "37");
    }

    #[test]
    fn test_var_get_type() {
        let source = "Local $a = [1]
Local $m[]
ConsoleWrite(VarGetType(1) & \" \" & VarGetType(1.5) & \" \" & VarGetType(\"s\") & \" \" & VarGetType(True))
ConsoleWrite(\" \" & VarGetType($a) & \" \" & VarGetType($m) & \" \" & VarGetType(Binary(\"x\")))";
        assert_output(source, "Int32 Double String Bool Array Map Binary");
    }

    #[test]
    fn test_type_predicates() {
        let source = "Local $a = [1]
Local $m[]
ConsoleWrite(IsNumber(1) & IsNumber(\"1\") & IsString(\"a\") & IsBool(False) & IsArray($a) & IsArray($m) & IsMap($m) & IsBinary(Binary(\"a\")))";
        assert_output(source, "10111011");
    }

    #[test]
    fn test_binary_conversions() {
        assert_output("ConsoleWrite(String(Binary(\"AB\")))", "0x4142");
        assert_output("ConsoleWrite(Binary(\"AB\"))", "AB");
        assert_output("ConsoleWrite(String(0x4142))", "0x4142");
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(Value::parse_number(" 42\t"), Value::Number(42));
        assert_eq!(Value::parse_number("2.5"), Value::Double(2.5));
        assert_eq!(Value::parse_number("x"), Value::Number(0));
        assert!(!Value::Number(0).as_bool());
        assert!(!Value::Number(-3).as_bool());
        assert!(!Value::string("").as_bool());
        assert!(!Value::Binary(Vec::new()).as_bool());
        assert!(Value::string("0").as_bool());
        assert_eq!(Value::from_f64(4.0), Value::Number(4));
        assert_eq!(Value::Double(0.1 + 0.2).to_string(), "0.3");
    }

    // ========== Файлы ==========

    #[test]
    fn test_file_write_then_read() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "out.txt");
        let source = format!(
            "$f = FileOpen(\"{p}\", 2)
FileWrite($f, \"hello \")
FileWriteLine($f, \"world\")
FileClose($f)
ConsoleWrite(FileRead(\"{p}\"))",
            p = path
        );
        assert_output(&source, "hello world\n");
        assert_eq!(fs::read_to_string(&path).expect("file written"), "hello world\n");
    }

    #[test]
    fn test_file_read_through_handle() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "in.txt");
        fs::write(&path, "abcdef").expect("write input");
        let source = format!(
            "$f = FileOpen(\"{}\")
ConsoleWrite(FileRead($f, 3) & \"|\" & FileRead($f))
FileClose($f)",
            path
        );
        assert_output(&source, "abc|def");
    }

    #[test]
    fn test_file_append_mode() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "log.txt");
        fs::write(&path, "one\n").expect("write input");
        let source = format!("$f = FileOpen(\"{}\", 1)\nFileWrite($f, \"two\")\nFileClose($f)", path);
        run_script(&source);
        assert_eq!(fs::read_to_string(&path).expect("file appended"), "one\ntwo");
    }

    #[test]
    fn test_file_open_creates_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "nested/deeper/file.txt");
        let source = format!("$f = FileOpen(\"{}\", 2 + 8)\nFileWrite($f, \"x\")\nFileClose($f)", path);
        run_script(&source);
        assert_eq!(fs::read_to_string(&path).expect("file created"), "x");
    }

    #[test]
    fn test_closed_handle_returns_failure_sentinel() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "closed.txt");
        let source = format!(
            "$f = FileOpen(\"{}\", 2)
ConsoleWrite(FileClose($f))
$w = FileWrite($f, \"late\")
ConsoleWrite(\"|\" & $w & @error)
$r = FileRead($f)
ConsoleWrite(\"|[\" & $r & \"]\" & @error)
ConsoleWrite(\"|\" & FileClose($f))",
            path
        );
        assert_output(&source, "1|01|[]1|0");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "missing.txt");
        let source = format!(
            "$f = FileOpen(\"{p}\")
ConsoleWrite($f & @error)
$r = FileRead(\"{p}\")
ConsoleWrite(\"|[\" & $r & \"]\" & @error)",
            p = path
        );
        assert_output(&source, "-11|[]1");
    }

    #[test]
    fn test_file_exists_and_delete() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = script_path(&dir, "gone.txt");
        fs::write(&path, "bye").expect("write input");
        let source = format!(
            "ConsoleWrite(FileExists(\"{p}\") & FileDelete(\"{p}\") & FileExists(\"{p}\") & FileDelete(\"{p}\"))",
            p = path
        );
        assert_output(&source, "1100");
    }

    // ========== Сеть ==========

    #[test]
    fn test_inet_read_failure_sets_error() {
        // Порт 1 на localhost закрыт: соединение отклоняется сразу
        let source = "$r = InetRead(\"http://127.0.0.1:1/\")\nConsoleWrite(@error & \"[\" & $r & \"]\")";
        assert_output(source, "1[]");
    }

    // ========== Время ==========

    #[test]
    fn test_timer_measures_sleep() {
        let vm = run_script("$t = TimerInit()\nSleep(5)\n$d = TimerDiff($t)");
        match vm.get_variable("d") {
            Some(Value::Double(ms)) => assert!(ms >= 5.0, "elapsed {}", ms),
            other => panic!("expected double, got {:?}", other),
        }
    }

    #[test]
    fn test_timer_diff_on_foreign_handle() {
        assert_output("Local $a = [1]\n$d = TimerDiff($a)\nConsoleWrite($d & @error)", "01");
    }

    // ========== Макросы ==========

    #[test]
    fn test_character_macros() {
        assert_output("ConsoleWrite(\"a\" & @CRLF & \"b\" & @TAB & \"c\" & @LF & @CR)", "a\r\nb\tc\n\r");
    }

    #[test]
    fn test_script_macros() {
        assert_output("ConsoleWrite(@ScriptName)", "test.au3");
        let vm = run_script("$full = @ScriptFullPath\n$dir = @ScriptDir");
        let full = vm.get_variable("full").map(|v| v.to_string()).unwrap_or_default();
        let dir = vm.get_variable("dir").map(|v| v.to_string()).unwrap_or_default();
        assert!(full.ends_with("test.au3"), "got {}", full);
        assert!(full.starts_with(&dir), "{} should start with {}", full, dir);
    }

    #[test]
    fn test_clock_macros() {
        assert_output("ConsoleWrite(StringLen(@YEAR) & StringLen(@MON) & StringLen(@MDAY) & StringLen(@YDAY))", "4223");
        let vm = run_script("$w = @WDAY");
        match vm.get_variable("w") {
            Some(Value::Number(n)) => assert!((1..=7).contains(&n)),
            other => panic!("expected weekday number, got {:?}", other),
        }
    }

    #[test]
    fn test_environment_macros() {
        assert_output("ConsoleWrite(@OSType)", std::env::consts::OS);
        assert_output("ConsoleWrite(@AutoItPID)", &std::process::id().to_string());
        assert_output("ConsoleWrite(@NumParams)", "0");
    }

    #[test]
    fn test_macros_are_case_insensitive_and_checked() {
        assert_output("ConsoleWrite(@crlf = @CRLF)", "True");
        let mut vm = Vm::new("test.au3", "ConsoleWrite(@NoSuchMacro)").unwrap();
        vm.set_echo(false);
        let err = vm.run().unwrap_err();
        assert!(err.is_instance_of(&ErrorType::NameError), "got {}", err);
    }

    // ========== Консоль ==========

    #[test]
    fn test_console_write_error_goes_to_stderr() {
        let vm = run_script("ConsoleWrite(\"out\")\nConsoleWriteError(\"err\")");
        assert_eq!(vm.stdout(), "out");
        assert_eq!(vm.stderr(), "err");
    }

    #[test]
    fn test_console_write_returns_length() {
        assert_output("$n = ConsoleWrite(\"abc\")\nConsoleWrite($n)", "abc3");
    }
}
