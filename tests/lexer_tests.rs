// Тесты лексера: виды токенов, ключевые слова, комментарии, позиции

#[cfg(test)]
mod tests {
    use autoscript::lexer::{Lexer, Token, TokenKind};
    use autoscript::LangError;

    fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize().expect("source should lex")
    }

    // Вспомогательная функция: только виды токенов
    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_source() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_assignment_statement() {
        let tokens = tokenize("$x = 42");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::Variable);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[1].kind, TokenKind::Operator);
        assert_eq!(tokens[1].lexeme, "=");
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].lexeme, "42");
    }

    #[test]
    fn test_numbers_and_doubles() {
        assert_eq!(kinds("1 2.5 0x1F"), vec![TokenKind::Number, TokenKind::Double, TokenKind::Binary]);
        let tokens = tokenize("0xff");
        assert_eq!(tokens[0].lexeme, "ff");
        // Точка без цифр после неё не входит в число
        assert_eq!(kinds("3.")[0], TokenKind::Number);
    }

    #[test]
    fn test_strings_with_both_quotes() {
        let tokens = tokenize(r#""double" 'single' "a \"q\" b""#);
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::String));
        assert_eq!(tokens[0].lexeme, "double");
        assert_eq!(tokens[1].lexeme, "single");
        assert_eq!(tokens[2].lexeme, "a \"q\" b");
    }

    #[test]
    fn test_compound_operators() {
        let ops: Vec<String> = tokenize("+= -= *= /= &= <= >= <> ==")
            .into_iter()
            .map(|t| t.lexeme)
            .collect();
        assert_eq!(ops, vec!["+=", "-=", "*=", "/=", "&=", "<=", ">=", "<>", "=="]);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("IF then ElSe endif WEND"),
            vec![TokenKind::If, TokenKind::Then, TokenKind::Else, TokenKind::EndIf, TokenKind::WEnd]
        );
    }

    #[test]
    fn test_dim_is_a_local_scope_token() {
        let tokens = tokenize("Dim local GLOBAL Const static");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Scope));
        let names: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(names, vec!["Local", "Local", "Global", "Const", "Static"]);
    }

    #[test]
    fn test_booleans_null_default() {
        let tokens = tokenize("true FALSE null Default");
        assert_eq!(tokens[0].kind, TokenKind::Boolean);
        assert_eq!(tokens[0].lexeme, "True");
        assert_eq!(tokens[1].lexeme, "False");
        assert_eq!(tokens[2].kind, TokenKind::Null);
        assert_eq!(tokens[3].kind, TokenKind::Default);
    }

    #[test]
    fn test_identifiers_macros_and_flags() {
        let tokens = tokenize("ConsoleWrite @CRLF #include-once");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Macro);
        assert_eq!(tokens[1].lexeme, "CRLF");
        assert_eq!(tokens[2].kind, TokenKind::Flag);
        assert_eq!(tokens[2].lexeme, "include-once");
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("( ) [ ] ,"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Separator
            ]
        );
    }

    #[test]
    fn test_line_comment_runs_to_end_of_line() {
        let tokens = tokenize("$a ; note $b\n$c");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Variable, TokenKind::Comment, TokenKind::Eol, TokenKind::Variable]
        );
        assert_eq!(tokens[1].lexeme, " note $b");
    }

    #[test]
    fn test_comment_block() {
        let tokens = tokenize("#cs\nignored $x\n#ce\n$y");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert!(tokens[0].lexeme.contains("ignored"));
        assert_eq!(tokens.last().map(|t| t.lexeme.as_str()), Some("y"));
        assert_eq!(tokens.last().map(|t| t.line), Some(4));
    }

    #[test]
    fn test_unterminated_comment_block_is_lex_error() {
        let err = Lexer::new("#comments-start\nnever closed").tokenize().unwrap_err();
        assert!(matches!(err, LangError::LexError { line: 1, .. }), "got {}", err);
    }

    #[test]
    fn test_line_continuation_token() {
        assert_eq!(
            kinds("$a & _\n$b"),
            vec![TokenKind::Variable, TokenKind::Operator, TokenKind::Extend, TokenKind::Eol, TokenKind::Variable]
        );
        // `_name` остаётся частью идентификатора
        assert_eq!(kinds("_helper")[0], TokenKind::Identifier);
    }

    #[test]
    fn test_lines_and_columns() {
        let tokens = tokenize("$a = 1\n  $b");
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].col), (1, 6));
        let b = tokens.last().unwrap();
        assert_eq!((b.line, b.col), (2, 3));
    }

    #[test]
    fn test_crlf_and_tabs_are_normalised() {
        let tokens = tokenize("$a\r\n\t$b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, TokenKind::Eol);
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn test_illegal_character() {
        let tokens = tokenize("$a ? 1");
        assert_eq!(tokens[1].kind, TokenKind::Illegal);
        assert_eq!(tokens[1].lexeme, "?");
    }

    #[test]
    fn test_empty_variable_name_is_lex_error() {
        assert!(Lexer::new("$ = 1").tokenize().is_err());
        assert!(Lexer::new("@").tokenize().is_err());
    }
}
