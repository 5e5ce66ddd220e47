// Line-oriented lexer: one pass, character at a time, longest match per construct

use super::token::{keyword, Token, TokenKind};
use crate::common::error::LangError;

pub struct Lexer {
    source: Vec<char>,
    current: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    /// Line endings are normalised to `\n` and tabs to spaces before scanning
    pub fn new(source: &str) -> Self {
        let normalized = source
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\t', " ");
        Self {
            source: normalized.chars().collect(),
            current: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn from_bytes(source: &[u8]) -> Self {
        Self::new(&String::from_utf8_lossy(source))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LangError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, LangError> {
        while self.peek() == ' ' {
            self.advance();
        }
        if self.is_at_end() {
            return Ok(None);
        }

        let line = self.line;
        let col = self.col;
        let c = self.advance();

        let token = match c {
            '\n' => Token::new(TokenKind::Eol, "", line, col),
            '_' if !is_ident(self.peek()) => Token::new(TokenKind::Extend, "_", line, col),
            '"' | '\'' => {
                let value = self.read_string(c);
                Token::new(TokenKind::String, value, line, col)
            }
            '#' => {
                let flag = self.read_flag();
                match flag.to_lowercase().as_str() {
                    "cs" | "comments-start" => {
                        let text = self.read_comment_block(line)?;
                        Token::new(TokenKind::Comment, text, line, col)
                    }
                    _ => Token::new(TokenKind::Flag, flag, line, col),
                }
            }
            '@' => {
                let name = self.read_ident();
                if name.is_empty() {
                    return Err(LangError::lex_error("expected macro name after '@'", line));
                }
                Token::new(TokenKind::Macro, name, line, col)
            }
            ';' => {
                let text = self.read_until_newline();
                Token::new(TokenKind::Comment, text, line, col)
            }
            '$' => {
                let name = self.read_ident();
                if name.is_empty() {
                    return Err(LangError::lex_error("expected variable name after '$'", line));
                }
                Token::new(TokenKind::Variable, name, line, col)
            }
            '(' => Token::new(TokenKind::LParen, "(", line, col),
            ')' => Token::new(TokenKind::RParen, ")", line, col),
            '[' => Token::new(TokenKind::LBracket, "[", line, col),
            ']' => Token::new(TokenKind::RBracket, "]", line, col),
            ',' => Token::new(TokenKind::Separator, ",", line, col),
            '=' | '&' | '+' | '-' | '*' | '/' | '<' | '>' => {
                let mut op = c.to_string();
                if self.match_char('=') {
                    op.push('=');
                } else if c == '<' && self.match_char('>') {
                    op.push('>');
                }
                Token::new(TokenKind::Operator, op, line, col)
            }
            c if c.is_ascii_digit() => {
                if c == '0' && matches!(self.peek(), 'x' | 'X') {
                    self.advance();
                    let digits = self.read_while(|ch| ch.is_ascii_hexdigit());
                    Token::new(TokenKind::Binary, digits, line, col)
                } else {
                    self.number(c, line, col)
                }
            }
            c if is_ident(c) => {
                let mut name = c.to_string();
                name.push_str(&self.read_ident());
                match keyword(&name.to_lowercase()) {
                    Some((kind, Some(canonical))) => Token::new(kind, canonical, line, col),
                    Some((kind, None)) => Token::new(kind, name, line, col),
                    None => Token::new(TokenKind::Identifier, name, line, col),
                }
            }
            other => Token::new(TokenKind::Illegal, other.to_string(), line, col),
        };

        Ok(Some(token))
    }

    fn number(&mut self, first: char, line: usize, col: usize) -> Token {
        let mut lexeme = first.to_string();
        lexeme.push_str(&self.read_while(|ch| ch.is_ascii_digit()));

        // At most one decimal point
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            lexeme.push('.');
            lexeme.push_str(&self.read_while(|ch| ch.is_ascii_digit()));
            return Token::new(TokenKind::Double, lexeme, line, col);
        }
        Token::new(TokenKind::Number, lexeme, line, col)
    }

    /// Reads a quoted string. Only the quote of the same kind can be escaped
    /// with a backslash; an unterminated string runs to the end of input.
    fn read_string(&mut self, quote: char) -> String {
        let mut value = String::new();
        while !self.is_at_end() {
            let c = self.advance();
            if c == '\\' && self.peek() == quote {
                value.push(self.advance());
                continue;
            }
            if c == quote {
                break;
            }
            value.push(c);
        }
        value
    }

    fn read_comment_block(&mut self, start_line: usize) -> Result<String, LangError> {
        let mut text = String::new();
        loop {
            if self.is_at_end() {
                return Err(LangError::lex_error(
                    format!("comment block beginning at line {} does not end", start_line),
                    start_line,
                ));
            }
            let c = self.advance();
            if c != '#' {
                text.push(c);
                continue;
            }
            let flag = self.read_flag();
            match flag.to_lowercase().as_str() {
                "ce" | "comments-end" => return Ok(text),
                _ => {
                    text.push('#');
                    text.push_str(&flag);
                }
            }
        }
    }

    fn read_ident(&mut self) -> String {
        self.read_while(is_ident)
    }

    fn read_flag(&mut self) -> String {
        self.read_while(|ch| is_ident(ch) || ch == '-')
    }

    fn read_until_newline(&mut self) -> String {
        self.read_while(|ch| ch != '\n')
    }

    fn read_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut read = String::new();
        while !self.is_at_end() && accept(self.peek()) {
            read.push(self.advance());
        }
        read
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
