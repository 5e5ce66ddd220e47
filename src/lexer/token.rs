// Tokens produced by the lexer and rewritten by the preprocessor

use crate::preprocessor::program::{CallId, LoopId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Illegal,
    Eol,
    /// Line continuation `_`
    Extend,

    // Literals
    String,
    Number,
    Double,
    Boolean,
    /// Hex digits of a `0x...` literal (prefix stripped)
    Binary,
    Null,
    Default,

    Macro,
    Comment,
    Variable,
    Flag,
    /// Bare call identifier (function name not followed by a call block)
    Identifier,

    // Structure
    LParen,
    RParen,
    LBracket,
    RBracket,
    Separator,
    Operator,
    And,
    Or,
    Not,

    // Preprocessed call sites and loops, indexing the program tables
    Call(CallId),
    UserCall(CallId),
    Loop(LoopId),

    // Keywords
    Func,
    EndFunc,
    Return,
    If,
    Then,
    Else,
    ElseIf,
    EndIf,
    For,
    To,
    Step,
    In,
    Next,
    While,
    WEnd,
    With,
    EndWith,
    Do,
    Until,
    Switch,
    EndSwitch,
    Select,
    EndSelect,
    Case,
    ContinueCase,
    ContinueLoop,
    ExitLoop,
    /// Local / Global / Const / Static (Dim is folded into Local)
    Scope,
    ReDim,
    Enum,
    Volatile,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            col,
        }
    }

    /// Synthetic token (no source position), e.g. the EOL closing an include
    pub fn synthetic(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Self::new(kind, lexeme, 0, 0)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.lexeme == op
    }

    /// Lower-cased lexeme, used for case-insensitive names
    pub fn key(&self) -> String {
        self.lexeme.to_lowercase()
    }

    /// End of a statement line
    pub fn ends_line(&self) -> bool {
        matches!(self.kind, TokenKind::Eol | TokenKind::Comment)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.kind {
            TokenKind::Eol => write!(f, "end of line"),
            TokenKind::String => write!(f, "\"{}\"", self.lexeme),
            TokenKind::Variable => write!(f, "${}", self.lexeme),
            TokenKind::Macro => write!(f, "@{}", self.lexeme),
            TokenKind::Flag => write!(f, "#{}", self.lexeme),
            TokenKind::Binary => write!(f, "0x{}", self.lexeme),
            _ if self.lexeme.is_empty() => write!(f, "{:?}", self.kind),
            _ => write!(f, "{}", self.lexeme),
        }
    }
}

/// Keyword table (matched case-insensitively). `Dim` maps onto a Local scope token.
pub fn keyword(lower: &str) -> Option<(TokenKind, Option<&'static str>)> {
    let kind = match lower {
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "elseif" => TokenKind::ElseIf,
        "endif" => TokenKind::EndIf,
        "for" => TokenKind::For,
        "to" => TokenKind::To,
        "step" => TokenKind::Step,
        "in" => TokenKind::In,
        "next" => TokenKind::Next,
        "while" => TokenKind::While,
        "wend" => TokenKind::WEnd,
        "with" => TokenKind::With,
        "endwith" => TokenKind::EndWith,
        "do" => TokenKind::Do,
        "until" => TokenKind::Until,
        "switch" => TokenKind::Switch,
        "endswitch" => TokenKind::EndSwitch,
        "select" => TokenKind::Select,
        "endselect" => TokenKind::EndSelect,
        "case" => TokenKind::Case,
        "continuecase" => TokenKind::ContinueCase,
        "continueloop" => TokenKind::ContinueLoop,
        "exitloop" => TokenKind::ExitLoop,
        "dim" | "local" => return Some((TokenKind::Scope, Some("Local"))),
        "global" => return Some((TokenKind::Scope, Some("Global"))),
        "const" => return Some((TokenKind::Scope, Some("Const"))),
        "static" => return Some((TokenKind::Scope, Some("Static"))),
        "redim" => TokenKind::ReDim,
        "enum" => TokenKind::Enum,
        "volatile" => TokenKind::Volatile,
        "func" => TokenKind::Func,
        "return" => TokenKind::Return,
        "endfunc" => TokenKind::EndFunc,
        "exit" => TokenKind::Exit,
        "null" => TokenKind::Null,
        "default" => TokenKind::Default,
        "true" => return Some((TokenKind::Boolean, Some("True"))),
        "false" => return Some((TokenKind::Boolean, Some("False"))),
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => return None,
    };
    Some((kind, None))
}
