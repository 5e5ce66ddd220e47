// Scope frames: one per script, function call, or nested block body

use std::collections::HashMap;
use std::rc::Rc;

use crate::common::value::Value;
use crate::lexer::Token;
use crate::preprocessor::TokenBlock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Script,
    Function(String),
    Block,
}

/// A window `[start, end)` over a shared token run
#[derive(Debug, Clone)]
pub struct Block {
    pub tokens: TokenBlock,
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn new(tokens: TokenBlock, start: usize, end: usize) -> Self {
        let end = end.min(tokens.len());
        Self { tokens, start, end }
    }

    pub fn whole(tokens: TokenBlock) -> Self {
        let end = tokens.len();
        Self { tokens, start: 0, end }
    }

    pub fn empty() -> Self {
        Self::whole(Rc::from(Vec::<Token>::new()))
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub value: Value,
    pub constant: bool,
}

/// `@error`, `@extended` and the pending return value of a script or function frame
#[derive(Debug, Clone)]
pub struct Registers {
    pub error: i64,
    pub extended: i64,
    pub return_value: Value,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            error: 0,
            extended: 0,
            return_value: Value::Number(0),
        }
    }
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub code: Block,
    pub pos: usize,
    pub vars: HashMap<String, Variable>,
    pub registers: Registers,
    pub num_params: usize,
}

impl Scope {
    pub fn new(kind: ScopeKind, code: Block) -> Self {
        let pos = code.start;
        Self {
            kind,
            code,
            pos,
            vars: HashMap::new(),
            registers: Registers::default(),
            num_params: 0,
        }
    }

    /// Script and function frames own registers; block frames defer to them
    pub fn is_frame(&self) -> bool {
        !matches!(self.kind, ScopeKind::Block)
    }

    pub fn current(&self) -> Option<&Token> {
        if self.pos < self.code.end {
            self.code.tokens.get(self.pos)
        } else {
            None
        }
    }

    pub fn read_token(&mut self) -> Option<Token> {
        let token = self.current().cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn move_by(&mut self, delta: isize) {
        let pos = self.pos as isize + delta;
        self.pos = pos.clamp(self.code.start as isize, self.code.end as isize) as usize;
    }

    pub fn rewind(&mut self) {
        self.pos = self.code.start;
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }
}
