// Immutable tables built by the preprocessor and shared by every scope of a VM tree

use std::collections::HashMap;
use std::rc::Rc;

use crate::lexer::Token;

/// Index of a call-site descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub usize);

/// Index of a for-loop descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub usize);

/// Shared, immutable run of tokens (a body, an argument, an expression)
pub type TokenBlock = Rc<[Token]>;

/// `Name(arg, arg, ...)` with every argument kept as un-evaluated tokens.
/// Arguments are evaluated fresh on each invocation.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub name: String,
    pub args: Vec<TokenBlock>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Param {
    /// Lower-cased variable name, without the `$`
    pub name: String,
    pub default: Option<TokenBlock>,
}

#[derive(Debug, Clone)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub body: TokenBlock,
    pub line: usize,
}

impl UserFunction {
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

#[derive(Debug, Clone)]
pub enum LoopKind {
    /// `For $i = start To end [Step step]`
    Range {
        start: TokenBlock,
        end: TokenBlock,
        step: Option<TokenBlock>,
    },
    /// `For $v In collection`
    Each { collection: TokenBlock },
}

#[derive(Debug, Clone)]
pub struct ForLoop {
    /// Index variable name, without the `$`
    pub index: String,
    pub kind: LoopKind,
    pub body: TokenBlock,
    pub line: usize,
}

/// Output of preprocessing: the executable top-level token stream plus the
/// function, call-site and loop tables its tokens refer to.
#[derive(Debug, Clone)]
pub struct Program {
    pub tokens: TokenBlock,
    pub functions: HashMap<String, Rc<UserFunction>>,
    pub calls: Vec<CallSite>,
    pub loops: Vec<ForLoop>,
}

impl Program {
    pub fn empty() -> Self {
        Self {
            tokens: Rc::from(Vec::new()),
            functions: HashMap::new(),
            calls: Vec::new(),
            loops: Vec::new(),
        }
    }

    pub fn call(&self, id: CallId) -> Option<&CallSite> {
        self.calls.get(id.0)
    }

    pub fn for_loop(&self, id: LoopId) -> Option<&ForLoop> {
        self.loops.get(id.0)
    }

    /// Case-insensitive function lookup
    pub fn function(&self, name: &str) -> Option<Rc<UserFunction>> {
        self.functions.get(&name.to_lowercase()).cloned()
    }
}
