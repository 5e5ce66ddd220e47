// Expression and statement evaluation over a cursor into a shared token run

use crate::common::error::{ErrorType, LangError};
use crate::common::value::{decode_hex, Value};
use crate::lexer::{Token, TokenKind};
use crate::preprocessor::TokenBlock;
use crate::vm::handles::HeapObject;
use crate::vm::operations::{binary_op, compound_base, is_assignment, negate};
use crate::vm::vm::{DeclScope, Flow, Vm};

/// Window `[pos, end)` the evaluator may read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub pos: usize,
    pub end: usize,
}

impl Cursor {
    pub fn new(pos: usize, end: usize) -> Self {
        Self { pos, end }
    }
}

/// Result of one `eval`: the value (when one was expected), how control
/// left the statement, and how many tokens were consumed
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: Option<Value>,
    pub flow: Flow,
    pub consumed: usize,
}

pub struct Evaluator<'vm> {
    pub(crate) vm: &'vm mut Vm,
    pub(crate) tokens: TokenBlock,
    pub(crate) cursor: Cursor,
}

impl<'vm> Evaluator<'vm> {
    pub fn new(vm: &'vm mut Vm, tokens: TokenBlock, cursor: Cursor) -> Self {
        let end = cursor.end.min(tokens.len());
        Self {
            vm,
            tokens,
            cursor: Cursor::new(cursor.pos, end),
        }
    }

    /// With `expect_value` a full expression is read; otherwise one statement
    /// (declaration, assignment, call or control construct) is executed.
    pub fn eval(&mut self, expect_value: bool) -> Result<Evaluated, LangError> {
        let start = self.cursor.pos;
        let (value, flow) = if expect_value {
            (Some(self.value()?), Flow::Normal)
        } else {
            (None, self.statement()?)
        };
        Ok(Evaluated {
            value,
            flow,
            consumed: self.cursor.pos - start,
        })
    }

    // ========== Cursor ==========

    pub(crate) fn peek(&self) -> Option<&Token> {
        if self.cursor.pos < self.cursor.end {
            self.tokens.get(self.cursor.pos)
        } else {
            None
        }
    }

    pub(crate) fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().map(|t| t.kind == kind).unwrap_or(false)
    }

    pub(crate) fn advance(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.cursor.pos += 1;
        }
        token
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, LangError> {
        match self.peek().cloned() {
            Some(token) if token.kind == kind => {
                self.cursor.pos += 1;
                Ok(token)
            }
            Some(token) => Err(self.syntax_error(format!("expected {}, found {}", what, token))),
            None => Err(self.syntax_error(format!("expected {}, found end of expression", what))),
        }
    }

    pub(crate) fn line(&self) -> usize {
        match self.peek() {
            Some(token) if token.line > 0 => token.line,
            _ => self.vm.line(),
        }
    }

    pub(crate) fn syntax_error(&self, message: impl Into<String>) -> LangError {
        LangError::runtime_error_with_type(message, self.line(), ErrorType::SyntaxError)
    }

    /// Evaluates `tokens[start..end]` as one complete expression
    pub(crate) fn eval_range(&mut self, tokens: TokenBlock, start: usize, end: usize) -> Result<Value, LangError> {
        let mut sub = Evaluator::new(&mut *self.vm, tokens, Cursor::new(start, end));
        let value = sub.value()?;
        match sub.peek() {
            Some(token) if !token.ends_line() => Err(sub.syntax_error(format!("unexpected {} in expression", token))),
            _ => Ok(value),
        }
    }

    // ========== Statements ==========

    fn statement(&mut self) -> Result<Flow, LangError> {
        let Some(token) = self.peek().cloned() else {
            return Ok(Flow::Normal);
        };
        match token.kind {
            TokenKind::Scope => self.declaration()?,
            TokenKind::Enum => {
                self.advance();
                self.enumeration(DeclScope::Local)?;
            }
            TokenKind::Variable => self.assignment()?,
            TokenKind::Call(_) | TokenKind::UserCall(_) => {
                let value = self.term()?;
                self.merge_value(value)?;
            }
            TokenKind::ReDim => self.redim()?,
            TokenKind::If => return self.if_chain(),
            TokenKind::Switch => return self.switch(),
            TokenKind::Select => return self.select(),
            TokenKind::Loop(id) => return self.for_loop(id),
            TokenKind::While => return self.while_loop(),
            TokenKind::Do => return self.do_until(),
            TokenKind::Eol | TokenKind::Comment => {}
            _ => {
                return Err(self.syntax_error(format!("illegal {} when not expecting value", token)));
            }
        }
        Ok(Flow::Normal)
    }

    /// `Local|Global|Const|Static [Const] $a [= v], $b[3], $m[] ...`
    fn declaration(&mut self) -> Result<(), LangError> {
        let mut target = DeclScope::Local;
        let mut constant = false;
        let mut is_static = false;
        while let Some(token) = self.peek().filter(|t| t.kind == TokenKind::Scope).cloned() {
            match token.lexeme.as_str() {
                "Global" => target = DeclScope::Global,
                "Const" => constant = true,
                "Static" => is_static = true,
                _ => target = DeclScope::Local,
            }
            self.advance();
        }

        if self.peek_is(TokenKind::Enum) {
            self.advance();
            return self.enumeration(target);
        }

        loop {
            let var = self.expect(TokenKind::Variable, "variable")?;
            let (dims, open) = self.subscripts()?;
            let init = if self.peek().map(|t| t.is_operator("=")).unwrap_or(false) {
                self.advance();
                Some(self.value()?)
            } else {
                None
            };

            if constant && init.is_none() {
                return Err(LangError::runtime_error_with_type(
                    format!("Const ${} requires an initial value", var.lexeme),
                    var.line,
                    ErrorType::ConstError,
                ));
            }

            let scope = match target {
                DeclScope::Local if is_static => DeclScope::Static,
                other => other,
            };
            if !(scope == DeclScope::Static && self.vm.declared_static(&var.lexeme)) {
                let value = self.declared_value(&var, dims, open, init)?;
                self.vm.declare_variable(scope, &var.lexeme, value, constant)?;
            }

            if !self.peek_is(TokenKind::Separator) {
                return Ok(());
            }
            self.advance();
        }
    }

    fn declared_value(&mut self, var: &Token, dims: Vec<Value>, open: bool, init: Option<Value>) -> Result<Value, LangError> {
        if open {
            return match init {
                None => Ok(self.vm.new_map()),
                Some(value) if self.is_array(&value) => Ok(value),
                Some(_) => Err(LangError::runtime_error_with_type(
                    format!("${}[] can only be initialised with an array literal", var.lexeme),
                    var.line,
                    ErrorType::TypeError,
                )),
            };
        }
        if dims.is_empty() {
            return Ok(init.unwrap_or_else(|| Value::string("")));
        }

        let array = self.sized_array(&dims, var.line)?;
        if let Some(init) = init {
            let items = match init.as_handle().and_then(|id| self.vm.get_handle(id)) {
                Some(HeapObject::Array(items)) => items.clone(),
                _ => {
                    return Err(LangError::runtime_error_with_type(
                        format!("${} must be initialised with an array literal", var.lexeme),
                        var.line,
                        ErrorType::TypeError,
                    ))
                }
            };
            if let Some(id) = array.as_handle() {
                for (i, item) in items.into_iter().enumerate() {
                    self.vm.array_set(id, i as i64, item)?;
                }
            }
        }
        Ok(array)
    }

    /// `[n]` dimensions; `[]` marks an open subscript (map declaration)
    fn subscripts(&mut self) -> Result<(Vec<Value>, bool), LangError> {
        let mut dims = Vec::new();
        while self.peek_is(TokenKind::LBracket) {
            self.advance();
            if self.peek_is(TokenKind::RBracket) {
                self.advance();
                return Ok((dims, true));
            }
            dims.push(self.value()?);
            self.expect(TokenKind::RBracket, "']'")?;
        }
        Ok((dims, false))
    }

    /// Nested arrays for `$a[2][3]`, every cell an empty string
    fn sized_array(&mut self, dims: &[Value], line: usize) -> Result<Value, LangError> {
        let Some((first, rest)) = dims.split_first() else {
            return Ok(Value::string(""));
        };
        let size = first.as_int();
        if size < 0 {
            return Err(LangError::runtime_error_with_type(
                format!("invalid array size {}", size),
                line,
                ErrorType::IndexError,
            ));
        }
        let mut items = Vec::with_capacity(size as usize);
        for _ in 0..size {
            items.push(self.sized_array(rest, line)?);
        }
        Ok(self.vm.new_array(items))
    }

    fn is_array(&self, value: &Value) -> bool {
        matches!(
            value.as_handle().and_then(|id| self.vm.get_handle(id)),
            Some(HeapObject::Array(_))
        )
    }

    /// `[Global] Enum $A, $B = 5, $C` declares integer constants counting up
    fn enumeration(&mut self, target: DeclScope) -> Result<(), LangError> {
        if self.peek_is(TokenKind::Step) {
            return Err(self.syntax_error("Enum Step is not supported"));
        }
        let mut counter: i64 = 0;
        loop {
            let var = self.expect(TokenKind::Variable, "variable")?;
            if self.peek().map(|t| t.is_operator("=")).unwrap_or(false) {
                self.advance();
                counter = self.value()?.as_int();
            }
            self.vm.declare_variable(target, &var.lexeme, Value::Number(counter), true)?;
            counter += 1;
            if !self.peek_is(TokenKind::Separator) {
                return Ok(());
            }
            self.advance();
        }
    }

    /// `$a = v, $b += w, $c[i] = x`; bare `$x` declares, `$a[n]` sizes, `$m[]` maps
    fn assignment(&mut self) -> Result<(), LangError> {
        loop {
            let var = self.expect(TokenKind::Variable, "variable")?;
            let (indexes, open) = self.subscripts()?;
            let op = match self.peek() {
                Some(t) if t.kind == TokenKind::Operator && is_assignment(&t.lexeme) => Some(t.lexeme.clone()),
                _ => None,
            };

            match op {
                Some(op) => {
                    self.advance();
                    if open {
                        return Err(self.syntax_error(format!("cannot assign to ${}[]", var.lexeme)));
                    }
                    let rhs = self.value()?;
                    if indexes.is_empty() {
                        let value = match compound_base(&op) {
                            Some(base) => {
                                let current = self.variable(&var)?;
                                binary_op(base, current, rhs, var.line)?
                            }
                            None => rhs,
                        };
                        self.vm.assign_variable(&var.lexeme, value)?;
                    } else {
                        self.assign_element(&var, indexes, &op, rhs)?;
                    }
                }
                None if open => {
                    let map = self.vm.new_map();
                    self.vm.assign_variable(&var.lexeme, map)?;
                }
                None if !indexes.is_empty() => {
                    let array = self.sized_array(&indexes, var.line)?;
                    self.vm.assign_variable(&var.lexeme, array)?;
                }
                None => {
                    if !self.vm.has_variable(&var.lexeme) {
                        self.vm.assign_variable(&var.lexeme, Value::string(""))?;
                    }
                }
            }

            if !self.peek_is(TokenKind::Separator) {
                return Ok(());
            }
            self.advance();
        }
    }

    fn assign_element(&mut self, var: &Token, indexes: Vec<Value>, op: &str, rhs: Value) -> Result<(), LangError> {
        let mut container = self.variable(var)?;
        let Some((key, path)) = indexes.split_last() else {
            return Ok(());
        };
        for index in path {
            container = self.index(container, index.clone())?;
        }
        let Some(id) = container.as_handle() else {
            return Err(LangError::runtime_error_with_type(
                format!("${} is not an array or map", var.lexeme),
                var.line,
                ErrorType::TypeError,
            ));
        };

        let value = match compound_base(op) {
            Some(base) => {
                let current = self.index(container.clone(), key.clone())?;
                binary_op(base, current, rhs, var.line)?
            }
            None => rhs,
        };

        match self.vm.get_handle(id) {
            Some(HeapObject::Array(_)) => self.vm.array_set(id, key.as_int(), value),
            Some(HeapObject::Map(_)) => self.vm.map_set(id, &key.to_string(), value),
            _ => Err(self.vm.not_a("array or map", id)),
        }
    }

    /// `ReDim $a[n]` resizes an array in place, padding with empty strings
    fn redim(&mut self) -> Result<(), LangError> {
        self.advance();
        let var = self.expect(TokenKind::Variable, "variable")?;
        let (dims, open) = self.subscripts()?;
        if open || dims.is_empty() {
            return Err(self.syntax_error(format!("ReDim ${} needs a size", var.lexeme)));
        }
        let size = dims[0].as_int().max(0) as usize;

        let existing = self.vm.get_variable(&var.lexeme).and_then(|v| v.as_handle());
        if let (Some(id), 1) = (existing, dims.len()) {
            if let Some(HeapObject::Array(items)) = self.vm.get_handle_mut(id) {
                items.resize(size, Value::string(""));
                return Ok(());
            }
        }
        let array = self.sized_array(&dims, var.line)?;
        self.vm.assign_variable(&var.lexeme, array)
    }

    // ========== Values ==========

    /// One term, then every trailing operator folded left to right
    pub(crate) fn value(&mut self) -> Result<Value, LangError> {
        let first = self.term()?;
        self.merge_value(first)
    }

    /// Folds `<op> <term>` pairs onto `source` until a terminator is reached.
    /// Every operator reduces against exactly one following term.
    pub(crate) fn merge_value(&mut self, source: Value) -> Result<Value, LangError> {
        let mut acc = source;
        loop {
            let Some(token) = self.peek().cloned() else {
                return Ok(acc);
            };
            let line = token.line;
            match token.kind {
                TokenKind::Operator => {
                    let op = token.lexeme;
                    if op != "=" && is_assignment(&op) {
                        return Err(self.syntax_error(format!("unexpected {} in expression", op)));
                    }
                    self.advance();
                    let rhs = self.term()?;
                    acc = binary_op(&op, acc, rhs, line)?;
                }
                TokenKind::And => {
                    self.advance();
                    let rhs = self.term()?;
                    acc = Value::Bool(acc.as_bool() && rhs.as_bool());
                }
                TokenKind::Or => {
                    self.advance();
                    let rhs = self.term()?;
                    acc = Value::Bool(acc.as_bool() || rhs.as_bool());
                }
                kind if terminates(kind) => return Ok(acc),
                _ => {
                    let message = format!("unexpected {} following value", token);
                    return Err(self.syntax_error(message));
                }
            }
        }
    }

    fn term(&mut self) -> Result<Value, LangError> {
        let Some(token) = self.advance() else {
            return Err(self.syntax_error("expected value, found end of expression"));
        };
        let value = match token.kind {
            TokenKind::String => Value::String(token.lexeme),
            TokenKind::Number | TokenKind::Double => Value::parse_number(&token.lexeme),
            TokenKind::Boolean => Value::Bool(token.lexeme == "True"),
            TokenKind::Binary => match decode_hex(&token.lexeme) {
                Some(bytes) => Value::Binary(bytes),
                None => {
                    return Err(LangError::runtime_error_with_type(
                        format!("malformed binary literal 0x{}", token.lexeme),
                        token.line,
                        ErrorType::SyntaxError,
                    ))
                }
            },
            TokenKind::Null => Value::Null,
            TokenKind::Default => Value::Default,
            TokenKind::Macro => self.vm.macro_value(&token.lexeme, token.line)?,
            TokenKind::Variable => self.variable(&token)?,
            TokenKind::Not => {
                let operand = self.term()?;
                Value::Bool(!operand.as_bool())
            }
            TokenKind::Operator if token.lexeme == "-" => negate(&self.term()?),
            TokenKind::Operator if token.lexeme == "+" => {
                let operand = self.term()?;
                match operand {
                    Value::Number(_) | Value::Double(_) => operand,
                    other => Value::from_f64(other.as_number()),
                }
            }
            TokenKind::LParen => {
                let inner = self.value()?;
                self.expect(TokenKind::RParen, "')'")?;
                inner
            }
            TokenKind::LBracket => self.array_literal()?,
            TokenKind::Call(id) | TokenKind::UserCall(id) => self.call(id)?,
            TokenKind::Identifier => Value::Function(token.lexeme),
            TokenKind::Eol | TokenKind::Comment => {
                return Err(LangError::runtime_error_with_type(
                    "expected value, found end of line",
                    token.line,
                    ErrorType::SyntaxError,
                ))
            }
            _ => {
                return Err(LangError::runtime_error_with_type(
                    format!("unexpected {} in expression", token),
                    token.line,
                    ErrorType::SyntaxError,
                ))
            }
        };
        self.index_chain(value)
    }

    fn array_literal(&mut self) -> Result<Value, LangError> {
        let mut items = Vec::new();
        if self.peek_is(TokenKind::RBracket) {
            self.advance();
            return Ok(self.vm.new_array(items));
        }
        loop {
            items.push(self.value()?);
            match self.advance() {
                Some(t) if t.kind == TokenKind::Separator => continue,
                Some(t) if t.kind == TokenKind::RBracket => break,
                Some(t) => {
                    return Err(LangError::runtime_error_with_type(
                        format!("unexpected {} in array literal", t),
                        t.line,
                        ErrorType::SyntaxError,
                    ))
                }
                None => return Err(self.syntax_error("unterminated array literal")),
            }
        }
        Ok(self.vm.new_array(items))
    }

    fn index_chain(&mut self, mut value: Value) -> Result<Value, LangError> {
        while self.peek_is(TokenKind::LBracket) {
            self.advance();
            let key = self.value()?;
            self.expect(TokenKind::RBracket, "']'")?;
            value = self.index(value, key)?;
        }
        Ok(value)
    }

    pub(crate) fn index(&self, base: Value, key: Value) -> Result<Value, LangError> {
        let Some(id) = base.as_handle() else {
            return Err(LangError::runtime_error_with_type(
                format!("value of type {} cannot be indexed", base.type_name()),
                self.line(),
                ErrorType::TypeError,
            ));
        };
        match self.vm.get_handle(id) {
            Some(HeapObject::Array(_)) => self.vm.array_get(id, key.as_int()),
            Some(HeapObject::Map(_)) => self.vm.map_get(id, &key.to_string()),
            _ => Err(self.vm.not_a("array or map", id)),
        }
    }

    pub(crate) fn variable(&self, token: &Token) -> Result<Value, LangError> {
        self.vm.get_variable(&token.lexeme).ok_or_else(|| {
            LangError::runtime_error_with_type(
                format!("undeclared variable ${}", token.lexeme),
                token.line,
                ErrorType::NameError,
            )
        })
    }
}

/// Tokens that end an expression without being consumed by it
fn terminates(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eol
            | TokenKind::Comment
            | TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::Separator
            | TokenKind::Then
            | TokenKind::To
            | TokenKind::Step
    )
}
