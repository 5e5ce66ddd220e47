// Script VM: scope stack, registers, handle heap and statement stepping

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::common::debug;
use crate::common::error::{ErrorType, LangError};
use crate::common::value::{HandleId, Value};
use crate::debug_println;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::preprocessor::{Preprocessor, Program, TokenBlock};
use crate::vm::evaluator::{Cursor, Evaluator};
use crate::vm::handles::{HandleTable, HeapObject};
use crate::vm::scope::{Block, Registers, Scope, ScopeKind, Variable};

/// Nested user-function calls allowed before a script is stopped
pub const MAX_CALL_DEPTH: usize = 300;

/// Remaining stack below which a call or block continues on a fresh segment
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Stopped,
    Running,
    Suspended,
}

/// How a statement, block or function body finished
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
    ExitLoop(u32),
    ContinueLoop(u32),
    ContinueCase,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Continue,
    End,
    Leave(Flow),
}

/// Target of a declaration: `Local` is the innermost scope, `Static` the
/// enclosing script or function frame, `Global` the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclScope {
    Local,
    Static,
    Global,
}

/// Shareable suspend switch. A suspended VM polls it between statements.
#[derive(Debug, Clone, Default)]
pub struct SuspendHandle(Arc<AtomicBool>);

impl SuspendHandle {
    pub fn suspend(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Vm {
    script_path: PathBuf,
    pending: Option<Vec<Token>>,
    program: Rc<Program>,
    scopes: Vec<Scope>,
    handles: HandleTable,
    running: bool,
    suspend: SuspendHandle,
    stdout: String,
    stderr: String,
    echo: bool,
    line: usize,
    exit_code: i32,
    exit_requested: bool,
    exit_handler: Option<String>,
    call_depth: usize,
}

impl Vm {
    /// Lexes `source` right away; preprocessing is deferred to the first run
    pub fn new(script_path: impl AsRef<Path>, source: &str) -> Result<Self, LangError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self::from_tokens(script_path, tokens))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LangError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            LangError::runtime_error_with_type(
                format!("cannot read script {}: {}", path.display(), e),
                0,
                ErrorType::IOError,
            )
        })?;
        let tokens = Lexer::from_bytes(&bytes).tokenize()?;
        Ok(Self::from_tokens(path, tokens))
    }

    pub fn from_tokens(script_path: impl AsRef<Path>, tokens: Vec<Token>) -> Self {
        Self {
            script_path: absolute(script_path.as_ref()),
            pending: Some(tokens),
            program: Rc::new(Program::empty()),
            scopes: vec![Scope::new(ScopeKind::Script, Block::empty())],
            handles: HandleTable::new(),
            running: false,
            suspend: SuspendHandle::default(),
            stdout: String::new(),
            stderr: String::new(),
            echo: true,
            line: 0,
            exit_code: 0,
            exit_requested: false,
            exit_handler: None,
            call_depth: 0,
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn program(&self) -> Rc<Program> {
        self.program.clone()
    }

    /// Runs the preprocessor once; later calls are no-ops
    pub fn preprocess(&mut self) -> Result<(), LangError> {
        if let Some(tokens) = self.pending.take() {
            let program = Preprocessor::new(&self.script_path).run(tokens)?;
            self.program = Rc::new(program);
            let root = &mut self.scopes[0];
            root.code = Block::whole(self.program.tokens.clone());
            root.rewind();
        }
        Ok(())
    }

    // ========== Execution ==========

    /// Runs the script to completion. Calling it on a running VM does nothing.
    pub fn run(&mut self) -> Result<(), LangError> {
        if self.running {
            return Ok(());
        }
        self.preprocess()?;
        self.running = true;
        self.exit_requested = false;
        debug_println!("run: {}", self.script_path.display());

        let result = self.run_scope();

        self.running = false;
        self.scopes.truncate(1);
        self.scopes[0].rewind();
        self.call_depth = 0;

        match result {
            Ok(flow) => {
                debug_println!("run: finished with {:?}", flow);
                self.run_exit_handler()
            }
            Err(e) => Err(e),
        }
    }

    /// Executes the current scope until its block ends or control leaves it
    pub(crate) fn run_scope(&mut self) -> Result<Flow, LangError> {
        loop {
            if self.suspend.is_suspended() {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            if self.exit_requested {
                return Ok(Flow::Exit);
            }
            match self.step()? {
                StepResult::Continue => {}
                StepResult::End => return Ok(Flow::Normal),
                StepResult::Leave(flow) => {
                    if self.top().is_frame()
                        && matches!(flow, Flow::ExitLoop(_) | Flow::ContinueLoop(_) | Flow::ContinueCase)
                    {
                        return Err(LangError::runtime_error(
                            format!("{:?} used outside of a loop or Switch", flow),
                            self.line,
                        ));
                    }
                    return Ok(flow);
                }
            }
        }
    }

    /// Executes one statement of the current scope
    pub fn step(&mut self) -> Result<StepResult, LangError> {
        let Some(token) = self.top_mut().read_token() else {
            return Ok(StepResult::End);
        };
        if token.line > 0 {
            self.line = token.line;
        }

        match token.kind {
            TokenKind::Eol | TokenKind::Comment => return Ok(StepResult::Continue),
            TokenKind::Flag => self.flag(&token)?,
            TokenKind::Return => {
                let value = if self.at_line_end() {
                    Value::Number(0)
                } else {
                    self.eval_value()?
                };
                self.registers_mut().return_value = value.clone();
                return Ok(StepResult::Leave(Flow::Return(value)));
            }
            TokenKind::Exit => {
                if !self.at_line_end() {
                    let code = self.eval_value()?;
                    self.exit_code = code.as_int() as i32;
                }
                debug_println!("exit: code {}", self.exit_code);
                self.exit_requested = true;
                return Ok(StepResult::Leave(Flow::Exit));
            }
            TokenKind::ExitLoop | TokenKind::ContinueLoop => {
                let level = if self.at_line_end() {
                    1
                } else {
                    self.eval_value()?.as_int()
                };
                if level < 1 {
                    return Err(LangError::runtime_error(
                        format!("invalid {} level {}", token.lexeme, level),
                        token.line,
                    ));
                }
                let flow = if token.kind == TokenKind::ExitLoop {
                    Flow::ExitLoop(level as u32)
                } else {
                    Flow::ContinueLoop(level as u32)
                };
                return Ok(StepResult::Leave(flow));
            }
            TokenKind::ContinueCase => return Ok(StepResult::Leave(Flow::ContinueCase)),
            TokenKind::Func => {
                while let Some(skipped) = self.top_mut().read_token() {
                    if skipped.kind == TokenKind::EndFunc {
                        break;
                    }
                }
            }
            TokenKind::Scope
            | TokenKind::Variable
            | TokenKind::Call(_)
            | TokenKind::UserCall(_)
            | TokenKind::If
            | TokenKind::Switch
            | TokenKind::Select
            | TokenKind::Loop(_)
            | TokenKind::While
            | TokenKind::Do
            | TokenKind::ReDim
            | TokenKind::Enum => {
                self.top_mut().move_by(-1);
                let flow = self.eval_statement()?;
                if flow != Flow::Normal {
                    return Ok(StepResult::Leave(flow));
                }
            }
            TokenKind::Identifier => {
                return Err(LangError::runtime_error_with_type(
                    format!("call to {} requires a parameter block", token.lexeme),
                    token.line,
                    ErrorType::SyntaxError,
                ));
            }
            TokenKind::Illegal => {
                return Err(LangError::runtime_error_with_type(
                    format!("illegal token '{}'", token.lexeme),
                    token.line,
                    ErrorType::SyntaxError,
                ));
            }
            _ => {
                return Err(LangError::runtime_error_with_type(
                    format!("unexpected {}", token),
                    token.line,
                    ErrorType::SyntaxError,
                ));
            }
        }

        self.expect_line_end()?;
        Ok(StepResult::Continue)
    }

    fn flag(&mut self, token: &Token) -> Result<(), LangError> {
        match token.key().as_str() {
            "debug" => debug::set_debug(true),
            "include" | "include-once" => {
                return Err(LangError::runtime_error(
                    format!("#{} reached at runtime (did preprocessing fail?)", token.lexeme),
                    token.line,
                ));
            }
            _ => {}
        }
        let assigned = self.top().current().map(|t| t.is_operator("=")).unwrap_or(false);
        if assigned {
            self.top_mut().move_by(1);
            let value = self.eval_value()?;
            debug_println!("flag: #{} = {}", token.lexeme, value);
        } else {
            debug_println!("flag: ignoring #{}", token.lexeme);
        }
        Ok(())
    }

    fn run_exit_handler(&mut self) -> Result<(), LangError> {
        if let Some(name) = self.exit_handler.take() {
            debug_println!("exit: calling handler {}", name);
            self.exit_requested = false;
            self.call_depth = 0;
            let result = self.call_function(&name, Vec::new(), self.line);
            self.exit_requested = true;
            result?;
        }
        Ok(())
    }

    /// Pushes `block` as a child scope, runs it and pops it again
    pub fn run_block(
        &mut self,
        block: Block,
        kind: ScopeKind,
        bindings: Vec<(String, Value)>,
    ) -> Result<Flow, LangError> {
        let mut scope = Scope::new(kind, block);
        for (name, value) in bindings {
            scope.vars.insert(name.to_lowercase(), Variable { value, constant: false });
        }
        self.scopes.push(scope);
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.run_scope());
        self.scopes.pop();
        result
    }

    pub(crate) fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub(crate) fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub(crate) fn enter_call(&mut self, name: &str, line: usize) -> Result<(), LangError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(LangError::runtime_error(
                format!("recursion level exceeded calling {}", name),
                line,
            ));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    fn cursor(&self) -> (TokenBlock, Cursor) {
        let scope = self.top();
        (scope.code.tokens.clone(), Cursor::new(scope.pos, scope.code.end))
    }

    fn eval_value(&mut self) -> Result<Value, LangError> {
        let (tokens, cursor) = self.cursor();
        let evaluated = Evaluator::new(self, tokens, cursor).eval(true)?;
        self.top_mut().pos += evaluated.consumed;
        Ok(evaluated.value.unwrap_or(Value::Null))
    }

    fn eval_statement(&mut self) -> Result<Flow, LangError> {
        let (tokens, cursor) = self.cursor();
        let evaluated = Evaluator::new(self, tokens, cursor).eval(false)?;
        self.top_mut().pos += evaluated.consumed;
        Ok(evaluated.flow)
    }

    fn at_line_end(&self) -> bool {
        self.top().current().map(|t| t.ends_line()).unwrap_or(true)
    }

    fn expect_line_end(&self) -> Result<(), LangError> {
        match self.top().current() {
            Some(token) if !token.ends_line() => Err(LangError::runtime_error_with_type(
                format!("expected end of line, instead found {}", token),
                token.line,
                ErrorType::SyntaxError,
            )),
            _ => Ok(()),
        }
    }

    // ========== State ==========

    pub fn state(&self) -> VmState {
        match (self.running, self.suspend.is_suspended()) {
            (false, _) => VmState::Stopped,
            (true, true) => VmState::Suspended,
            (true, false) => VmState::Running,
        }
    }

    pub fn suspend(&self) {
        self.suspend.suspend();
    }

    pub fn resume(&self) {
        self.suspend.resume();
    }

    /// Handle another thread can use to suspend and resume this VM
    pub fn suspend_handle(&self) -> SuspendHandle {
        self.suspend.clone()
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn set_exit_handler(&mut self, name: impl Into<String>) {
        self.exit_handler = Some(name.into());
    }

    pub fn line(&self) -> usize {
        self.line
    }

    // ========== Tokens ==========

    /// Executable top-level tokens (empty until preprocessed)
    pub fn tokens(&self) -> &[Token] {
        &self.program.tokens
    }

    // ========== Scopes and variables ==========

    pub(crate) fn top(&self) -> &Scope {
        // The root scope is never popped
        &self.scopes[self.scopes.len() - 1]
    }

    pub(crate) fn top_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Index of the nearest script or function frame
    fn frame_index(&self) -> usize {
        self.scopes.iter().rposition(|s| s.is_frame()).unwrap_or(0)
    }

    /// Reads walk every enclosing scope up to the script root
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        let key = name.to_lowercase();
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.lookup(&key))
            .map(|var| var.value.clone())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.scopes.iter().any(|scope| scope.vars.contains_key(&key))
    }

    /// Writes into the current scope, creating the variable if needed
    pub fn set_variable(&mut self, name: &str, value: Value) -> Result<(), LangError> {
        let index = self.scopes.len() - 1;
        self.write_variable(index, name, value, false)
    }

    /// Bare `$x = v`: updates the nearest existing `$x` without leaving the
    /// current function (the script root stays reachable), otherwise creates
    /// it in the innermost scope.
    pub fn assign_variable(&mut self, name: &str, value: Value) -> Result<(), LangError> {
        let key = name.to_lowercase();
        let mut target = None;
        for index in (0..self.scopes.len()).rev() {
            if self.scopes[index].vars.contains_key(&key) {
                target = Some(index);
                break;
            }
            if self.scopes[index].is_frame() {
                break;
            }
        }
        if target.is_none() && self.scopes[0].vars.contains_key(&key) {
            target = Some(0);
        }
        let index = target.unwrap_or(self.scopes.len() - 1);
        self.write_variable(index, &key, value, false)
    }

    pub fn declare_variable(
        &mut self,
        scope: DeclScope,
        name: &str,
        value: Value,
        constant: bool,
    ) -> Result<(), LangError> {
        let index = match scope {
            DeclScope::Global => 0,
            DeclScope::Static => self.frame_index(),
            DeclScope::Local => self.scopes.len() - 1,
        };
        self.write_variable(index, name, value, constant)
    }

    /// True when `name` already lives in the frame a `Static` declaration targets
    pub fn declared_static(&self, name: &str) -> bool {
        self.scopes[self.frame_index()].vars.contains_key(&name.to_lowercase())
    }

    fn write_variable(&mut self, index: usize, name: &str, value: Value, constant: bool) -> Result<(), LangError> {
        let key = name.to_lowercase();
        let scope = &mut self.scopes[index];
        if let Some(existing) = scope.vars.get(&key) {
            if existing.constant {
                return Err(LangError::runtime_error_with_type(
                    format!("cannot assign to constant ${}", name),
                    self.line,
                    ErrorType::ConstError,
                ));
            }
        }
        scope.vars.insert(key, Variable { value, constant });
        Ok(())
    }

    // ========== Registers ==========

    pub fn registers(&self) -> &Registers {
        &self.scopes[self.frame_index()].registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        let index = self.frame_index();
        &mut self.scopes[index].registers
    }

    pub fn get_error(&self) -> i64 {
        self.registers().error
    }

    pub fn set_error(&mut self, code: i64) {
        self.registers_mut().error = code;
    }

    pub fn get_extended(&self) -> i64 {
        self.registers().extended
    }

    pub fn set_extended(&mut self, code: i64) {
        self.registers_mut().extended = code;
    }

    pub fn return_value(&self) -> Value {
        self.registers().return_value.clone()
    }

    pub fn set_return_value(&mut self, value: Value) {
        self.registers_mut().return_value = value;
    }

    pub fn num_params(&self) -> usize {
        self.scopes[self.frame_index()].num_params
    }

    pub(crate) fn set_num_params(&mut self, count: usize) {
        self.top_mut().num_params = count;
    }

    // ========== Handles ==========

    pub fn add_handle(&mut self, object: HeapObject) -> HandleId {
        let id = self.handles.add(object);
        debug_println!("handle: added {} {}", self.handles.get(id).map(|o| o.kind()).unwrap_or("?"), id);
        id
    }

    pub fn get_handle(&self, id: HandleId) -> Option<&HeapObject> {
        self.handles.get(id)
    }

    pub fn get_handle_mut(&mut self, id: HandleId) -> Option<&mut HeapObject> {
        self.handles.get_mut(id)
    }

    pub fn destroy_handle(&mut self, id: HandleId) -> Option<HeapObject> {
        debug_println!("handle: destroying {}", id);
        self.handles.destroy(id)
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn new_map(&mut self) -> Value {
        Value::Handle(self.add_handle(HeapObject::Map(Default::default())))
    }

    pub fn new_array(&mut self, items: Vec<Value>) -> Value {
        Value::Handle(self.add_handle(HeapObject::Array(items)))
    }

    pub fn map_get(&self, id: HandleId, key: &str) -> Result<Value, LangError> {
        match self.handles.get(id) {
            Some(HeapObject::Map(map)) => map.get(key).cloned().ok_or_else(|| {
                LangError::runtime_error_with_type(format!("map key \"{}\" not found", key), self.line, ErrorType::KeyError)
            }),
            _ => Err(self.not_a("map", id)),
        }
    }

    pub fn map_set(&mut self, id: HandleId, key: &str, value: Value) -> Result<(), LangError> {
        match self.handles.get_mut(id) {
            Some(HeapObject::Map(map)) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err(self.not_a("map", id)),
        }
    }

    pub fn array_get(&self, id: HandleId, index: i64) -> Result<Value, LangError> {
        match self.handles.get(id) {
            Some(HeapObject::Array(items)) => usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| self.out_of_bounds(index, items.len())),
            _ => Err(self.not_a("array", id)),
        }
    }

    pub fn array_set(&mut self, id: HandleId, index: i64, value: Value) -> Result<(), LangError> {
        let line = self.line;
        match self.handles.get_mut(id) {
            Some(HeapObject::Array(items)) => {
                let len = items.len();
                match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(LangError::runtime_error_with_type(
                        format!("array index {} out of bounds (size {})", index, len),
                        line,
                        ErrorType::IndexError,
                    )),
                }
            }
            _ => Err(self.not_a("array", id)),
        }
    }

    fn out_of_bounds(&self, index: i64, len: usize) -> LangError {
        LangError::runtime_error_with_type(
            format!("array index {} out of bounds (size {})", index, len),
            self.line,
            ErrorType::IndexError,
        )
    }

    pub(crate) fn not_a(&self, what: &str, id: HandleId) -> LangError {
        LangError::runtime_error_with_type(
            format!("handle {} is not a live {}", id, what),
            self.line,
            ErrorType::TypeError,
        )
    }

    // ========== Output ==========

    /// Disables echoing captured output to the process streams
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn write_stdout(&mut self, text: &str) {
        self.stdout.push_str(text);
        if self.echo {
            let mut out = io::stdout();
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }

    pub fn write_stderr(&mut self, text: &str) {
        if debug::is_error_to_stdout() {
            self.write_stdout(text);
            return;
        }
        self.stderr.push_str(text);
        if self.echo {
            debug::write_error_stream(text);
        }
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
