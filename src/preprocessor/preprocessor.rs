// Preprocessing passes: continuations, includes, call sites, loops, functions, structure

use std::collections::{HashMap, HashSet};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::blocks::{closer_for, find_then, is_single_line_if, trailing_endif};
use super::program::{CallId, CallSite, ForLoop, LoopId, LoopKind, Param, Program, TokenBlock, UserFunction};
use crate::common::error::LangError;
use crate::debug_println;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::vm::natives;

pub struct Preprocessor {
    script_path: PathBuf,
    include_once: HashSet<PathBuf>,
    include_stack: Vec<PathBuf>,
    functions: HashMap<String, Rc<UserFunction>>,
    calls: Vec<CallSite>,
    loops: Vec<ForLoop>,
}

impl Preprocessor {
    pub fn new(script_path: impl AsRef<Path>) -> Self {
        Self {
            script_path: script_path.as_ref().to_path_buf(),
            include_once: HashSet::new(),
            include_stack: Vec::new(),
            functions: HashMap::new(),
            calls: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Runs every pass in order and hands back the immutable program tables
    pub fn run(mut self, tokens: Vec<Token>) -> Result<Program, LangError> {
        let root = canonical(&self.script_path);
        self.include_stack.push(root.clone());
        let tokens = self.resolve_includes(tokens, &root)?;
        self.include_stack.pop();

        let tokens = join_continuations(tokens)?;
        let tokens = self.extract_calls(&tokens)?;
        let tokens = self.extract_loops(&tokens)?;
        let tokens = self.extract_functions(&tokens)?;

        check_structure(&tokens)?;
        for for_loop in &self.loops {
            check_structure(&for_loop.body)?;
        }
        for function in self.functions.values() {
            check_structure(&function.body)?;
        }

        debug_println!(
            "preprocess: {} tokens, {} functions, {} call sites, {} loops",
            tokens.len(),
            self.functions.len(),
            self.calls.len(),
            self.loops.len()
        );

        Ok(Program {
            tokens: Rc::from(tokens),
            functions: self.functions,
            calls: self.calls,
            loops: self.loops,
        })
    }

    // ========== Includes ==========

    fn resolve_includes(&mut self, tokens: Vec<Token>, current: &Path) -> Result<Vec<Token>, LangError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut line_start = true;
        let mut iter = tokens.into_iter().peekable();

        while let Some(token) = iter.next() {
            match token.kind {
                TokenKind::Flag if token.key() == "include-once" => {
                    if !line_start {
                        return Err(LangError::preprocess_error("unexpected flag #include-once", token.line));
                    }
                    self.include_once.insert(current.to_path_buf());
                    continue;
                }
                TokenKind::Flag if token.key() == "include" => {
                    if !line_start {
                        return Err(LangError::preprocess_error("unexpected flag #include", token.line));
                    }
                    let target = match iter.next() {
                        Some(t) if t.kind == TokenKind::String => t.lexeme,
                        Some(t) if t.is_operator("<") => {
                            return Err(LangError::preprocess_error(
                                "library includes (#include <...>) are not supported",
                                t.line,
                            ))
                        }
                        _ => {
                            return Err(LangError::preprocess_error(
                                "expected string containing path to include",
                                token.line,
                            ))
                        }
                    };
                    let included = self.include_file(&target, current, token.line)?;
                    out.extend(included);
                    out.push(Token::synthetic(TokenKind::Eol, ""));
                    line_start = false;
                    continue;
                }
                TokenKind::Flag if !line_start => {
                    return Err(LangError::preprocess_error(
                        format!("unexpected flag #{}", token.lexeme),
                        token.line,
                    ));
                }
                TokenKind::Eol | TokenKind::Comment => line_start = true,
                _ => line_start = false,
            }
            out.push(token);
        }
        Ok(out)
    }

    fn include_file(&mut self, target: &str, current: &Path, line: usize) -> Result<Vec<Token>, LangError> {
        let base = current.parent().unwrap_or_else(|| Path::new("."));
        let requested = Path::new(target);
        let path = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            base.join(requested)
        };
        let path = canonical(&path);

        if self.include_once.contains(&path) {
            debug_println!("preprocess: skipping {} (include-once)", path.display());
            return Ok(Vec::new());
        }
        if self.include_stack.contains(&path) {
            return Err(LangError::preprocess_error(
                format!("include cycle detected at {}", path.display()),
                line,
            ));
        }

        let bytes = fs::read(&path).map_err(|e| {
            LangError::preprocess_error(format!("cannot include {}: {}", path.display(), e), line)
        })?;
        let tokens = Lexer::from_bytes(&bytes).tokenize()?;

        self.include_stack.push(path.clone());
        let result = self.resolve_includes(tokens, &path);
        self.include_stack.pop();

        debug_println!("preprocess: include {} preloaded successfully", path.display());
        result
    }

    // ========== Call sites ==========

    fn extract_calls(&mut self, tokens: &[Token]) -> Result<Vec<Token>, LangError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::Func => {
                    // The function name is not a call site
                    out.push(token.clone());
                    if let Some(name) = tokens.get(i + 1) {
                        out.push(name.clone());
                    }
                    i += 2;
                    continue;
                }
                TokenKind::Identifier if next_is(tokens, i, TokenKind::LParen) => {
                    let (call, next) = self.extract_call(tokens, i)?;
                    out.push(call);
                    i = next;
                    continue;
                }
                _ => out.push(token.clone()),
            }
            i += 1;
        }
        Ok(out)
    }

    /// Replaces `Name ( ... )` starting at `start` with one call token and
    /// returns it along with the position after the closing parenthesis.
    fn extract_call(&mut self, tokens: &[Token], start: usize) -> Result<(Token, usize), LangError> {
        let name = &tokens[start];
        let mut groups: Vec<Vec<Token>> = Vec::new();
        let mut group: Vec<Token> = Vec::new();
        let mut parens = 0usize;
        let mut brackets = 0usize;
        let mut i = start + 2;

        loop {
            let Some(token) = tokens.get(i) else {
                return Err(LangError::preprocess_error(
                    format!("unterminated call block for {}", name.lexeme),
                    name.line,
                ));
            };
            match token.kind {
                TokenKind::Identifier if next_is(tokens, i, TokenKind::LParen) => {
                    let (nested, next) = self.extract_call(tokens, i)?;
                    group.push(nested);
                    i = next;
                    continue;
                }
                TokenKind::LParen => {
                    parens += 1;
                    group.push(token.clone());
                }
                TokenKind::RParen if parens == 0 => {
                    i += 1;
                    break;
                }
                TokenKind::RParen => {
                    parens -= 1;
                    group.push(token.clone());
                }
                TokenKind::LBracket => {
                    brackets += 1;
                    group.push(token.clone());
                }
                TokenKind::RBracket => {
                    brackets = brackets.saturating_sub(1);
                    group.push(token.clone());
                }
                TokenKind::Separator if brackets > 0 => group.push(token.clone()),
                TokenKind::Separator if parens > 0 => {
                    return Err(LangError::preprocess_error(
                        format!("unexpected separator in nested block of {} call", name.lexeme),
                        token.line,
                    ));
                }
                TokenKind::Separator => {
                    if group.is_empty() {
                        return Err(LangError::preprocess_error(
                            format!("empty argument in call to {}", name.lexeme),
                            token.line,
                        ));
                    }
                    groups.push(mem::take(&mut group));
                }
                TokenKind::Eol | TokenKind::Comment => {
                    return Err(LangError::preprocess_error(
                        format!("unexpected end of line in call to {}", name.lexeme),
                        token.line,
                    ));
                }
                _ => group.push(token.clone()),
            }
            i += 1;
        }

        if !group.is_empty() {
            groups.push(group);
        } else if !groups.is_empty() {
            return Err(LangError::preprocess_error(
                format!("empty argument in call to {}", name.lexeme),
                name.line,
            ));
        }

        let id = CallId(self.calls.len());
        self.calls.push(CallSite {
            name: name.lexeme.clone(),
            args: groups.into_iter().map(Rc::from).collect(),
            line: name.line,
        });
        let kind = if natives::lookup(&name.lexeme).is_some() {
            TokenKind::Call(id)
        } else {
            TokenKind::UserCall(id)
        };
        Ok((Token::new(kind, name.lexeme.clone(), name.line, name.col), i))
    }

    // ========== For loops ==========

    fn extract_loops(&mut self, tokens: &[Token]) -> Result<Vec<Token>, LangError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut line_start = true;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::For => {
                    if !line_start {
                        return Err(LangError::preprocess_error("For must begin a statement", token.line));
                    }
                    let (for_token, next) = self.extract_for(tokens, i)?;
                    out.push(for_token);
                    i = next;
                    line_start = false;
                    continue;
                }
                TokenKind::Next => {
                    return Err(LangError::preprocess_error("Next without matching For", token.line));
                }
                TokenKind::Eol | TokenKind::Comment => line_start = true,
                _ => line_start = false,
            }
            out.push(token.clone());
            i += 1;
        }
        Ok(out)
    }

    fn extract_for(&mut self, tokens: &[Token], start: usize) -> Result<(Token, usize), LangError> {
        let for_token = &tokens[start];
        let line = for_token.line;
        let index = match tokens.get(start + 1) {
            Some(t) if t.kind == TokenKind::Variable => t.lexeme.clone(),
            _ => return Err(LangError::preprocess_error("expected variable after For", line)),
        };

        let mut i = start + 2;
        let kind = match tokens.get(i) {
            Some(t) if t.is_operator("=") => {
                i += 1;
                let (start_expr, next) = header_expr(tokens, i, &[TokenKind::To], "start index", line)?;
                if !next_is_at(tokens, next, TokenKind::To) {
                    return Err(LangError::preprocess_error("expected To in For loop", line));
                }
                let (end_expr, next) = header_expr(tokens, next + 1, &[TokenKind::Step], "end index", line)?;
                i = next;
                let step = if next_is_at(tokens, i, TokenKind::Step) {
                    let (step_expr, next) = header_expr(tokens, i + 1, &[], "step", line)?;
                    i = next;
                    Some(step_expr)
                } else {
                    None
                };
                LoopKind::Range {
                    start: start_expr,
                    end: end_expr,
                    step,
                }
            }
            Some(t) if t.kind == TokenKind::In => {
                let (collection, next) = header_expr(tokens, i + 1, &[], "collection", line)?;
                i = next;
                LoopKind::Each { collection }
            }
            _ => return Err(LangError::preprocess_error("expected '=' or In after For variable", line)),
        };

        let mut body = Vec::new();
        let mut line_start = false;
        loop {
            let Some(token) = tokens.get(i) else {
                return Err(LangError::preprocess_error("For without matching Next", line));
            };
            match token.kind {
                TokenKind::For if line_start => {
                    let (nested, next) = self.extract_for(tokens, i)?;
                    body.push(nested);
                    i = next;
                    line_start = false;
                    continue;
                }
                TokenKind::Next => {
                    i += 1;
                    break;
                }
                TokenKind::Eol | TokenKind::Comment => line_start = true,
                _ => line_start = false,
            }
            body.push(token.clone());
            i += 1;
        }

        if let Some(token) = tokens.get(i) {
            if !token.ends_line() {
                return Err(LangError::preprocess_error(
                    format!("unexpected {} following Next", token),
                    token.line,
                ));
            }
        }

        let id = LoopId(self.loops.len());
        self.loops.push(ForLoop {
            index,
            kind,
            body: Rc::from(body),
            line,
        });
        Ok((Token::new(TokenKind::Loop(id), "For", line, for_token.col), i))
    }

    // ========== Functions ==========

    fn extract_functions(&mut self, tokens: &[Token]) -> Result<Vec<Token>, LangError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut line_start = true;
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::Func => {
                    if !line_start {
                        return Err(LangError::preprocess_error("Func must begin a statement", token.line));
                    }
                    i = self.extract_function(tokens, i)?;
                    line_start = false;
                    continue;
                }
                TokenKind::EndFunc => {
                    return Err(LangError::preprocess_error("EndFunc without matching Func", token.line));
                }
                TokenKind::Eol | TokenKind::Comment => line_start = true,
                _ => line_start = false,
            }
            out.push(token.clone());
            i += 1;
        }
        Ok(out)
    }

    fn extract_function(&mut self, tokens: &[Token], start: usize) -> Result<usize, LangError> {
        let line = tokens[start].line;
        let name = match tokens.get(start + 1) {
            Some(t) if t.kind == TokenKind::Identifier => t.lexeme.clone(),
            _ => return Err(LangError::preprocess_error("expected function name after Func", line)),
        };
        if !next_is(tokens, start + 1, TokenKind::LParen) {
            return Err(LangError::preprocess_error(
                format!("expected parameter list after Func {}", name),
                line,
            ));
        }

        let (params, mut i) = parse_params(tokens, start + 3, &name, line)?;
        match tokens.get(i) {
            Some(t) if t.ends_line() => {}
            None => {}
            Some(t) => {
                return Err(LangError::preprocess_error(
                    format!("unexpected {} after parameter list of {}", t, name),
                    t.line,
                ))
            }
        }

        let mut body = Vec::new();
        loop {
            let Some(token) = tokens.get(i) else {
                return Err(LangError::preprocess_error(
                    format!("unexpected end of func {}", name),
                    line,
                ));
            };
            match token.kind {
                TokenKind::EndFunc => {
                    i += 1;
                    break;
                }
                TokenKind::Func => {
                    return Err(LangError::preprocess_error(
                        format!("nested Func inside {} is not allowed", name),
                        token.line,
                    ));
                }
                _ => body.push(token.clone()),
            }
            i += 1;
        }

        if let Some(token) = tokens.get(i) {
            if !token.ends_line() {
                return Err(LangError::preprocess_error(
                    format!("unexpected {} following EndFunc", token),
                    token.line,
                ));
            }
        }

        let key = name.to_lowercase();
        if self.functions.contains_key(&key) {
            return Err(LangError::preprocess_error(format!("func {} already defined", name), line));
        }
        debug_println!("preprocess: func {}({} params)", name, params.len());
        self.functions.insert(
            key,
            Rc::new(UserFunction {
                name,
                params,
                body: Rc::from(body),
                line,
            }),
        );
        Ok(i)
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn next_is(tokens: &[Token], i: usize, kind: TokenKind) -> bool {
    next_is_at(tokens, i + 1, kind)
}

fn next_is_at(tokens: &[Token], i: usize, kind: TokenKind) -> bool {
    tokens.get(i).map(|t| t.kind == kind).unwrap_or(false)
}

/// Joins lines ending in `_`: the marker, a trailing comment and the EOL are dropped
fn join_continuations(tokens: Vec<Token>) -> Result<Vec<Token>, LangError> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token.kind != TokenKind::Extend {
            out.push(token);
            continue;
        }
        while iter.peek().map(|t| t.kind == TokenKind::Comment).unwrap_or(false) {
            iter.next();
        }
        match iter.next() {
            Some(t) if t.kind == TokenKind::Eol => {}
            Some(t) => {
                return Err(LangError::preprocess_error(
                    format!("unexpected {} after line continuation", t),
                    t.line,
                ))
            }
            None => return Err(LangError::preprocess_error("line continuation at end of file", token.line)),
        }
    }
    Ok(out)
}

/// Collects a For-header expression up to one of `stops` (or the end of the line)
fn header_expr(
    tokens: &[Token],
    start: usize,
    stops: &[TokenKind],
    what: &str,
    line: usize,
) -> Result<(TokenBlock, usize), LangError> {
    let mut expr = Vec::new();
    let mut i = start;
    while let Some(token) = tokens.get(i) {
        if token.ends_line() || stops.contains(&token.kind) {
            break;
        }
        if matches!(token.kind, TokenKind::To | TokenKind::Step | TokenKind::For | TokenKind::In) {
            return Err(LangError::preprocess_error(
                format!("unexpected {} in For loop {}", token, what),
                token.line,
            ));
        }
        expr.push(token.clone());
        i += 1;
    }
    if expr.is_empty() {
        return Err(LangError::preprocess_error(format!("missing {} in For loop", what), line));
    }
    Ok((Rc::from(expr), i))
}

/// `$a, $b = default, ...)`; returns the parameters and the position after `)`
fn parse_params(tokens: &[Token], start: usize, func: &str, line: usize) -> Result<(Vec<Param>, usize), LangError> {
    let mut params: Vec<Param> = Vec::new();
    let mut i = start;
    if next_is_at(tokens, i, TokenKind::RParen) {
        return Ok((params, i + 1));
    }

    loop {
        let name = match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Variable => t.key(),
            Some(t) => {
                return Err(LangError::preprocess_error(
                    format!("unexpected {} in parameter list of {}", t, func),
                    t.line,
                ))
            }
            None => return Err(LangError::preprocess_error(format!("unterminated parameter list of {}", func), line)),
        };
        if params.iter().any(|p| p.name == name) {
            return Err(LangError::preprocess_error(
                format!("duplicate parameter ${} in {}", name, func),
                line,
            ));
        }
        i += 1;

        let mut default = None;
        if tokens.get(i).map(|t| t.is_operator("=")).unwrap_or(false) {
            i += 1;
            let mut expr = Vec::new();
            let mut depth = 0usize;
            while let Some(token) = tokens.get(i) {
                match token.kind {
                    TokenKind::Separator | TokenKind::RParen if depth == 0 => break,
                    TokenKind::LParen | TokenKind::LBracket => depth += 1,
                    TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                    TokenKind::Eol | TokenKind::Comment => break,
                    _ => {}
                }
                expr.push(token.clone());
                i += 1;
            }
            if expr.is_empty() {
                return Err(LangError::preprocess_error(
                    format!("missing default value for ${} in {}", name, func),
                    line,
                ));
            }
            default = Some(Rc::from(expr));
        } else if params.iter().any(|p| p.default.is_some()) {
            return Err(LangError::preprocess_error(
                format!("parameter ${} of {} follows an optional parameter", name, func),
                line,
            ));
        }
        params.push(Param { name, default });

        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Separator => i += 1,
            Some(t) if t.kind == TokenKind::RParen => return Ok((params, i + 1)),
            _ => return Err(LangError::preprocess_error(format!("unterminated parameter list of {}", func), line)),
        }
    }
}

/// Balanced-block check over one token stream. Function and loop bodies are
/// checked separately since they were lifted out of the stream.
fn check_structure(tokens: &[Token]) -> Result<(), LangError> {
    let end = tokens.len();
    let mut open: Vec<(TokenKind, usize)> = Vec::new();
    let mut skip = None;
    let mut i = 0;
    while i < end {
        let token = &tokens[i];
        if skip == Some(i) {
            i += 1;
            continue;
        }
        match token.kind {
            TokenKind::If => {
                if find_then(tokens, i, end).is_none() {
                    return Err(LangError::preprocess_error("If without Then", token.line));
                }
                if !is_single_line_if(tokens, i, end) {
                    open.push((TokenKind::If, token.line));
                } else {
                    skip = trailing_endif(tokens, i, end);
                }
            }
            TokenKind::ElseIf => {
                if !matches!(open.last(), Some((TokenKind::If, _))) {
                    return Err(LangError::preprocess_error("ElseIf without matching If", token.line));
                }
                if find_then(tokens, i, end).is_none() {
                    return Err(LangError::preprocess_error("ElseIf without Then", token.line));
                }
            }
            TokenKind::Else => {
                if !matches!(open.last(), Some((TokenKind::If, _))) {
                    return Err(LangError::preprocess_error("Else without matching If", token.line));
                }
            }
            TokenKind::Case => {
                if !matches!(open.last(), Some((TokenKind::Switch | TokenKind::Select, _))) {
                    return Err(LangError::preprocess_error("Case outside of Switch or Select", token.line));
                }
                // `Case Else` is not an If branch
                if next_is(tokens, i, TokenKind::Else) {
                    i += 1;
                }
            }
            TokenKind::Switch | TokenKind::Select | TokenKind::While | TokenKind::Do => {
                open.push((token.kind, token.line));
            }
            TokenKind::EndIf | TokenKind::EndSwitch | TokenKind::EndSelect | TokenKind::WEnd | TokenKind::Until => {
                match open.pop() {
                    Some((opener, _)) if closer_for(opener) == Some(token.kind) => {}
                    Some((opener, line)) => {
                        return Err(LangError::preprocess_error(
                            format!("{} closes {:?} opened at line {}", token.lexeme, opener, line),
                            token.line,
                        ))
                    }
                    None => {
                        return Err(LangError::preprocess_error(
                            format!("{} without matching opener", token.lexeme),
                            token.line,
                        ))
                    }
                }
            }
            TokenKind::Func | TokenKind::EndFunc => {
                return Err(LangError::preprocess_error(
                    format!("{} is only allowed at the top level of a script", token.lexeme),
                    token.line,
                ));
            }
            TokenKind::With | TokenKind::EndWith | TokenKind::Volatile => {
                return Err(LangError::preprocess_error(
                    format!("{} is not supported", token.lexeme),
                    token.line,
                ));
            }
            _ => {}
        }
        i += 1;
    }

    match open.pop() {
        Some((opener, line)) => Err(LangError::preprocess_error(
            format!("{:?} without matching {:?}", opener, closer_for(opener).unwrap_or(opener)),
            line,
        )),
        None => Ok(()),
    }
}
