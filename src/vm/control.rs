// Control constructs: If chains, Switch, Select, For, While and Do loops

use std::cmp::Ordering;

use crate::common::error::{ErrorType, LangError};
use crate::common::value::Value;
use crate::lexer::{Token, TokenKind};
use crate::preprocessor::blocks::{find_then, is_single_line_if, line_end, scan_depth_zero, statement_end, trailing_endif};
use crate::preprocessor::{ForLoop, LoopId, LoopKind, TokenBlock};
use crate::vm::evaluator::{Cursor, Evaluator};
use crate::vm::handles::HeapObject;
use crate::vm::operations::{compare, loose_equals};
use crate::vm::scope::{Block, ScopeKind};
use crate::vm::vm::Flow;

/// One `Case` of a Switch or Select: header expression range and body range
#[derive(Debug, Clone, Copy)]
struct Clause {
    header: (usize, usize),
    body: (usize, usize),
    is_else: bool,
}

enum LoopControl {
    Continue,
    Break,
    Leave(Flow),
}

/// Consumes the innermost level of ExitLoop/ContinueLoop; deeper levels and
/// every other flow leave the loop
fn loop_control(flow: Flow) -> LoopControl {
    match flow {
        Flow::Normal | Flow::ContinueLoop(1) => LoopControl::Continue,
        Flow::ExitLoop(1) => LoopControl::Break,
        Flow::ExitLoop(n) => LoopControl::Leave(Flow::ExitLoop(n - 1)),
        Flow::ContinueLoop(n) => LoopControl::Leave(Flow::ContinueLoop(n - 1)),
        other => LoopControl::Leave(other),
    }
}

impl<'vm> Evaluator<'vm> {
    fn run_range(&mut self, start: usize, end: usize) -> Result<Flow, LangError> {
        let block = Block::new(self.tokens.clone(), start, end);
        self.vm.run_block(block, ScopeKind::Block, Vec::new())
    }

    fn eval_block(&mut self, block: &TokenBlock) -> Result<Value, LangError> {
        self.eval_range(block.clone(), 0, block.len())
    }

    fn missing_closer(&self, token: &Token, closer: &str) -> LangError {
        LangError::runtime_error_with_type(
            format!("{} without matching {}", token.lexeme, closer),
            token.line,
            ErrorType::SyntaxError,
        )
    }

    // ========== If ==========

    /// Evaluates conditions lazily in order and runs only the first true branch
    pub(crate) fn if_chain(&mut self) -> Result<Flow, LangError> {
        let tokens = self.tokens.clone();
        let end = self.cursor.end;
        let if_pos = self.cursor.pos;
        let if_token = tokens[if_pos].clone();
        let then = find_then(&tokens, if_pos, end).ok_or_else(|| self.missing_closer(&if_token, "Then"))?;

        if is_single_line_if(&tokens, if_pos, end) {
            let stop = line_end(&tokens, then + 1, end);
            let body_end = trailing_endif(&tokens, if_pos, end).unwrap_or_else(|| statement_end(&tokens, then + 1, stop));
            let condition = self.eval_range(tokens.clone(), if_pos + 1, then)?;
            self.cursor.pos = stop;
            if condition.as_bool() {
                return self.run_range(then + 1, body_end);
            }
            return Ok(Flow::Normal);
        }

        let mut markers = Vec::new();
        let endif = scan_depth_zero(&tokens, then + 1, end, |i, token| match token.kind {
            TokenKind::ElseIf | TokenKind::Else => {
                markers.push(i);
                false
            }
            TokenKind::EndIf => true,
            _ => false,
        })
        .ok_or_else(|| self.missing_closer(&if_token, "EndIf"))?;

        let mut branches: Vec<(Option<(usize, usize)>, usize, usize)> = Vec::new();
        let mut condition = Some((if_pos + 1, then));
        let mut body_start = then + 1;
        for &marker in &markers {
            branches.push((condition, body_start, marker));
            if tokens[marker].kind == TokenKind::ElseIf {
                let marker_then =
                    find_then(&tokens, marker, end).ok_or_else(|| self.missing_closer(&tokens[marker], "Then"))?;
                condition = Some((marker + 1, marker_then));
                body_start = marker_then + 1;
            } else {
                condition = None;
                body_start = marker + 1;
            }
        }
        branches.push((condition, body_start, endif));
        self.cursor.pos = endif + 1;

        for (condition, start, stop) in branches {
            let taken = match condition {
                Some((from, to)) => self.eval_range(tokens.clone(), from, to)?.as_bool(),
                None => true,
            };
            if taken {
                return self.run_range(start, stop);
            }
        }
        Ok(Flow::Normal)
    }

    // ========== Switch / Select ==========

    fn clauses(&self, opener: &Token, start: usize, closer: TokenKind, name: &str) -> Result<(Vec<Clause>, usize), LangError> {
        let tokens = &self.tokens;
        let end = self.cursor.end;
        let mut cases = Vec::new();
        let close = scan_depth_zero(tokens, start, end, |i, token| {
            if token.kind == TokenKind::Case {
                cases.push(i);
                false
            } else {
                token.kind == closer
            }
        })
        .ok_or_else(|| self.missing_closer(opener, name))?;

        let first = cases.first().copied().unwrap_or(close);
        if let Some(stray) = tokens[start..first].iter().find(|t| !t.ends_line()) {
            return Err(LangError::runtime_error_with_type(
                format!("unexpected {} before first Case", stray),
                stray.line,
                ErrorType::SyntaxError,
            ));
        }

        let clauses = cases
            .iter()
            .enumerate()
            .map(|(k, &case)| {
                let header_end = statement_end(tokens, case + 1, close);
                let body_end = cases.get(k + 1).copied().unwrap_or(close);
                Clause {
                    header: (case + 1, header_end),
                    body: (header_end, body_end),
                    is_else: tokens.get(case + 1).map(|t| t.kind == TokenKind::Else).unwrap_or(false),
                }
            })
            .collect();
        Ok((clauses, close))
    }

    /// Runs the chosen clause; `ContinueCase` falls through into the next one
    fn run_clauses(&mut self, clauses: &[Clause], first: usize) -> Result<Flow, LangError> {
        let mut k = first;
        loop {
            let (start, stop) = clauses[k].body;
            match self.run_range(start, stop)? {
                Flow::ContinueCase if k + 1 < clauses.len() => k += 1,
                Flow::ContinueCase => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
    }

    pub(crate) fn switch(&mut self) -> Result<Flow, LangError> {
        let opener = self.expect(TokenKind::Switch, "Switch")?;
        let subject = self.value()?;
        let start = self.cursor.pos;
        let (clauses, close) = self.clauses(&opener, start, TokenKind::EndSwitch, "EndSwitch")?;
        self.cursor.pos = close + 1;

        // Every case value is evaluated once, in order, before a clause is chosen
        let mut headers = Vec::with_capacity(clauses.len());
        for clause in &clauses {
            headers.push(if clause.is_else { None } else { Some(self.case_items(clause)?) });
        }

        let chosen = headers.iter().position(|items| match items {
            None => true,
            Some(items) => items.iter().any(|(low, high)| match high {
                Some(high) => compare(&subject, low) != Ordering::Less && compare(&subject, high) != Ordering::Greater,
                None => loose_equals(&subject, low),
            }),
        });
        match chosen {
            Some(k) => self.run_clauses(&clauses, k),
            None => Ok(Flow::Normal),
        }
    }

    /// `Case v1, v2, lo To hi`: single values and inclusive ranges
    fn case_items(&mut self, clause: &Clause) -> Result<Vec<(Value, Option<Value>)>, LangError> {
        let (start, end) = clause.header;
        let mut sub = Evaluator::new(&mut *self.vm, self.tokens.clone(), Cursor::new(start, end));
        let mut items = Vec::new();
        loop {
            let low = sub.value()?;
            let high = if sub.peek_is(TokenKind::To) {
                sub.advance();
                Some(sub.value()?)
            } else {
                None
            };
            items.push((low, high));
            match sub.peek().cloned() {
                Some(token) if token.kind == TokenKind::Separator => {
                    sub.advance();
                }
                None => return Ok(items),
                Some(token) => {
                    return Err(sub.syntax_error(format!("unexpected {} in Case", token)));
                }
            }
        }
    }

    pub(crate) fn select(&mut self) -> Result<Flow, LangError> {
        let opener = self.expect(TokenKind::Select, "Select")?;
        let start = self.cursor.pos;
        if let Some(token) = self.peek().filter(|t| !t.ends_line()).cloned() {
            return Err(self.syntax_error(format!("unexpected {} after Select", token)));
        }
        let (clauses, close) = self.clauses(&opener, start, TokenKind::EndSelect, "EndSelect")?;
        self.cursor.pos = close + 1;

        for (k, clause) in clauses.iter().enumerate() {
            let taken = clause.is_else || {
                let (from, to) = clause.header;
                self.eval_range(self.tokens.clone(), from, to)?.as_bool()
            };
            if taken {
                return self.run_clauses(&clauses, k);
            }
        }
        Ok(Flow::Normal)
    }

    // ========== Loops ==========

    pub(crate) fn for_loop(&mut self, id: LoopId) -> Result<Flow, LangError> {
        let token = self.advance();
        let program = self.vm.program();
        let Some(descriptor) = program.for_loop(id) else {
            return Err(LangError::runtime_error(
                format!("unknown loop descriptor {}", id.0),
                token.map(|t| t.line).unwrap_or(0),
            ));
        };
        match &descriptor.kind {
            LoopKind::Range { start, end, step } => self.range_loop(descriptor, start, end, step.as_ref()),
            LoopKind::Each { collection } => self.each_loop(descriptor, collection),
        }
    }

    fn run_body(&mut self, descriptor: &ForLoop, index: Value) -> Result<Flow, LangError> {
        self.vm.run_block(
            Block::whole(descriptor.body.clone()),
            ScopeKind::Block,
            vec![(descriptor.index.clone(), index)],
        )
    }

    fn step_amount(&mut self, step: Option<&TokenBlock>) -> Result<f64, LangError> {
        match step {
            Some(block) => Ok(self.eval_block(block)?.as_number()),
            None => Ok(1.0),
        }
    }

    /// The next index is computed before the body runs; the loop stops once
    /// it would pass `end` in the direction of travel, or fails to advance.
    fn range_loop(
        &mut self,
        descriptor: &ForLoop,
        start: &TokenBlock,
        end: &TokenBlock,
        step: Option<&TokenBlock>,
    ) -> Result<Flow, LangError> {
        let mut index = self.eval_block(start)?.as_number();
        let last = self.eval_block(end)?.as_number();
        let mut step_by = self.step_amount(step)?;

        if (step_by > 0.0 && index > last) || (step_by < 0.0 && index < last) {
            return Ok(Flow::Normal);
        }

        loop {
            let next = index + step_by;
            match loop_control(self.run_body(descriptor, Value::from_f64(index))?) {
                LoopControl::Continue => {}
                LoopControl::Break => break,
                LoopControl::Leave(flow) => return Ok(flow),
            }
            if next == index || (next > index && next > last) || (next < index && next < last) {
                break;
            }
            index = next;
            step_by = self.step_amount(step)?;
        }
        Ok(Flow::Normal)
    }

    /// `For $v In $collection`: array elements in order, or map keys
    fn each_loop(&mut self, descriptor: &ForLoop, collection: &TokenBlock) -> Result<Flow, LangError> {
        let value = self.eval_block(collection)?;
        let items: Vec<Value> = match value.as_handle().and_then(|id| self.vm.get_handle(id)) {
            Some(HeapObject::Array(items)) => items.clone(),
            Some(HeapObject::Map(map)) => map.keys().map(|k| Value::string(k.as_str())).collect(),
            _ => {
                return Err(LangError::runtime_error_with_type(
                    format!("For...In needs an array or map, got {}", value.type_name()),
                    descriptor.line,
                    ErrorType::TypeError,
                ))
            }
        };

        for item in items {
            match loop_control(self.run_body(descriptor, item)?) {
                LoopControl::Continue => {}
                LoopControl::Break => break,
                LoopControl::Leave(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn while_loop(&mut self) -> Result<Flow, LangError> {
        let tokens = self.tokens.clone();
        let end = self.cursor.end;
        let opener = self.expect(TokenKind::While, "While")?;
        let cond_start = self.cursor.pos;
        let cond_end = statement_end(&tokens, cond_start, end);
        let wend = scan_depth_zero(&tokens, cond_end, end, |_, token| token.kind == TokenKind::WEnd)
            .ok_or_else(|| self.missing_closer(&opener, "WEnd"))?;
        self.cursor.pos = wend + 1;

        loop {
            if !self.eval_range(tokens.clone(), cond_start, cond_end)?.as_bool() {
                break;
            }
            match loop_control(self.run_range(cond_end, wend)?) {
                LoopControl::Continue => {}
                LoopControl::Break => break,
                LoopControl::Leave(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// `Do ... Until <cond>`: the body always runs at least once
    pub(crate) fn do_until(&mut self) -> Result<Flow, LangError> {
        let tokens = self.tokens.clone();
        let end = self.cursor.end;
        let opener = self.expect(TokenKind::Do, "Do")?;
        let body_start = self.cursor.pos;
        let until = scan_depth_zero(&tokens, body_start, end, |_, token| token.kind == TokenKind::Until)
            .ok_or_else(|| self.missing_closer(&opener, "Until"))?;
        let cond_end = statement_end(&tokens, until + 1, end);
        self.cursor.pos = cond_end;

        loop {
            match loop_control(self.run_range(body_start, until)?) {
                LoopControl::Continue => {}
                LoopControl::Break => break,
                LoopControl::Leave(flow) => return Ok(flow),
            }
            if self.eval_range(tokens.clone(), until + 1, cond_end)?.as_bool() {
                break;
            }
        }
        Ok(Flow::Normal)
    }
}
