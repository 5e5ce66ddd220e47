// Function call operations: argument binding, registers, natives and user functions

use std::rc::Rc;

use crate::common::error::{ErrorType, LangError};
use crate::common::value::Value;
use crate::debug_println;
use crate::preprocessor::{CallId, UserFunction};
use crate::vm::evaluator::{Cursor, Evaluator};
use crate::vm::natives::{self, NativeArgs, NativeFunction};
use crate::vm::scope::{Block, Scope, ScopeKind};
use crate::vm::vm::{Flow, Vm, STACK_GROW_SIZE, STACK_RED_ZONE};

impl<'vm> Evaluator<'vm> {
    /// Evaluates every argument once, in order, in the caller's scope, then dispatches
    pub(crate) fn call(&mut self, id: CallId) -> Result<Value, LangError> {
        let program = self.vm.program();
        let Some(site) = program.call(id) else {
            return Err(LangError::runtime_error(
                format!("unknown call site {}", id.0),
                self.line(),
            ));
        };
        let mut args = Vec::with_capacity(site.args.len());
        for group in &site.args {
            args.push(self.eval_range(group.clone(), 0, group.len())?);
        }
        self.vm.call_function(&site.name, args, site.line)
    }
}

fn check_arity(name: &str, max: usize, required: usize, given: usize, line: usize) -> Result<(), LangError> {
    // Проверяем количество аргументов
    if given > max {
        return Err(LangError::runtime_error_with_type(
            format!("{} called with too many arguments ({} given, at most {})", name, given, max),
            line,
            ErrorType::ArityError,
        ));
    }
    if given < required {
        return Err(LangError::runtime_error_with_type(
            format!("{} called with too few arguments ({} given, {} required)", name, given, required),
            line,
            ErrorType::ArityError,
        ));
    }
    Ok(())
}

fn missing_default(function: &str, param: &str, line: usize) -> LangError {
    LangError::runtime_error_with_type(
        format!("parameter {} of {} has no default value", param, function),
        line,
        ErrorType::ArityError,
    )
}

impl Vm {
    /// Resolves `name` among the script's functions first, then the standard library
    pub fn call_function(&mut self, name: &str, args: Vec<Value>, line: usize) -> Result<Value, LangError> {
        if self.exit_requested() {
            return Ok(Value::Null);
        }
        if let Some(function) = self.program().function(name) {
            return self.call_user(&function, args, line);
        }
        if let Some(native) = natives::lookup(name) {
            return self.call_native(native, args, line);
        }
        Err(LangError::runtime_error_with_type(
            format!("undefined function {}", name),
            line,
            ErrorType::NameError,
        ))
    }

    fn reset_registers(&mut self) {
        let registers = self.registers_mut();
        registers.error = 0;
        registers.extended = 0;
    }

    fn call_native(&mut self, native: &NativeFunction, args: Vec<Value>, line: usize) -> Result<Value, LangError> {
        check_arity(native.name, native.params.len(), native.required(), args.len(), line)?;

        let mut bound = NativeArgs::new(args.len());
        let mut args = args.into_iter();
        for param in &native.params {
            let value = match args.next() {
                Some(Value::Default) | None => match &param.default {
                    Some(default) => default.clone(),
                    None => return Err(missing_default(native.name, param.name, line)),
                },
                Some(value) => value,
            };
            bound.insert(param.name, value);
        }

        self.reset_registers();
        debug_println!("call: {}({} args)", native.name, bound.supplied());
        (native.func)(self, &bound)
    }

    fn call_user(&mut self, function: &Rc<UserFunction>, args: Vec<Value>, line: usize) -> Result<Value, LangError> {
        check_arity(&function.name, function.params.len(), function.required_params(), args.len(), line)?;

        self.reset_registers();
        self.enter_call(&function.name, line)?;
        debug_println!("call: {}({} args) from line {}", function.name, args.len(), line);

        let scope = Scope::new(
            ScopeKind::Function(function.name.clone()),
            Block::whole(function.body.clone()),
        );
        self.push_scope(scope);
        self.set_num_params(args.len());
        // Deep script recursion grows the native stack instead of overflowing it
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.bind_and_run(function, args, line));
        let callee = self.pop_scope();
        self.leave_call();

        let flow = result.map_err(|e| e.with_frame(&function.name, line))?;
        let callee_registers = callee.map(|scope| scope.registers).unwrap_or_default();
        {
            let registers = self.registers_mut();
            registers.error = callee_registers.error;
            registers.extended = callee_registers.extended;
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Exit => Ok(Value::Null),
            _ => Ok(callee_registers.return_value),
        }
    }

    fn bind_and_run(&mut self, function: &UserFunction, args: Vec<Value>, line: usize) -> Result<Flow, LangError> {
        let mut args = args.into_iter();
        for param in &function.params {
            let value = match args.next() {
                Some(Value::Default) | None => match &param.default {
                    // Defaults are evaluated at call time, after earlier parameters are bound
                    Some(expr) => {
                        let mut evaluator = Evaluator::new(self, expr.clone(), Cursor::new(0, expr.len()));
                        evaluator.value()?
                    }
                    None => return Err(missing_default(&function.name, &format!("${}", param.name), line)),
                },
                Some(value) => value,
            };
            self.set_variable(&param.name, value)?;
        }
        self.run_scope()
    }
}
