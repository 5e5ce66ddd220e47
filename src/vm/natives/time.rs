// Timing native functions

use std::thread;
use std::time::{Duration, Instant};

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::vm::handles::HeapObject;
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

pub fn native_sleep(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let delay = args.int("delay").max(0) as u64;
    thread::sleep(Duration::from_millis(delay));
    Ok(Value::Number(1))
}

pub fn native_timer_init(vm: &mut Vm, _args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::Handle(vm.add_handle(HeapObject::Timer(Instant::now()))))
}

/// Milliseconds elapsed since the matching TimerInit
pub fn native_timer_diff(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let started = match args.get("handle").as_handle().and_then(|id| vm.get_handle(id)) {
        Some(HeapObject::Timer(started)) => *started,
        _ => {
            vm.set_error(1);
            return Ok(Value::Number(0));
        }
    };
    Ok(Value::Double(started.elapsed().as_secs_f64() * 1000.0))
}
