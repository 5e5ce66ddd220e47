// Basic native functions: conversions, type checks, console output, error registers

use crate::common::error::LangError;
use crate::common::value::{encode_hex, Value};
use crate::vm::handles::HeapObject;
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

fn bool_number(flag: bool) -> Value {
    Value::Number(if flag { 1 } else { 0 })
}

fn heap_kind<'a>(vm: &'a Vm, value: &Value) -> Option<&'a HeapObject> {
    value.as_handle().and_then(|id| vm.get_handle(id))
}

/// Binaries render as `0x` hex, everything else through its display form
pub fn native_string(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(match args.get("value") {
        Value::Binary(bytes) => Value::String(format!("0x{}", encode_hex(bytes))),
        other => Value::String(other.to_string()),
    })
}

pub fn native_number(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(match args.get("value") {
        Value::Number(n) => Value::Number(*n),
        Value::Double(n) => Value::Double(*n),
        other => Value::parse_number(&other.to_string()),
    })
}

pub fn native_int(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::Number(args.int("value")))
}

pub fn native_binary(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::Binary(args.get("value").as_bytes()))
}

pub fn native_var_get_type(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let value = args.get("value");
    let name = match heap_kind(vm, value) {
        Some(HeapObject::Array(_)) => "Array",
        Some(HeapObject::Map(_)) => "Map",
        _ => value.type_name(),
    };
    Ok(Value::string(name))
}

pub fn native_is_number(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(bool_number(matches!(args.get("value"), Value::Number(_) | Value::Double(_))))
}

pub fn native_is_string(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(bool_number(matches!(args.get("value"), Value::String(_))))
}

pub fn native_is_bool(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(bool_number(matches!(args.get("value"), Value::Bool(_))))
}

pub fn native_is_binary(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(bool_number(matches!(args.get("value"), Value::Binary(_))))
}

pub fn native_is_array(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(bool_number(matches!(heap_kind(vm, args.get("value")), Some(HeapObject::Array(_)))))
}

pub fn native_is_map(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(bool_number(matches!(heap_kind(vm, args.get("value")), Some(HeapObject::Map(_)))))
}

pub fn native_console_write(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let text = args.string("data");
    vm.write_stdout(&text);
    Ok(Value::Number(text.len() as i64))
}

pub fn native_console_write_error(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let text = args.string("data");
    vm.write_stderr(&text);
    Ok(Value::Number(text.len() as i64))
}

/// Sets `@error` (and `@extended`) of the calling function and yields the given return value
pub fn native_set_error(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let value = args.get("return").clone();
    vm.set_error(args.int("code"));
    vm.set_extended(args.int("extended"));
    vm.set_return_value(value.clone());
    Ok(value)
}

pub fn native_set_extended(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let value = args.get("return").clone();
    vm.set_extended(args.int("code"));
    vm.set_return_value(value.clone());
    Ok(value)
}

/// Accepts a bare function reference or its name as a string
pub fn native_on_exit_register(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let name = match args.get("function") {
        Value::Function(name) | Value::String(name) => name.clone(),
        _ => {
            vm.set_error(1);
            return Ok(Value::Number(0));
        }
    };
    vm.set_exit_handler(name);
    Ok(Value::Number(1))
}
