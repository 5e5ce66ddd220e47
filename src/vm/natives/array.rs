// Array and map native functions

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::vm::handles::HeapObject;
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

/// Element count of an array (or of the nested arrays at `dimension`), entry count of a map
pub fn native_ubound(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let dimension = args.int("dimension");
    let mut current = args.get("array").clone();

    for level in 1.. {
        let Some(object) = current.as_handle().and_then(|id| vm.get_handle(id)) else {
            vm.set_error(if level == 1 { 1 } else { 2 });
            return Ok(Value::Number(0));
        };
        match object {
            HeapObject::Array(items) if level >= dimension => return Ok(Value::Number(items.len() as i64)),
            HeapObject::Array(items) => match items.first() {
                Some(first) => current = first.clone(),
                None => {
                    vm.set_error(2);
                    return Ok(Value::Number(0));
                }
            },
            HeapObject::Map(map) if dimension <= 1 => return Ok(Value::Number(map.len() as i64)),
            _ => {
                vm.set_error(1);
                return Ok(Value::Number(0));
            }
        }
    }
    Ok(Value::Number(0))
}

pub fn native_map_keys(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let keys: Option<Vec<Value>> = match args.get("map").as_handle().and_then(|id| vm.get_handle(id)) {
        Some(HeapObject::Map(map)) => Some(map.keys().map(|k| Value::string(k.as_str())).collect()),
        _ => None,
    };
    match keys {
        Some(keys) => Ok(vm.new_array(keys)),
        None => {
            vm.set_error(1);
            Ok(Value::string(""))
        }
    }
}

pub fn native_map_exists(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let key = args.string("key");
    Ok(match args.get("map").as_handle().and_then(|id| vm.get_handle(id)) {
        Some(HeapObject::Map(map)) => Value::Bool(map.contains_key(&key)),
        _ => {
            vm.set_error(1);
            Value::Bool(false)
        }
    })
}

pub fn native_map_remove(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let key = args.string("key");
    Ok(match args.get("map").as_handle().and_then(|id| vm.get_handle_mut(id)) {
        Some(HeapObject::Map(map)) => Value::Bool(map.remove(&key).is_some()),
        _ => {
            vm.set_error(1);
            Value::Bool(false)
        }
    })
}
