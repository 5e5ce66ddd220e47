// Mathematical native functions

use rand::Rng;

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

pub fn native_abs(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(match args.get("value") {
        Value::Number(n) => match n.checked_abs() {
            Some(abs) => Value::Number(abs),
            None => Value::Double((*n as f64).abs()),
        },
        other => Value::from_f64(other.as_number().abs()),
    })
}

pub fn native_round(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let value = args.number("value");
    let decimals = args.int("decimals").clamp(0, 15) as i32;
    let factor = 10f64.powi(decimals);
    Ok(Value::from_f64((value * factor).round() / factor))
}

pub fn native_sqrt(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let value = args.number("value");
    if value < 0.0 {
        vm.set_error(1);
        return Ok(Value::Number(0));
    }
    Ok(Value::from_f64(value.sqrt()))
}

pub fn native_mod(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let (dividend, divisor) = (args.get("dividend"), args.get("divisor"));
    if divisor.as_number() == 0.0 {
        vm.set_error(1);
        return Ok(Value::Number(0));
    }
    if let (Value::Number(a), Value::Number(b)) = (dividend, divisor) {
        return Ok(Value::Number(a.wrapping_rem(*b)));
    }
    Ok(Value::from_f64(dividend.as_number() % divisor.as_number()))
}

/// Float in `[min, max)`, or with flag 1 an integer in `[min, max]`.
/// A single argument acts as the maximum.
pub fn native_random(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let (mut min, mut max) = (args.number("min"), args.number("max"));
    if args.supplied() == 1 {
        max = min;
        min = 0.0;
    }
    if min > max {
        vm.set_error(1);
        return Ok(Value::Number(0));
    }

    let mut rng = rand::thread_rng();
    if args.int("flag") == 1 {
        let (low, high) = (min.ceil() as i64, max.floor() as i64);
        if low > high {
            vm.set_error(1);
            return Ok(Value::Number(0));
        }
        return Ok(Value::Number(rng.gen_range(low..=high)));
    }
    if min == max {
        return Ok(Value::Double(min));
    }
    Ok(Value::Double(rng.gen_range(min..max)))
}
