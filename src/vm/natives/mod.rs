// Native functions module
// Registry of the standard library: name -> parameter list + implementation

pub mod array;
pub mod basic;
pub mod file;
pub mod math;
pub mod net;
pub mod string;
pub mod time;

pub use array::*;
pub use basic::*;
pub use file::*;
pub use math::*;
pub use net::*;
pub use string::*;
pub use time::*;

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::vm::vm::Vm;

pub type NativeFn = fn(&mut Vm, &NativeArgs) -> Result<Value, LangError>;

#[derive(Debug, Clone)]
pub struct NativeParam {
    pub name: &'static str,
    pub default: Option<Value>,
}

pub fn required(name: &'static str) -> NativeParam {
    NativeParam { name, default: None }
}

pub fn optional(name: &'static str, default: Value) -> NativeParam {
    NativeParam {
        name,
        default: Some(default),
    }
}

#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub params: Vec<NativeParam>,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &'static str, params: Vec<NativeParam>, func: NativeFn) -> Self {
        Self { name, params, func }
    }

    pub fn required(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

static NULL_VALUE: Value = Value::Null;

/// Bound arguments by parameter name, defaults already filled in
#[derive(Debug, Clone, Default)]
pub struct NativeArgs {
    values: HashMap<&'static str, Value>,
    supplied: usize,
}

impl NativeArgs {
    pub fn new(supplied: usize) -> Self {
        Self {
            values: HashMap::new(),
            supplied,
        }
    }

    pub fn insert(&mut self, name: &'static str, value: Value) {
        self.values.insert(name, value);
    }

    /// Number of arguments the caller actually passed
    pub fn supplied(&self) -> usize {
        self.supplied
    }

    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL_VALUE)
    }

    pub fn string(&self, name: &str) -> String {
        self.get(name).to_string()
    }

    pub fn int(&self, name: &str) -> i64 {
        self.get(name).as_int()
    }

    pub fn number(&self, name: &str) -> f64 {
        self.get(name).as_number()
    }
}

lazy_static! {
    static ref REGISTRY: HashMap<String, NativeFunction> = build_registry();
}

fn build_registry() -> HashMap<String, NativeFunction> {
    let functions = vec![
        // Types and conversions
        NativeFunction::new("String", vec![required("value")], native_string),
        NativeFunction::new("Number", vec![required("value")], native_number),
        NativeFunction::new("Int", vec![required("value")], native_int),
        NativeFunction::new("Binary", vec![required("value")], native_binary),
        NativeFunction::new("VarGetType", vec![required("value")], native_var_get_type),
        NativeFunction::new("IsNumber", vec![required("value")], native_is_number),
        NativeFunction::new("IsString", vec![required("value")], native_is_string),
        NativeFunction::new("IsBool", vec![required("value")], native_is_bool),
        NativeFunction::new("IsBinary", vec![required("value")], native_is_binary),
        NativeFunction::new("IsArray", vec![required("value")], native_is_array),
        NativeFunction::new("IsMap", vec![required("value")], native_is_map),
        // Console and registers
        NativeFunction::new("ConsoleWrite", vec![required("data")], native_console_write),
        NativeFunction::new("ConsoleWriteError", vec![required("data")], native_console_write_error),
        NativeFunction::new(
            "SetError",
            vec![required("code"), optional("extended", Value::Number(0)), optional("return", Value::Number(1))],
            native_set_error,
        ),
        NativeFunction::new(
            "SetExtended",
            vec![required("code"), optional("return", Value::Number(1))],
            native_set_extended,
        ),
        NativeFunction::new("OnAutoItExitRegister", vec![required("function")], native_on_exit_register),
        // Strings
        NativeFunction::new("StringLen", vec![required("string")], native_string_len),
        NativeFunction::new("StringUpper", vec![required("string")], native_string_upper),
        NativeFunction::new("StringLower", vec![required("string")], native_string_lower),
        NativeFunction::new("StringLeft", vec![required("string"), required("count")], native_string_left),
        NativeFunction::new("StringRight", vec![required("string"), required("count")], native_string_right),
        NativeFunction::new(
            "StringMid",
            vec![required("string"), required("start"), optional("count", Value::Number(-1))],
            native_string_mid,
        ),
        NativeFunction::new(
            "StringInStr",
            vec![
                required("string"),
                required("substring"),
                optional("casesense", Value::Number(0)),
                optional("occurrence", Value::Number(1)),
            ],
            native_string_in_str,
        ),
        NativeFunction::new(
            "StringReplace",
            vec![
                required("string"),
                required("search"),
                required("replace"),
                optional("occurrence", Value::Number(0)),
                optional("casesense", Value::Number(0)),
            ],
            native_string_replace,
        ),
        NativeFunction::new(
            "StringSplit",
            vec![required("string"), required("delimiters"), optional("flag", Value::Number(0))],
            native_string_split,
        ),
        NativeFunction::new("StringStripWS", vec![required("string"), required("flag")], native_string_strip_ws),
        NativeFunction::new(
            "StringRegExp",
            vec![required("string"), required("pattern"), optional("flag", Value::Number(0))],
            native_string_regexp,
        ),
        // Math
        NativeFunction::new("Abs", vec![required("value")], native_abs),
        NativeFunction::new("Round", vec![required("value"), optional("decimals", Value::Number(0))], native_round),
        NativeFunction::new("Sqrt", vec![required("value")], native_sqrt),
        NativeFunction::new("Mod", vec![required("dividend"), required("divisor")], native_mod),
        NativeFunction::new(
            "Random",
            vec![
                optional("min", Value::Number(0)),
                optional("max", Value::Number(1)),
                optional("flag", Value::Number(0)),
            ],
            native_random,
        ),
        // Arrays and maps
        NativeFunction::new("UBound", vec![required("array"), optional("dimension", Value::Number(1))], native_ubound),
        NativeFunction::new("MapKeys", vec![required("map")], native_map_keys),
        NativeFunction::new("MapExists", vec![required("map"), required("key")], native_map_exists),
        NativeFunction::new("MapRemove", vec![required("map"), required("key")], native_map_remove),
        // Files
        NativeFunction::new("FileOpen", vec![required("filename"), optional("mode", Value::Number(0))], native_file_open),
        NativeFunction::new("FileRead", vec![required("file"), optional("count", Value::Number(-1))], native_file_read),
        NativeFunction::new("FileWrite", vec![required("file"), required("data")], native_file_write),
        NativeFunction::new("FileWriteLine", vec![required("file"), required("line")], native_file_write_line),
        NativeFunction::new("FileClose", vec![required("handle")], native_file_close),
        NativeFunction::new("FileDelete", vec![required("filename")], native_file_delete),
        NativeFunction::new("FileExists", vec![required("path")], native_file_exists),
        // Network
        NativeFunction::new("InetRead", vec![required("url"), optional("options", Value::Number(0))], native_inet_read),
        // Time
        NativeFunction::new("Sleep", vec![required("delay")], native_sleep),
        NativeFunction::new("TimerInit", vec![], native_timer_init),
        NativeFunction::new("TimerDiff", vec![required("handle")], native_timer_diff),
    ];

    functions
        .into_iter()
        .map(|function| (function.name.to_lowercase(), function))
        .collect()
}

/// Case-insensitive lookup in the standard library
pub fn lookup(name: &str) -> Option<&'static NativeFunction> {
    REGISTRY.get(&name.to_lowercase())
}

/// Registered function names, sorted
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.values().map(|f| f.name).collect();
    names.sort_unstable_by_key(|name| name.to_lowercase());
    names
}
