// Runtime value type shared by the evaluator, the handle heap and native functions

use std::fmt;

/// Key into the handle heap of a VM tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(i64),
    Double(f64),
    Bool(bool),
    Binary(Vec<u8>),
    Handle(HandleId),
    /// Bare function name used by reference (callbacks)
    Function(String),
    Default,
    Null,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Arithmetic results: whole numbers stay integers, everything else is a double
    pub fn from_f64(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
            Value::Number(n as i64)
        } else {
            Value::Double(n)
        }
    }

    /// Parses numeric source text; malformed text degrades to zero
    pub fn parse_number(text: &str) -> Self {
        let cleaned = strip_numeric_noise(text);
        if cleaned.is_empty() {
            return Value::Number(0);
        }
        if let Ok(n) = cleaned.parse::<i64>() {
            return Value::Number(n);
        }
        match cleaned.parse::<f64>() {
            Ok(n) => Value::Double(n),
            Err(_) => Value::Number(0),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Double(_) | Value::Bool(_))
    }

    /// Numeric coercion. Strings have whitespace stripped before parsing and
    /// fall back to zero; binaries are read as UTF-8 text first.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n as f64,
            Value::Double(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::String(s) => parse_f64(s),
            Value::Binary(bytes) => parse_f64(&String::from_utf8_lossy(bytes)),
            Value::Handle(_) | Value::Function(_) | Value::Default | Value::Null => 0.0,
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Number(n) => *n,
            other => {
                let n = other.as_number();
                if n.is_finite() {
                    n.trunc() as i64
                } else {
                    0
                }
            }
        }
    }

    /// Truthiness: `False`, numbers <= 0, empty binaries, empty strings and Null are false
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n > 0,
            Value::Double(n) => *n > 0.0,
            Value::Binary(bytes) => !bytes.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Null => false,
            Value::Handle(_) | Value::Function(_) | Value::Default => true,
        }
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Value::Binary(bytes) => bytes.clone(),
            other => other.to_string().into_bytes(),
        }
    }

    pub fn as_handle(&self) -> Option<HandleId> {
        match self {
            Value::Handle(id) => Some(*id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Number(n) => {
                if i32::try_from(*n).is_ok() {
                    "Int32"
                } else {
                    "Int64"
                }
            }
            Value::Double(_) => "Double",
            Value::Bool(_) => "Bool",
            Value::Binary(_) => "Binary",
            Value::Handle(_) => "Ptr",
            Value::Function(_) => "Function",
            Value::Default | Value::Null => "Keyword",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    // 15 significant digits hide binary noise such as 0.1 + 0.2
                    let rounded: f64 = format!("{:.14e}", n).parse().unwrap_or(*n);
                    write!(f, "{}", rounded)
                }
            }
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Binary(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::Handle(id) => write!(f, "{}", id),
            Value::Function(name) => write!(f, "{}", name),
            Value::Default => write!(f, "Default"),
            Value::Null => Ok(()),
        }
    }
}

fn strip_numeric_noise(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t' | ' '))
        .collect()
}

fn parse_f64(text: &str) -> f64 {
    match Value::parse_number(text) {
        Value::Number(n) => n as f64,
        Value::Double(n) => n,
        _ => 0.0,
    }
}

/// Decodes hex digits (without the `0x` prefix); odd lengths are left-padded
pub fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{}", digits);
        padded.as_str()
    } else {
        digits
    };
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    let raw = digits.as_bytes();
    for pair in raw.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        bytes.push((hi * 16 + lo) as u8);
    }
    Some(bytes)
}

pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
