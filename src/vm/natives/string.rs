// String manipulation native functions

use regex::RegexBuilder;

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

fn chars_of(args: &NativeArgs) -> Vec<char> {
    args.string("string").chars().collect()
}

/// Capture groups of one match, or the whole match when the pattern has none
fn capture_groups(captures: &regex::Captures) -> Vec<Value> {
    if captures.len() == 1 {
        return vec![Value::string(captures.get(0).map(|m| m.as_str()).unwrap_or(""))];
    }
    (1..captures.len())
        .map(|i| Value::string(captures.get(i).map(|m| m.as_str()).unwrap_or("")))
        .collect()
}

fn clamp_count(count: i64, len: usize) -> usize {
    if count <= 0 {
        0
    } else {
        (count as usize).min(len)
    }
}

pub fn native_string_len(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::Number(args.string("string").chars().count() as i64))
}

pub fn native_string_upper(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::String(args.string("string").to_uppercase()))
}

pub fn native_string_lower(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::String(args.string("string").to_lowercase()))
}

pub fn native_string_left(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let chars = chars_of(args);
    let count = clamp_count(args.int("count"), chars.len());
    Ok(Value::String(chars[..count].iter().collect()))
}

pub fn native_string_right(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let chars = chars_of(args);
    let count = clamp_count(args.int("count"), chars.len());
    Ok(Value::String(chars[chars.len() - count..].iter().collect()))
}

/// 1-based `start`; a negative `count` takes the rest of the string
pub fn native_string_mid(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let chars = chars_of(args);
    let start = args.int("start").max(1) as usize - 1;
    if start >= chars.len() {
        return Ok(Value::string(""));
    }
    let rest = chars.len() - start;
    let count = match args.int("count") {
        n if n < 0 => rest,
        n => (n as usize).min(rest),
    };
    Ok(Value::String(chars[start..start + count].iter().collect()))
}

/// 1-based character position of the n-th occurrence, 0 when absent.
/// A negative occurrence searches from the right.
pub fn native_string_in_str(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let case_sensitive = args.int("casesense") == 1;
    let (haystack, needle) = if case_sensitive {
        (args.string("string"), args.string("substring"))
    } else {
        (args.string("string").to_lowercase(), args.string("substring").to_lowercase())
    };
    let occurrence = args.int("occurrence");
    if occurrence == 0 || needle.is_empty() {
        vm.set_error(1);
        return Ok(Value::Number(0));
    }

    let positions: Vec<usize> = haystack.match_indices(needle.as_str()).map(|(i, _)| i).collect();
    let found = if occurrence > 0 {
        positions.get(occurrence as usize - 1)
    } else {
        positions.iter().rev().nth((-occurrence) as usize - 1)
    };
    Ok(match found {
        Some(&byte_index) => Value::Number(haystack[..byte_index].chars().count() as i64 + 1),
        None => Value::Number(0),
    })
}

/// Replaces `occurrence` matches (0 = all, negative = from the right); `@extended` holds the count
pub fn native_string_replace(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let text = args.string("string");
    let search = args.string("search");
    let replace = args.string("replace");
    if search.is_empty() {
        return Ok(Value::String(text));
    }

    let pattern = regex::escape(&search);
    let matcher = RegexBuilder::new(&pattern)
        .case_insensitive(args.int("casesense") != 1)
        .build()
        .map_err(|e| LangError::runtime_error(format!("StringReplace: {}", e), vm.line()))?;

    let mut matches: Vec<(usize, usize)> = matcher.find_iter(&text).map(|m| (m.start(), m.end())).collect();
    let occurrence = args.int("occurrence");
    if occurrence > 0 {
        matches.truncate(occurrence as usize);
    } else if occurrence < 0 {
        let keep = ((-occurrence) as usize).min(matches.len());
        matches = matches.split_off(matches.len() - keep);
    }

    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for &(start, end) in &matches {
        result.push_str(&text[last..start]);
        result.push_str(&replace);
        last = end;
    }
    result.push_str(&text[last..]);

    vm.set_extended(matches.len() as i64);
    Ok(Value::String(result))
}

/// Flag 0: every character of `delimiters` splits; 1: the whole string is the
/// delimiter; add 2 to omit the leading count element.
pub fn native_string_split(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let text = args.string("string");
    let delimiters = args.string("delimiters");
    let flag = args.int("flag");

    let parts: Vec<String> = if delimiters.is_empty() {
        text.chars().map(|c| c.to_string()).collect()
    } else if flag & 1 == 1 {
        text.split(delimiters.as_str()).map(str::to_string).collect()
    } else {
        text.split(|c: char| delimiters.contains(c)).map(str::to_string).collect()
    };
    if parts.len() == 1 {
        vm.set_error(1);
    }

    let mut items: Vec<Value> = Vec::with_capacity(parts.len() + 1);
    if flag & 2 == 0 {
        items.push(Value::Number(parts.len() as i64));
    }
    items.extend(parts.into_iter().map(Value::String));
    Ok(vm.new_array(items))
}

/// Flags: 1 leading, 2 trailing, 4 double spaces, 8 all whitespace
pub fn native_string_strip_ws(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let flag = args.int("flag");
    let mut text = args.string("string");

    if flag & 8 != 0 {
        text.retain(|c| !c.is_whitespace());
        return Ok(Value::String(text));
    }
    if flag & 1 != 0 {
        text = text.trim_start().to_string();
    }
    if flag & 2 != 0 {
        text = text.trim_end().to_string();
    }
    if flag & 4 != 0 {
        let mut collapsed = String::with_capacity(text.len());
        let mut previous_space = false;
        for c in text.chars() {
            if c == ' ' && previous_space {
                continue;
            }
            previous_space = c == ' ';
            collapsed.push(c);
        }
        text = collapsed;
    }
    Ok(Value::String(text))
}

/// Flag 0: 1/0 for a match; 1: array of the first match's groups;
/// 3: array of every match's groups. Bad patterns set `@error` to 2.
pub fn native_string_regexp(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let text = args.string("string");
    let pattern = match regex::Regex::new(&args.string("pattern")) {
        Ok(pattern) => pattern,
        Err(_) => {
            vm.set_error(2);
            return Ok(Value::Number(0));
        }
    };

    let flag = args.int("flag");
    if flag == 0 {
        return Ok(Value::Number(if pattern.is_match(&text) { 1 } else { 0 }));
    }

    let items: Vec<Value> = if flag == 3 {
        pattern.captures_iter(&text).flat_map(|c| capture_groups(&c)).collect()
    } else {
        pattern.captures(&text).map(|c| capture_groups(&c)).unwrap_or_default()
    };
    if items.is_empty() {
        vm.set_error(1);
        return Ok(Value::Number(0));
    }
    Ok(vm.new_array(items))
}
