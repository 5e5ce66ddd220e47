// File operations native functions
// A file argument is either a handle from FileOpen or a path

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::debug_println;
use crate::vm::handles::{HeapObject, OpenFile};
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

pub const MODE_READ: i64 = 0;
pub const MODE_APPEND: i64 = 1;
pub const MODE_OVERWRITE: i64 = 2;
pub const MODE_CREATE_PATH: i64 = 8;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

fn open_options(mode: i64) -> OpenOptions {
    let mut options = OpenOptions::new();
    match mode & 7 {
        MODE_APPEND => options.append(true).create(true),
        MODE_OVERWRITE => options.write(true).truncate(true).create(true),
        _ => options.read(true),
    };
    options
}

/// Returns a file handle, or -1 (with `@error` set) when the file cannot be opened
pub fn native_file_open(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let path = args.string("filename");
    let mode = args.int("mode");

    if mode & MODE_CREATE_PATH != 0 {
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() && fs::create_dir_all(parent).is_err() {
                vm.set_error(1);
                return Ok(Value::Number(-1));
            }
        }
    }

    match open_options(mode).open(&path) {
        Ok(file) => {
            let id = vm.add_handle(HeapObject::File(OpenFile {
                file,
                path: path.clone().into(),
                mode,
            }));
            debug_println!("file: opened {} (mode {}) as {}", path, mode, id);
            Ok(Value::Handle(id))
        }
        Err(e) => {
            debug_println!("file: cannot open {}: {}", path, e);
            vm.set_error(1);
            Ok(Value::Number(-1))
        }
    }
}

/// Reads `count` bytes (or everything) as text. A stale or foreign handle
/// yields "" with `@error` 1; reading at end of file sets `@error` to -1.
pub fn native_file_read(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let count = args.int("count");
    let bytes = match args.get("file") {
        Value::Handle(id) => {
            let Some(HeapObject::File(open)) = vm.get_handle_mut(*id) else {
                vm.set_error(1);
                return Ok(Value::string(""));
            };
            let mut buffer = Vec::new();
            let result = if count >= 0 {
                (&open.file).take(count as u64).read_to_end(&mut buffer)
            } else {
                open.file.read_to_end(&mut buffer)
            };
            match result {
                Ok(_) => buffer,
                Err(_) => {
                    vm.set_error(1);
                    return Ok(Value::string(""));
                }
            }
        }
        other => match fs::read(other.to_string()) {
            Ok(bytes) => bytes,
            Err(_) => {
                vm.set_error(1);
                return Ok(Value::string(""));
            }
        },
    };

    if bytes.is_empty() && count != 0 {
        vm.set_error(-1);
    }
    Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

fn write_to(vm: &mut Vm, target: &Value, data: &[u8]) -> Value {
    let written = match target {
        Value::Handle(id) => match vm.get_handle_mut(*id) {
            Some(HeapObject::File(open)) if open.mode & 7 != MODE_READ => open.file.write_all(data).is_ok(),
            _ => false,
        },
        other => open_options(MODE_APPEND)
            .open(other.to_string())
            .and_then(|mut file| file.write_all(data))
            .is_ok(),
    };
    if written {
        Value::Number(1)
    } else {
        vm.set_error(1);
        Value::Number(0)
    }
}

pub fn native_file_write(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let data = args.get("data").as_bytes();
    Ok(write_to(vm, args.get("file"), &data))
}

/// Appends a line ending unless the text already ends with CR or LF
pub fn native_file_write_line(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let mut line = args.string("line");
    if !line.ends_with('\n') && !line.ends_with('\r') {
        line.push_str(LINE_ENDING);
    }
    Ok(write_to(vm, args.get("file"), line.as_bytes()))
}

pub fn native_file_close(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let Some(id) = args.get("handle").as_handle() else {
        return Ok(Value::Number(0));
    };
    match vm.get_handle(id) {
        Some(HeapObject::File(_)) => {
            if let Some(HeapObject::File(mut open)) = vm.destroy_handle(id) {
                let _ = open.file.flush();
                debug_println!("file: closed {}", open.path.display());
            }
            Ok(Value::Number(1))
        }
        _ => Ok(Value::Number(0)),
    }
}

pub fn native_file_delete(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::Number(if fs::remove_file(args.string("filename")).is_ok() { 1 } else { 0 }))
}

pub fn native_file_exists(_vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    Ok(Value::Number(if Path::new(&args.string("path")).exists() { 1 } else { 0 }))
}
