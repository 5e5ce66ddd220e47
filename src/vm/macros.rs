// `@Name` macros: registers, script location, environment and clock

use std::env;
use std::path::Path;

use chrono::{Datelike, Local, Timelike};

use crate::common::error::{ErrorType, LangError};
use crate::common::value::Value;
use crate::vm::vm::Vm;

fn path_string(path: &Path) -> Value {
    Value::string(path.to_string_lossy())
}

fn dir_or_empty(dir: Option<std::path::PathBuf>) -> Value {
    dir.map(|d| path_string(&d)).unwrap_or_else(|| Value::string(""))
}

fn env_or_empty(names: &[&str]) -> Value {
    names
        .iter()
        .find_map(|name| env::var(name).ok())
        .map(Value::String)
        .unwrap_or_else(|| Value::string(""))
}

impl Vm {
    /// Resolves a macro name (case-insensitive)
    pub fn macro_value(&self, name: &str, line: usize) -> Result<Value, LangError> {
        let now = Local::now();
        let value = match name.to_lowercase().as_str() {
            "cr" => Value::string("\r"),
            "lf" => Value::string("\n"),
            "crlf" => Value::string("\r\n"),
            "tab" => Value::string("\t"),

            "error" => Value::Number(self.get_error()),
            "extended" => Value::Number(self.get_extended()),
            "numparams" => Value::Number(self.num_params() as i64),

            "scriptdir" => path_string(self.script_path().parent().unwrap_or_else(|| Path::new(""))),
            "scriptname" => Value::string(
                self.script_path()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            "scriptfullpath" => path_string(self.script_path()),
            "workingdir" => dir_or_empty(env::current_dir().ok()),
            "tempdir" => path_string(&env::temp_dir()),
            "userprofiledir" => dir_or_empty(dirs::home_dir()),
            "appdatadir" => dir_or_empty(dirs::config_dir()),
            "desktopdir" => dir_or_empty(dirs::desktop_dir()),

            "computername" => env_or_empty(&["COMPUTERNAME", "HOSTNAME"]),
            "username" => env_or_empty(&["USERNAME", "USER"]),
            "ostype" => Value::string(env::consts::OS),
            "autoitpid" => Value::Number(std::process::id() as i64),

            "year" => Value::string(format!("{:04}", now.year())),
            "mon" => Value::string(format!("{:02}", now.month())),
            "mday" => Value::string(format!("{:02}", now.day())),
            "hour" => Value::string(format!("{:02}", now.hour())),
            "min" => Value::string(format!("{:02}", now.minute())),
            "sec" => Value::string(format!("{:02}", now.second())),
            "msec" => Value::string(format!("{:03}", now.timestamp_subsec_millis().min(999))),
            "wday" => Value::Number(now.weekday().number_from_sunday() as i64),
            "yday" => Value::string(format!("{:03}", now.ordinal())),

            _ => {
                return Err(LangError::runtime_error_with_type(
                    format!("unknown macro @{}", name),
                    line,
                    ErrorType::NameError,
                ))
            }
        };
        Ok(value)
    }
}
