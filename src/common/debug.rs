// Debug mode and stream redirection management

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static ERROR_TO_STDOUT: AtomicBool = AtomicBool::new(false);

/// Enable debug mode (step tracing for every VM in the process)
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Check if debug mode is enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Route everything written to the error stream into standard output
pub fn set_error_to_stdout(enabled: bool) {
    ERROR_TO_STDOUT.store(enabled, Ordering::Relaxed);
}

pub fn is_error_to_stdout() -> bool {
    ERROR_TO_STDOUT.load(Ordering::Relaxed)
}

/// Writes text to the error stream, or to stdout when redirected
pub fn write_error_stream(text: &str) {
    if is_error_to_stdout() {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    } else {
        eprint!("{}", text);
    }
}

/// Timestamp prefix used by trace lines
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Print trace message if debug mode is enabled
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        if $crate::common::debug::is_debug_enabled() {
            println!("[{}] vm: {}", $crate::common::debug::timestamp(), format!($($arg)*));
        }
    };
}
