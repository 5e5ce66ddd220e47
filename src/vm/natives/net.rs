// Network native functions

use std::io::Read;
use std::time::Duration;

use crate::common::error::LangError;
use crate::common::value::Value;
use crate::debug_println;
use crate::vm::natives::NativeArgs;
use crate::vm::vm::Vm;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads `url` and returns the body as binary; `@extended` holds the byte
/// count. Failures set `@error` to 1 and return an empty string.
pub fn native_inet_read(vm: &mut Vm, args: &NativeArgs) -> Result<Value, LangError> {
    let url = args.string("url");
    let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();

    let body = agent
        .get(&url)
        .call()
        .map_err(|e| e.to_string())
        .and_then(|response| {
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map(|_| bytes)
                .map_err(|e| e.to_string())
        });

    match body {
        Ok(bytes) => {
            debug_println!("inet: {} -> {} bytes", url, bytes.len());
            vm.set_extended(bytes.len() as i64);
            Ok(Value::Binary(bytes))
        }
        Err(message) => {
            debug_println!("inet: {} failed: {}", url, message);
            vm.set_error(1);
            Ok(Value::string(""))
        }
    }
}
