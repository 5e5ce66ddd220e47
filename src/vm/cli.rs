// CLI argument parsing and structures

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Script run when no file is given on the command line
pub const INTERNAL_SCRIPT: &str = ";INTERNAL SCRIPT\n#include \"main.au3\"";

/// Path the internal script runs under, relative to the working directory
pub const INTERNAL_SCRIPT_PATH: &str = "autoscript.au3";

/// Configuration for a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    /// Script paths in run order; empty means the internal script
    pub scripts: Vec<String>,
    pub debug: bool,
    pub error_stdout: bool,
}

/// Parsed CLI arguments
#[derive(Debug, PartialEq)]
pub enum CliArgs {
    Help,
    Version,
    Run(RunConfig),
}

/// Print help message
pub fn print_help() {
    println!("AutoScript - AutoIt-style script interpreter");
    println!();
    println!("Usage:");
    println!("  autoscript                     # Run the internal script (includes main.au3)");
    println!("  autoscript script.au3          # Run a script");
    println!("  autoscript a.au3 b.au3         # Run several scripts one after another");
    println!();
    println!("Options (case-insensitive):");
    println!("  /debug         Trace preprocessing, statements, variables and calls");
    println!("  /errorstdout   Write the error stream to standard output");
    println!("  /version       Show version");
    println!("  /help, /?      Show this help");
    println!();
    println!("Script flags:");
    println!("  #debug              Enable tracing from inside a script");
    println!("  #include \"file\"     Insert another script");
    println!("  #include-once       Include this file at most once");
    println!();
    println!("Example (hello.au3):");
    println!("  Func Greet($name, $greeting = \"Hello\")");
    println!("      Return $greeting & \", \" & $name & \"!\"");
    println!("  EndFunc");
    println!("  ConsoleWrite(Greet(\"World\") & @CRLF)");
}

/// Print version
pub fn print_version() {
    println!("AutoScript v{}", VERSION);
}

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

/// `/name` switches; absolute script paths such as `/tmp/a.au3` are not options
fn is_option(arg: &str) -> bool {
    match arg.strip_prefix('/') {
        Some(rest) => !rest.is_empty() && !rest.contains(&['/', '.'][..]),
        None => false,
    }
}

/// Parse CLI arguments; `args[0]` is the program name
pub fn parse_args(args: Vec<String>) -> Result<CliArgs, String> {
    let mut config = RunConfig::default();

    for arg in args.into_iter().skip(1) {
        if !is_option(&arg) {
            config.scripts.push(arg);
            continue;
        }
        match arg.to_lowercase().as_str() {
            "/help" | "/?" => return Ok(CliArgs::Help),
            "/version" => return Ok(CliArgs::Version),
            "/debug" => config.debug = true,
            "/errorstdout" => config.error_stdout = true,
            _ => {
                return Err(format!("Unknown option: {}\nUse /help for usage", arg));
            }
        }
    }

    Ok(CliArgs::Run(config))
}
