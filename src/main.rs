use std::env;
use std::ffi::OsString;
use std::process::ExitCode;

use rpipe::{report, Config, Runner};

fn print_help() {
    println!("rpipe - run commands as a pipeline");
    println!();
    println!("Usage: rpipe [--] <command> [args...] [| <command> [args...]]...");
    println!("  -h, --help       Print this help");
    println!("  -V, --version    Print version");
    println!();
    println!("Quote the delimiter so the calling shell passes it through: rpipe ls '|' wc -l");
    println!();
    println!("Environment:");
    println!("  RPIPE_DELIMITER  Stage delimiter token (default '|')");
    println!("  RPIPE_COLOR      auto, always or never");
    println!("  RPIPE_LOG        Log filter, e.g. 'debug'");
}

fn print_version() {
    println!("rpipe {}", env!("CARGO_PKG_VERSION"));
}

fn main() -> ExitCode {
    let args: Vec<OsString> = env::args_os().skip(1).collect();

    // Flags are only recognised in front of the first stage.
    match args.first().and_then(|arg| arg.to_str()) {
        Some("-h" | "--help") => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Some("-V" | "--version") => {
            print_version();
            return ExitCode::SUCCESS;
        }
        _ => {}
    }
    let args = match args.split_first() {
        Some((first, rest)) if first == "--" => rest,
        _ => &args[..],
    };

    let config = Config::from_env();
    report::init_logging(&config);
    for setting in &config.ignored {
        tracing::warn!("ignoring {setting}");
    }

    match Runner::new(&config).run(args) {
        Ok(result) => {
            for stage in result.failed() {
                report::report_stage(stage);
            }
            ExitCode::from(result.kind().exit_code())
        }
        Err(err) => {
            report::report_error(&err);
            ExitCode::from(err.kind().exit_code())
        }
    }
}
