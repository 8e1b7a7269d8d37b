//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `hostbridge_core` linkage without a foreign host.
//! - Print the `test` module manifest and call one export through `LocalHost`.
//!
//! Usage: `hostbridge_cli [export-name [str-arg...]]` (defaults to `test1`).

use hostbridge_core::reference::{test_module, TEST1_NAME};
use hostbridge_core::{invoke_by_name, BridgeConfig, CallArgs, Initializer, LocalHost, NativeValue};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("hostbridge_core ping={}", hostbridge_core::ping());
    println!("hostbridge_core version={}", hostbridge_core::core_version());

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = hostbridge_core::init_logging_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let module = match test_module() {
        Ok(module) => module,
        Err(err) => {
            eprintln!("module error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&module.manifest()) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("manifest error: {err}"),
    }

    let host = LocalHost::new().with_echo(config.echo_diagnostics);
    let Some(instance) = Initializer::new().initialize(&host, module) else {
        report_error(&host);
        return ExitCode::FAILURE;
    };
    println!("initialized module={}", instance.name());

    let mut argv = std::env::args().skip(1);
    let name = argv.next().unwrap_or_else(|| TEST1_NAME.to_string());
    let call_args = CallArgs::positional(argv.map(NativeValue::Str).collect());
    let raw = match host.args(&call_args) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("argument error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match invoke_by_name(&host, module.registry(), &name, raw) {
        Some(value) => {
            let handle = value.into_raw();
            match host.value(handle) {
                Some(value) => println!("{name}() -> {value}"),
                None => println!("{name}() -> <object>"),
            }
            host.release(handle);
            ExitCode::SUCCESS
        }
        None => {
            report_error(&host);
            ExitCode::FAILURE
        }
    }
}

fn report_error(host: &LocalHost) {
    match host.take_error() {
        Some(error) => eprintln!("{}: {}", error.kind, error.message),
        None => eprintln!("call failed without an error set"),
    }
}
