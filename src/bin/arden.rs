//! Command-line interface for arden
//! Compiles Arden Syntax MLM files and prints any stage of the compilation.
//!
//! Usage:
//!   arden compile `<path>` [--format `<format>`]   - Compile and print the chosen output
//!   arden check `<path>`                          - Compile and report diagnostics only
//!   arden tokens `<path>` [--format simple|json]  - Print the token stream
//!   arden ast `<path>` [--format treeviz|json]    - Print the syntax tree
//!   arden formats                               - List all output formats
//!
//! Settings come from the built-in defaults, then `arden.toml` in the working directory if
//! present, or the file given with `--config` instead.
//!
//! Logging goes to stderr and is controlled with `ARDEN_LOG` (default `warn`).

use arden::config::{ArdenConfig, Loader};
use arden::mlm::formats::{format_compilation, process_source, FormatStage, OutputFormat};
use arden::mlm::pipeline::{Compilation, Compiler};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::process;

/// Configuration picked up from the working directory when `--config` is not given
const LOCAL_CONFIG: &str = "arden.toml";
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();

    let matches = Command::new("arden")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A compiler for Arden Syntax medical logic modules")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("Configuration file layered over the built-in defaults"),
        )
        .arg(
            Arg::new("deny-warnings")
                .long("deny-warnings")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Exit with an error status when any diagnostic is reported"),
        )
        .subcommand(
            Command::new("compile")
                .about("Compile an MLM and print the chosen output")
                .arg(path_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format, see `arden formats` (default from config)"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Compile an MLM and report diagnostics")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("tokens")
                .about("Print the token stream of an MLM")
                .arg(path_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .value_parser(["simple", "json"])
                        .default_value("simple"),
                ),
        )
        .subcommand(
            Command::new("ast")
                .about("Print the syntax tree of an MLM")
                .arg(path_arg())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .value_parser(["treeviz", "json"])
                        .default_value("treeviz"),
                ),
        )
        .subcommand(Command::new("formats").about("List available output formats"))
        .get_matches();

    let config = load_config(&matches);
    let compiler = config.compiler();

    match matches.subcommand() {
        Some(("compile", compile_matches)) => {
            let format = match compile_matches.get_one::<String>("format") {
                Some(format) => format.clone(),
                None => config.output.default_format.clone(),
            };
            handle_compile_command(path_of(compile_matches), &format, &compiler, &config);
        }
        Some(("check", check_matches)) => {
            handle_check_command(path_of(check_matches), &compiler, &config);
        }
        Some(("tokens", token_matches)) => {
            let format = format!("token-{}", option_of(token_matches, "format"));
            handle_stage_command(path_of(token_matches), &format, &compiler);
        }
        Some(("ast", ast_matches)) => {
            let format = format!("ast-{}", option_of(ast_matches, "format"));
            handle_stage_command(path_of(ast_matches), &format, &compiler);
        }
        Some(("formats", _)) => handle_formats_command(),
        _ => unreachable!(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("ARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn path_arg() -> Arg {
    Arg::new("path")
        .help("Path to the MLM file")
        .required(true)
        .index(1)
}

fn path_of(matches: &ArgMatches) -> &str {
    option_of(matches, "path")
}

fn option_of<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load_config(matches: &ArgMatches) -> ArdenConfig {
    let mut loader = Loader::new();
    loader = match matches.get_one::<String>("config") {
        Some(path) => loader.with_file(path),
        None => loader.with_optional_file(LOCAL_CONFIG),
    };
    if matches.get_flag("deny-warnings") {
        loader = loader
            .set_override("diagnostics.deny_warnings", true)
            .unwrap_or_else(|e| fail(e));
    }
    loader.build().unwrap_or_else(|e| fail(e))
}

fn read_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| fail(format!("cannot read {}: {}", path, e)))
}

/// Print diagnostics to stderr and exit non-zero if they are not acceptable.
fn report(compilation: &Compilation, config: &ArdenConfig) {
    if compilation.diagnostics.is_empty() {
        return;
    }
    eprintln!("{}", compilation.render_diagnostics());
    if compilation.is_degraded() || config.diagnostics.deny_warnings {
        process::exit(1);
    }
}

fn handle_compile_command(path: &str, format: &str, compiler: &Compiler, config: &ArdenConfig) {
    let format: OutputFormat = format.parse().unwrap_or_else(|e| fail(e));
    if format.stage() != FormatStage::Compile {
        handle_stage_command(path, format.name(), compiler);
        return;
    }
    let compilation = compiler.compile_file(path).unwrap_or_else(|e| fail(e));
    let output = format_compilation(&compilation, format).unwrap_or_else(|e| fail(e));
    println!("{}", output);
    report(&compilation, config);
}

fn handle_check_command(path: &str, compiler: &Compiler, config: &ArdenConfig) {
    let compilation = compiler.compile_file(path).unwrap_or_else(|e| fail(e));
    report(&compilation, config);
    match compilation.diagnostics.len() {
        0 => println!("{}: ok", compilation.procedure.name),
        1 => println!("{}: ok (1 warning)", compilation.procedure.name),
        n => println!("{}: ok ({} warnings)", compilation.procedure.name, n),
    }
}

fn handle_stage_command(path: &str, format: &str, compiler: &Compiler) {
    let format: OutputFormat = format.parse().unwrap_or_else(|e| fail(e));
    let source = read_source(path);
    let output = process_source(&source, format, compiler).unwrap_or_else(|e| fail(e));
    println!("{}", output);
}

fn handle_formats_command() {
    println!("Available output formats:\n");
    for format in OutputFormat::ALL {
        println!("  {:<14} {}", format.name(), format.description());
    }
}
