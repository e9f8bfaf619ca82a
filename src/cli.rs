use clap::{App, Arg, ArgMatches};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use crate::compiler::pipeline::Stage;
use crate::compiler::Target;

// Exit Codes for different types of errors
pub const ERR_IO: i32 = 1;
pub const ERR_LEXER: i32 = 2;
pub const ERR_SYNTAX: i32 = 3;
pub const ERR_SEMANTIC: i32 = 4;
pub const ERR_TOOLCHAIN: i32 = 5;
pub const ERR_INTERNAL: i32 = 6;
pub const ERR_USAGE: i32 = 7;

pub const DEFAULT_TABLE: &str = "desc_table";
pub const DEFAULT_HEADER: &str = "desc_offsets";

pub fn configure_cli() -> clap::App<'static, 'static> {
    let app = App::new("Type Descriptor Compiler")
        .version("0.3.0")
        .author("Erich Ess")
        .about("Compiles C type declarations into descriptor tables that a runtime uses to convert values between machines")
        .arg(
            Arg::with_name("input")
                .short("i")
                .long("input")
                .takes_value(true)
                .required(true)
                .help("Preprocessed C source holding the declarations"),
        )
        .arg(
            Arg::with_name("keys")
                .short("k")
                .long("keys")
                .takes_value(true)
                .required(true)
                .help("File listing the type names to export, separated by commas or newlines. A name may be preceded by struct, union or enum; a bare name that is not a typedef picks the one tag of that name."),
        )
        .arg(
            Arg::with_name("cc")
                .short("c")
                .long("cc")
                .takes_value(true)
                .required(true)
                .help("Command that runs the host C compiler, used to evaluate array dimensions that are not literals"),
        )
        .arg(
            Arg::with_name("table")
                .short("t")
                .long("table")
                .takes_value(true)
                .default_value(DEFAULT_TABLE)
                .help("Base name of the C file the descriptor table is written to"),
        )
        .arg(
            Arg::with_name("header")
                .short("H")
                .long("header")
                .takes_value(true)
                .default_value(DEFAULT_HEADER)
                .help("Base name of the C header the offset constants are written to"),
        )
        .arg(
            Arg::with_name("target")
                .long("target")
                .possible_values(&["32", "64"])
                .takes_value(true)
                .default_value("64")
                .help("Word size of the machine whose layout is described"),
        )
        .arg(
            Arg::with_name("prefix")
                .short("p")
                .long("prefix")
                .takes_value(true)
                .help("Prefix added to every generated C name"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Prints more about what the compiler is doing. Repeat for more detail."),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .possible_values(&["error", "warn", "info", "debug", "trace"])
                .takes_value(true)
                .help("Sets the log level directly, overriding --verbose"),
        )
        .arg(
            Arg::with_name("no-optimize")
                .long("no-optimize")
                .help("Emit every struct as its own table instead of inlining structs that only one field uses"),
        )
        .arg(
            Arg::with_name("emit-json")
                .long("emit-json")
                .takes_value(true)
                .help("Also write the descriptor table as JSON to this file"),
        )
        .arg(
            Arg::with_name("stop-after")
                .long("stop-after")
                .possible_values(&["lexer", "parser", "layout"])
                .takes_value(true)
                .help("Stop after the given pass and write no output"),
        );
    app
}

pub fn get_target(args: &ArgMatches) -> Target {
    args.value_of("target")
        .and_then(Target::parse)
        .unwrap_or_default()
}

pub fn get_stage(args: &ArgMatches) -> Stage {
    args.value_of("stop-after")
        .and_then(Stage::parse)
        .unwrap_or(Stage::Emit)
}

pub fn get_prefix(args: &ArgMatches) -> String {
    args.value_of("prefix").unwrap_or_default().into()
}

pub fn get_log_level(args: &ArgMatches) -> LevelFilter {
    match args.value_of("log-level") {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => match args.occurrences_of("verbose") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        },
    }
}

pub fn configure_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
}
