extern crate log;

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use typedesc::compiler::constexpr::HostToolchain;
use typedesc::compiler::context::CompilerOptions;
use typedesc::compiler::emitter::{to_json, write_header, write_table, CHeaderNames};
use typedesc::compiler::lexer::DEFAULT_CONTEXT_LINES;
use typedesc::compiler::source::{write_output, SourceFile};
use typedesc::compiler::types::parse_key_list;
use typedesc::compiler::CompilerError;
use typedesc::diagnostics::ConsoleWriter;
use typedesc::*;

fn main() {
    if let Err(code) = run() {
        std::process::exit(code);
    }
}

fn run() -> Result<(), i32> {
    let config = match configure_cli().get_matches_safe() {
        Ok(config) => config,
        Err(e) => match e.kind {
            clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => {
                println!("{}", e.message);
                return Ok(());
            }
            _ => {
                eprintln!("{}", e.message);
                return Err(ERR_USAGE);
            }
        },
    };

    if let Err(e) = configure_logging(get_log_level(&config)) {
        eprintln!("Logging is unavailable: {}", e);
    }

    let string_table = StringTable::new();
    let console = ConsoleWriter::new(&string_table);
    let report = |failure: Failure| -> i32 {
        eprintln!("{}", console.write_failure(&failure));
        failure.error.exit_code()
    };

    let input = Path::new(config.value_of("input").unwrap_or_default());
    let keys = Path::new(config.value_of("keys").unwrap_or_default());
    let cc = config.value_of("cc").unwrap_or_default();

    let source = SourceFile::read(input).map_err(|e| report(e.into()))?;
    let key_list = SourceFile::read(keys).map_err(|e| report(e.into()))?;
    let keys = parse_key_list(key_list.text(), &string_table).map_err(|e| report(e.into()))?;
    if keys.is_empty() {
        warn!("{} names no types, the tables will be empty", key_list.path().display());
    }

    let options = CompilerOptions {
        target: get_target(&config),
        prefix: get_prefix(&config),
        optimize: !config.is_present("no-optimize"),
        context_lines: DEFAULT_CONTEXT_LINES,
    };
    let names = header_names(&config, &options.prefix);
    let toolchain = HostToolchain::new(cc, input)
        .map_err(|e| report(CompilerError::new(0, e).into()))?;

    let compile_time = Instant::now();
    let compilation = compile(
        source.text(),
        keys,
        options,
        &string_table,
        &toolchain,
        get_stage(&config),
    )
    .map_err(report)?;
    info!("Compiled in {:.3}s", compile_time.elapsed().as_secs_f32());

    let table = match compilation.table {
        Some(table) => table,
        None => return Ok(()),
    };

    let table_src = write_table(&table, &names).map_err(|e| report(e.into()))?;
    write_output(&output_path(&config, "table", "c"), &table_src).map_err(|e| report(e.into()))?;

    let header = write_header(&table, &names);
    write_output(&output_path(&config, "header", "h"), &header).map_err(|e| report(e.into()))?;

    if let Some(json_path) = config.value_of("emit-json") {
        let json = to_json(&table).map_err(|e| report(e.into()))?;
        write_output(Path::new(json_path), &json).map_err(|e| report(e.into()))?;
    }

    Ok(())
}

fn output_path(config: &clap::ArgMatches, arg: &str, ext: &str) -> PathBuf {
    let base = config.value_of(arg).unwrap_or_default();
    PathBuf::from(format!("{}.{}", base, ext))
}

fn header_names(config: &clap::ArgMatches, prefix: &str) -> CHeaderNames {
    let header = output_path(config, "header", "h");
    let file = header
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.h", DEFAULT_HEADER));
    CHeaderNames::new(prefix, &file)
}
