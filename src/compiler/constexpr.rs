//! Evaluation of array dimensions that are not a single literal.
//!
//! The compiler does not understand C expressions. When a dimension such as
//! `[sizeof(struct foo) * 2]` shows up it hands the expression to the host
//! toolchain: a small program that prints the value is written to a scoped
//! temporary directory, compiled, and run, and the value it writes to a
//! result file is read back.  Each step blocks until the child process exits
//! and any failure ends the compilation.  The temporary directory is removed
//! when evaluation returns, on success and failure alike.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::compiler::{CompilerDisplay, CompilerDisplayError, StringTable};

#[derive(Clone, Debug, PartialEq)]
pub enum ToolchainError {
    NoCompiler,
    SourcePath(String, String),
    TempFile(String),
    Spawn(String, String),
    CompileFailed(String, String),
    RunFailed(String),
    ReadResult(String),
    InvalidOutput(String),
}

impl CompilerDisplay for ToolchainError {
    fn fmt(&self, _: &StringTable) -> Result<String, CompilerDisplayError> {
        use ToolchainError::*;
        Ok(match self {
            NoCompiler => "No host compiler command was given".into(),
            SourcePath(path, e) => format!("Could not resolve {}: {}", path, e),
            TempFile(e) => format!("Could not create temporary file: {}", e),
            Spawn(cmd, e) => format!("Could not run `{}`: {}", cmd, e),
            CompileFailed(expr, stderr) => {
                format!("Host compiler rejected dimension `{}`:\n{}", expr, stderr)
            }
            RunFailed(expr) => format!("Evaluation program for `{}` failed", expr),
            ReadResult(e) => format!("Could not read evaluation result: {}", e),
            InvalidOutput(out) => format!("Evaluation program produced `{}`, not an integer", out),
        })
    }
}

/// Computes the value of a constant expression that the parser cannot
/// evaluate itself.
pub trait ConstantEvaluator {
    fn evaluate(&self, expr: &str) -> Result<i64, ToolchainError>;
}

/// Evaluates expressions by compiling and running a small program with the
/// host C compiler.
pub struct HostToolchain {
    compiler: Vec<String>,
    source: PathBuf,
}

impl HostToolchain {
    /// `compiler` is the command used to invoke the host compiler, e.g.
    /// `"cc -m32"`. `source` is the declaration file the generated program
    /// includes so that the expression can refer to its types.  The program
    /// is compiled inside a temporary directory, so a relative `source` is
    /// made absolute against the current directory here.
    pub fn new(compiler: &str, source: &Path) -> Result<HostToolchain, ToolchainError> {
        let source = if source.is_absolute() {
            source.to_path_buf()
        } else {
            env::current_dir()
                .map_err(|e| ToolchainError::SourcePath(source.display().to_string(), e.to_string()))?
                .join(source)
        };
        Ok(HostToolchain {
            compiler: compiler.split_whitespace().map(String::from).collect(),
            source,
        })
    }

    fn program(&self, expr: &str) -> String {
        format!(
            "#include <stdio.h>\n\
             #include \"{}\"\n\
             int main(int argc, char **argv) {{\n\
             \x20   FILE *out;\n\
             \x20   if (argc < 2 || (out = fopen(argv[1], \"w\")) == 0) return 1;\n\
             \x20   fprintf(out, \"%lld\\n\", (long long)({}));\n\
             \x20   return fclose(out) != 0;\n\
             }}\n",
            self.source.display(),
            expr
        )
    }

    fn run(command: &mut Command, what: &str) -> Result<std::process::Output, ToolchainError> {
        command
            .output()
            .map_err(|e| ToolchainError::Spawn(what.into(), e.to_string()))
    }
}

impl ConstantEvaluator for HostToolchain {
    fn evaluate(&self, expr: &str) -> Result<i64, ToolchainError> {
        let (program, args) = self
            .compiler
            .split_first()
            .ok_or(ToolchainError::NoCompiler)?;

        let dir = tempfile::tempdir().map_err(|e| ToolchainError::TempFile(e.to_string()))?;
        let program_src = dir.path().join("dimension.c");
        let exe = dir.path().join("dimension");
        let result = dir.path().join("dimension.out");

        fs::write(&program_src, self.program(expr))
            .map_err(|e| ToolchainError::TempFile(e.to_string()))?;

        debug!("Evaluating `{}` with {}", expr, self.compiler.join(" "));
        let compiled = Self::run(
            Command::new(program).args(args).arg("-o").arg(&exe).arg(&program_src),
            program,
        )?;
        if !compiled.status.success() {
            let stderr = String::from_utf8_lossy(&compiled.stderr).into_owned();
            return Err(ToolchainError::CompileFailed(expr.into(), stderr));
        }

        let ran = Self::run(Command::new(&exe).arg(&result), "dimension")?;
        if !ran.status.success() {
            return Err(ToolchainError::RunFailed(expr.into()));
        }

        let out = fs::read_to_string(&result).map_err(|e| ToolchainError::ReadResult(e.to_string()))?;
        let value = out
            .trim()
            .parse::<i64>()
            .map_err(|_| ToolchainError::InvalidOutput(out.trim().into()))?;

        debug!("`{}` = {}", expr, value);
        Ok(value)
    }
}
