use crate::compiler::{lexer::SourceLine, pipeline::Failure, CompilerDisplay, StringTable};

/// Formats compile failures for the console, resolving interned names through
/// the [`StringTable`].
pub struct ConsoleWriter<'a> {
    string_table: &'a StringTable,
}

impl<'a> ConsoleWriter<'a> {
    pub fn new(string_table: &'a StringTable) -> ConsoleWriter<'a> {
        ConsoleWriter { string_table }
    }

    /// The error message, followed by the source lines that lead up to it for
    /// errors found while reading the source.
    pub fn write_failure(&self, failure: &Failure) -> String {
        let mut out = format!("error: {}", self.write_error(&failure.error));
        if failure.error.shows_context() && !failure.context.is_empty() {
            out.push('\n');
            out.push_str(&self.write_context(&failure.context));
        }
        out
    }

    pub fn write_error(&self, e: &dyn CompilerDisplay) -> String {
        match e.fmt(self.string_table) {
            Ok(msg) => msg,
            Err(err) => format!("(could not format error: {})", err),
        }
    }

    /// Numbered source lines, with the last line marked.
    pub fn write_context(&self, lines: &[SourceLine]) -> String {
        let width = lines
            .iter()
            .map(|l| l.number.to_string().len())
            .max()
            .unwrap_or(1);
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let marker = if i + 1 == lines.len() { '>' } else { ' ' };
                format!("{} {:>w$} | {}", marker, l.number, l.text, w = width)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        parser::ParserError, pipeline::Failure, CompileError, CompilerError,
    };

    #[test]
    fn syntax_errors_show_the_source_that_led_to_them() {
        let st = StringTable::new();
        let failure = Failure {
            error: CompileError::Parser(CompilerError::new(10, ParserError::ArrayExpectedSize)),
            context: vec![
                SourceLine {
                    number: 9,
                    text: "struct s {".into(),
                },
                SourceLine {
                    number: 10,
                    text: "    int a[];".into(),
                },
            ],
        };

        let text = ConsoleWriter::new(&st).write_failure(&failure);
        assert_eq!(
            text,
            "error: L10: Array dimension is missing\n   9 | struct s {\n> 10 |     int a[];"
        );
    }

    #[test]
    fn other_errors_show_only_the_message() {
        let st = StringTable::new();
        let failure = Failure {
            error: CompileError::Io("keys.txt".into(), "not found".into()),
            context: vec![SourceLine {
                number: 1,
                text: "int x;".into(),
            }],
        };
        assert_eq!(
            ConsoleWriter::new(&st).write_failure(&failure),
            "error: keys.txt: not found"
        );
    }
}
