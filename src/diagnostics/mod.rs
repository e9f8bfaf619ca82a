//! Rendering of compiler errors for the console.

mod consolewriter;

pub use consolewriter::ConsoleWriter;
