//! User-facing output for the CLI.
//!
//! Colour is used only when stdout is a terminal, so piped output stays
//! plain.

use std::io::{self, IsTerminal, Write};
use std::path::Path;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::ast::value::Value;
use crate::engine::Rendered;

fn stdout() -> StandardStream {
    let choice = if io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Node text followed by its links, numbered from 1.
pub fn print_rendered(rendered: &Rendered) -> io::Result<()> {
    let mut out = stdout();
    writeln!(out, "{}", rendered.text)?;
    if rendered.links.is_empty() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_italic(true))?;
        writeln!(out, "(the end)")?;
        return out.reset();
    }
    writeln!(out)?;
    for (i, link) in rendered.links.iter().enumerate() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
        write!(out, "{:>3}. ", i + 1)?;
        out.reset()?;
        writeln!(out, "{}", link.label)?;
    }
    Ok(())
}

pub fn print_value(value: &Value) -> io::Result<()> {
    let mut out = stdout();
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    match value {
        Value::Text(text) => writeln!(out, "{text:?}")?,
        other => writeln!(out, "{other}")?,
    }
    out.reset()
}

pub fn print_check(path: &Path, failures: usize) -> io::Result<()> {
    let mut out = stdout();
    if failures == 0 {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "ok")?;
    } else {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "FAILED")?;
    }
    out.reset()?;
    match failures {
        0 => writeln!(out, "  {}", path.display()),
        1 => writeln!(out, "  {} (1 problem)", path.display()),
        n => writeln!(out, "  {} ({n} problems)", path.display()),
    }
}

pub fn print_summary(checked: usize, failed: usize) -> io::Result<()> {
    let mut out = stdout();
    writeln!(out)?;
    let color = if failed == 0 { Color::Green } else { Color::Red };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    writeln!(out, "{checked} stories checked, {failed} failed")?;
    out.reset()
}
