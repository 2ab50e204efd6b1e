//! The Firelight command-line interface.
//!
//! Thin front end over the library: every subcommand loads a story, drives a
//! [`Session`] and prints through [`output`]. Diagnostics are rendered with
//! miette on stderr.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::cli::args::{Command, FirelightArgs};
use crate::config::EngineConfig;
use crate::engine::Session;
use crate::errors::{print_error, ErrorKind, FirelightError};
use crate::story::Story;

pub mod args;
pub mod output;

const LOG_ENV: &str = "FIRELIGHT_LOG";
const STORY_EXTENSIONS: [&str; 2] = ["fls", "flj"];

/// The main entry point for the CLI.
pub fn run() {
    let args = FirelightArgs::parse();
    init_logging(args.verbose);

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    };

    let ok = match args.command {
        Command::Render { story, node } => report(render(&story, node.as_deref(), config)),
        Command::Play { story } => report(play(&story, config)),
        Command::Check { path } => check(&path),
    };
    if !ok {
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, FirelightError> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    }
}

fn report(result: Result<(), FirelightError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            print_error(e);
            false
        }
    }
}

fn io_error(e: io::Error) -> FirelightError {
    FirelightError::unsourced(
        ErrorKind::Io {
            message: e.to_string(),
        },
        "output",
    )
}

fn open_session(path: &Path, config: EngineConfig) -> Result<Session, FirelightError> {
    let story = Story::load(path)?;
    Session::with_config(story, config)
}

// ============================================================================
// RENDER
// ============================================================================

fn render(path: &Path, node: Option<&str>, config: EngineConfig) -> Result<(), FirelightError> {
    let mut session = open_session(path, config)?;
    let rendered = match node {
        Some(node) => session.render(node)?,
        None => session.start()?,
    };
    output::print_rendered(&rendered).map_err(io_error)
}

// ============================================================================
// PLAY
// ============================================================================

enum Input<'a> {
    Follow(usize),
    Reset,
    Quit,
    Eval(&'a str),
    Unknown,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if let Some(expr) = line.strip_prefix(":eval") {
        return Input::Eval(expr.trim());
    }
    match line {
        "q" | "quit" => Input::Quit,
        "r" | "reset" => Input::Reset,
        _ => line.parse().map_or(Input::Unknown, Input::Follow),
    }
}

fn play(path: &Path, config: EngineConfig) -> Result<(), FirelightError> {
    let mut session = open_session(path, config)?;
    let mut shown = session.start()?;
    output::print_rendered(&shown).map_err(io_error)?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().map_err(io_error)?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.map_err(io_error)?;
        let next = match parse_input(&line) {
            Input::Quit => break,
            Input::Reset => {
                session.reset();
                session.start()
            }
            Input::Eval(expr) => {
                match session.evaluate(expr) {
                    Ok(value) => output::print_value(&value).map_err(io_error)?,
                    Err(e) => print_error(e),
                }
                continue;
            }
            Input::Follow(n) => match n.checked_sub(1).and_then(|i| shown.links.get(i)) {
                Some(link) => {
                    let link = link.clone();
                    session.traverse(&link)
                }
                None => {
                    println!("No link {n}. Pick 1 to {}.", shown.links.len());
                    continue;
                }
            },
            Input::Unknown => {
                println!("Enter a link number, r to restart, q to quit or :eval <expression>.");
                continue;
            }
        };
        match next {
            Ok(rendered) => {
                output::print_rendered(&rendered).map_err(io_error)?;
                shown = rendered;
            }
            Err(e) => print_error(e),
        }
    }
    Ok(())
}

// ============================================================================
// CHECK
// ============================================================================

fn story_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| STORY_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

/// Problems found in one story file.
fn check_file(path: &Path) -> Vec<FirelightError> {
    match Story::load(path) {
        Ok(story) => story.check_markup(),
        Err(e) => vec![e],
    }
}

fn check(root: &Path) -> bool {
    let files = story_files(root);
    if files.is_empty() {
        eprintln!("no .fls or .flj stories under {}", root.display());
        return false;
    }
    let mut failed = 0;
    for path in &files {
        let problems = check_file(path);
        let _ = output::print_check(path, problems.len());
        if !problems.is_empty() {
            failed += 1;
        }
        for problem in problems {
            print_error(problem);
        }
    }
    let _ = output::print_summary(files.len(), failed);
    failed == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Rendered;

    #[test]
    fn play_input_is_recognised() {
        assert!(matches!(parse_input(" 2 "), Input::Follow(2)));
        assert!(matches!(parse_input("q"), Input::Quit));
        assert!(matches!(parse_input("r"), Input::Reset));
        assert!(matches!(parse_input(":eval gold + 1"), Input::Eval("gold + 1")));
        assert!(matches!(parse_input("north"), Input::Unknown));
    }

    #[test]
    fn rendered_endings_have_no_links() {
        let rendered = Rendered {
            node: "end".into(),
            text: "Fin.".into(),
            links: Vec::new(),
        };
        assert!(rendered.is_ending());
    }
}
