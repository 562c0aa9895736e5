//! pline: calculator REPL demonstrating the promptline editor.

use anyhow::{Context, Result};
use clap::Parser;
use promptline::{CommandLine, FileHistory, History, MemoryHistory};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod adapters;
mod calc;

use adapters::{Bindings, CalcCode, CalcPrompt};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "pline", version, about = "promptline demo REPL")]
struct Args {
    /// Use Vi keybindings instead of emacs.
    #[arg(long)]
    vi: bool,
    /// Start with multiline input enabled.
    #[arg(long)]
    multiline: bool,
    /// History file path (overrides the config).
    #[arg(long)]
    history: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `promptline.toml`).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Log to a file: stdout belongs to the renderer.
fn configure_logging() -> Option<WorkerGuard> {
    let dir = std::env::var_os("PLINE_LOG_DIR").map(PathBuf::from)?;
    let appender = tracing_appender::rolling::never(dir, "pline.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Raw mode may still be active; restore before printing.
        let _ = crossterm_disable();
        default_hook(info);
    }));
}

fn crossterm_disable() -> Result<()> {
    // The guard restores on drop in the normal paths; this is the
    // last-resort path for panics inside the read loop.
    Ok(crossterm::terminal::disable_raw_mode()?)
}

fn open_history(path: Option<&PathBuf>) -> Result<Rc<RefCell<dyn History>>> {
    match path {
        Some(path) => {
            let history = FileHistory::open(path)
                .with_context(|| format!("opening history {}", path.display()))?;
            Ok(Rc::new(RefCell::new(history)))
        }
        None => Ok(Rc::new(RefCell::new(MemoryHistory::new()))),
    }
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    let args = Args::parse();
    let config = core_config::Config::load(args.config.as_deref())?;
    info!(target: "runtime", vi = args.vi || config.editor.vi_mode, "startup");

    let history_path = args.history.or(config.history.file.clone());
    let history = open_history(history_path.as_ref())?;

    let bindings: Bindings = Rc::new(RefCell::new(HashMap::new()));
    let statement_index = Rc::new(Cell::new(1));

    let mut command_line = CommandLine::new()
        .with_history(history)
        .with_code(Rc::new(CalcCode::new(Rc::clone(&bindings))))
        .with_prompt(Rc::new(CalcPrompt::new(Rc::clone(&statement_index))))
        .with_enter_hook(adapters::wants_more_input);
    command_line.vi_mode = args.vi || config.editor.vi_mode;
    command_line.multiline = args.multiline || config.editor.multiline;
    command_line.auto_indent = config.editor.auto_indent;
    command_line.highlight_current_line = config.editor.highlight_current_line;

    let result = command_line.start_repl(|input| {
        match calc::evaluate(input, &mut bindings.borrow_mut()) {
            Ok(Some(value)) => println!("Out[{}]: {}\n", statement_index.get(), value),
            Ok(None) => println!(),
            Err(error) => eprintln!("error: {error}\n"),
        }
        statement_index.set(statement_index.get() + 1);
    });

    info!(target: "runtime", "shutdown");
    result.context("read loop failed")
}
