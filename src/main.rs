//! jjgraph - A terminal viewer for the jj commit graph
//!
//! jjgraph runs `jj log` (or any command printing a colored graph), parses
//! the graph text as it streams in and shows it as a scrollable list of
//! revisions with a selection cursor.
//!
//! # Features
//!
//! - **Streaming**: rows are loaded in batches as you scroll
//! - **Selection**: the selected revision is highlighted without losing colors
//! - **Marks**: mark revisions to keep track of them
//! - **Details**: inline panel with the identifiers of a revision
//! - **Clipboard**: copy change or commit ids
//! - **Color Schemes**: 8 built-in themes
//!
//! # Quick Start
//!
//! ```text
//! jjgraph                          # jj log --color always
//! jjgraph -- jj log --color always -r 'all()'
//! jj log --color always | jjgraph -
//! jjgraph -f saved.log
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | j/k, arrows | Move selection |
//! | PageUp/PageDown, Ctrl+B/F | Move by half a screen |
//! | g/G | First/last revision |
//! | m | Toggle mark |
//! | Enter, d | Toggle details |
//! | y/Y | Copy change id / commit id |
//! | r | Refresh |
//! | q, Esc | Quit |

mod config;
mod core;
mod revisions;
mod ui;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event, KeyEventKind};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{ColorScheme, Config};
use crate::core::StreamError;
use crate::revisions::{IdKind, Revisions, Source};
use crate::ui::{Action, GraphRowIterator, KeyMapper, RenderStyle, Renderer, StyledLine, WindowedRenderer};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter
const LOG_ENV: &str = "JJGRAPH_LOG";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    batch_size: Option<usize>,
    source: Option<Source>,
}

#[derive(Debug, PartialEq)]
enum Cli {
    Help,
    Version,
    Run(Options),
}

fn print_version() {
    eprintln!("jjgraph {}", VERSION);
}

fn print_help() {
    eprintln!("jjgraph {} - A terminal viewer for the jj commit graph", VERSION);
    eprintln!();
    eprintln!("Usage: jjgraph [OPTIONS] [-- <COMMAND>...]");
    eprintln!();
    eprintln!("Source options:");
    eprintln!("  (default)             Run the command from config.toml (jj log --color always)");
    eprintln!("  -- <COMMAND>...       Run COMMAND instead");
    eprintln!("  -f, --file <PATH>     Read a saved log");
    eprintln!("  -, --stdin            Read the log from standard input");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -c, --config <PATH>   Configuration file");
    eprintln!("  -b, --batch-size <N>  Rows loaded per request");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keybindings:");
    eprintln!("  j/k, Up/Down          Move selection");
    eprintln!("  PageUp/PageDown       Move by half a screen");
    eprintln!("  g/G, Home/End         First/last revision");
    eprintln!("  m                     Toggle mark");
    eprintln!("  Enter, d              Toggle details");
    eprintln!("  y / Y                 Copy change id / commit id");
    eprintln!("  r                     Refresh");
    eprintln!("  q, Esc                Quit");
    eprintln!();
    eprintln!("Configuration: ~/.jjgraph/config.toml");
    eprintln!("Log file:      ~/.jjgraph/jjgraph.log (filter with {})", LOG_ENV);
    eprintln!();
    eprintln!("Color schemes: {}", ColorScheme::list().join(", "));
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut options = Options::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Cli::Help),
            "-v" | "--version" => return Ok(Cli::Version),
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).ok_or("Missing config path")?;
                options.config_path = Some(PathBuf::from(path));
            }
            "-b" | "--batch-size" => {
                i += 1;
                let value = args.get(i).ok_or("Missing batch size")?;
                let size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| format!("Invalid batch size: {}", value))?;
                options.batch_size = Some(size);
            }
            "-f" | "--file" => {
                i += 1;
                let path = args.get(i).ok_or("Missing log file")?;
                options.source = Some(Source::File(PathBuf::from(path)));
            }
            "-" | "--stdin" => {
                options.source = Some(Source::Stdin);
            }
            "--" => {
                let command = args[i + 1..].to_vec();
                if command.is_empty() {
                    return Err("Missing command after --".to_string());
                }
                options.source = Some(Source::Command(command));
                break;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(Cli::Run(options))
}

/// Log to `~/.jjgraph/jjgraph.log`; the terminal belongs to the UI
fn init_logging() {
    let log_path = config::data_dir()
        .map(|dir| dir.join("jjgraph.log"))
        .unwrap_or_else(|| PathBuf::from("jjgraph.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Cli::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Cli::Version) => {
            print_version();
            return Ok(());
        }
        Ok(Cli::Run(options)) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("jjgraph {} starting", VERSION);

    let config = match &options.config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let source = options
        .source
        .unwrap_or_else(|| Source::Command(config.log.command.clone()));
    let batch_size = options.batch_size.unwrap_or_else(|| config.batch_size());

    let revisions = Revisions::open(source, batch_size, config.parse_options())
        .context("Failed to load revisions")?;

    let mut app = App::new(revisions, &config);
    let result = app.run();
    if let Err(e) = &result {
        error!("jjgraph exited with error: {:#}", e);
    }
    info!("jjgraph exiting");
    result
}

/// Interactive view over the revisions
struct App {
    revisions: Revisions,
    window: WindowedRenderer,
    renderer: Renderer,
    scheme: ColorScheme,
    /// Graph lines in the last frame
    page: usize,
    /// One-shot status message and whether it is an error
    message: Option<(String, bool)>,
}

impl App {
    fn new(revisions: Revisions, config: &Config) -> Self {
        let scheme = config.get_color_scheme();
        Self {
            revisions,
            window: WindowedRenderer::new(),
            renderer: Renderer::new(scheme.clone(), config.status_bar.visible),
            scheme,
            page: 0,
            message: None,
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        self.renderer.init()?;
        let result = self.main_loop();
        self.renderer.cleanup()?;
        result
    }

    fn main_loop(&mut self) -> anyhow::Result<()> {
        let poll_timeout = Duration::from_millis(250);
        let mut dirty = true;

        loop {
            if dirty {
                self.draw()?;
                dirty = false;
            }

            if !event::poll(poll_timeout)? {
                continue;
            }
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => KeyMapper::map(&key),
                Event::Mouse(mouse) => KeyMapper::map_mouse(&mouse),
                Event::Resize(cols, rows) => {
                    info!("Terminal resized to {}x{}", cols, rows);
                    dirty = true;
                    None
                }
                _ => None,
            };

            if let Some(action) = action {
                if action == Action::Quit {
                    break;
                }
                self.apply(action);
                dirty = true;
            }
        }
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        self.message = None;
        let step = (self.page / 2).max(1) as isize;
        let result = match action {
            Action::MoveUp => self.revisions.move_by(-1),
            Action::MoveDown => self.revisions.move_by(1),
            Action::PageUp => self.revisions.move_by(-step),
            Action::PageDown => self.revisions.move_by(step),
            Action::Top => {
                self.revisions.top();
                Ok(())
            }
            Action::Bottom => self.revisions.bottom(),
            Action::ToggleMark => {
                self.revisions.toggle_mark();
                Ok(())
            }
            Action::ToggleDetails => {
                self.revisions.toggle_details();
                Ok(())
            }
            Action::YankChangeId => {
                self.yank(IdKind::Change);
                Ok(())
            }
            Action::YankCommitId => {
                self.yank(IdKind::Commit);
                Ok(())
            }
            Action::Refresh => self.refresh(),
            Action::Quit => Ok(()),
        };
        if let Err(e) = result {
            self.report(e);
        }
    }

    fn refresh(&mut self) -> Result<(), StreamError> {
        if !self.revisions.can_refresh() {
            self.message = Some(("Standard input cannot be re-read".to_string(), true));
            return Ok(());
        }
        self.revisions.refresh()?;
        // Row heights may have changed, so the old line offsets are stale
        self.window.reset();
        self.message = Some((format!("Refreshed {} revisions", self.revisions.rows().len()), false));
        Ok(())
    }

    fn yank(&mut self, kind: IdKind) {
        let Some(id) = self.revisions.selected_id(kind).map(str::to_string) else {
            return;
        };
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(id.clone())) {
            Ok(()) => {
                info!("Copied {} to clipboard", id);
                self.message = Some((format!("Copied {}", id), false));
            }
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                self.message = Some((format!("Clipboard unavailable: {}", e), true));
            }
        }
    }

    fn report(&mut self, e: StreamError) {
        warn!("Revision stream error: {}", e);
        self.message = Some((e.to_string(), true));
    }

    fn frame(&mut self, cols: usize, height: usize) -> Vec<StyledLine> {
        let decorators = self
            .revisions
            .decorators(self.scheme.mark_fg, self.scheme.detail_fg);
        let style = RenderStyle {
            selected_bg: self.scheme.selection_bg.bg_params(),
            width: cols,
        };
        let mut rows = GraphRowIterator::new(self.revisions.rows(), self.revisions.cursor(), &decorators, style);
        self.window.render(&mut rows, cols, height)
    }

    fn draw(&mut self) -> anyhow::Result<()> {
        let (cols, rows) = Renderer::size()?;
        let height = self.renderer.graph_height(rows);
        self.page = height;

        let mut lines = self.frame(cols as usize, height);
        if self.revisions.has_more() {
            let loaded = self.revisions.rows().len();
            if let Err(e) = self.revisions.ensure_loaded(self.window.view().last_row_index) {
                self.report(e);
            }
            if self.revisions.rows().len() != loaded {
                lines = self.frame(cols as usize, height);
            }
        }

        let mut status = self.revisions.status();
        if let Some((text, error)) = &self.message {
            status.left = text.clone();
            status.error = *error;
        }
        self.renderer.draw(&lines, &status)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_args() {
        assert_eq!(parse_args(&[]), Ok(Cli::Run(Options::default())));
        assert_eq!(parse_args(&args(&["-h"])), Ok(Cli::Help));
        assert_eq!(parse_args(&args(&["--version"])), Ok(Cli::Version));
    }

    #[test]
    fn test_source_args() {
        let Ok(Cli::Run(options)) = parse_args(&args(&["-b", "20", "-f", "saved.log"])) else {
            panic!("expected options");
        };
        assert_eq!(options.batch_size, Some(20));
        assert_eq!(options.source, Some(Source::File(PathBuf::from("saved.log"))));

        let Ok(Cli::Run(options)) = parse_args(&args(&["-"])) else {
            panic!("expected options");
        };
        assert_eq!(options.source, Some(Source::Stdin));
    }

    #[test]
    fn test_trailing_command() {
        let Ok(Cli::Run(options)) = parse_args(&args(&["-c", "my.toml", "--", "jj", "log", "-h"])) else {
            panic!("expected options");
        };
        assert_eq!(options.config_path, Some(PathBuf::from("my.toml")));
        assert_eq!(options.source, Some(Source::Command(args(&["jj", "log", "-h"]))));
    }

    #[test]
    fn test_invalid_args() {
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert!(parse_args(&args(&["-b", "0"])).is_err());
        assert!(parse_args(&args(&["-b"])).is_err());
        assert!(parse_args(&args(&["--"])).is_err());
    }
}
