mod cli;
mod keys;
mod logging;
mod tui;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use padconfig::generate::{example_board_config, generate_board_config};
use padconfig::snippets::{SnippetOptions, SystemRunner, run_snippets};
use padconfig::{BoardSource, Config};
use padcontrol::{Controller, Request, RestBackend, Timings, load_board};
use tracing::{error, info};

use crate::cli::{Cli, Command, ConnectionOptions, GenerateOptions, parse_args, usage};
use crate::logging::{LogSettings, Logging, init_tracing};
use crate::tui::{App, restore_terminal, run_app};

/// Extra time granted to a one-shot command on top of the HTTP timeout.
const ONE_SHOT_MARGIN: Duration = Duration::from_secs(1);
const FILES_SHOWN: usize = 10;

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("Error: {err:#}\n");
            eprintln!("{}", usage());
            return ExitCode::from(2);
        }
    };

    let logging = init_tracing();
    match run(cli, &logging) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "Command failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, logging: &Logging) -> Result<()> {
    match cli.command {
        Command::Help => {
            println!("{}", usage());
            Ok(())
        }
        Command::Version => {
            println!("padboard {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Generate(options) => generate(&options),
        Command::CreateExample(path) => create_example(&path),
        Command::Snippets { csv, options } => snippets(&csv, &options),
        Command::Run => {
            let settings = Settings::load(&cli.options)?;
            logging.configure(&settings.log_settings(true));
            run_grid(&settings)
        }
        Command::Play(id) => one_shot(&cli.options, logging, Request::Play(id)),
        Command::Stop(id) => one_shot(&cli.options, logging, Request::Stop(id)),
        Command::StopAll => one_shot(&cli.options, logging, Request::StopAll),
    }
}

/// Settings merged from the settings file and the command line.
struct Settings {
    config_dir: String,
    base_url: String,
    http_timeout: Duration,
    timings: Timings,
    tick_rate: Duration,
    board_source: BoardSource,
    log_level: String,
    log_file: Option<String>,
}

impl Settings {
    fn load(options: &ConnectionOptions) -> Result<Self> {
        let config = Config::load_config(options.config_dir.as_deref().unwrap_or(""))
            .context("Cannot load settings")?;

        let board_source = match options.board.clone().or_else(|| config.get_board_path()) {
            Some(path) => BoardSource::File(path),
            None => BoardSource::Backend,
        };

        Ok(Self {
            config_dir: config.directory().to_string(),
            base_url: options
                .base_url
                .clone()
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| config.get_base_url()),
            http_timeout: options.timeout.unwrap_or_else(|| config.get_http_timeout()),
            timings: Timings {
                playing_timeout: config.get_playing_timeout(),
                status_duration: config.get_status_duration(),
            },
            tick_rate: config.get_tick_rate(),
            board_source,
            log_level: config.get_log_min_level(),
            log_file: config.get_log_file(),
        })
    }

    /// The grid owns the terminal, so it always logs to a file,
    /// `<config_dir>/padboard.log` unless one is configured.
    fn log_settings(&self, grid: bool) -> LogSettings {
        let file = self.log_file.clone().map(PathBuf::from).or_else(|| {
            grid.then(|| Path::new(&self.config_dir).join("padboard.log"))
        });
        LogSettings::new(self.log_level.clone(), file)
    }

    fn controller(&self) -> Controller<RestBackend> {
        let backend = Arc::new(RestBackend::new(&self.base_url, self.http_timeout));
        let board = load_board(&self.board_source, backend.as_ref());
        info!(
            base_url = %self.base_url,
            rows = board.layout.rows,
            cols = board.layout.cols,
            buttons = board.buttons.len(),
            "Board loaded"
        );
        Controller::new(backend, board, self.timings)
    }
}

fn run_grid(settings: &Settings) -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        restore_terminal();
        eprintln!("\nPadBoard panicked: {panic_info}");
    }));

    let controller = settings.controller();
    let app = App::new(controller, settings.base_url.clone());
    run_app(app, settings.tick_rate)
}

fn one_shot(options: &ConnectionOptions, logging: &Logging, request: Request) -> Result<()> {
    let settings = Settings::load(options)?;
    logging.configure(&settings.log_settings(false));

    let mut controller = settings.controller();
    match &request {
        Request::Play(id) => controller.play(id),
        Request::Stop(id) => controller.stop(id),
        Request::StopAll => controller.stop_all(),
    }

    let outcome = controller
        .wait_outcome(settings.http_timeout + ONE_SHOT_MARGIN)
        .ok_or_else(|| anyhow!("No answer from {} for {request}", settings.base_url))?;

    if let Err(err) = outcome.result {
        bail!("{request} failed: {err}");
    }

    match &request {
        Request::Stop(id) => println!("Stopped {}", controller.board().label_for(id)),
        _ => {
            let view = controller.view(std::time::Instant::now());
            if let Some(status) = view.status {
                println!("{}", status.text);
            }
        }
    }
    Ok(())
}

fn generate(options: &GenerateOptions) -> Result<()> {
    let extensions = options.all_extensions();
    let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
    let board = generate_board_config(&options.folder, !options.absolute_paths, &extensions)
        .with_context(|| format!("Cannot generate a board from {}", options.folder.display()))?;

    println!(
        "Generated a {}x{} board with {} buttons",
        board.layout.rows,
        board.layout.cols,
        board.buttons.len()
    );
    for button in board.buttons.iter().take(FILES_SHOWN) {
        println!(
            "  [{},{}] {} ({})",
            button.row,
            button.col,
            button.display_label(),
            button.file.as_deref().unwrap_or("-")
        );
    }
    if board.buttons.len() > FILES_SHOWN {
        println!("  ... and {} more", board.buttons.len() - FILES_SHOWN);
    }

    if options.preview {
        println!("{}", board.to_json_pretty()?);
        return Ok(());
    }

    let output: PathBuf = options
        .output
        .clone()
        .unwrap_or_else(|| options.folder.join("soundboard.json"));
    board.write_to(&output)?;
    println!("Board written to {}", output.display());
    Ok(())
}

fn snippets(csv: &Path, options: &SnippetOptions) -> Result<()> {
    let report = run_snippets(&SystemRunner, csv, options)
        .with_context(|| format!("Cannot process snippets from {}", csv.display()))?;

    println!(
        "Snippets written: {}, skipped: {}, failed: {}",
        report.written.len(),
        report.skipped,
        report.failed
    );
    for snippet in report.written.iter().take(FILES_SHOWN) {
        println!("  {} ({})", snippet.label, snippet.path.display());
    }
    if report.written.len() > FILES_SHOWN {
        println!("  ... and {} more", report.written.len() - FILES_SHOWN);
    }
    if let Some(board) = &report.board {
        println!("Board written to {}", board.display());
        println!("Open it with: padboard --board {}", board.display());
    }
    Ok(())
}

fn create_example(path: &Path) -> Result<()> {
    let board = example_board_config();
    board.write_to(path)?;
    println!(
        "Example {}x{} board written to {}",
        board.layout.rows,
        board.layout.cols,
        path.display()
    );
    Ok(())
}
