//! Command line parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use padconfig::generate::DEFAULT_AUDIO_EXTENSIONS;
use padconfig::snippets::{SnippetFormat, SnippetOptions};
use padconfig::{Layout, MAX_CELLS};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub config_dir: Option<String>,
    pub board: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub folder: PathBuf,
    pub output: Option<PathBuf>,
    pub absolute_paths: bool,
    pub extensions: Vec<String>,
    pub preview: bool,
}

impl GenerateOptions {
    /// Default extensions followed by the extra ones given with `-e`.
    pub fn all_extensions(&self) -> Vec<String> {
        DEFAULT_AUDIO_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .chain(self.extensions.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Play(String),
    Stop(String),
    StopAll,
    Generate(GenerateOptions),
    CreateExample(PathBuf),
    Snippets { csv: PathBuf, options: SnippetOptions },
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub command: Command,
    pub options: ConnectionOptions,
}

pub fn usage() -> String {
    format!(
        "\
PadBoard {version} - terminal soundboard controller

Usage:
  padboard [run] [OPTIONS]            open the pad grid
  padboard play <ID> [OPTIONS]        play one sound
  padboard stop <ID> [OPTIONS]        stop one sound
  padboard stop-all [OPTIONS]         stop every sound
  padboard generate <FOLDER> [-o FILE] [-a] [-e EXT]... [-p]
                                      build a board from a folder of audio files
  padboard create-example <FILE>      write an example board
  padboard snippets <CSV> [SNIPPET OPTIONS]
                                      cut audio snippets from videos (needs yt-dlp and ffmpeg)

Options:
  -b, --board <FILE>       board JSON file (default: GET /api/config on the backend)
  -u, --base-url <URL>     backend base URL (default: http://localhost:8080)
      --timeout-ms <MS>    HTTP timeout in milliseconds
  -c, --config-dir <DIR>   settings directory (default: $PADBOARD_CONFIG, ./.padboard, ~/.padboard)
  -h, --help               print this help
  -V, --version            print the version

Generate options:
  -o, --output <FILE>      output file (default: <FOLDER>/soundboard.json)
  -a, --absolute-paths     write absolute file paths
  -e, --extensions <EXT>   additional extension, repeatable (e.g. -e .aac)
  -p, --preview            print the board instead of writing it

Snippet options (CSV columns: url,start,end[,output][,format]):
      --format <FMT>       m4a, mp3 or wav (default: m4a)
      --precise            re-encode for frame accurate cuts
      --outdir <DIR>       snippet directory (default: snippets)
      --tempdir <DIR>      download cache (default: downloads)
      --cookies-from-browser <NAME>
                           read cookies from this browser, retry without on failure
      --cookies <FILE>     cookies.txt file
      --soundboard-ready   force wav and write <outdir>/soundboard.json
  -o, --output <FILE>      write the board to this file
      --layout <RxC>       board grid, e.g. 4x6 (default: smallest fitting grid)

Keys: arrows/hjkl move, Enter play, s stop, Space/Esc stop all, q quit

Environment:
  RUST_LOG                 tracing filter (e.g. padcontrol=debug)
  PADBOARD_LOG_FILE        write logs to this file
  PADBOARD_CONFIG__*       settings overrides (e.g. PADBOARD_CONFIG__HOST__BASE_URL)",
        version = env!("CARGO_PKG_VERSION")
    )
}

pub fn parse_args<I>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut options = ConnectionOptions::default();
    let mut positionals: Vec<String> = Vec::new();
    let mut output: Option<PathBuf> = None;
    let mut absolute_paths = false;
    let mut extensions: Vec<String> = Vec::new();
    let mut preview = false;
    let mut snippet = SnippetOptions::default();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| anyhow!("{name} requires a value"))
        };
        match arg.as_str() {
            "--help" | "-h" => {
                return Ok(Cli {
                    command: Command::Help,
                    options,
                });
            }
            "--version" | "-V" => {
                return Ok(Cli {
                    command: Command::Version,
                    options,
                });
            }
            "--board" | "-b" => options.board = Some(PathBuf::from(value(arg.as_str())?)),
            "--base-url" | "-u" => options.base_url = Some(value(arg.as_str())?),
            "--config-dir" | "-c" => options.config_dir = Some(value(arg.as_str())?),
            "--timeout-ms" => {
                let raw = value(arg.as_str())?;
                let millis: u64 = raw
                    .parse()
                    .with_context(|| format!("Invalid value for --timeout-ms: {raw}"))?;
                options.timeout = Some(Duration::from_millis(millis.max(1)));
            }
            "--output" | "-o" => output = Some(PathBuf::from(value(arg.as_str())?)),
            "--absolute-paths" | "-a" => absolute_paths = true,
            "--extensions" | "-e" => extensions.push(value(arg.as_str())?),
            "--preview" | "-p" => preview = true,
            "--format" => snippet.format = value(arg.as_str())?.parse()?,
            "--precise" => snippet.precise = true,
            "--outdir" => snippet.outdir = PathBuf::from(value(arg.as_str())?),
            "--tempdir" => snippet.tempdir = PathBuf::from(value(arg.as_str())?),
            "--cookies-from-browser" => snippet.cookies.browser = Some(value(arg.as_str())?),
            "--cookies" => snippet.cookies.file = Some(PathBuf::from(value(arg.as_str())?)),
            "--soundboard-ready" => snippet.soundboard_ready = true,
            "--layout" => snippet.board_layout = Some(parse_layout(&value(arg.as_str())?)?),
            other if other.starts_with('-') && other.len() > 1 => {
                bail!("Unknown argument: {other}. Use --help for usage.")
            }
            _ => positionals.push(arg),
        }
    }

    let mut positionals = positionals.into_iter();
    let command = match positionals.next().as_deref() {
        None | Some("run") => Command::Run,
        Some("play") => Command::Play(required(positionals.next(), "play <ID>")?),
        Some("stop") => Command::Stop(required(positionals.next(), "stop <ID>")?),
        Some("stop-all") => Command::StopAll,
        Some("generate") => Command::Generate(GenerateOptions {
            folder: PathBuf::from(required(positionals.next(), "generate <FOLDER>")?),
            output,
            absolute_paths,
            extensions,
            preview,
        }),
        Some("create-example") => Command::CreateExample(PathBuf::from(required(
            positionals.next(),
            "create-example <FILE>",
        )?)),
        Some("snippets") => Command::Snippets {
            csv: PathBuf::from(required(positionals.next(), "snippets <CSV>")?),
            options: SnippetOptions {
                board_output: output,
                ..snippet
            },
        },
        Some(other) => bail!("Unknown command: {other}. Use --help for usage."),
    };

    if let Some(extra) = positionals.next() {
        bail!("Unexpected argument: {extra}");
    }

    Ok(Cli { command, options })
}

/// `4x6` or `4,6`.
fn parse_layout(raw: &str) -> Result<Layout> {
    let (rows, cols) = raw
        .split_once(['x', 'X', ','])
        .ok_or_else(|| anyhow!("Invalid layout {raw}, expected ROWSxCOLS"))?;
    let rows: u32 = rows
        .trim()
        .parse()
        .with_context(|| format!("Invalid layout rows: {rows}"))?;
    let cols: u32 = cols
        .trim()
        .parse()
        .with_context(|| format!("Invalid layout columns: {cols}"))?;
    match rows.checked_mul(cols) {
        Some(cells) if cells > 0 && cells <= MAX_CELLS => Ok(Layout::new(rows, cols)),
        _ => bail!("Layout {rows}x{cols} must have between 1 and {MAX_CELLS} cells"),
    }
}

fn required(value: Option<String>, usage: &str) -> Result<String> {
    value.ok_or_else(|| anyhow!("Missing argument: {usage}"))
}
