//! Audio snippets cut from online videos.
//!
//! A CSV file lists one job per row: a video URL, a start and an end time,
//! and optionally an output name and format. The audio track of each video is
//! downloaded once with `yt-dlp` into a cache directory, cut with `ffmpeg`,
//! converted, and the resulting snippets can be laid out as a board.
//!
//! ```csv
//! url,start,end,output,format
//! https://www.youtube.com/watch?v=dQw4w9WgXcQ,00:00:05,00:00:12,rick-intro,m4a
//! https://youtu.be/dQw4w9WgXcQ,5,12,,mp3
//! ```
//!
//! Times are passed to `ffmpeg` as written (`HH:MM:SS(.ms)` or seconds).

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::board::Layout;
use crate::generate::{arrange_board, capitalize};

pub const YT_DLP: &str = "yt-dlp";
pub const FFMPEG: &str = "ffmpeg";

/// Columns every snippet CSV must have, sorted.
pub const REQUIRED_COLUMNS: [&str; 3] = ["end", "start", "url"];

const MAX_LABEL_CHARS: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnippetFormat {
    #[default]
    M4a,
    Mp3,
    Wav,
}

impl SnippetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnippetFormat::M4a => "m4a",
            SnippetFormat::Mp3 => "mp3",
            SnippetFormat::Wav => "wav",
        }
    }
}

impl FromStr for SnippetFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m4a" => Ok(SnippetFormat::M4a),
            "mp3" => Ok(SnippetFormat::Mp3),
            "wav" => Ok(SnippetFormat::Wav),
            other => bail!("Unsupported format: {other} (expected m4a, mp3 or wav)"),
        }
    }
}

impl fmt::Display for SnippetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Cookies handed to `yt-dlp` for age-restricted videos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    /// Browser to read cookies from (`firefox`, `chrome`, ...).
    pub browser: Option<String>,
    /// Netscape `cookies.txt` file. Tried first when set.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetOptions {
    /// Format for rows that do not name one.
    pub format: SnippetFormat,
    /// Re-encode while cutting instead of copying the stream.
    pub precise: bool,
    pub outdir: PathBuf,
    /// Download cache, one file per video id.
    pub tempdir: PathBuf,
    pub cookies: Cookies,
    /// Forces WAV output and writes a board.
    pub soundboard_ready: bool,
    /// Board file to write. Defaults to `<outdir>/soundboard.json`.
    pub board_output: Option<PathBuf>,
    /// Board grid. Defaults to the smallest grid fitting the snippets.
    pub board_layout: Option<Layout>,
}

impl Default for SnippetOptions {
    fn default() -> Self {
        Self {
            format: SnippetFormat::default(),
            precise: false,
            outdir: PathBuf::from("snippets"),
            tempdir: PathBuf::from("downloads"),
            cookies: Cookies::default(),
            soundboard_ready: false,
            board_output: None,
            board_layout: None,
        }
    }
}

impl SnippetOptions {
    pub fn wants_board(&self) -> bool {
        self.soundboard_ready || self.board_output.is_some()
    }

    pub fn board_path(&self) -> PathBuf {
        self.board_output
            .clone()
            .unwrap_or_else(|| self.outdir.join("soundboard.json"))
    }
}

/// One CSV row. Missing optional columns read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnippetJob {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub path: PathBuf,
    pub label: String,
    /// Output name without extension.
    pub name: String,
}

#[derive(Debug, Default)]
pub struct SnippetReport {
    pub written: Vec<Snippet>,
    /// Rows without url, start or end.
    pub skipped: usize,
    pub failed: usize,
    pub board: Option<PathBuf>,
}

/// Runs the external tools. Implemented over [`Command`] by [`SystemRunner`].
pub trait ToolRunner {
    /// Runs `program`, its output going to the terminal.
    fn run(&self, program: &str, args: &[String]) -> Result<()>;

    /// Runs `program` and returns its trimmed standard output.
    fn output(&self, program: &str, args: &[String]) -> Result<String>;

    fn check_tools(&self) -> Result<()> {
        check_dependencies()
    }
}

pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<()> {
        info!(command = %command_line(program, args), "Running");
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Cannot start {program}"))?;
        if !status.success() {
            bail!("{program} failed with {status}");
        }
        Ok(())
    }

    fn output(&self, program: &str, args: &[String]) -> Result<String> {
        info!(command = %command_line(program, args), "Running");
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Cannot start {program}"))?;
        if !output.status.success() {
            bail!(
                "{program} failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Command as it would be typed in a shell, for logs.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| {
            if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Location of `program` on `PATH`.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = dir.join(format!("{program}.exe"));
        (cfg!(windows) && exe.is_file()).then_some(exe)
    })
}

pub fn check_dependencies() -> Result<()> {
    if find_in_path(YT_DLP).is_none() {
        bail!("yt-dlp not found in PATH. Install it and ensure it's on PATH.");
    }
    if find_in_path(FFMPEG).is_none() {
        bail!("ffmpeg not found in PATH. Install it and ensure it's on PATH.");
    }
    Ok(())
}

pub fn time_str(t: &str) -> String {
    t.trim().to_string()
}

pub fn validate_headers(headers: &StringRecord) -> Result<()> {
    let present: Vec<&str> = headers.iter().map(str::trim).collect();
    if REQUIRED_COLUMNS.iter().all(|column| present.contains(column)) {
        return Ok(());
    }
    bail!(
        "CSV must include columns: {} (plus optional 'output' and 'format')",
        REQUIRED_COLUMNS.join(", ")
    )
}

/// Pad label from an output name: `rick-intro` becomes `Rick Intro`.
/// Long labels are cut to fit a pad.
pub fn snippet_label(name: &str) -> String {
    let label = name
        .replace(['_', '-'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    if label.chars().count() > MAX_LABEL_CHARS {
        let cut: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        label
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn with_tail(args: &[String], tail: &[&str]) -> Vec<String> {
    args.iter()
        .cloned()
        .chain(tail.iter().map(|s| s.to_string()))
        .collect()
}

/// Runs `yt-dlp` for its output.
///
/// A cookie file is final: if it fails the error is returned. Browser
/// cookies fall back to a run without cookies, since reading them fails
/// while the browser is open.
fn yt_dlp_output(
    runner: &dyn ToolRunner,
    args: &[String],
    cookies: &Cookies,
    url: &str,
) -> Result<String> {
    if let Some(file) = &cookies.file {
        let file = arg(file);
        return runner
            .output(YT_DLP, &with_tail(args, &["--cookies", &file, url]))
            .inspect_err(|_| {
                error!(cookie_file = %file, "yt-dlp failed with the cookie file, check that it exists and is valid");
            });
    }

    let Some(browser) = &cookies.browser else {
        return runner.output(YT_DLP, &with_tail(args, &[url]));
    };

    match runner.output(YT_DLP, &with_tail(args, &["--cookies-from-browser", browser, url])) {
        Ok(out) => Ok(out),
        Err(err) => {
            warn!(
                browser = %browser,
                error = %err,
                "Cookie extraction failed (is the browser running?), retrying without cookies"
            );
            runner
                .output(YT_DLP, &with_tail(args, &[url]))
                .inspect_err(|_| {
                    error!(
                        browser = %browser,
                        "Failed with and without cookies, the video may require authentication: close every browser window or export cookies to a file"
                    );
                })
        }
    }
}

pub fn get_video_id(runner: &dyn ToolRunner, url: &str, cookies: &Cookies) -> Result<String> {
    let args = vec!["--no-playlist".to_string(), "--get-id".to_string()];
    let output = yt_dlp_output(runner, &args, cookies, url)?;
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("yt-dlp returned no video id for {url}"))
}

/// Downloads the audio track of `url` as `<tempdir>/<video_id>.m4a`, unless
/// it is already there.
pub fn download_audio(
    runner: &dyn ToolRunner,
    url: &str,
    video_id: &str,
    tempdir: &Path,
    cookies: &Cookies,
) -> Result<PathBuf> {
    let audio = tempdir.join(format!("{video_id}.m4a"));
    if audio.exists() {
        info!(file = %audio.display(), "Using cached download");
        return Ok(audio);
    }

    let template = arg(&tempdir.join("%(id)s.%(ext)s"));
    let base: Vec<String> = ["-x", "--audio-format", "m4a", "-o", template.as_str(), "--no-playlist"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let plain = with_tail(&base, &[url]);

    let first = match (&cookies.file, &cookies.browser) {
        (Some(file), _) => with_tail(&base, &["--cookies", &arg(file), url]),
        (None, Some(browser)) => with_tail(&base, &["--cookies-from-browser", browser, url]),
        (None, None) => plain.clone(),
    };

    match runner.run(YT_DLP, &first) {
        Ok(()) => {}
        Err(err) if cookies.browser.is_some() => {
            warn!(error = %err, "Download with cookies failed, retrying without cookies");
            runner.run(YT_DLP, &plain)?;
        }
        Err(err) => return Err(err),
    }
    Ok(audio)
}

/// Cuts `start..end` out of `input`. The cut lands next to `output` as
/// `<name>.cut.m4a` and its path is returned.
pub fn cut_audio(
    runner: &dyn ToolRunner,
    input: &Path,
    start: &str,
    end: &str,
    output: &Path,
    precise: bool,
) -> Result<PathBuf> {
    let cut = output.with_extension("cut.m4a");
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-ss".into(),
        start.into(),
        "-to".into(),
        end.into(),
        "-i".into(),
        arg(input),
    ];
    if precise {
        args.extend(["-c:a", "aac", "-b:a", "192k"].map(String::from));
    } else {
        args.extend(["-c", "copy"].map(String::from));
    }
    args.push(arg(&cut));

    runner.run(FFMPEG, &args)?;
    Ok(cut)
}

/// Turns the cut into `output`. The cut is consumed.
pub fn convert_format(
    runner: &dyn ToolRunner,
    input: &Path,
    output: &Path,
    format: SnippetFormat,
) -> Result<()> {
    match format {
        SnippetFormat::M4a => {
            if output.exists() {
                fs::remove_file(output)
                    .with_context(|| format!("Cannot replace {}", output.display()))?;
            }
            fs::rename(input, output).with_context(|| {
                format!("Cannot move {} to {}", input.display(), output.display())
            })?;
        }
        SnippetFormat::Mp3 | SnippetFormat::Wav => {
            let mut args = vec!["-y".to_string(), "-i".to_string(), arg(input)];
            if format == SnippetFormat::Mp3 {
                args.extend(["-q:a", "2"].map(String::from));
            }
            args.push(arg(output));
            runner.run(FFMPEG, &args)?;
            fs::remove_file(input)
                .with_context(|| format!("Cannot remove {}", input.display()))?;
        }
    }
    Ok(())
}

/// Produces the snippet of one row. `Ok(None)` means the row was skipped.
pub fn process_job(
    runner: &dyn ToolRunner,
    job: &SnippetJob,
    row: usize,
    options: &SnippetOptions,
) -> Result<Option<Snippet>> {
    let url = job.url.trim();
    let start = time_str(&job.start);
    let end = time_str(&job.end);

    let format = if options.soundboard_ready {
        SnippetFormat::Wav
    } else if job.format.trim().is_empty() {
        options.format
    } else {
        job.format.parse()?
    };

    if url.is_empty() || start.is_empty() || end.is_empty() {
        warn!(row, "Row is missing url, start or end, skipping");
        return Ok(None);
    }

    let video_id = get_video_id(runner, url, &options.cookies)?;
    let audio = download_audio(runner, url, &video_id, &options.tempdir, &options.cookies)?;

    let name = match job.output.trim() {
        "" => video_id,
        name => name.to_string(),
    };
    let path = options
        .outdir
        .join(format!("{name}.{}", format.extension()));
    info!(row, url, format = %format, output = %path.display(), "Processing snippet");

    let cut = cut_audio(runner, &audio, &start, &end, &path, options.precise)?;
    convert_format(runner, &cut, &path, format)?;
    info!(row, output = %path.display(), "Snippet written");

    Ok(Some(Snippet {
        path,
        label: snippet_label(&name),
        name,
    }))
}

/// Processes every row of `csv_path`.
///
/// A failing row is logged and counted, the next rows still run. The board
/// is written when requested and at least one snippet was produced.
pub fn run_snippets(
    runner: &dyn ToolRunner,
    csv_path: &Path,
    options: &SnippetOptions,
) -> Result<SnippetReport> {
    runner.check_tools()?;
    if let Some(file) = &options.cookies.file {
        if !file.is_file() {
            bail!("Cookies file not found: {}", file.display());
        }
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .from_path(csv_path)
        .with_context(|| format!("Cannot open CSV file {}", csv_path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Cannot read the header of {}", csv_path.display()))?
        .clone();
    validate_headers(&headers)?;

    fs::create_dir_all(&options.outdir)
        .with_context(|| format!("Cannot create {}", options.outdir.display()))?;
    fs::create_dir_all(&options.tempdir)
        .with_context(|| format!("Cannot create {}", options.tempdir.display()))?;

    let mut report = SnippetReport::default();
    for (index, record) in reader.deserialize::<SnippetJob>().enumerate() {
        let row = index + 1;
        let outcome = record
            .with_context(|| format!("Unreadable CSV row {row}"))
            .and_then(|job| process_job(runner, &job, row, options));
        match outcome {
            Ok(Some(snippet)) => report.written.push(snippet),
            Ok(None) => report.skipped += 1,
            Err(err) => {
                error!(row, error = %format!("{err:#}"), "Snippet failed");
                report.failed += 1;
            }
        }
    }
    info!(
        written = report.written.len(),
        skipped = report.skipped,
        failed = report.failed,
        "All jobs processed"
    );

    if options.wants_board() && !report.written.is_empty() {
        let files: Vec<(PathBuf, String)> = report
            .written
            .iter()
            .map(|snippet| (snippet.path.clone(), snippet.label.clone()))
            .collect();
        let board = arrange_board(&files, options.board_layout, false);
        let path = options.board_path();
        board.write_to(&path)?;
        info!(
            board_file = %path.display(),
            rows = board.layout.rows,
            cols = board.layout.cols,
            buttons = board.buttons.len(),
            "Board generated from snippets"
        );
        report.board = Some(path);
    }

    Ok(report)
}
