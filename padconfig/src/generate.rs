//! Board generation from a folder of audio files.
//!
//! Files are discovered by extension, sorted by name, laid out row by row on
//! the smallest grid that fits them, and labelled from their file names.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::board::{button_id, BoardConfig, ButtonSpec, Layout};

/// Extensions picked up when none are given.
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".m4a", ".ogg", ".flac"];

/// Smallest grid holding `count` pads.
///
/// Grids are at least as tall as they are wide and at most three times
/// taller than wide. Among the candidates with the fewest slots, the one
/// with the fewest columns wins. Zero or one file gives `(1, 1)`.
pub fn calculate_optimal_grid(count: usize) -> (u32, u32) {
    if count <= 1 {
        return (1, 1);
    }

    let max_cols = (count as f64).sqrt() as usize + 5;
    let mut best = (count, 1usize);
    let mut best_slots = usize::MAX;

    for cols in 1..=max_cols {
        let rows = count.div_ceil(cols).max(cols);
        if rows > cols * 3 {
            continue;
        }
        let slots = rows * cols;
        if slots < best_slots {
            best = (rows, cols);
            best_slots = slots;
        }
    }

    (best.0 as u32, best.1 as u32)
}

/// Audio files directly inside `folder`, sorted case-insensitively by name.
///
/// Extensions are compared case-insensitively and may be given with or
/// without the leading dot.
pub fn find_audio_files(folder: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    let mut found = BTreeSet::new();
    let entries = fs::read_dir(folder)
        .with_context(|| format!("Cannot list audio folder {}", folder.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| wanted.contains(&ext.to_lowercase()))
            .unwrap_or(false);
        if matches {
            found.insert(path);
        }
    }

    let mut files: Vec<PathBuf> = found.into_iter().collect();
    files.sort_by_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    debug!(folder = %folder.display(), count = files.len(), "Audio files discovered");
    Ok(files)
}

/// Human readable label from a file name: `vader-I_am_your_father.wav`
/// becomes `Vader I Am Your Father`.
pub fn create_button_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();

    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Builds a board from the audio files of `folder`.
///
/// With `use_relative_paths`, file paths are written relative to the current
/// directory when possible and absolute otherwise. Paths always use forward
/// slashes.
pub fn generate_board_config(
    folder: &Path,
    use_relative_paths: bool,
    extensions: &[&str],
) -> Result<BoardConfig> {
    let files = find_audio_files(folder, extensions)?;
    if files.is_empty() {
        bail!("No audio files found in {}", folder.display());
    }

    let labelled: Vec<(PathBuf, String)> = files
        .into_iter()
        .map(|file| {
            let label = create_button_label(&file);
            (file, label)
        })
        .collect();
    let board = arrange_board(&labelled, None, use_relative_paths);

    info!(
        folder = %folder.display(),
        rows = board.layout.rows,
        cols = board.layout.cols,
        buttons = board.buttons.len(),
        "Board generated"
    );
    Ok(board)
}

/// Lays labelled files out row by row.
///
/// Without a `layout` the smallest fitting grid is used. Files that do not
/// fit a given layout are dropped.
pub fn arrange_board(
    files: &[(PathBuf, String)],
    layout: Option<Layout>,
    use_relative_paths: bool,
) -> BoardConfig {
    let layout = layout.unwrap_or_else(|| {
        let (rows, cols) = calculate_optimal_grid(files.len());
        Layout::new(rows, cols)
    });
    if files.len() > layout.slots() {
        warn!(
            files = files.len(),
            rows = layout.rows,
            cols = layout.cols,
            "Too many files for the layout, keeping the first ones"
        );
    }

    let cwd = env::current_dir().ok();
    let buttons = files
        .iter()
        .take(layout.slots())
        .enumerate()
        .map(|(index, (file, label))| {
            let row = (index as u32) / layout.cols + 1;
            let col = (index as u32) % layout.cols + 1;
            ButtonSpec {
                id: button_id(row, col),
                label: Some(label.clone()),
                row,
                col,
                file: Some(display_path(file, use_relative_paths, cwd.as_deref())),
            }
        })
        .collect();

    BoardConfig::new(layout, buttons)
}

fn display_path(file: &Path, relative: bool, cwd: Option<&Path>) -> String {
    let absolute = if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.map(|cwd| cwd.join(file)).unwrap_or_else(|| file.to_path_buf())
    };
    let chosen = if relative {
        cwd.and_then(|cwd| absolute.strip_prefix(cwd).ok())
            .map(Path::to_path_buf)
            .unwrap_or(absolute)
    } else {
        absolute
    };
    chosen.to_string_lossy().replace('\\', "/")
}

/// Board written by `padboard create-example`.
pub fn example_board_config() -> BoardConfig {
    let button = |row: u32, col: u32, label: &str, file: &str| ButtonSpec {
        id: button_id(row, col),
        label: Some(label.to_string()),
        row,
        col,
        file: Some(file.to_string()),
    };
    BoardConfig::new(
        Layout::new(4, 6),
        vec![
            button(1, 1, "Example Sound 1", "snippets/example_clip_1.m4a"),
            button(1, 2, "Example Sound 2", "snippets/example_clip_2.wav"),
            button(1, 3, "My Custom Audio", "snippets/my_audio_snippet.m4a"),
            button(2, 1, "Absolute Path Example", "C:/path/to/your/audio/file.wav"),
            button(2, 2, "Relative Path Example", "./relative/path/to/audio.mp3"),
            button(2, 3, "Generated Snippet", "snippets/generated_by_asa.m4a"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_edge_cases() {
        assert_eq!(calculate_optimal_grid(0), (1, 1));
        assert_eq!(calculate_optimal_grid(1), (1, 1));
        assert_eq!(calculate_optimal_grid(2), (2, 1));
        assert_eq!(calculate_optimal_grid(3), (3, 1));
    }

    #[test]
    fn test_grid_known_values() {
        let expected = [
            (4, (2, 2)),
            (5, (3, 2)),
            (6, (3, 2)),
            (7, (4, 2)),
            (8, (4, 2)),
            (9, (3, 3)),
            (10, (5, 2)),
            (12, (6, 2)),
            (15, (5, 3)),
            (16, (4, 4)),
            (18, (6, 3)),
            (20, (5, 4)),
            (24, (8, 3)),
            (25, (5, 5)),
            (28, (7, 4)),
            (30, (6, 5)),
            (35, (7, 5)),
            (36, (9, 4)),
            (42, (7, 6)),
        ];
        for (count, grid) in expected {
            assert_eq!(calculate_optimal_grid(count), grid, "{count} files");
        }
    }

    #[test]
    fn test_grid_properties() {
        for count in 1..=100usize {
            let (rows, cols) = calculate_optimal_grid(count);
            assert!((rows * cols) as usize >= count);
            assert!(rows >= cols);
            assert!(rows <= cols * 3);
        }
    }

    #[test]
    fn test_labels() {
        let cases = [
            ("hello_world.wav", "Hello World"),
            ("mixed_under-score.m4a", "Mixed Under Score"),
            ("test_file_v2.m4a", "Test File V2"),
            ("123.mp3", "123"),
            ("___.wav", ""),
            ("multiple___underscores.mp3", "Multiple Underscores"),
            ("UPPERCASE_FILE.wav", "Uppercase File"),
            ("MiXeD_CaSe.wav", "Mixed Case"),
            ("vader-I_am_your_father.wav", "Vader I Am Your Father"),
            ("test.unknown", "Test"),
        ];
        for (file, label) in cases {
            assert_eq!(create_button_label(Path::new(file)), label, "{file}");
        }
    }

    #[test]
    fn test_arrange_board_with_fixed_layout_drops_overflow() {
        let files: Vec<(PathBuf, String)> = (1..=5)
            .map(|i| (PathBuf::from(format!("/snips/s{i}.wav")), format!("S{i}")))
            .collect();
        let board = arrange_board(&files, Some(Layout::new(2, 2)), false);
        assert_eq!(board.layout, Layout::new(2, 2));
        assert_eq!(board.buttons.len(), 4);
        assert_eq!(board.buttons[3].id, "btn_2_2");
        assert_eq!(board.buttons[3].label.as_deref(), Some("S4"));
        assert_eq!(board.buttons[0].file.as_deref(), Some("/snips/s1.wav"));

        let fitted = arrange_board(&files, None, false);
        assert_eq!(fitted.layout, Layout::new(3, 2));
        assert_eq!(fitted.buttons.len(), 5);
    }
}
