//! Input tables and env files

use std::path::{Path, PathBuf};

/// Two neurons in records layout
pub const TWO_ROWS: &str = r#"[
    {"pt_root_id": 1, "pt_position": [10, 20, 30]},
    {"pt_root_id": 2, "pt_position": [40, 50, 60]}
]"#;

/// Three neurons in pandas column layout, with a radius column
pub const THREE_ROWS_COLUMNS: &str = r#"{
    "pt_root_id": {"0": 11, "1": 12, "2": 13},
    "pt_position": {"0": [1, 1, 1], "1": [2, 2, 2], "2": [3, 3, 3]},
    "soma_radius": {"0": 5000.0, "1": null, "2": 9000.0}
}"#;

/// Write `content` as the input table and return its path
pub fn write_table(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Write an env file for a run and return its path
pub fn write_env(
    dir: &Path,
    output: &Path,
    server: &str,
    table: &Path,
    extra: &[(&str, &str)],
) -> PathBuf {
    let mut lines = vec![
        format!("FILEPATH={}", output.display()),
        "DATASTACK=minnie65_public".to_string(),
        format!("SERVER_ADDRESS={server}"),
        format!("DATAFRAME={}", table.display()),
    ];
    lines.extend(extra.iter().map(|(k, v)| format!("{k}={v}")));

    let path = dir.join("run.env");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

/// Sorted file names in `dir`, skipping hidden files
pub fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}
