use std::path::PathBuf;

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("prompt-grok"))
        .unwrap_or_else(|| PathBuf::from("~/.local/share/prompt-grok"))
}

/// Directory for logs, created on first use. Honors `XDG_DATA_HOME`.
pub fn get_data_dir() -> std::io::Result<PathBuf> {
    let path = match std::env::var_os("XDG_DATA_HOME") {
        Some(xdg_data_home) => PathBuf::from(xdg_data_home).join("prompt-grok"),
        None => default_data_dir(),
    };
    std::fs::create_dir_all(&path)?;
    Ok(path)
}
