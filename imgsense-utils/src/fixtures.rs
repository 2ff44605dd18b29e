use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const FIXTURE_ENV: &str = "IMGSENSE_FIXTURE_ROOT";

/// Resolve the root directory that stores project fixtures.
///
/// `IMGSENSE_FIXTURE_ROOT` wins when set; otherwise the ancestors of the crate manifest directory
/// are searched for a `fixtures` folder.
pub fn fixtures_dir() -> Result<PathBuf> {
    if let Ok(value) = env::var(FIXTURE_ENV) {
        return Ok(PathBuf::from(value));
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .map(|ancestor| ancestor.join("fixtures"))
        .find(|candidate| candidate.is_dir())
        .with_context(|| {
            format!(
                "fixtures directory not found starting from {}",
                manifest_dir.display()
            )
        })
}

/// Resolve a path inside the fixture folder, failing if it does not exist.
pub fn fixture_path<P: AsRef<Path>>(relative: P) -> Result<PathBuf> {
    let relative = relative.as_ref();
    let root = fixtures_dir()?;
    let full = root.join(relative);
    anyhow::ensure!(
        full.exists(),
        "fixture {} does not exist under {}",
        relative.display(),
        root.display()
    );
    Ok(full)
}

/// Load fixture contents as UTF-8 text.
pub fn load_fixture_text<P: AsRef<Path>>(relative: P) -> Result<String> {
    let path = fixture_path(relative)?;
    fs::read_to_string(&path).with_context(|| format!("failed to read fixture {}", path.display()))
}

/// Load fixture JSON into a strongly-typed structure.
pub fn load_fixture_json<P, T>(relative: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = fixture_path(relative)?;
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read JSON fixture {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON fixture {}", path.display()))
}
