use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const DEFAULT_ENV_KEY: &str = "ZEPHYR_SDK_INSTALL_DIR";

/// Appends `key=value` to a github actions style environment file.
pub fn append_env(env_file: &Path, key: &str, value: &Path) -> Result<()> {
    anyhow::ensure!(
        !key.is_empty() && !key.contains('='),
        "invalid environment key {:?}",
        key
    );
    let value = value
        .to_str()
        .with_context(|| format!("non utf-8 path {}", value.display()))?;
    anyhow::ensure!(
        !value.contains('\n'),
        "environment value for {} contains a newline",
        key
    );
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(env_file)
        .with_context(|| format!("failed to open {}", env_file.display()))?;
    writeln!(f, "{}={}", key, value)?;
    tracing::info!("recorded {}={} in {}", key, value, env_file.display());
    Ok(())
}
