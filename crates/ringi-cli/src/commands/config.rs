//! `ringi config show`.

use anyhow::{Result, bail};
use ringi_config::{ResolvedConfig, ShowFormat};

/// Print the resolved configuration with source annotations.
pub(crate) fn show(resolved: &ResolvedConfig, format: &str, section: Option<&str>) -> Result<()> {
    let format = match format {
        "toml" => ShowFormat::Toml,
        "json" => ShowFormat::Json,
        other => bail!("unknown config format '{other}' (expected toml or json)"),
    };
    let Ok(rendered) = resolved.show(format, section) else {
        bail!(
            "cannot render configuration{}",
            section.map(|s| format!(" section '{s}'")).unwrap_or_default()
        );
    };
    print!("{rendered}");
    Ok(())
}
