use std::path::Path;

use tierstore_core::TierStoreConfig;

pub fn init(path: Option<&str>) -> anyhow::Result<()> {
    let scaffold = TierStoreConfig::scaffold().to_toml_string()?;

    match path {
        Some(path) => {
            let output = Path::new(path);
            if output.exists() {
                anyhow::bail!("{} already exists", output.display());
            }
            std::fs::write(output, scaffold)?;
            println!("✓ Generated {}", output.display());
        }
        None => print!("{scaffold}"),
    }

    Ok(())
}
