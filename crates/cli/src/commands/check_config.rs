use std::path::Path;

use signoff_engine::EngineConfig;

use crate::{fail, OutputFormat};

pub(crate) fn cmd_check_config(path: &Path, output: OutputFormat, quiet: bool) {
    let config = match EngineConfig::load(path) {
        Ok(config) => config,
        Err(e) => fail(
            &format!("error in config '{}': {}", path.display(), e),
            output,
            quiet,
        ),
    };

    match output {
        OutputFormat::Json => {
            let doc = serde_json::json!({ "valid": true, "config": config });
            println!("{}", doc);
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            println!("{}: ok", path.display());
            println!(
                "  overdue after {} day(s), {} administrator(s), log level {}{}",
                config.engine.overdue_after_days,
                config.directory.administrators.len(),
                config.logging.level,
                if config.logging.json { " (json)" } else { "" }
            );
        }
    }
}
