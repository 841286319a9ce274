//! Settings commands.

use anyhow::Result;
use attrgate_config::{AttrgateConfig, LogFormat};

use crate::style::{print_header, print_labeled, print_spacer};

/// Show effective settings.
pub fn show(config: &AttrgateConfig, format: &str) -> Result<()> {
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{json}");
        }
        "toml" => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{toml_str}");
        }
        _ => {
            print_header("attrgate Settings");
            print_spacer();

            print_header("Policy:");
            print_labeled("File", &config.policy.file.display().to_string());
            print_spacer();

            print_header("Logging:");
            print_labeled("Level", &config.logging.level);
            let log_format = match config.logging.format {
                LogFormat::Text => "text",
                LogFormat::Json => "json",
            };
            print_labeled("Format", log_format);
            print_spacer();

            print_header("Rejection:");
            print_labeled("Endpoint", &config.rejection.endpoint);
            print_labeled("Default language", &config.rejection.default_language);
            print_labeled("Generic text", &config.rejection.generic_text);
        }
    }

    Ok(())
}
