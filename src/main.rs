//! Demo viewer.
//!
//! Usage: `flowtrail [config.json] [--quality low|mid|high]`

use flowtrail::prelude::*;
use flowtrail::ConfigError;
use log::info;

#[derive(Debug, Default, PartialEq)]
struct Args {
    config_path: Option<String>,
    quality: Option<Quality>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, ConfigError> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if let Some(tier) = arg.strip_prefix("--quality=") {
            parsed.quality = Some(tier.parse().map_err(ConfigError::Invalid)?);
        } else if arg == "--quality" {
            let tier = args
                .next()
                .ok_or_else(|| ConfigError::Invalid("--quality needs a tier".into()))?;
            parsed.quality = Some(tier.parse().map_err(ConfigError::Invalid)?);
        } else if parsed.config_path.is_none() {
            parsed.config_path = Some(arg);
        } else {
            return Err(ConfigError::Invalid(format!("unexpected argument '{arg}'")));
        }
    }

    Ok(parsed)
}

fn main() -> Result<(), SimulationError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args(std::env::args().skip(1))?;

    let mut config = match &args.config_path {
        Some(path) => {
            info!("Loading config from {}", path);
            ParticleConfig::load(path)?
        }
        None => ParticleConfig::default(),
    };
    if let Some(quality) = args.quality {
        config.quality = quality;
    }

    FlowSimulation::from_config(config).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, ConfigError> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_config_path_and_quality() {
        let parsed = args(&["scene.json", "--quality", "mid"]).unwrap();
        assert_eq!(parsed.config_path.as_deref(), Some("scene.json"));
        assert_eq!(parsed.quality, Some(Quality::Mid));

        let inline = args(&["--quality=LOW"]).unwrap();
        assert_eq!(inline.quality, Some(Quality::Low));
        assert_eq!(inline.config_path, None);
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        assert!(matches!(args(&["--quality", "ultra"]), Err(ConfigError::Invalid(_))));
        assert!(matches!(args(&["--quality"]), Err(ConfigError::Invalid(_))));
        assert!(matches!(args(&["a.json", "b.json"]), Err(ConfigError::Invalid(_))));
    }
}
