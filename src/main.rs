use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use aurora_correlate::color::ColorMapCache;
use aurora_correlate::config::BatchConfig;
use aurora_correlate::data::loader::{load_cameras, load_magnetometers};
use aurora_correlate::geomag::DipoleModel;
use aurora_correlate::report;
use aurora_correlate::session::Session;

#[derive(Parser)]
#[command(name = "aurora-correlate", author, version, about = "Correlate all-sky camera brightness with magnetometer records", long_about = None)]
struct Cli {
    /// JSON batch configuration; built-in defaults when absent
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let config = match args.config {
        Some(path) => BatchConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            info!("no config given, using defaults");
            BatchConfig::default()
        }
    };

    let cameras = load_cameras(&config.cameras_path).context("loading cameras")?;
    let magnetometers =
        load_magnetometers(&config.magnetometers_path).context("loading magnetometers")?;
    let session = Session::new(cameras, magnetometers);

    let model = DipoleModel::default();
    let mut colors = ColorMapCache::new();
    let report = report::build(&session, &config, &model, &mut colors)
        .context("running batch pass")?;

    report
        .write_to(&config.output_dir)
        .with_context(|| format!("writing tables to {}", config.output_dir.display()))?;
    info!("wrote tables to {}", config.output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_path_is_optional() {
        assert_eq!(Cli::try_parse_from(["aurora-correlate"]).unwrap().config, None);
        let args = Cli::try_parse_from(["aurora-correlate", "night.json"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("night.json")));
    }

    #[test]
    fn extra_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["aurora-correlate", "a.json", "b.json"]).is_err());
    }
}
