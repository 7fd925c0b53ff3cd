use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use yintune_core::config::TunerConfig;

/// yintune: YIN pitch tracker and live tuner.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace. `RUST_LOG` wins when set.
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List audio input devices.
    Devices {
        /// One JSON object per device.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run the live tuner on an input device until Ctrl+C.
    Live(LiveArgs),
}

#[derive(Args, Debug, Default)]
pub struct LiveArgs {
    /// TOML config file; flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input device name or index (see `yintune devices`).
    #[arg(short, long)]
    pub device: Option<String>,

    /// Requested sample rate in Hz.
    #[arg(long)]
    pub samplerate: Option<u32>,

    /// Samples per analysis block.
    #[arg(long)]
    pub block: Option<usize>,

    /// A4 reference in Hz.
    #[arg(long)]
    pub tuning: Option<f32>,

    /// Lowest detectable frequency in Hz.
    #[arg(long)]
    pub fmin: Option<f32>,

    /// Highest detectable frequency in Hz.
    #[arg(long)]
    pub fmax: Option<f32>,

    /// Confidence below which a block shows no pitch.
    #[arg(long)]
    pub conf: Option<f32>,

    /// Rolling median window, in blocks.
    #[arg(long)]
    pub median: Option<usize>,

    /// Cents past a note boundary before the shown note changes.
    #[arg(long)]
    pub hysteresis: Option<f32>,

    /// Print one JSON object per block instead of a status line.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl LiveArgs {
    /// Loads the config file (or defaults) and applies the flag overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be loaded or the merged config is invalid.
    pub fn resolve_config(&self) -> anyhow::Result<TunerConfig> {
        let mut config = match &self.config {
            Some(path) => TunerConfig::load(path)?,
            None => TunerConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut TunerConfig) {
        if let Some(sample_rate) = self.samplerate {
            config.sample_rate = sample_rate;
        }
        if let Some(block) = self.block {
            config.frame_size = block;
        }
        if let Some(a4) = self.tuning {
            config.a4 = a4;
        }
        if let Some(f_min) = self.fmin {
            config.f_min = f_min;
        }
        if let Some(f_max) = self.fmax {
            config.f_max = f_max;
        }
        if let Some(conf) = self.conf {
            config.conf_threshold = conf;
        }
        if let Some(median) = self.median {
            config.median_window = median;
        }
        if let Some(hysteresis) = self.hysteresis {
            config.hysteresis_cents = hysteresis;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yintune_core::ConfigError;

    #[test]
    fn test_parse_live_flags() {
        let cli = Cli::parse_from([
            "yintune", "live", "--device", "2", "--tuning", "442", "--median", "7", "--json",
        ]);
        let Command::Live(args) = cli.command else {
            panic!("expected live subcommand");
        };
        assert_eq!(args.device.as_deref(), Some("2"));
        assert!(args.json);

        let config = args.resolve_config().unwrap();
        assert_eq!(config.a4, 442.0);
        assert_eq!(config.median_window, 7);
        assert_eq!(config.f_min, 50.0);
    }

    #[test]
    fn test_overrides_are_validated() {
        let args = LiveArgs {
            fmin: Some(3000.0),
            ..LiveArgs::default()
        };
        let err = args.resolve_config().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::FrequencyBounds { .. })
        ));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuner.toml");
        std::fs::write(&path, "a4 = 432.0\nhysteresis_cents = 20.0\n").unwrap();
        let args = LiveArgs {
            config: Some(path),
            hysteresis: Some(5.0),
            ..LiveArgs::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.a4, 432.0);
        assert_eq!(config.hysteresis_cents, 5.0);
    }

    #[test]
    fn test_devices_subcommand() {
        let cli = Cli::parse_from(["yintune", "--log-level", "debug", "devices"]);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::Devices { json: false }));
    }
}
