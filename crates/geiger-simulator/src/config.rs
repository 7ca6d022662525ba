//! Simulator settings read from the environment
//!
//! Every variable is optional. A `.env` file in the working directory is
//! loaded first if present.
//!
//! | Variable                  | Default               | Meaning                                   |
//! |---------------------------|-----------------------|-------------------------------------------|
//! | `GEIGER_SOURCE_CPM`       | 30                    | Mean counts per minute of the source      |
//! | `GEIGER_HOTSPOT_CPM`      | unset                 | Source strength after `GEIGER_HOTSPOT_AT` |
//! | `GEIGER_HOTSPOT_AT`       | 120                   | Simulated seconds before the hotspot      |
//! | `GEIGER_SPEEDUP`          | 1                     | Simulated seconds per real second         |
//! | `GEIGER_DURATION`         | 600                   | Simulated seconds to run, 0 = forever     |
//! | `GEIGER_SEED`             | 0x2545F4914F6CDD1D    | Random source seed                        |
//! | `GEIGER_ALARM_RATE`       | unset                 | Alarm rate limit (µSv/h)                  |
//! | `GEIGER_ALARM_DOSE`       | unset                 | Alarm cumulative dose limit (mSv)         |
//! | `GEIGER_ALARM_ENABLED`    | unset                 | `true` / `false`                          |
//! | `GEIGER_SETTINGS_PATH`    | geiger-settings.bin   | Persisted alarm settings                  |
//!
//! Setting any of the `GEIGER_ALARM_*` variables overrides (and rewrites) the
//! persisted alarm settings.

use std::path::PathBuf;
use std::str::FromStr;

use geiger_core::alarm::AlarmThresholds;
use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum SimConfigError {
    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} must be positive, got {value}")]
    NotPositive { var: &'static str, value: f64 },
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub source_cpm: f64,
    /// `(cpm, starting at simulated second)`
    pub hotspot: Option<(f64, u64)>,
    pub speedup: f64,
    /// Simulated run time in seconds; `None` runs until killed
    pub duration_secs: Option<u64>,
    pub seed: u64,
    /// Thresholds given on the command line environment, if any
    pub alarm_override: Option<AlarmThresholds>,
    pub settings_path: PathBuf,
}

impl SimConfig {
    pub fn from_env() -> Result<Self, SimConfigError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let source_cpm = parse_or("GEIGER_SOURCE_CPM", 30.0)?;
        if source_cpm < 0.0 {
            return Err(SimConfigError::NotPositive {
                var: "GEIGER_SOURCE_CPM",
                value: source_cpm,
            });
        }

        let speedup = parse_or("GEIGER_SPEEDUP", 1.0)?;
        if speedup <= 0.0 {
            return Err(SimConfigError::NotPositive {
                var: "GEIGER_SPEEDUP",
                value: speedup,
            });
        }

        let hotspot = match parse::<f64>("GEIGER_HOTSPOT_CPM")? {
            Some(cpm) => Some((cpm.max(0.0), parse_or("GEIGER_HOTSPOT_AT", 120)?)),
            None => None,
        };

        let duration_secs = match parse_or("GEIGER_DURATION", 600u64)? {
            0 => None,
            secs => Some(secs),
        };

        let rate = parse::<f32>("GEIGER_ALARM_RATE")?;
        let dose = parse::<f32>("GEIGER_ALARM_DOSE")?;
        let enabled = parse::<bool>("GEIGER_ALARM_ENABLED")?;
        let alarm_override = if rate.is_some() || dose.is_some() || enabled.is_some() {
            let defaults = AlarmThresholds::default();
            Some(AlarmThresholds {
                current_rate_limit: rate.unwrap_or(defaults.current_rate_limit),
                cumulative_dose_limit: dose.unwrap_or(defaults.cumulative_dose_limit),
                enabled: enabled.unwrap_or(true),
            })
        } else {
            None
        };

        Ok(Self {
            source_cpm,
            hotspot,
            speedup,
            duration_secs,
            seed: parse_or("GEIGER_SEED", 0x2545_F491_4F6C_DD1D)?,
            alarm_override,
            settings_path: std::env::var_os("GEIGER_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("geiger-settings.bin")),
        })
    }
}

fn parse<T: FromStr>(var: &'static str) -> Result<Option<T>, SimConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SimConfigError::Invalid { var, value }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(raw)) => Err(SimConfigError::Invalid {
            var,
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

fn parse_or<T: FromStr>(var: &'static str, default: T) -> Result<T, SimConfigError> {
    Ok(parse(var)?.unwrap_or(default))
}
