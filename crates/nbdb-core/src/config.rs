use crate::app_config::{AppConfig, BucketStrategy};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an invalid value.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an invalid value.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default; only malformed values are errors.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_ratio = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = parse_f64(var, default)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(invalid(var, format!("{value} is outside [0, 1]")))
        }
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("NBDB_LOG_LEVEL", "info");
    let name_threshold = parse_ratio("NBDB_NAME_THRESHOLD", "0.85")?;
    let address_threshold = parse_ratio("NBDB_ADDRESS_THRESHOLD", "0.85")?;

    let geo_outlier_km = parse_f64("NBDB_GEO_OUTLIER_KM", "5.0")?;
    if !geo_outlier_km.is_finite() || geo_outlier_km <= 0.0 {
        return Err(invalid(
            "NBDB_GEO_OUTLIER_KM",
            format!("{geo_outlier_km} must be a positive distance"),
        ));
    }

    let bucket_strategy = or_default("NBDB_BUCKET_STRATEGY", "first_char")
        .parse::<BucketStrategy>()
        .map_err(|e| invalid("NBDB_BUCKET_STRATEGY", e))?;

    let output_dir = PathBuf::from(or_default("NBDB_OUTPUT_DIR", "./results/merged"));
    let output_prefix = or_default("NBDB_OUTPUT_PREFIX", "merged_restaurant_data");
    if output_prefix.trim().is_empty() {
        return Err(invalid("NBDB_OUTPUT_PREFIX", "must be non-empty".to_string()));
    }

    let max_concurrent_reads = parse_usize("NBDB_MAX_CONCURRENT_READS", "4")?.max(1);

    Ok(AppConfig {
        log_level,
        name_threshold,
        address_threshold,
        geo_outlier_km,
        bucket_strategy,
        output_dir,
        output_prefix,
        max_concurrent_reads,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
