use std::path::PathBuf;

/// Generate a UTC timestamp for markers and manifests
/// Returns format: YYYYMMDD_HHMMSS (in UTC timezone)
pub fn generate_utc_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Get the Seqport home directory
/// Checks SEQPORT_HOME environment variable, falls back to ${HOME}/.seqport
///
/// Not cached: jobs and tests may point different invocations at different homes.
pub fn seqport_home() -> PathBuf {
    if let Ok(path) = std::env::var("SEQPORT_HOME") {
        PathBuf::from(path)
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| {
            std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string())
        });
        PathBuf::from(home).join(".seqport")
    }
}

/// Get the shared artifact cache directory
/// Checks SEQPORT_CACHE_DIR environment variable, falls back to SEQPORT_HOME/cache
pub fn seqport_cache_dir() -> PathBuf {
    if let Ok(path) = std::env::var("SEQPORT_CACHE_DIR") {
        PathBuf::from(path)
    } else {
        seqport_home().join("cache")
    }
}

/// Get the configuration file path
/// Checks SEQPORT_CONFIG environment variable, falls back to SEQPORT_HOME/seqport.toml
pub fn seqport_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SEQPORT_CONFIG") {
        PathBuf::from(path)
    } else {
        seqport_home().join("seqport.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_home_from_env() {
        std::env::set_var("SEQPORT_HOME", "/opt/seqport");
        std::env::remove_var("SEQPORT_CACHE_DIR");
        std::env::remove_var("SEQPORT_CONFIG");

        assert_eq!(seqport_home(), PathBuf::from("/opt/seqport"));
        assert_eq!(seqport_cache_dir(), PathBuf::from("/opt/seqport/cache"));
        assert_eq!(
            seqport_config_path(),
            PathBuf::from("/opt/seqport/seqport.toml")
        );

        std::env::remove_var("SEQPORT_HOME");
    }

    #[test]
    #[serial]
    fn test_cache_dir_override() {
        std::env::set_var("SEQPORT_CACHE_DIR", "/scratch/cache");
        assert_eq!(seqport_cache_dir(), PathBuf::from("/scratch/cache"));
        std::env::remove_var("SEQPORT_CACHE_DIR");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = generate_utc_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }
}
