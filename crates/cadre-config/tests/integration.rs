use std::collections::HashMap;
use std::io::Write;

use cadre_config::{ConfigError, ProfileFile, resolve};

fn lookup_from(map: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| map.get(key).map(ToString::to_string)
}

#[test]
fn profile_file_round_trips_through_resolution() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            "base_url": "https://cadre.example.test/api/",
            "timeout_secs": 15,
            "refresh_margin_secs": 45,
            "session_dir": "/tmp/cadre-session",
            "log_level": "debug"
        }}"#
    )?;

    let profile = ProfileFile::read(file.path())?;
    let vars = HashMap::new();
    let config = resolve(Some(profile), &lookup_from(&vars))?;

    assert_eq!(config.base_url.as_str(), "https://cadre.example.test/api");
    assert_eq!(config.timeout_secs, 15);
    assert_eq!(config.refresh_margin_secs, 45);
    assert_eq!(
        config.session_dir.as_deref(),
        Some(std::path::Path::new("/tmp/cadre-session"))
    );
    assert_eq!(config.log_level, "debug");
    Ok(())
}

#[test]
fn malformed_profile_file_is_a_parse_error() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, "{{ not json")?;

    let err = ProfileFile::read(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}

#[test]
fn missing_profile_file_is_an_io_error() {
    let err = ProfileFile::read(std::path::Path::new("/definitely/missing/cadre.json"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
