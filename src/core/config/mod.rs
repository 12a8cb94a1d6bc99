//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `CORVID_SPOOL_DIR` and `CORVID_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types** — Public configuration structs (`Config`, `BrokerConfig`).
//! - **raw** — Raw TOML deserialization types with serde defaults; private.
//! - **load** — Loading logic: `load`, `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests — plaintext broker URI, temp paths, no
    /// certificates.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            agent_name: "test".into(),
            agent_uri: "corvid://localhost/agent".into(),
            spool_dir: work_dir.join("spool"),
            modules_dir: work_dir.join("modules"),
            log_level: "info".into(),
            log_file: None,
            broker: BrokerConfig {
                uri: "ws://127.0.0.1:0/corvid".into(),
                endpoint_uri: "corvid://broker".into(),
                ca_cert: None,
                client_cert: None,
                client_key: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[agent]
name = "test-agent"
spool_dir = "/tmp/corvid-spool"
log_level = "info"

[broker]
uri = "wss://broker.example:8142/corvid"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.agent_name, "test-agent");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.broker.uri, "wss://broker.example:8142/corvid");
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let f = write_toml("[agent]\nname = \"bare\"\n");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.agent_name, "bare");
        assert_eq!(cfg.broker.endpoint_uri, "corvid://broker");
        assert!(cfg.broker.ca_cert.is_none());
    }

    #[test]
    fn tilde_resolves_against_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        assert_eq!(expand_home("~"), home);
        let expanded = expand_home("~/.corvid/spool");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".corvid/spool"));
    }

    #[test]
    fn plain_paths_pass_through() {
        for p in ["/absolute/path", "relative/path", "dir/~tilde-inside"] {
            assert_eq!(expand_home(p), std::path::PathBuf::from(p));
        }
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(std::path::Path::new("/nonexistent/config.toml"), None, None);
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn spool_dir_override_wins() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/override-spool"), None).unwrap();
        assert_eq!(cfg.spool_dir, std::path::PathBuf::from("/tmp/override-spool"));
    }

    #[test]
    fn log_level_override_wins() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, Some("debug")).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn cert_paths_parse() {
        let toml = r#"
[broker]
uri = "wss://broker:8142/corvid"
ca_cert = "/etc/corvid/ca.pem"
client_cert = "/etc/corvid/agent.pem"
client_key = "/etc/corvid/agent.key"
"#;
        let f = write_toml(toml);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(
            cfg.broker.ca_cert.as_deref(),
            Some(std::path::Path::new("/etc/corvid/ca.pem"))
        );
        assert!(cfg.broker.client_key.is_some());
    }
}
