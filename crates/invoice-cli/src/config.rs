use std::path::Path;

use anyhow::Context;
use invoice_flow::FlowConfig;
use serde::{Deserialize, Serialize};

/// The in-process network a command runs against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Party this invocation acts as.
    pub local: String,
    pub peers: Vec<String>,
    pub notary: String,
    pub flow: FlowConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local: "PartyA".into(),
            peers: vec!["PartyB".into()],
            notary: "Notary".into(),
            flow: FlowConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Read a TOML file, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut names = vec![self.local.as_str(), self.notary.as_str()];
        names.extend(self.peers.iter().map(String::as_str));
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            anyhow::bail!("party name {:?} is used twice", pair[0]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let config = NetworkConfig::load(None).unwrap();
        assert_eq!(config.local, "PartyA");
        assert_eq!(config.peers, vec!["PartyB".to_string()]);
        assert_eq!(config.flow, FlowConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "local = \"Acme\"\npeers = [\"Globex\", \"Initech\"]\n\n[flow]\ncounterparty_timeout_ms = 500"
        )
        .unwrap();

        let config = NetworkConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.local, "Acme");
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.notary, "Notary");
        assert_eq!(config.flow.counterparty_timeout_ms, 500);
        assert_eq!(config.flow.notary_timeout_ms, 30_000);
    }

    #[test]
    fn duplicate_names_are_refused() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "local = \"Acme\"\npeers = [\"Acme\"]").unwrap();
        let err = NetworkConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("used twice"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(NetworkConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "peers = 3").unwrap();
        let err = NetworkConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }
}
