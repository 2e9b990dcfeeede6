//! Validated table of configured provider networks.
//!
//! Built once at startup by flattening every provider's network definitions
//! into a single table. Command uniqueness is enforced across all providers
//! combined; a duplicate anywhere is a fatal configuration error.

use crate::config::{Integrations, Network, NetworkKind};
use thiserror::Error;

/// Built-in command names that configured networks may not shadow.
pub const RESERVED_COMMANDS: &[&str] = &["start", "ping", "help", "whitelist", "blacklist"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate command /{0} in network configuration")]
    DuplicateCommand(String),
    #[error("command /{0} is reserved for a built-in")]
    ReservedCommand(String),
    #[error("command /{0} can never match an incoming command token")]
    InvalidCommand(String),
}

/// Incoming command tokens are lowercased word characters, so a configured
/// command with uppercase or non-word characters would be permanently
/// unreachable.
fn is_valid_command(command: &str) -> bool {
    !command.is_empty()
        && command
            .chars()
            .all(|c| (c.is_alphanumeric() && !c.is_uppercase()) || c == '_')
}

/// Which integration serves a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Replicate,
}

/// One validated, immutable network record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    pub provider: Provider,
    pub name: String,
    pub command: String,
    pub version: String,
    pub kind: NetworkKind,
}

impl NetworkEntry {
    fn from_network(provider: Provider, network: &Network) -> Self {
        Self {
            provider,
            name: network.name.clone(),
            command: network.command.clone(),
            version: network.version.clone(),
            kind: network.kind,
        }
    }
}

/// Flattened lookup table over all configured networks.
pub struct NetworkRegistry {
    entries: Vec<NetworkEntry>,
}

impl NetworkRegistry {
    /// Flatten and validate all configured networks.
    ///
    /// # Errors
    ///
    /// `DuplicateCommand` if two networks (of any provider) share a command,
    /// `ReservedCommand` if a network shadows a built-in, `InvalidCommand`
    /// if a command could never be produced by command extraction. All are
    /// fatal at startup.
    pub fn from_settings(integrations: &Integrations) -> Result<Self, RegistryError> {
        let mut entries = Vec::new();
        if let Some(openai) = &integrations.openai {
            for network in &openai.networks {
                entries.push(NetworkEntry::from_network(Provider::OpenAi, network));
            }
        }
        if let Some(replicate) = &integrations.replicate {
            for network in &replicate.networks {
                entries.push(NetworkEntry::from_network(Provider::Replicate, network));
            }
        }

        for (i, entry) in entries.iter().enumerate() {
            if !is_valid_command(&entry.command) {
                return Err(RegistryError::InvalidCommand(entry.command.clone()));
            }
            if RESERVED_COMMANDS.contains(&entry.command.as_str()) {
                return Err(RegistryError::ReservedCommand(entry.command.clone()));
            }
            if entries[..i].iter().any(|e| e.command == entry.command) {
                return Err(RegistryError::DuplicateCommand(entry.command.clone()));
            }
        }

        Ok(Self { entries })
    }

    #[must_use]
    pub fn find_by_command(&self, command: &str) -> Option<&NetworkEntry> {
        self.entries.iter().find(|e| e.command == command)
    }

    /// First configured network of a modality; used to pick a default
    /// handler for un-commanded input such as a bare voice note.
    #[must_use]
    pub fn find_by_kind(&self, kind: NetworkKind) -> Option<&NetworkEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    #[must_use]
    pub fn entries(&self) -> &[NetworkEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Network, ProviderSettings};

    fn network(command: &str, kind: NetworkKind) -> Network {
        Network {
            name: format!("model-{command}"),
            command: command.to_string(),
            version: String::new(),
            kind,
        }
    }

    fn integrations(openai: Vec<Network>, replicate: Vec<Network>) -> Integrations {
        Integrations {
            openai: Some(ProviderSettings {
                api_key: "sk".to_string(),
                networks: openai,
            }),
            replicate: Some(ProviderSettings {
                api_key: "r8".to_string(),
                networks: replicate,
            }),
        }
    }

    #[test]
    fn flattens_both_providers() -> Result<(), RegistryError> {
        let registry = NetworkRegistry::from_settings(&integrations(
            vec![network("p", NetworkKind::Text)],
            vec![network("m", NetworkKind::Image)],
        ))?;
        assert_eq!(registry.entries().len(), 2);
        let p = registry.find_by_command("p").ok_or_else(|| {
            RegistryError::DuplicateCommand("missing /p".to_string())
        })?;
        assert_eq!(p.provider, Provider::OpenAi);
        let m = registry.find_by_command("m").ok_or_else(|| {
            RegistryError::DuplicateCommand("missing /m".to_string())
        })?;
        assert_eq!(m.provider, Provider::Replicate);
        Ok(())
    }

    #[test]
    fn duplicate_command_across_providers_is_fatal() {
        let err = NetworkRegistry::from_settings(&integrations(
            vec![network("x", NetworkKind::Text)],
            vec![network("x", NetworkKind::Image)],
        ));
        assert!(matches!(
            err,
            Err(RegistryError::DuplicateCommand(c)) if c == "x"
        ));
    }

    #[test]
    fn duplicate_command_within_one_provider_is_fatal() {
        let err = NetworkRegistry::from_settings(&integrations(
            vec![
                network("x", NetworkKind::Text),
                network("x", NetworkKind::Text),
            ],
            Vec::new(),
        ));
        assert!(matches!(
            err,
            Err(RegistryError::DuplicateCommand(c)) if c == "x"
        ));
    }

    #[test]
    fn reserved_command_is_fatal() {
        let err = NetworkRegistry::from_settings(&integrations(
            vec![network("ping", NetworkKind::Text)],
            Vec::new(),
        ));
        assert!(matches!(
            err,
            Err(RegistryError::ReservedCommand(c)) if c == "ping"
        ));
    }

    #[test]
    fn unmatchable_command_is_fatal() {
        for bad in ["P", "my-cmd", "", "img 2"] {
            let err = NetworkRegistry::from_settings(&integrations(
                vec![network(bad, NetworkKind::Text)],
                Vec::new(),
            ));
            assert!(matches!(
                err,
                Err(RegistryError::InvalidCommand(c)) if c == bad
            ));
        }
        assert!(is_valid_command("img_2"));
    }

    #[test]
    fn find_by_kind_returns_first_match() -> Result<(), RegistryError> {
        let registry = NetworkRegistry::from_settings(&integrations(
            vec![network("d", NetworkKind::Image)],
            vec![
                network("w", NetworkKind::Audio),
                network("w2", NetworkKind::Audio),
            ],
        ))?;
        let audio = registry
            .find_by_kind(NetworkKind::Audio)
            .ok_or_else(|| RegistryError::DuplicateCommand("missing audio".to_string()))?;
        assert_eq!(audio.command, "w");
        assert!(registry.find_by_kind(NetworkKind::Text).is_none());
        Ok(())
    }

    #[test]
    fn empty_integrations_yield_empty_registry() -> Result<(), RegistryError> {
        let registry = NetworkRegistry::from_settings(&Integrations::default())?;
        assert!(registry.is_empty());
        Ok(())
    }
}
