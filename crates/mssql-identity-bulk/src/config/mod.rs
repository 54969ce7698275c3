//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;
use tiberius::{AuthMethod, EncryptionLevel};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate_connection(&self.connection)?;
        validation::validate_bulk_copy(&self.bulk_copy)
    }
}

impl BulkCopyConfig {
    /// Validate the bulk-copy settings on their own.
    pub fn validate(&self) -> Result<()> {
        validation::validate_bulk_copy(self)
    }
}

impl ConnectionConfig {
    /// Whether the connection should be encrypted.
    pub fn encryption_enabled(&self) -> bool {
        !matches!(
            self.encrypt.to_lowercase().as_str(),
            "false" | "no" | "0" | "disable"
        )
    }

    /// Build a tiberius client configuration.
    pub fn to_tiberius_config(&self) -> tiberius::Config {
        let mut config = tiberius::Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));

        if let Some(name) = &self.application_name {
            config.application_name(name);
        }

        if self.encryption_enabled() {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }
        if self.trust_server_cert {
            config.trust_cert();
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
connection:
  host: localhost
  database: inventory
  user: sa
  password: secret
  trust_server_cert: true
bulk_copy:
  destination_table: dbo.Widget
  identity_column: Id
  batch_size: 500
  notify_after: 100
  column_mappings:
    - source: Quantity
      destination: Qty
  options: TABLE_LOCK | USE_INTERNAL_TRANSACTION
  correlation: identity_order
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.connection.port, 1433);
        assert!(config.connection.encryption_enabled());
        assert_eq!(config.bulk_copy.identity_column.as_deref(), Some("Id"));
        assert_eq!(config.bulk_copy.batch_size, 500);
        assert_eq!(config.bulk_copy.bulk_copy_timeout_secs, 30);
        assert!(!config.bulk_copy.enable_streaming);
        assert_eq!(
            config.bulk_copy.options,
            BulkCopyOptions::TABLE_LOCK | BulkCopyOptions::USE_INTERNAL_TRANSACTION
        );
        assert_eq!(config.bulk_copy.correlation, RowCorrelation::IdentityOrder);
        assert_eq!(config.bulk_copy.destination_for("Quantity"), "Qty");
        assert_eq!(config.bulk_copy.destination_for("quantity"), "Qty");
        assert_eq!(config.bulk_copy.destination_for("Name"), "Name");
    }

    #[test]
    fn test_from_yaml_rejects_keep_identity() {
        let yaml = SAMPLE.replace(
            "TABLE_LOCK | USE_INTERNAL_TRANSACTION",
            "KEEP_IDENTITY",
        );
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_encrypt_disable() {
        let mut config = Config::from_yaml(SAMPLE).unwrap().connection;
        config.encrypt = "disable".to_string();
        assert!(!config.encryption_enabled());
    }
}
