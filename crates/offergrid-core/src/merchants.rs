use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Per-merchant feed source configuration, tagged by source type.
///
/// Validated at seed time; the reconciliation engine never inspects it — only
/// the feed client does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Shopify {
        store_url: String,
        access_token: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    pub name: String,
    pub email: Option<String>,
    pub source: SourceConfig,
}

impl MerchantConfig {
    /// Generate a URL-safe slug from the merchant name.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Generate a URL-safe slug from an arbitrary display name.
///
/// Lower-cases, maps spaces to dashes, strips everything that is not ASCII
/// alphanumeric, and collapses repeated dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else if c == ' ' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Deserialize)]
pub struct MerchantsFile {
    pub merchants: Vec<MerchantConfig>,
}

/// Load and validate the merchants configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_merchants(path: &Path) -> Result<MerchantsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MerchantsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let merchants_file: MerchantsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::MerchantsFileParse)?;

    validate_merchants(&merchants_file)?;

    Ok(merchants_file)
}

fn validate_merchants(merchants_file: &MerchantsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for merchant in &merchants_file.merchants {
        if merchant.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "merchant name must be non-empty".to_string(),
            ));
        }

        let lower_name = merchant.name.to_lowercase();
        if !seen_names.insert(lower_name) {
            return Err(ConfigError::Validation(format!(
                "duplicate merchant name: '{}'",
                merchant.name
            )));
        }

        match &merchant.source {
            SourceConfig::Shopify { store_url, .. } => {
                if store_url.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "merchant '{}' has an empty store_url",
                        merchant.name
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_merchant(name: &str, store_url: &str) -> MerchantConfig {
        MerchantConfig {
            name: name.to_string(),
            email: None,
            source: SourceConfig::Shopify {
                store_url: store_url.to_string(),
                access_token: None,
            },
        }
    }

    #[test]
    fn slug_simple_name() {
        let merchant = make_merchant("Seller A", "https://seller-a.example.com");
        assert_eq!(merchant.slug(), "seller-a");
    }

    #[test]
    fn slug_special_characters() {
        let merchant = make_merchant("Arnie's Outlet", "https://arnies.example.com");
        assert_eq!(merchant.slug(), "arnies-outlet");
    }

    #[test]
    fn validation_rejects_empty_name() {
        let file = MerchantsFile {
            merchants: vec![make_merchant("  ", "https://x.example.com")],
        };
        assert!(validate_merchants(&file).is_err());
    }

    #[test]
    fn validation_rejects_duplicate_names_case_insensitively() {
        let file = MerchantsFile {
            merchants: vec![
                make_merchant("Seller A", "https://a.example.com"),
                make_merchant("seller a", "https://b.example.com"),
            ],
        };
        assert!(validate_merchants(&file).is_err());
    }

    #[test]
    fn validation_rejects_empty_store_url() {
        let file = MerchantsFile {
            merchants: vec![make_merchant("Seller A", "")],
        };
        assert!(validate_merchants(&file).is_err());
    }

    #[test]
    fn merchants_yaml_parses_tagged_source() {
        let yaml = r"
merchants:
  - name: Seller A
    email: seller.a@example.com
    source:
      type: shopify
      store_url: https://seller-a.example.com
      access_token: shpat-test
";
        let file: MerchantsFile = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(file.merchants.len(), 1);
        let SourceConfig::Shopify {
            store_url,
            access_token,
        } = &file.merchants[0].source;
        assert_eq!(store_url, "https://seller-a.example.com");
        assert_eq!(access_token.as_deref(), Some("shpat-test"));
    }
}
