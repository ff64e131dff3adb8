use crate::error::ConfigurationError;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const PROD_URL: &str = "https://posnet.yapikredi.com.tr/PosnetWebService/XML";
const PROD_3D_URL: &str = "https://posnet.yapikredi.com.tr/3DSWebService/YKBPaymentService";
const TEST_URL: &str = "https://setmpos.ykb.com/PosnetWebService/XML";
const TEST_3D_URL: &str = "https://setmpos.ykb.com/3DSWebService/YKBPaymentService";

const THREE_D_SUFFIX: &str = "3d";

/// Key into the [`EndpointTable`].
///
/// Aliases follow the bank's naming: `NAME` is the XML service and `NAME3d`
/// the 3-D Secure payment page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Environment {
    Production,
    Production3d,
    Test,
    Test3d,
    Alias(String),
}

impl Environment {
    pub fn key(&self) -> &str {
        match self {
            Environment::Production => "PROD",
            Environment::Production3d => "PROD3d",
            Environment::Test => "TEST",
            Environment::Test3d => "TEST3d",
            Environment::Alias(name) => name,
        }
    }

    pub fn is_three_d(&self) -> bool {
        match self {
            Environment::Production3d | Environment::Test3d => true,
            Environment::Production | Environment::Test => false,
            Environment::Alias(name) => name.ends_with(THREE_D_SUFFIX),
        }
    }

    /// The environment hosting the 3-D Secure page for this one.
    pub fn three_d(&self) -> Environment {
        match self {
            Environment::Production | Environment::Production3d => Environment::Production3d,
            Environment::Test | Environment::Test3d => Environment::Test3d,
            Environment::Alias(name) if self.is_three_d() => Environment::Alias(name.clone()),
            Environment::Alias(name) => Environment::Alias(format!("{name}{THREE_D_SUFFIX}")),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigurationError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "PROD" => Ok(Environment::Production),
            "PROD3d" => Ok(Environment::Production3d),
            "TEST" => Ok(Environment::Test),
            "TEST3d" => Ok(Environment::Test3d),
            alias
                if !alias.is_empty()
                    && alias
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') =>
            {
                Ok(Environment::Alias(alias.to_string()))
            }
            other => Err(ConfigurationError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Environment to URL mapping handed to the client at construction.
#[derive(Debug, Clone)]
pub struct EndpointTable {
    urls: HashMap<Environment, String>,
}

impl Default for EndpointTable {
    fn default() -> Self {
        let urls = [
            (Environment::Production, PROD_URL),
            (Environment::Production3d, PROD_3D_URL),
            (Environment::Test, TEST_URL),
            (Environment::Test3d, TEST_3D_URL),
        ]
        .into_iter()
        .map(|(environment, url)| (environment, url.to_string()))
        .collect();

        Self { urls }
    }
}

impl EndpointTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            urls: HashMap::new(),
        }
    }

    /// Registers or replaces the URL of `environment`.
    pub fn with_endpoint(
        mut self,
        environment: Environment,
        url: &str,
    ) -> Result<Self, ConfigurationError> {
        let parsed = Url::parse(url).map_err(|e| ConfigurationError::InvalidEndpoint {
            environment: environment.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(ConfigurationError::InvalidEndpoint {
                environment: environment.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        self.urls.insert(environment, url.to_string());
        Ok(self)
    }

    pub fn url_for(&self, environment: &Environment) -> Result<&str, ConfigurationError> {
        self.urls
            .get(environment)
            .map(String::as_str)
            .ok_or_else(|| ConfigurationError::UnknownEnvironment(environment.to_string()))
    }

    /// Fails on the first environment without a registered URL.
    pub fn ensure_resolves<'a>(
        &self,
        environments: impl IntoIterator<Item = &'a Environment>,
    ) -> Result<(), ConfigurationError> {
        for environment in environments {
            self.url_for(environment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_four_endpoints() {
        let table = EndpointTable::default();
        assert_eq!(table.url_for(&Environment::Production).unwrap(), PROD_URL);
        assert_eq!(
            table.url_for(&Environment::Production3d).unwrap(),
            PROD_3D_URL
        );
        assert_eq!(table.url_for(&Environment::Test).unwrap(), TEST_URL);
        assert_eq!(table.url_for(&Environment::Test3d).unwrap(), TEST_3D_URL);
    }

    #[test]
    fn unknown_environment_fails() {
        let table = EndpointTable::default();
        let alias = Environment::Alias("ALBARAKA".into());
        assert_eq!(
            table.url_for(&alias),
            Err(ConfigurationError::UnknownEnvironment("ALBARAKA".into()))
        );
        assert!(EndpointTable::empty().url_for(&Environment::Test).is_err());
    }

    #[test]
    fn aliases_can_be_registered() {
        let table = EndpointTable::default()
            .with_endpoint(
                Environment::Alias("BANK".into()),
                "https://bank.example.com/PosnetWebService/XML",
            )
            .unwrap();
        let alias: Environment = "BANK".parse().unwrap();
        assert_eq!(
            table.url_for(&alias).unwrap(),
            "https://bank.example.com/PosnetWebService/XML"
        );
        assert!(table.ensure_resolves([&alias]).is_ok());
        assert!(table.ensure_resolves([&alias, &alias.three_d()]).is_err());
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(EndpointTable::default()
            .with_endpoint(Environment::Test, "not a url")
            .is_err());
        assert!(EndpointTable::default()
            .with_endpoint(Environment::Test, "ftp://setmpos.ykb.com/")
            .is_err());
    }

    #[test]
    fn environment_keys_round_trip() {
        for key in ["PROD", "PROD3d", "TEST", "TEST3d", "BANK", "BANK3d"] {
            let environment: Environment = key.parse().unwrap();
            assert_eq!(environment.key(), key);
        }
        assert!("".parse::<Environment>().is_err());
        assert!("has space".parse::<Environment>().is_err());
    }

    #[test]
    fn three_d_counterparts() {
        assert_eq!(Environment::Production.three_d(), Environment::Production3d);
        assert_eq!(Environment::Test3d.three_d(), Environment::Test3d);
        assert_eq!(
            Environment::Alias("BANK".into()).three_d(),
            Environment::Alias("BANK3d".into())
        );
        assert!(Environment::Alias("BANK3d".into()).is_three_d());
    }
}
