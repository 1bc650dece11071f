use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub provider: ProviderSettings,
    pub auth: AuthSettings,
    pub order: OrderSettings,
    pub broker: BrokerSettings,
    pub static_files: StaticFilesSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub redirect_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Issuer URL of the identity provider realm. The OIDC discovery
    /// document is fetched from `<issuer_url>/.well-known/openid-configuration`.
    pub issuer_url: String,
    pub scopes: Vec<String>,

    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Anti-forgery value round-tripped through the authorization redirect.
    /// A single pre-shared value shared by every flow; there is no
    /// per-request nonce binding a callback to the redirect that issued it.
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    /// Path of the baseline order record, re-read on every submission.
    pub source_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub url: String,
    pub cluster_id: String,
    pub client_id: String,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesSettings {
    pub assets_folder: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            redirect_base_url: "http://localhost:8081".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            issuer_url: "http://localhost:9080/auth/realms/zxc-realm".to_string(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            client_id: Some("confidential-client".to_string()),
            client_secret: None,
            client_id_env: Some("OIDC_CLIENT_ID".to_string()),
            client_secret_env: Some("OIDC_CLIENT_SECRET".to_string()),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            state: "somestate".to_string(),
        }
    }
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            source_path: "ord.json".to_string(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            cluster_id: "test-cluster".to_string(),
            client_id: "producer-client".to_string(),
            topic: "test-subject".to_string(),
        }
    }
}

impl Default for StaticFilesSettings {
    fn default() -> Self {
        Self {
            assets_folder: "src/static".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `Settings.toml` and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - `Settings.toml` cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::initialize_environment()?;

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Load `.env` and initialize logging
    fn initialize_environment() -> Result<(), Box<dyn std::error::Error>> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from `Settings.toml` in the current directory,
    /// falling back to defaults when the file is absent.
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::path::PathBuf::from("Settings.toml");
        if config_path.exists() {
            let toml_content = fs::read_to_string(&config_path)?;
            let settings = basic_toml::from_str(&toml_content)?;
            log::info!("Loaded base settings from {}", config_path.display());
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_provider_env_overrides(&mut settings.provider);
        Self::apply_auth_env_overrides(&mut settings.auth);
        Self::apply_order_env_overrides(&mut settings.order);
        Self::apply_broker_env_overrides(&mut settings.broker);
        Self::apply_static_files_env_overrides(&mut settings.static_files);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(redirect_base_url) = std::env::var("REDIRECT_BASE_URL") {
            app_settings.redirect_base_url = redirect_base_url;
        }
    }

    fn apply_provider_env_overrides(provider_settings: &mut ProviderSettings) {
        if let Ok(issuer_url) = std::env::var("OIDC_ISSUER_URL") {
            provider_settings.issuer_url = issuer_url;
        }
    }

    fn apply_auth_env_overrides(auth_settings: &mut AuthSettings) {
        if let Ok(state) = std::env::var("AUTH_STATE") {
            auth_settings.state = state;
        }
    }

    fn apply_order_env_overrides(order_settings: &mut OrderSettings) {
        if let Ok(source_path) = std::env::var("ORDER_SOURCE_PATH") {
            order_settings.source_path = source_path;
        }
    }

    fn apply_broker_env_overrides(broker_settings: &mut BrokerSettings) {
        if let Ok(url) = std::env::var("BROKER_URL") {
            broker_settings.url = url;
        }
        if let Ok(cluster_id) = std::env::var("BROKER_CLUSTER_ID") {
            broker_settings.cluster_id = cluster_id;
        }
        if let Ok(client_id) = std::env::var("BROKER_CLIENT_ID") {
            broker_settings.client_id = client_id;
        }
        if let Ok(topic) = std::env::var("BROKER_TOPIC") {
            broker_settings.topic = topic;
        }
    }

    fn apply_static_files_env_overrides(static_settings: &mut StaticFilesSettings) {
        if let Ok(assets_folder) = std::env::var("STATIC_FOLDER_PATH") {
            static_settings.assets_folder = assets_folder;
        }
    }

    /// Load environment variables from `.env` file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }
}

impl ProviderSettings {
    /// Get the client ID, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Some(env_var) = &self.client_id_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_id.clone()
    }

    /// Get the client secret, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        if let Some(env_var) = &self.client_secret_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_secret.clone()
    }

    /// Requested scopes as a single space-separated value
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}
