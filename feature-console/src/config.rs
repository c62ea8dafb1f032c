use envconfig::Envconfig;

/// Connection settings for the store behind the console. Passed explicitly to
/// `HttpStoreClient::new` at construction; nothing reads these from ambient
/// globals.
#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "http://localhost:8080/api")]
    pub api_base_url: String,

    #[envconfig(default = "http://localhost:8080/static")]
    pub static_base_url: String,

    #[envconfig(default = "")]
    pub auth_token: String,

    #[envconfig(default = "3000")]
    pub request_timeout_ms: u64,
}

impl Config {
    /// A config pointing both the API and static roots at one base URL, as
    /// test servers serve everything from a single origin.
    pub fn for_base_url(base_url: &str, auth_token: &str) -> Config {
        Config {
            api_base_url: format!("{}/api", base_url),
            static_base_url: base_url.to_string(),
            auth_token: auth_token.to_string(),
            request_timeout_ms: 3000,
        }
    }
}
