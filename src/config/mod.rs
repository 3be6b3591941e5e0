use anyhow::{anyhow, Context};

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub auth: AuthConfig,
    pub environment: String,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://deskuser:@localhost:5432/deskserver".to_string());

        let access_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .context("ACCESS_TOKEN_SECRET must be set")?;
        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .context("REFRESH_TOKEN_SECRET must be set")?;
        if access_secret == refresh_secret {
            return Err(anyhow!(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ"
            ));
        }

        let environment =
            std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database_url,
            auth: AuthConfig {
                access_secret,
                refresh_secret,
            },
            environment,
        })
    }

    /// Cookies are marked `Secure` everywhere except local development.
    pub fn secure_cookies(&self) -> bool {
        self.environment != "development"
    }
}
