use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub media_root: PathBuf,
    pub media_url: String,
    pub admin_token: String,
    pub site_title: String,
    pub submissions_per_minute: u32,
    /// Take the client ip from `X-Forwarded-For`/`X-Real-IP` instead of the socket peer.
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://movies.db?mode=rwc".to_string());

        let media_root =
            PathBuf::from(std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()));

        let mut media_url = std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string());
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        let admin_token = std::env::var("ADMIN_TOKEN").unwrap_or_default();
        let site_title = std::env::var("SITE_TITLE").unwrap_or_else(|_| "Movies".to_string());

        let submissions_per_minute: u32 = std::env::var("SUBMISSIONS_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let trust_proxy = std::env::var("TRUST_PROXY")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            media_root,
            media_url,
            admin_token,
            site_title,
            submissions_per_minute,
            trust_proxy,
        })
    }

    /// Public URL of a stored media path.
    pub fn media(&self, path: &str) -> String {
        format!("{}{}", self.media_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            addr: "127.0.0.1:0".parse().expect("static addr"),
            database_url: "sqlite::memory:".to_string(),
            media_root: PathBuf::from("media"),
            media_url: "/media/".to_string(),
            admin_token: "secret-token".to_string(),
            site_title: "Movies".to_string(),
            submissions_per_minute: 100,
            trust_proxy: true,
        }
    }
}
