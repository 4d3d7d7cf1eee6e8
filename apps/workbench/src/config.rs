use std::{collections::HashMap, fs};

#[derive(Debug)]
pub struct Settings {
    pub server_url: String,
    pub database_url: String,
    pub csrf_token: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000/api/v1".into(),
            database_url: "sqlite://./data/drafts.db".into(),
            csrf_token: String::new(),
        }
    }
}

/// Defaults, overridden by `workbench.toml`, overridden by environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("workbench.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("server_url") {
                settings.server_url = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("csrf_token") {
                settings.csrf_token = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("WORKBENCH_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("WORKBENCH_CSRF_TOKEN") {
        settings.csrf_token = v;
    }

    settings
}
