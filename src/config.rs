use std::{fs::File, path::Path};

use serde::Deserialize;
use tracing::{Level, event};

#[derive(Debug, Deserialize)]
pub(crate) struct ConfigData {
    pub automation_server: AutomationServerConfig,
    pub global: GlobalConfig,
}

#[derive(Debug)]
pub(crate) struct Config {
    pub automation_server: AutomationServerConfig,
    pub ats_client: reqwest::Client,
    pub global: GlobalConfig,
}
impl Config {
    fn from_config_data(cd: ConfigData) -> Result<Config, Box<dyn std::error::Error>> {
        let ats_client = crate::ats::create_client(&cd.automation_server.token)?;

        Ok(Config {
            automation_server: cd.automation_server,
            ats_client,
            global: cd.global,
        })
    }

    pub fn create() -> Result<Config, Box<dyn std::error::Error>> {
        let path = Path::new("/etc/momentum-contact-cleanup/config.yaml");
        let f = match File::open(path) {
            Ok(x) => x,
            Err(e) => {
                event!(
                    Level::ERROR,
                    "config file /etc/momentum-contact-cleanup/config.yaml not readable: {e}"
                );
                return Err(Box::new(e));
            }
        };
        let config_data: ConfigData = match serde_yaml::from_reader(f) {
            Ok(x) => x,
            Err(e) => {
                event!(Level::ERROR, "config file had syntax errors: {e}");
                return Err(Box::new(e));
            }
        };
        Config::from_config_data(config_data)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GlobalConfig {
    pub log_level: String,
}

#[derive(Deserialize)]
pub(crate) struct AutomationServerConfig {
    pub url: String,
    pub token: String,
    /// The workqueue this script populates and processes.
    pub workqueue_id: String,
}
impl std::fmt::Debug for AutomationServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("AutomationServerConfig")
            .field("url", &self.url)
            .field("token", &"[redacted]")
            .field("workqueue_id", &self.workqueue_id)
            .finish()
    }
}
