//! Configuration for the MQTT frontend transport.

use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "picalor_core".to_string()
}

fn default_data_topic_prefix() -> String {
    "picalor/data".to_string()
}

fn default_cmd_req_prefix() -> String {
    "picalor/cmd_req".to_string()
}

fn default_cmd_resp_prefix() -> String {
    "picalor/cmd_resp".to_string()
}

/// Broker connection and topic-tree configuration for the MQTT
/// [`crate::frontend::FrontendPort`] implementation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MqttConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_data_topic_prefix")]
    pub data_topic_prefix: String,
    #[serde(default = "default_cmd_req_prefix")]
    pub cmd_req_topic_prefix: String,
    #[serde(default = "default_cmd_resp_prefix")]
    pub cmd_resp_topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            data_topic_prefix: default_data_topic_prefix(),
            cmd_req_topic_prefix: default_cmd_req_prefix(),
            cmd_resp_topic_prefix: default_cmd_resp_prefix(),
        }
    }
}

impl MqttConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.host.trim().is_empty() {
            return Err("MQTT frontend is enabled but host is empty".into());
        }
        Ok(())
    }

    pub fn results_topic(&self) -> String {
        format!("{}/results", self.data_topic_prefix)
    }

    pub fn errors_topic(&self) -> String {
        format!("{}/errors", self.data_topic_prefix)
    }

    pub fn cmd_req_topic(&self, cmd_name: &str) -> String {
        format!("{}/{}", self.cmd_req_topic_prefix, cmd_name)
    }

    pub fn cmd_resp_topic(&self, cmd_name: &str, ok: bool) -> String {
        format!(
            "{}/{}/{}",
            self.cmd_resp_topic_prefix,
            if ok { "ok" } else { "err" },
            cmd_name
        )
    }
}
