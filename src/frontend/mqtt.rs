//! MQTT binding for [`super::FrontendPort`].
//!
//! The topic tree is `<data_topic_prefix>/results`, `<data_topic_prefix>/errors`,
//! `<cmd_req_topic_prefix>/<cmd_name>` and `<cmd_resp_topic_prefix>/ok|err/<cmd_name>`.
//! Incoming command requests are buffered in an internal queue drained by
//! [`MqttFrontend::poll_command`]; the event loop itself runs on a
//! dedicated background thread, the way `rumqttc`'s synchronous client is
//! meant to be driven.

use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{error, warn};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use serde_json::Value;

use crate::config::mqtt::MqttConfig;
use crate::frontend::{CommandRequest, FrontendPort};

pub struct MqttFrontend {
    client: Mutex<Client>,
    config: MqttConfig,
    incoming: Mutex<mpsc::Receiver<CommandRequest>>,
}

impl MqttFrontend {
    /// Connect to the configured broker and subscribe to the command
    /// request wildcard. The connection's event loop runs on its own
    /// background thread for the lifetime of this frontend.
    pub fn connect(config: MqttConfig) -> Result<Self> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut connection) = Client::new(options, 64);
        let sub_topic = format!("{}/+", config.cmd_req_topic_prefix);
        client
            .subscribe(&sub_topic, QoS::AtLeastOnce)
            .context("subscribing to command request topic")?;

        let (tx, rx) = mpsc::channel();
        let cmd_req_prefix = config.cmd_req_topic_prefix.clone();

        std::thread::spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Some(name) = publish
                            .topic
                            .strip_prefix(&cmd_req_prefix)
                            .and_then(|s| s.strip_prefix('/'))
                        {
                            let payload: Value = serde_json::from_slice(&publish.payload)
                                .unwrap_or(Value::Null);
                            let _ = tx.send(CommandRequest {
                                name: name.to_string(),
                                payload,
                            });
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT connection error: {e}");
                    }
                }
            }
        });

        Ok(Self {
            client: Mutex::new(client),
            config,
            incoming: Mutex::new(rx),
        })
    }

    fn publish(&self, topic: &str, payload: &Value) -> Result<()> {
        let body = serde_json::to_vec(payload).context("serializing MQTT payload")?;
        self.client
            .lock()
            .unwrap()
            .publish(topic, QoS::AtLeastOnce, false, body)
            .map_err(|e| anyhow!("MQTT publish to '{topic}' failed: {e}"))
    }
}

impl FrontendPort for MqttFrontend {
    fn publish_results(&self, results: &Value) -> Result<()> {
        self.publish(&self.config.results_topic(), results)
    }

    fn publish_error(&self, message: &str) -> Result<()> {
        self.publish(&self.config.errors_topic(), &Value::String(message.to_string()))
    }

    fn publish_command_response(&self, command: &str, ok: bool, body: &Value) -> Result<()> {
        let topic = self.config.cmd_resp_topic(command, ok);
        if let Err(e) = self.publish(&topic, body) {
            error!("failed to publish command response on '{topic}': {e}");
            return Err(e);
        }
        Ok(())
    }

    fn poll_command(&self) -> Option<CommandRequest> {
        self.incoming.lock().unwrap().try_recv().ok()
    }
}
