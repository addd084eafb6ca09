use crate::prelude::*;
use crate::wr3223::driver::Mode;
use crate::wr3223::{CommandType, Value, WriteValue};

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};

const PUBLISH_ATTEMPTS: u32 = 3;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    pub fn for_value(command_type: CommandType, value: Value) -> Message {
        Message {
            topic: command_type.name().to_string(),
            retain: true,
            payload: value.to_string(),
        }
    }

    pub fn for_mode(mode: Mode) -> Message {
        Message {
            topic: "mode".to_string(),
            retain: true,
            payload: mode.as_str().to_string(),
        }
    }

    pub fn for_failure(name: &str) -> Message {
        Message {
            topic: format!("result/{}", name),
            retain: false,
            payload: "FAIL".to_string(),
        }
    }

    /// The command name of a `cmd/<name>` message.
    pub fn command_name(&self) -> Result<&str> {
        match self.topic.split('/').collect::<Vec<_>>()[..] {
            ["cmd", name] if !name.is_empty() => Ok(name),
            _ => bail!("ignoring badly formed MQTT topic: {}", self.topic),
        }
    }

    // eg cmd/ventilation_level with payload 3 => ("ventilation_level", Number(3))
    pub fn to_write_request(&self) -> Result<(&str, WriteValue)> {
        let name = self.command_name()?;
        let value = WriteValue::parse(&self.payload)
            .ok_or_else(|| anyhow!("can't parse {:?} for {}", self.payload, name))?;

        Ok((name, value))
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
}

impl Mqtt {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let c = &self.config;

        if !c.mqtt().enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new("wr3223-bridge", c.mqtt().host(), c.mqtt().port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(std::time::Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.mqtt().username(), c.mqtt().password()) {
            options.set_credentials(u, p);
        }

        info!(
            "initializing mqtt at {}:{}",
            c.mqtt().host(),
            c.mqtt().port()
        );

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        client
            .subscribe(
                format!("{}/cmd/#", self.config.mqtt().namespace()),
                QoS::AtMostOnce,
            )
            .await?;

        Ok(())
    }

    // mqtt -> coordinator
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                msg = shutdown.recv() => {
                    if matches!(msg, Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        info!("MQTT receiver shutting down");
                        break;
                    }
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        if let Err(e) = self.handle_message(publish) {
                            warn!("{}", e);
                        }
                    }
                    Err(e) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                },
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    fn handle_message(&self, publish: Publish) -> Result<()> {
        // remove the namespace, including the first /
        // doing it this way means we don't break if namespace happens to contain a /
        let topic = publish
            .topic
            .get(self.config.mqtt().namespace().len() + 1..)
            .ok_or_else(|| anyhow!("ignoring MQTT topic outside namespace: {}", publish.topic))?
            .to_owned();

        let message = Message {
            topic,
            retain: publish.retain,
            payload: String::from_utf8(publish.payload.to_vec())?,
        };
        debug!("RX: {:?}", message);
        if self
            .channels
            .from_mqtt
            .send(ChannelData::Message(message))
            .is_err()
        {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client
                        .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "offline")
                        .await;
                    let _ = client.disconnect().await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("MQTT sender lagged, {} messages dropped", n);
                }
                Ok(Message(message)) => {
                    let topic = format!("{}/{}", self.config.mqtt().namespace(), message.topic);
                    debug!("publishing: {} = {}", topic, message.payload);
                    self.publish(&client, &topic, &message).await;
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    async fn publish(&self, client: &AsyncClient, topic: &str, message: &Message) {
        for attempt in 1..=PUBLISH_ATTEMPTS {
            match client
                .publish(topic, QoS::AtLeastOnce, message.retain, message.payload.as_bytes())
                .await
            {
                Ok(_) => return,
                Err(err) if attempt < PUBLISH_ATTEMPTS => {
                    error!(
                        "MQTT publish failed: {:?} - retrying in 10s (attempt {}/{})",
                        err, attempt, PUBLISH_ATTEMPTS
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                }
                Err(err) => {
                    error!("MQTT publish to {} failed, giving up: {:?}", topic, err);
                }
            }
        }
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt().namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(topic: &str, payload: &str) -> Message {
        Message {
            topic: topic.to_string(),
            retain: false,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn value_messages() {
        let m = Message::for_value(CommandType::TemperatureOutside, Value::Number(4.5));
        assert_eq!(m.topic, "temperature_outside");
        assert_eq!(m.payload, "4.5");
        assert!(m.retain);

        let m = Message::for_value(CommandType::Compressor, Value::Switch(true));
        assert_eq!(m.payload, "ON");

        assert_eq!(Message::for_mode(Mode::ManualOverride).payload, "manual");
        assert_eq!(Message::for_failure("solar_max").topic, "result/solar_max");
    }

    #[test]
    fn write_requests() {
        let binding = cmd("cmd/ventilation_level", "3");
        let (name, value) = binding.to_write_request().unwrap();
        assert_eq!(name, "ventilation_level");
        assert_eq!(value, WriteValue::Number(3));

        let (_, value) = cmd("cmd/heat_pump_activate", "ON").to_write_request().unwrap();
        assert_eq!(value, WriteValue::Switch(true));

        assert!(cmd("cmd/solar_max", "lots").to_write_request().is_err());
        assert!(cmd("cmd", "1").to_write_request().is_err());
        assert!(cmd("cmd/a/b", "1").to_write_request().is_err());
    }
}
