use crate::prelude::*;
use crate::wr3223::driver::{self, DriverHandle};

/// Routes driver publications to MQTT and MQTT commands into the driver.
#[derive(Clone)]
pub struct Coordinator {
    config: ConfigWrapper,
    channels: Channels,
    handle: DriverHandle,
}

impl Coordinator {
    pub fn new(config: ConfigWrapper, channels: Channels, handle: DriverHandle) -> Self {
        Self {
            config,
            channels,
            handle,
        }
    }

    pub async fn start(&self) -> Result<()> {
        // subscribe before anything can be published
        let from_driver = self.channels.from_driver.subscribe();
        let from_mqtt = self.channels.from_mqtt.subscribe();

        if self.config.mqtt().enabled() {
            futures::try_join!(
                self.driver_receiver(from_driver),
                self.mqtt_receiver(from_mqtt)
            )?;
        } else {
            self.driver_receiver(from_driver).await?;
        }

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping coordinator...");
        let _ = self.channels.from_driver.send(driver::ChannelData::Shutdown);
        let _ = self.channels.from_mqtt.send(mqtt::ChannelData::Shutdown);
    }

    // driver -> mqtt
    async fn driver_receiver(
        &self,
        mut receiver: broadcast::Receiver<driver::ChannelData>,
    ) -> Result<()> {
        use driver::ChannelData::*;

        loop {
            let message = match receiver.recv().await {
                Ok(Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("coordinator lagging behind driver, {} values dropped", n);
                    continue;
                }
                Ok(Value(command_type, value)) => mqtt::Message::for_value(command_type, value),
                Ok(Mode(mode)) => mqtt::Message::for_mode(mode),
            };

            if self.config.mqtt().enabled() {
                self.send_to_mqtt(message);
            }
        }

        info!("coordinator driver receiver exiting");
        Ok(())
    }

    // mqtt -> driver
    async fn mqtt_receiver(
        &self,
        mut receiver: broadcast::Receiver<mqtt::ChannelData>,
    ) -> Result<()> {
        use mqtt::ChannelData::*;

        loop {
            match receiver.recv().await {
                Ok(Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("coordinator lagging behind mqtt, {} commands dropped", n);
                }
                Ok(Message(message)) => self.process_message(&message),
            }
        }

        info!("coordinator mqtt receiver exiting");
        Ok(())
    }

    /// Hand a `cmd/<name>` message to the driver; rejections are answered on `result/<name>`.
    pub fn process_message(&self, message: &mqtt::Message) {
        let (name, value) = match message.to_write_request() {
            Ok(request) => request,
            Err(e) => {
                warn!("{}", e);
                if let Ok(name) = message.command_name() {
                    self.send_to_mqtt(mqtt::Message::for_failure(name));
                }
                return;
            }
        };

        if let Err(e) = self.handle.submit_write(name, value) {
            warn!("rejected write to {}: {}", name, e);
            self.send_to_mqtt(mqtt::Message::for_failure(name));
        }
    }

    fn send_to_mqtt(&self, message: mqtt::Message) {
        // nobody subscribed yet while mqtt is still connecting
        if self
            .channels
            .to_mqtt
            .send(mqtt::ChannelData::Message(message))
            .is_err()
        {
            debug!("send(to_mqtt) failed - no subscribers");
        }
    }
}
