use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use bytestring::ByteString;
use parking_lot::Mutex;
use simple_logger::SimpleLogger;

use mqlink::{ClientOptions, InboundMessage, Ingress, MqttClient, QoS, Result, Transport};

//A broker stand-in that echoes every publish straight back to the
//client, as a real broker would for a matching subscriber.
#[derive(Default)]
struct LoopbackTransport {
    connected: AtomicBool,
    ingress: Mutex<Option<Ingress>>,
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe_topics(&self, filters: Vec<ByteString>) -> Result<()> {
        log::info!("broker subscribe, {filters:?}");
        Ok(())
    }

    async fn unsubscribe_topics(&self, filters: Vec<ByteString>) -> Result<()> {
        log::info!("broker unsubscribe, {filters:?}");
        Ok(())
    }

    async fn publish(&self, topic: ByteString, payload: Bytes, _qos: QoS, _retain: bool) -> Result<()> {
        if let Some(ingress) = self.ingress.lock().as_ref() {
            ingress.push(topic, payload);
        }
        Ok(())
    }

    fn set_inbound(&self, ingress: Ingress) {
        self.ingress.lock().replace(ingress);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new().with_level(log::LevelFilter::Info).init()?;

    let client = MqttClient::new(ClientOptions::default(), Arc::new(LoopbackTransport::default()));
    client.start();
    while !client.is_connected() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client
        .subscribe(
            "sensors/+/temperature",
            Arc::new(|msg: &InboundMessage| {
                log::info!("received {} {:?}", msg.topic, msg.payload);
            }),
        )
        .await;

    for i in 0..10u32 {
        client.publish("sensors/kitchen/temperature", format!("{}", 20 + i), QoS::AtMostOnce, false).await;
        client.pump();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    client.stop().await?;
    Ok(())
}
