#![deny(unsafe_code)]

//! # Overall Example
//! ```rust,no_run
//!
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mqlink::{ClientOptions, InboundMessage, MqttClient, QoS, Transport};
//!
//! async fn run(transport: Arc<dyn Transport>) {
//!     let client = MqttClient::new(ClientOptions::default(), transport);
//!     client.start();
//!
//!     client
//!         .subscribe(
//!             "sensors/+/temperature",
//!             Arc::new(|msg: &InboundMessage| {
//!                 println!("{} {:?}", msg.topic, msg.payload);
//!             }),
//!         )
//!         .await;
//!     client.publish("sensors/kitchen/temperature", "21.5", QoS::AtMostOnce, false).await;
//!
//!     loop {
//!         client.pump();
//!         tokio::time::sleep(Duration::from_millis(50)).await;
//!     }
//! }
//! ```

/// Client Core
pub mod client; // Connection lifecycle, delivery pump
pub mod config; // Client settings
pub mod error; // Typed error surface

/// Subscription Engine
pub mod subscription; // Filter registry and callback dispatch
pub mod topic; // Topic filter compilation and matching

/// Message Plumbing
pub mod queue; // Cross-thread inbound queue
pub mod transport; // Broker transport abstraction

pub use client::{ConnectionState, MqttClient};
pub use config::ClientOptions;
pub use error::ClientError;
pub use queue::{InboundMessage, InboundQueue, Ingress};
pub use subscription::{MessageCallback, OnMessageFn, SubscriptionRegistry, UnsubscribeStatus};
pub use topic::{FilterLevel, TopicFilter};
pub use transport::{QoS, Transport};

pub use mqlink_utils as utils; // Common utilities

pub type Error = anyhow::Error;
pub type Result<T> = anyhow::Result<T, Error>;
