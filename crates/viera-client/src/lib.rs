//! # viera-client
//!
//! High-level remote control client for Panasonic Viera TVs.
//!
//! This crate provides:
//! - PIN pairing and encrypted session setup
//! - Remote key presses, with transparent command encryption
//! - Volume and mute over the rendering control service
//! - App listing and launching
//! - Device description lookup
//!
//! ## Example
//!
//! ```ignore
//! use viera_client::{ClientBuilder, Key};
//!
//! #[tokio::main]
//! async fn main() -> viera_client::Result<()> {
//!     let mut remote = ClientBuilder::new("192.168.1.20")
//!         .credentials("my-app-id", "c2VjcmV0LXNlZWQtMTYhIQ==")
//!         .connect()
//!         .await?;
//!
//!     remote.send_key(Key::VolumeUp).await?;
//!     println!("volume: {}", remote.get_volume().await?);
//!     Ok(())
//! }
//! ```

mod apps;
mod builder;
mod client;

pub use apps::App;
pub use builder::ClientBuilder;
pub use client::RemoteControl;

// Re-export commonly used types
pub use viera_core::{Device, DeviceInfo, Encryption, Error, Key, Result};
pub use viera_pairing::{Credentials, SessionState};
pub use viera_soap::{HttpTransport, SoapRequest, SoapTransport};
