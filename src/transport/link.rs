//! Trait abstraction for raw serial link operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use crate::error::{BenchError, Result};

/// Trait for raw serial byte I/O
///
/// The transport drives the link one byte at a time; frame boundaries
/// are its business, not the link's.
#[async_trait]
pub trait SerialLink: Send {
    /// Read the next byte from the link
    async fn read_byte(&mut self) -> io::Result<u8>;

    /// Write all data to the link
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialLink
pub struct TokioSerialLink {
    port: tokio_serial::SerialStream,
}

impl TokioSerialLink {
    /// Open a serial port with board link settings (8N1)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| BenchError::Link(format!("failed to open {}: {}", path, e)))?;

        debug!("opened serial link at {} ({} baud)", path, baud_rate);
        Ok(Self { port })
    }
}

#[async_trait]
impl SerialLink for TokioSerialLink {
    async fn read_byte(&mut self) -> io::Result<u8> {
        use tokio::io::AsyncReadExt;

        let mut buf = [0u8; 1];
        let n = self.port.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial stream closed",
            ));
        }
        Ok(buf[0])
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }
}

/// Enumerate candidate serial ports, USB adapters first
///
/// macOS exposes each device twice (`/dev/cu.*` and `/dev/tty.*`); the
/// `tty.*` duplicates are dropped.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| BenchError::Link(format!("failed to enumerate serial ports: {}", e)))?;

    let mut usb_ports = Vec::new();
    let mut other_ports = Vec::new();

    for info in ports {
        if info.port_name.starts_with("/dev/tty.") {
            continue;
        }

        let is_usb = matches!(info.port_type, tokio_serial::SerialPortType::UsbPort(_))
            || info.port_name.to_lowercase().contains("usb");

        if is_usb {
            usb_ports.push(info.port_name);
        } else {
            other_ports.push(info.port_name);
        }
    }

    usb_ports.extend(other_ports);
    Ok(usb_ports)
}
