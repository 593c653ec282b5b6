use std::future::Future;
use std::net::SocketAddr;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::core::{BusConfig, Error, Result};
use crate::protocol::{CanFrameCodec, Frame};

/// Field bus as seen by the core
pub trait BusTransport: Send + Sync + 'static {
    /// Transmits one frame
    fn send(&self, frame: Frame) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the next frame; `Ok(None)` once the bus has closed
    fn receive(&self) -> impl Future<Output = Result<Option<Frame>>> + Send;

    /// Releases the underlying device
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

type FramedBus<T> = Framed<T, CanFrameCodec>;

/// Bus carried over a byte stream of raw `can_frame` records
///
/// Reader and writer halves are locked independently, so a pending receive
/// never delays an outbound frame.
pub struct StreamBus<T> {
    reader: Mutex<SplitStream<FramedBus<T>>>,
    writer: Mutex<SplitSink<FramedBus<T>, Frame>>,
}

impl<T> StreamBus<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wraps an already connected stream
    pub fn new(io: T) -> Self {
        let (writer, reader) = Framed::new(io, CanFrameCodec::new()).split();
        StreamBus {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }
}

impl StreamBus<TcpStream> {
    /// Connects to a TCP CAN gateway
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::device_unavailable(format!("CAN gateway {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        info!(%addr, "connected to CAN gateway");
        Ok(StreamBus::new(stream))
    }
}

impl<T> BusTransport for StreamBus<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, frame: Frame) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .send(frame)
            .await
            .map_err(|e| Error::transport_send(format!("bus write failed: {}", e)))
    }

    async fn receive(&self) -> Result<Option<Frame>> {
        let mut reader = self.reader.lock().await;
        reader.next().await.transpose()
    }

    async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .close()
            .await
            .map_err(|e| Error::shutdown(format!("closing bus stream: {}", e)))
    }
}

#[cfg(all(feature = "socketcan", target_os = "linux"))]
pub use self::native::SocketCanBus;

#[cfg(all(feature = "socketcan", target_os = "linux"))]
mod native {
    use socketcan::tokio::CanSocket;
    use socketcan::{CanFrame, EmbeddedFrame, Id, StandardId};
    use tracing::debug;

    use super::BusTransport;
    use crate::core::{Error, Result};
    use crate::protocol::Frame;

    /// Native Linux SocketCAN interface
    pub struct SocketCanBus {
        interface: String,
        socket: CanSocket,
    }

    impl SocketCanBus {
        /// Opens a bound raw CAN socket on `interface`, e.g. `can0`
        pub fn open(interface: &str) -> Result<Self> {
            let socket = CanSocket::open(interface)
                .map_err(|e| Error::device_unavailable(format!("SocketCAN {}: {}", interface, e)))?;
            Ok(SocketCanBus {
                interface: interface.to_string(),
                socket,
            })
        }
    }

    impl BusTransport for SocketCanBus {
        async fn send(&self, frame: Frame) -> Result<()> {
            let id = u16::try_from(frame.id)
                .ok()
                .and_then(StandardId::new)
                .ok_or_else(|| Error::transport_send(format!("invalid standard id 0x{:X}", frame.id)))?;
            let can_frame = CanFrame::new(id, &frame.data)
                .ok_or_else(|| Error::transport_send("payload longer than 8 bytes"))?;
            self.socket
                .write_frame(can_frame)
                .await
                .map_err(|e| Error::transport_send(format!("{}: {}", self.interface, e)))
        }

        async fn receive(&self) -> Result<Option<Frame>> {
            loop {
                let can_frame = self
                    .socket
                    .read_frame()
                    .await
                    .map_err(|e| Error::device_unavailable(format!("{}: {}", self.interface, e)))?;
                let CanFrame::Data(data) = can_frame else {
                    continue;
                };
                let id = match data.id() {
                    Id::Standard(id) => u32::from(id.as_raw()),
                    Id::Extended(id) => id.as_raw(),
                };
                return Ok(Some(Frame::new(id, data.data().to_vec())));
            }
        }

        async fn close(&self) -> Result<()> {
            // The descriptor is released when the last handle drops
            debug!(interface = %self.interface, "SocketCAN bus released");
            Ok(())
        }
    }
}

/// Any bus the binary can be configured with
pub enum FieldBus {
    Gateway(StreamBus<TcpStream>),
    #[cfg(all(feature = "socketcan", target_os = "linux"))]
    SocketCan(SocketCanBus),
}

impl FieldBus {
    /// Opens the bus described by `config`; `Ok(None)` when none is configured
    pub async fn open(config: &BusConfig) -> Result<Option<Self>> {
        if let Some(interface) = &config.socketcan_interface {
            return Self::open_socketcan(interface).map(Some);
        }
        match config.gateway_addr {
            Some(addr) => Ok(Some(FieldBus::Gateway(StreamBus::connect(addr).await?))),
            None => {
                debug!("no field bus configured");
                Ok(None)
            }
        }
    }

    #[cfg(all(feature = "socketcan", target_os = "linux"))]
    fn open_socketcan(interface: &str) -> Result<Self> {
        let bus = SocketCanBus::open(interface)?;
        info!(%interface, "opened SocketCAN bus");
        Ok(FieldBus::SocketCan(bus))
    }

    #[cfg(not(all(feature = "socketcan", target_os = "linux")))]
    fn open_socketcan(interface: &str) -> Result<Self> {
        Err(Error::device_unavailable(format!(
            "SocketCAN interface {} requested but the socketcan feature is not enabled",
            interface
        )))
    }
}

impl BusTransport for FieldBus {
    async fn send(&self, frame: Frame) -> Result<()> {
        match self {
            FieldBus::Gateway(bus) => bus.send(frame).await,
            #[cfg(all(feature = "socketcan", target_os = "linux"))]
            FieldBus::SocketCan(bus) => bus.send(frame).await,
        }
    }

    async fn receive(&self) -> Result<Option<Frame>> {
        match self {
            FieldBus::Gateway(bus) => bus.receive().await,
            #[cfg(all(feature = "socketcan", target_os = "linux"))]
            FieldBus::SocketCan(bus) => bus.receive().await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            FieldBus::Gateway(bus) => bus.close().await,
            #[cfg(all(feature = "socketcan", target_os = "linux"))]
            FieldBus::SocketCan(bus) => bus.close().await,
        }
    }
}
