//! Serial radio modem link
//!
//! Talks to an AT-style LoRa modem over a serial port. The modem owns the
//! physical framing; on this side every message is one line. Received
//! lines of the form `+RCV=<rssi>,<snr>,<payload>` carry the modem's
//! reception metrics; anything else is treated as a bare payload with no
//! quality attached.
//!
//! Reader and writer tasks bridge the async port to bounded queues so the
//! engine-facing `try_send`/`try_receive` never block.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};

use lora_proto::LinkQuality;

use crate::error::{LoraSrvError, Result};

use super::ChannelLink;

/// Frames buffered in each direction before `try_send` starts refusing
const QUEUE_DEPTH: usize = 64;

/// Line-framed serial link to the radio modem
pub struct SerialModemLink {
    device: String,
    baud_rate: u32,
    outbound: Option<mpsc::Sender<Bytes>>,
    inbound: Option<mpsc::Receiver<(Bytes, LinkQuality)>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SerialModemLink {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            outbound: None,
            inbound: None,
            tasks: Vec::new(),
        }
    }
}

#[async_trait]
impl ChannelLink for SerialModemLink {
    async fn open(&mut self) -> Result<()> {
        let port = tokio_serial::new(self.device.as_str(), self.baud_rate)
            .open_native_async()
            .map_err(|e| {
                LoraSrvError::channel(format!("failed to open {}: {e}", self.device))
            })?;
        info!("serial modem opened: {} @{}baud", self.device, self.baud_rate);

        let (reader, mut writer) = tokio::io::split(port);
        let (in_tx, in_rx) = mpsc::channel(QUEUE_DEPTH);
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(QUEUE_DEPTH);

        let read_task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let (payload, quality) = parse_modem_line(line);
                        if in_tx.send((payload, quality)).await.is_err() {
                            break;
                        }
                    },
                    Ok(None) => {
                        warn!("serial modem closed the read side");
                        break;
                    },
                    Err(e) => {
                        error!("serial read error: {e}");
                        break;
                    },
                }
            }
        });

        let write_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let result = async {
                    writer.write_all(&frame).await?;
                    writer.write_all(b"\r\n").await?;
                    writer.flush().await
                }
                .await;
                match result {
                    Ok(()) => debug!("serial TX: {}B", frame.len()),
                    Err(e) => {
                        error!("serial write error: {e}");
                        break;
                    },
                }
            }
        });

        self.outbound = Some(out_tx);
        self.inbound = Some(in_rx);
        self.tasks = vec![read_task, write_task];
        Ok(())
    }

    fn try_send(&mut self, frame: Bytes) -> bool {
        match &self.outbound {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    fn try_receive(&mut self) -> Option<(Bytes, LinkQuality)> {
        self.inbound.as_mut()?.try_recv().ok()
    }

    async fn shutdown(&mut self) -> Result<()> {
        // dropping the sender ends the writer task once its queue drains;
        // the reader is parked on the port and has to be aborted
        self.outbound = None;
        self.inbound = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("serial modem link closed: {}", self.device);
        Ok(())
    }
}

/// Split a modem line into payload bytes and reception quality.
fn parse_modem_line(line: &str) -> (Bytes, LinkQuality) {
    if let Some(rest) = line.strip_prefix("+RCV=") {
        let mut parts = rest.splitn(3, ',');
        if let (Some(rssi), Some(snr), Some(payload)) = (parts.next(), parts.next(), parts.next()) {
            let quality = LinkQuality {
                rssi: rssi.trim().parse().ok(),
                snr: snr.trim().parse().ok(),
            };
            return (Bytes::from(payload.trim().to_string()), quality);
        }
    }
    (Bytes::from(line.to_string()), LinkQuality::default())
}
