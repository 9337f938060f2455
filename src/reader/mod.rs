use crate::config::Config;
use crate::metering_p1::listener::TelegramEvent;
use crate::metering_p1::TelegramParser;
use log::{debug, error, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, timeout};

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Unable to open {0}: {1}")]
    Connect(String, #[source] std::io::Error),
    #[error("Read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("No source configured")]
    NoSource,
}

#[derive(Debug, PartialEq)]
enum SourceEnd {
    /// Connection dropped or device went away, try again
    Closed,
    /// Regular file read to the end
    Finished,
}

/// Pulls bytes from the configured source and pushes them through one parser.
pub struct P1Reader {
    config: Config,
    parser: TelegramParser<UnboundedSender<TelegramEvent>>,
}

impl P1Reader {
    pub fn new(config: Config, sender: UnboundedSender<TelegramEvent>) -> Self {
        let mut parser = TelegramParser::dsmr(sender);
        parser.set_lenient_mode(config.lenient);
        return P1Reader { config, parser };
    }

    pub async fn start_thread(&mut self) {
        info!("Starting P1 reader");
        let reconnect_delay = Duration::from_secs(self.config.reconnect_delay);

        loop {
            match self.read_source().await {
                Ok(SourceEnd::Finished) => {
                    info!("P1 source read completely, stopping reader");
                    return;
                }
                Ok(SourceEnd::Closed) => warn!("P1 source closed"),
                Err(ReaderError::NoSource) => {
                    error!("No P1 source configured, stopping reader");
                    return;
                }
                Err(e) => error!("P1 source error: {}", e),
            }

            /* Whatever was in flight belongs to the old connection */
            self.parser.reset();

            if self.parser.listener().is_closed() {
                debug!("Nobody listens for telegrams anymore, stopping reader");
                return;
            }
            info!("Reconnecting in {}s", reconnect_delay.as_secs());
            sleep(reconnect_delay).await;
        }
    }

    async fn read_source(&mut self) -> Result<SourceEnd, ReaderError> {
        if let Some(host) = self.config.source.host.clone() {
            let addr = format!("{}:{}", host, self.config.source.port);
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| ReaderError::Connect(addr.clone(), e))?;
            info!("Connected to P1 bridge at {}", addr);
            self.pump(stream).await?;
            return Ok(SourceEnd::Closed);
        }

        if let Some(device) = self.config.source.device.clone() {
            let file = tokio::fs::File::open(&device)
                .await
                .map_err(|e| ReaderError::Connect(device.clone(), e))?;
            let regular = file.metadata().await?.is_file();
            info!("Reading P1 telegrams from {}", device);
            self.pump(file).await?;
            return Ok(if regular { SourceEnd::Finished } else { SourceEnd::Closed });
        }

        Err(ReaderError::NoSource)
    }

    async fn pump<R: AsyncRead + Unpin>(&mut self, mut source: R) -> Result<(), ReaderError> {
        let mut buf = vec![0u8; self.config.read_buffer.max(1)];
        let read_timeout = Duration::from_secs(self.config.read_timeout.max(1));

        loop {
            match timeout(read_timeout, source.read(&mut buf)).await {
                Err(_) => {
                    warn!("No data for {}s, resetting parser", read_timeout.as_secs());
                    self.parser.reset();
                }
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(n)) => {
                    if let Err(e) = self.parser.parse(&buf[..n]) {
                        error!("Parser failed: {}", e);
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use std::io::Write;

    fn file_config(path: &str) -> Config {
        Config {
            source: SourceConfig { host: None, port: 8088, device: Some(path.to_string()) },
            lenient: false,
            reconnect_delay: 1,
            read_timeout: 5,
            offline_threshold: 3,
            read_buffer: 7,
        }
    }

    #[tokio::test]
    async fn test_read_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let good = "/ISk5\\2MT382-1000\r\n\r\n1-0:1.8.1(00123.456*kWh)\r\n!7399\r\n";
        let bad = good.replace("7399", "0000");
        write!(file, "noise{}{}{}", good, bad, good).unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut reader = P1Reader::new(file_config(file.path().to_str().unwrap()), tx);
        reader.start_thread().await;
        drop(reader);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
        assert_eq!(events[2].as_ref().unwrap().objects[0].value(), "00123.456*kWh");
    }

    #[tokio::test]
    async fn test_missing_device() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut reader = P1Reader::new(file_config("/nonexistent/p1-device"), tx);
        let result = reader.read_source().await;
        assert!(matches!(result, Err(ReaderError::Connect(_, _))));
    }

    #[tokio::test]
    async fn test_no_source() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut config = file_config("unused");
        config.source.device = None;
        let mut reader = P1Reader::new(config, tx);
        reader.start_thread().await;
        assert!(matches!(reader.read_source().await, Err(ReaderError::NoSource)));
    }
}
