use crate::error::ScpiError;
use log::{debug, warn};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Synchronous request/response link to an instrument.
///
/// Implementors only move text; everything SCPI-specific (error queues, value
/// parsing, validation) lives in the drivers on top.
pub trait Adapter {
    /// Send one command. The write termination is appended by the adapter.
    fn write(&mut self, command: &str) -> Result<(), ScpiError>;

    /// Read one reply with the read termination stripped.
    fn read(&mut self) -> Result<String, ScpiError>;

    fn query(&mut self, command: &str) -> Result<String, ScpiError> {
        self.write(command)?;
        self.read()
    }

    /// Query and parse a comma-separated list of numbers.
    fn query_values(&mut self, command: &str) -> Result<Vec<f64>, ScpiError> {
        let reply = self.query(command)?;
        parse_values(&reply)
    }
}

impl<T: Adapter + ?Sized> Adapter for Box<T> {
    fn write(&mut self, command: &str) -> Result<(), ScpiError> {
        (**self).write(command)
    }

    fn read(&mut self) -> Result<String, ScpiError> {
        (**self).read()
    }

    fn query(&mut self, command: &str) -> Result<String, ScpiError> {
        (**self).query(command)
    }

    fn query_values(&mut self, command: &str) -> Result<Vec<f64>, ScpiError> {
        (**self).query_values(command)
    }
}

pub(crate) fn parse_values(reply: &str) -> Result<Vec<f64>, ScpiError> {
    reply
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| ScpiError::Protocol(format!("cannot parse '{s}' as a number")))
        })
        .collect()
}

/// Timeouts and terminations for a [`TcpAdapter`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Timeout for a single reply; a blocking measurement must finish within it
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub read_termination: u8,
    pub write_termination: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            read_termination: b'\n',
            write_termination: "\n".to_string(),
        }
    }
}

/// Builder for [`TcpAdapter`].
///
/// ```no_run
/// use std::time::Duration;
/// use rusty_scpi::TcpAdapter;
///
/// let adapter = TcpAdapter::builder()
///     .address("192.168.1.20")
///     .port(5025)
///     .read_timeout(Duration::from_secs(120))
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Default)]
pub struct TcpAdapterBuilder {
    address: Option<String>,
    port: Option<u16>,
    config: ConnectionConfig,
}

impl TcpAdapterBuilder {
    pub fn address(mut self, addr: &str) -> Self {
        self.address = Some(addr.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the full connection configuration
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn read_termination(mut self, termination: u8) -> Self {
        self.config.read_termination = termination;
        self
    }

    pub fn write_termination(mut self, termination: &str) -> Self {
        self.config.write_termination = termination.to_string();
        self
    }

    pub fn build(self) -> Result<TcpAdapter, ScpiError> {
        let address = self
            .address
            .ok_or_else(|| ScpiError::InvalidAddress("address must be specified".to_string()))?;
        let port = self
            .port
            .ok_or_else(|| ScpiError::InvalidAddress("port must be specified".to_string()))?;

        let socket_addr: SocketAddr = (address.as_str(), port)
            .to_socket_addrs()
            .map_err(|_| ScpiError::InvalidAddress(format!("{address}:{port}")))?
            .next()
            .ok_or_else(|| ScpiError::InvalidAddress(format!("{address}:{port}")))?;

        debug!("Connecting to instrument at {socket_addr}");

        let stream = TcpStream::connect_timeout(&socket_addr, self.config.connect_timeout)
            .map_err(|e| {
                warn!("Failed to connect to {socket_addr}: {e}");
                ScpiError::io(format!("connecting to {socket_addr}"))(e)
            })?;

        stream
            .set_read_timeout(Some(self.config.read_timeout))
            .map_err(ScpiError::io("setting read timeout"))?;
        stream
            .set_write_timeout(Some(self.config.write_timeout))
            .map_err(ScpiError::io("setting write timeout"))?;
        stream
            .set_nodelay(true)
            .map_err(ScpiError::io("disabling Nagle"))?;

        let writer = stream
            .try_clone()
            .map_err(ScpiError::io("cloning socket"))?;

        debug!("Connected to {socket_addr}");

        Ok(TcpAdapter {
            reader: BufReader::new(stream),
            writer,
            config: self.config,
        })
    }
}

/// Raw SCPI socket, as exposed by LAN instruments and GPIB/LAN gateways (usually
/// port 5025).
pub struct TcpAdapter {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    config: ConnectionConfig,
}

impl TcpAdapter {
    pub fn new(addr: &str, port: u16) -> Result<Self, ScpiError> {
        Self::builder().address(addr).port(port).build()
    }

    pub fn builder() -> TcpAdapterBuilder {
        TcpAdapterBuilder::default()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Adapter for TcpAdapter {
    fn write(&mut self, command: &str) -> Result<(), ScpiError> {
        let mut frame = Vec::with_capacity(command.len() + self.config.write_termination.len());
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(self.config.write_termination.as_bytes());
        self.writer
            .write_all(&frame)
            .map_err(ScpiError::io(format!("writing '{command}'")))?;
        self.writer.flush().map_err(ScpiError::io("flushing socket"))
    }

    fn read(&mut self) -> Result<String, ScpiError> {
        let mut buf = Vec::new();
        let n = self
            .reader
            .read_until(self.config.read_termination, &mut buf)
            .map_err(ScpiError::io("reading reply"))?;
        if n == 0 {
            return Err(ScpiError::Protocol("connection closed by instrument".to_string()));
        }
        while buf
            .last()
            .is_some_and(|&b| b == self.config.read_termination || b == b'\r')
        {
            buf.pop();
        }
        match String::from_utf8(buf) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!("Reply contains non UTF-8 bytes, replacing them");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn parse_values_handles_padding_and_trailing_comma() {
        assert_eq!(parse_values(" 1.5, -2e-3 ,4,").unwrap(), vec![1.5, -2e-3, 4.0]);
        assert!(parse_values("").unwrap().is_empty());
        assert!(matches!(parse_values("1,abc"), Err(ScpiError::Protocol(_))));
    }

    #[test]
    fn builder_requires_address_and_port() {
        assert!(matches!(
            TcpAdapter::builder().port(5025).build(),
            Err(ScpiError::InvalidAddress(_))
        ));
        assert!(matches!(
            TcpAdapter::builder().address("127.0.0.1").build(),
            Err(ScpiError::InvalidAddress(_))
        ));
    }

    #[test]
    fn tcp_adapter_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut byte = [0u8; 1];
            while sock.read(&mut byte).unwrap() == 1 {
                received.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            sock.write_all(b"1,2,3\r\n").unwrap();
            String::from_utf8(received).unwrap()
        });

        let mut adapter = TcpAdapter::new("127.0.0.1", port).unwrap();
        let values = adapter.query_values(":DATA? 'IC'").unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(server.join().unwrap(), ":DATA? 'IC'\n");
    }
}
