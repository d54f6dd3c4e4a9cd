use super::{CacheClient, CacheEntry, ClientError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Longest key the memcached text protocol accepts
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest data block accepted in a `VALUE` reply (memcached's `-I` ceiling is 1 GiB)
pub const MAX_VALUE_LENGTH: usize = 128 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Text protocol requests issued by the client
#[derive(Debug, Clone, PartialEq)]
pub enum TextCommand {
    Get {
        key: String,
    },
    Set {
        key: String,
        flags: u32,
        exptime: u32,
        bytes: usize,
    },
    FlushAll,
    Version,
    Quit,
}

/// Text protocol replies the client understands
#[derive(Debug, Clone, PartialEq)]
pub enum TextResponse {
    Value {
        key: String,
        flags: u32,
        bytes: usize,
        data: Vec<u8>,
    },
    Stored,
    NotStored,
    Exists,
    NotFound,
    Ok,
    Error(String),
    ClientError(String),
    ServerError(String),
    Version(String),
    End,
}

impl TextCommand {
    /// Request line including the trailing CRLF
    pub fn encode(&self) -> String {
        match self {
            TextCommand::Get { key } => format!("get {}\r\n", key),
            TextCommand::Set {
                key,
                flags,
                exptime,
                bytes,
            } => format!("set {} {} {} {}\r\n", key, flags, exptime, bytes),
            TextCommand::FlushAll => "flush_all\r\n".to_string(),
            TextCommand::Version => "version\r\n".to_string(),
            TextCommand::Quit => "quit\r\n".to_string(),
        }
    }

    /// Check if this command expects a response
    pub fn expects_response(&self) -> bool {
        !matches!(self, TextCommand::Quit)
    }
}

impl TextResponse {
    /// Parse a reply line. `VALUE` headers come back with an empty data block.
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.starts_with("VALUE ") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return Err(ClientError::Protocol(format!(
                    "Invalid VALUE response: {}",
                    line
                )));
            }
            let key = parts[1].to_string();
            let flags = parts[2]
                .parse::<u32>()
                .map_err(|_| ClientError::Protocol("Invalid flags".to_string()))?;
            let bytes = parts[3]
                .parse::<usize>()
                .map_err(|_| ClientError::Protocol("Invalid bytes".to_string()))?;
            return Ok(TextResponse::Value {
                key,
                flags,
                bytes,
                data: Vec::new(),
            });
        }

        match line {
            "STORED" => Ok(TextResponse::Stored),
            "NOT_STORED" => Ok(TextResponse::NotStored),
            "EXISTS" => Ok(TextResponse::Exists),
            "NOT_FOUND" => Ok(TextResponse::NotFound),
            "OK" => Ok(TextResponse::Ok),
            "END" => Ok(TextResponse::End),
            _ if line.starts_with("CLIENT_ERROR") => Ok(TextResponse::ClientError(
                line.trim_start_matches("CLIENT_ERROR").trim().to_string(),
            )),
            _ if line.starts_with("SERVER_ERROR") => Ok(TextResponse::ServerError(
                line.trim_start_matches("SERVER_ERROR").trim().to_string(),
            )),
            _ if line.starts_with("ERROR") => Ok(TextResponse::Error(
                line.trim_start_matches("ERROR").trim().to_string(),
            )),
            _ if line.starts_with("VERSION ") => {
                let version = line.strip_prefix("VERSION ").unwrap_or("").to_string();
                Ok(TextResponse::Version(version))
            }
            _ => Err(ClientError::Protocol(format!("Unknown response: {}", line))),
        }
    }

    /// Turn an error reply into a `ClientError`, pass everything else through
    fn into_result(self) -> Result<Self, ClientError> {
        match self {
            TextResponse::Error(msg) => Err(ClientError::Protocol(format!(
                "server rejected command: ERROR {}",
                msg
            ))),
            TextResponse::ClientError(msg) => Err(ClientError::Protocol(format!(
                "CLIENT_ERROR {}",
                msg
            ))),
            TextResponse::ServerError(msg) => Err(ClientError::Server(msg)),
            other => Ok(other),
        }
    }
}

/// Reject keys the text protocol cannot carry
pub fn validate_key(key: &str) -> Result<(), ClientError> {
    if key.is_empty() {
        return Err(ClientError::InvalidKey("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ClientError::InvalidKey(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(ClientError::InvalidKey(format!(
            "key '{}' contains whitespace or control characters",
            key.escape_debug()
        )));
    }
    Ok(())
}

/// Optimize TCP socket for low latency
fn optimize_socket_for_latency(stream: &TcpStream) {
    let _ = stream.set_nodelay(true);

    let socket_ref = socket2::SockRef::from(stream);
    // 32KB buffers are plenty for single request/reply exchanges
    let _ = socket_ref.set_send_buffer_size(32768);
    let _ = socket_ref.set_recv_buffer_size(32768);
}

async fn open_stream(address: &str) -> Result<TcpStream, ClientError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => {
            optimize_socket_for_latency(&stream);
            debug!("Connected to memcached at {}", address);
            Ok(stream)
        }
        Ok(Err(e)) => Err(ClientError::ConnectionFailed(format!("{}: {}", address, e))),
        Err(_) => Err(ClientError::ConnectionFailed(format!(
            "Connection to {} timed out after 1s",
            address
        ))),
    }
}

async fn read_line(stream: &mut BufReader<TcpStream>) -> Result<String, ClientError> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await?;
    if n == 0 {
        return Err(ClientError::Io("Connection closed by server".to_string()));
    }
    Ok(line)
}

/// Read one reply, including the data block and `END` of a `VALUE`
async fn read_reply(stream: &mut BufReader<TcpStream>) -> Result<TextResponse, ClientError> {
    let line = read_line(stream).await?;

    match TextResponse::parse(&line)? {
        TextResponse::Value {
            key, flags, bytes, ..
        } => {
            let block_len = bytes
                .checked_add(2)
                .filter(|_| bytes <= MAX_VALUE_LENGTH)
                .ok_or_else(|| {
                    ClientError::Protocol(format!(
                        "VALUE for '{}' announces {} bytes, limit is {}",
                        key, bytes, MAX_VALUE_LENGTH
                    ))
                })?;
            let mut data = vec![0u8; block_len];
            stream.read_exact(&mut data).await?;
            if &data[bytes..] != b"\r\n" {
                return Err(ClientError::Protocol(format!(
                    "Data block for '{}' is not terminated by CRLF",
                    key
                )));
            }
            data.truncate(bytes);

            let terminator = read_line(stream).await?;
            if terminator.trim_end() != "END" {
                return Err(ClientError::Protocol(format!(
                    "Expected END after value, got: {}",
                    terminator.trim_end()
                )));
            }

            Ok(TextResponse::Value {
                key,
                flags,
                bytes,
                data,
            })
        }
        other => Ok(other),
    }
}

/// Async memcached client speaking the text protocol over one TCP connection.
///
/// `connect` only records the address; the socket is opened by the first
/// command and reopened after an I/O failure.
#[derive(Debug)]
pub struct TextProtocolClient {
    name: String,
    address: Option<String>,
    stream: Option<BufReader<TcpStream>>,
}

impl TextProtocolClient {
    pub fn new() -> Self {
        Self {
            name: "text".to_string(),
            address: None,
            stream: None,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Whether a socket is currently open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn stream(&mut self) -> Result<&mut BufReader<TcpStream>, ClientError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let address = self.address.as_deref().ok_or(ClientError::NotConnected)?;
                BufReader::new(open_stream(address).await?)
            }
        };
        Ok(self.stream.insert(stream))
    }

    /// Send one command (plus data block) and read its reply
    pub async fn execute(
        &mut self,
        command: &TextCommand,
        data: Option<&[u8]>,
    ) -> Result<TextResponse, ClientError> {
        let result = self.round_trip(command, data).await;
        // ConnectionFailed never stored a stream, so there is nothing to drop
        if matches!(
            result,
            Err(ClientError::Io(_)) | Err(ClientError::Protocol(_))
        ) {
            // Stream position is unknown now
            self.stream = None;
        }
        result?.into_result()
    }

    async fn round_trip(
        &mut self,
        command: &TextCommand,
        data: Option<&[u8]>,
    ) -> Result<TextResponse, ClientError> {
        let stream = self.stream().await?;
        let writer = stream.get_mut();

        writer.write_all(command.encode().as_bytes()).await?;
        if let Some(data) = data {
            writer.write_all(data).await?;
            writer.write_all(b"\r\n").await?;
        }
        writer.flush().await?;

        if command.expects_response() {
            read_reply(stream).await
        } else {
            Ok(TextResponse::Ok)
        }
    }

    /// Native write call: key, value, flags, expiration
    pub async fn set_with_flags(
        &mut self,
        key: &str,
        value: &[u8],
        flags: u32,
        exptime: u32,
    ) -> Result<bool, ClientError> {
        validate_key(key)?;
        let command = TextCommand::Set {
            key: key.to_string(),
            flags,
            exptime,
            bytes: value.len(),
        };

        match self.execute(&command, Some(value)).await? {
            TextResponse::Stored => Ok(true),
            TextResponse::NotStored | TextResponse::Exists | TextResponse::NotFound => Ok(false),
            other => Err(ClientError::Protocol(format!(
                "Unexpected reply to set: {:?}",
                other
            ))),
        }
    }

    pub async fn version(&mut self) -> Result<String, ClientError> {
        match self.execute(&TextCommand::Version, None).await? {
            TextResponse::Version(version) => Ok(version),
            other => Err(ClientError::Protocol(format!(
                "Unexpected reply to version: {:?}",
                other
            ))),
        }
    }
}

impl Default for TextProtocolClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for TextProtocolClient {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        let address = format!("{}:{}", host, port);
        debug!("Registered memcached server {}", address);
        self.address = Some(address);
        // A new server means the old socket is stale
        self.stream = None;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, ClientError> {
        validate_key(key)?;
        let command = TextCommand::Get {
            key: key.to_string(),
        };

        match self.execute(&command, None).await? {
            TextResponse::Value { key: reply_key, .. } if reply_key != key => {
                self.stream = None;
                Err(ClientError::Protocol(format!(
                    "Asked for '{}', server answered with '{}'",
                    key, reply_key
                )))
            }
            TextResponse::Value { data, .. } => Ok(Some(data)),
            TextResponse::End => Ok(None),
            other => Err(ClientError::Protocol(format!(
                "Unexpected reply to get: {:?}",
                other
            ))),
        }
    }

    async fn set(&mut self, entry: &CacheEntry<'_>) -> Result<bool, ClientError> {
        self.set_with_flags(entry.key, entry.value, 0, entry.expiration)
            .await
    }

    async fn flush(&mut self) -> Result<bool, ClientError> {
        let reply = self.execute(&TextCommand::FlushAll, None).await?;
        Ok(reply == TextResponse::Ok)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let writer = stream.get_mut();
        writer.write_all(TextCommand::Quit.encode().as_bytes()).await?;
        writer.flush().await?;
        writer.shutdown().await?;
        debug!("Closed connection to {}", self.address.as_deref().unwrap_or("?"));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
