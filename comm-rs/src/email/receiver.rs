//! Inbound SMTP receiver
//!
//! Accept loop spawning one session per connection. Sessions run a
//! minimal command loop (HELO/EHLO, MAIL, RCPT, DATA, RSET, NOOP, QUIT)
//! with timeouts, a message size limit, and optional sender/recipient
//! validators. Each completed message gets a fresh queue id, is parsed
//! with mail-parser, has its text body stripped of quoted replies, and is
//! handed to the consumer channel. Session errors are logged and never
//! stop the listener.

use crate::config::ReceiverConfig;
use crate::error::{CommError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cleanup::strip_quoted;
use super::dns::domain_resolves;
use super::message::validate_email;

/// Timeout for reading a command line
const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for reading DATA content
const DATA_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum number of errors before disconnecting
const MAX_ERRORS: usize = 10;

pub type AddressValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One parsed inbound message.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    /// Queue id, fresh per message.
    pub id: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: Option<String>,
    /// Text body with quoted replies and signatures stripped.
    pub text: Option<String>,
    pub html: Option<String>,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Helo(String),
    Ehlo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommError::SmtpProtocol("empty command".to_string()));
        }

        let parts: Vec<&str> = line.splitn(2, ' ').collect();
        let command = parts[0].to_uppercase();
        let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

        match command.as_str() {
            "HELO" => Ok(Command::Helo(args.to_string())),
            "EHLO" => Ok(Command::Ehlo(args.to_string())),
            "MAIL" => Ok(Command::MailFrom(parse_path(args, "FROM:")?)),
            "RCPT" => Ok(Command::RcptTo(parse_path(args, "TO:")?)),
            "DATA" => Ok(Command::Data),
            "RSET" => Ok(Command::Rset),
            "NOOP" => Ok(Command::Noop),
            "QUIT" => Ok(Command::Quit),
            _ => Ok(Command::Unknown(command)),
        }
    }
}

fn parse_path(args: &str, prefix: &str) -> Result<String> {
    if !args.to_uppercase().starts_with(prefix) {
        return Err(CommError::SmtpProtocol(format!(
            "expected {}<address>",
            prefix
        )));
    }
    let address = args[prefix.len()..].trim();
    let address = address
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(address);
    Ok(address.to_string())
}

pub struct EmailReceiver {
    config: ReceiverConfig,
    listener: TcpListener,
    sender_validator: Option<AddressValidator>,
    recipient_validator: Option<AddressValidator>,
}

impl EmailReceiver {
    /// Bind the listener. Use a `:0` port in tests to get an ephemeral one.
    pub async fn bind(config: ReceiverConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        info!("SMTP receiver listening on {}", listener.local_addr()?);
        Ok(Self {
            config,
            listener,
            sender_validator: None,
            recipient_validator: None,
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn sender_validator(mut self, validator: AddressValidator) -> Self {
        self.sender_validator = Some(validator);
        self
    }

    pub fn recipient_validator(mut self, validator: AddressValidator) -> Self {
        self.recipient_validator = Some(validator);
        self
    }

    /// Accept connections until the channel closes or the task is dropped.
    pub async fn run(self, tx: mpsc::Sender<InboundEmail>) {
        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    debug!("New inbound SMTP connection from {}", addr);
                    let session = Session {
                        banner: self.banner(),
                        max_message_size: self.config.max_message_size,
                        validate_sender_dns: self.config.validate_sender_dns,
                        sender_validator: self.sender_validator.clone(),
                        recipient_validator: self.recipient_validator.clone(),
                        tx: tx.clone(),
                    };
                    tokio::spawn(async move {
                        if let Err(e) = session.handle(socket).await {
                            warn!("Inbound session error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    fn banner(&self) -> String {
        self.config
            .banner
            .clone()
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().to_string())
    }
}

struct Session {
    banner: String,
    max_message_size: usize,
    validate_sender_dns: bool,
    sender_validator: Option<AddressValidator>,
    recipient_validator: Option<AddressValidator>,
    tx: mpsc::Sender<InboundEmail>,
}

impl Session {
    async fn handle(self, socket: TcpStream) -> Result<()> {
        let (reader, mut writer) = socket.into_split();
        let mut reader = BufReader::new(reader);

        write_line(&mut writer, &format!("220 {} ESMTP", self.banner)).await?;

        let mut from: Option<String> = None;
        let mut to: Vec<String> = Vec::new();
        let mut error_count = 0;

        loop {
            let line = match timeout(COMMAND_TIMEOUT, read_line(&mut reader)).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => return Ok(()), // connection closed
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    write_line(&mut writer, "421 Timeout").await?;
                    return Ok(());
                }
            };

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    error_count += 1;
                    if error_count >= MAX_ERRORS {
                        write_line(&mut writer, "421 Too many errors").await?;
                        return Ok(());
                    }
                    write_line(&mut writer, &format!("500 {}", e)).await?;
                    continue;
                }
            };

            match command {
                Command::Helo(domain) | Command::Ehlo(domain) => {
                    debug!("Greeted by {}", domain);
                    write_line(&mut writer, &format!("250 {}", self.banner)).await?;
                }
                Command::MailFrom(address) => {
                    if let Err(e) = self.validate_sender(&address).await {
                        warn!("Rejected sender {}: {}", address, e);
                        write_line(&mut writer, "550 Sender rejected").await?;
                        continue;
                    }
                    from = Some(address);
                    to.clear();
                    write_line(&mut writer, "250 OK").await?;
                }
                Command::RcptTo(address) => {
                    if from.is_none() {
                        write_line(&mut writer, "503 MAIL first").await?;
                        continue;
                    }
                    if !self.validate_recipient(&address) {
                        warn!("Rejected recipient {}", address);
                        write_line(&mut writer, "550 Recipient rejected").await?;
                        continue;
                    }
                    to.push(address);
                    write_line(&mut writer, "250 OK").await?;
                }
                Command::Data => {
                    let Some(sender) = from.clone() else {
                        write_line(&mut writer, "503 MAIL first").await?;
                        continue;
                    };
                    if to.is_empty() {
                        write_line(&mut writer, "503 RCPT first").await?;
                        continue;
                    }
                    write_line(&mut writer, "354 End data with <CR><LF>.<CR><LF>").await?;

                    let raw = match timeout(
                        DATA_TIMEOUT,
                        read_data(&mut reader, self.max_message_size),
                    )
                    .await
                    {
                        Ok(Ok(raw)) => raw,
                        Ok(Err(e)) => {
                            write_line(&mut writer, &format!("552 {}", e)).await?;
                            from = None;
                            to.clear();
                            continue;
                        }
                        Err(_) => {
                            write_line(&mut writer, "421 Timeout").await?;
                            return Ok(());
                        }
                    };

                    let id = Uuid::new_v4().to_string();
                    match self.finish_message(id.clone(), sender, to.clone(), raw) {
                        Ok(email) => {
                            if self.tx.send(email).await.is_err() {
                                warn!("Inbound consumer dropped, discarding message");
                            }
                            write_line(&mut writer, &format!("250 OK queued as {}", id))
                                .await?;
                        }
                        Err(e) => {
                            // parse failures must not kill the listener
                            error!("Failed to parse inbound message: {}", e);
                            write_line(&mut writer, "451 Failed to process message").await?;
                        }
                    }
                    from = None;
                    to.clear();
                }
                Command::Rset => {
                    from = None;
                    to.clear();
                    write_line(&mut writer, "250 OK").await?;
                }
                Command::Noop => {
                    write_line(&mut writer, "250 OK").await?;
                }
                Command::Quit => {
                    write_line(&mut writer, "221 Bye").await?;
                    return Ok(());
                }
                Command::Unknown(command) => {
                    error_count += 1;
                    if error_count >= MAX_ERRORS {
                        write_line(&mut writer, "421 Too many errors").await?;
                        return Ok(());
                    }
                    write_line(&mut writer, &format!("502 {} not implemented", command))
                        .await?;
                }
            }
        }
    }

    async fn validate_sender(&self, address: &str) -> Result<()> {
        validate_email(address)?;
        if let Some(validator) = &self.sender_validator {
            if !validator(address) {
                return Err(CommError::InvalidEmail(address.to_string()));
            }
        }
        if self.validate_sender_dns {
            let domain = address.split('@').nth(1).unwrap_or_default();
            if !domain_resolves(domain).await {
                return Err(CommError::DnsLookup(domain.to_string()));
            }
        }
        Ok(())
    }

    fn validate_recipient(&self, address: &str) -> bool {
        if validate_email(address).is_err() {
            return false;
        }
        match &self.recipient_validator {
            Some(validator) => validator(address),
            None => true,
        }
    }

    fn finish_message(
        &self,
        id: String,
        from: String,
        to: Vec<String>,
        raw: Vec<u8>,
    ) -> Result<InboundEmail> {
        let parsed = mail_parser::MessageParser::default()
            .parse(&raw)
            .ok_or_else(|| CommError::Parse("unparseable message".to_string()))?;

        let subject = parsed.subject().map(|s| s.to_string());
        let text = parsed.body_text(0).map(|t| strip_quoted(&t));
        let html = parsed.body_html(0).map(|h| h.to_string());

        info!(
            "Received message {} from {} ({} recipient(s))",
            id,
            from,
            to.len()
        );
        Ok(InboundEmail {
            id,
            from,
            to,
            subject,
            text,
            html,
            raw,
        })
    }
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Read DATA content until the lone-dot terminator, enforcing the size
/// limit and undoing dot-stuffing.
async fn read_data(reader: &mut BufReader<OwnedReadHalf>, max_size: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(CommError::SmtpProtocol(
                "connection closed during DATA".to_string(),
            ));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "." {
            return Ok(data);
        }
        // undo dot-stuffing
        let content = if trimmed.starts_with("..") {
            &trimmed[1..]
        } else {
            trimmed
        };
        if data.len() + content.len() + 2 > max_size {
            return Err(CommError::SmtpProtocol("message too large".to_string()));
        }
        data.extend_from_slice(content.as_bytes());
        data.extend_from_slice(b"\r\n");
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    debug!("> {}", line);
    writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helo() {
        let cmd = Command::parse("HELO example.com").unwrap();
        assert_eq!(cmd, Command::Helo("example.com".to_string()));
    }

    #[test]
    fn test_parse_mail_from() {
        let cmd = Command::parse("MAIL FROM:<sender@example.com>").unwrap();
        assert_eq!(cmd, Command::MailFrom("sender@example.com".to_string()));
    }

    #[test]
    fn test_parse_rcpt_to() {
        let cmd = Command::parse("RCPT TO:<recipient@example.com>").unwrap();
        assert_eq!(cmd, Command::RcptTo("recipient@example.com".to_string()));
    }

    #[test]
    fn test_parse_rejects_bad_mail_syntax() {
        assert!(Command::parse("MAIL <x@y.z>").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let cmd = Command::parse("VRFY someone").unwrap();
        assert_eq!(cmd, Command::Unknown("VRFY".to_string()));
    }
}
