//! SMTP submission over implicit TLS.
//!
//! TLS is negotiated right after the TCP connect, before the relay sends
//! its greeting, so no plaintext STARTTLS upgrade is ever attempted.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::campaign::message_builder::ComposedMessage;
use crate::config::RelaySettings;
use crate::domain::Credentials;
use crate::errors::Error;

use super::{Mailer, Stage, TransportCause, TransportError};

/// Delivers each message over its own implicit-TLS SMTP session.
pub struct SmtpsTransport {
    settings: RelaySettings,
    connector: TlsConnector,
}

impl SmtpsTransport {
    pub fn new(settings: RelaySettings) -> Result<Self, Error> {
        // Build a rustls connector with bundled webpki roots
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.into(),
        };

        let tls_config = ClientConfig::builder_with_provider(
            rustls::crypto::aws_lc_rs::default_provider().into(),
        )
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            settings,
            connector: TlsConnector::from(Arc::new(tls_config)),
        })
    }

    async fn open_tcp(&self) -> Result<TcpStream, TransportError> {
        let host = self.settings.host.as_str();
        let resolved = lookup_host((host, self.settings.port))
            .await
            .map_err(|e| TransportError::new(Stage::Connect, e))?
            .collect();
        let addrs = candidate_addrs(resolved, self.settings.prefer_ipv4);

        let mut last_error =
            io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {host}"));
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    log::debug!("Cannot connect to relay address {addr}: {e}");
                    last_error = e;
                }
            }
        }

        Err(TransportError::new(Stage::Connect, last_error))
    }

    async fn connect(&self) -> Result<TlsStream<TcpStream>, TransportError> {
        let connect_timeout = self.settings.connect_timeout();

        let tcp = timeout(connect_timeout, self.open_tcp())
            .await
            .map_err(|_| {
                TransportError::new(Stage::Connect, TransportCause::Timeout(connect_timeout))
            })??;

        // SNI / server name for TLS
        let server_name = ServerName::try_from(self.settings.host.clone()).map_err(|_| {
            TransportError::new(
                Stage::Tls,
                TransportCause::InvalidServerName(self.settings.host.clone()),
            )
        })?;

        timeout(connect_timeout, self.connector.connect(server_name, tcp))
            .await
            .map_err(|_| TransportError::new(Stage::Tls, TransportCause::Timeout(connect_timeout)))?
            .map_err(|e| TransportError::new(Stage::Tls, e))
    }
}

#[async_trait]
impl Mailer for SmtpsTransport {
    async fn deliver(
        &self,
        message: &ComposedMessage,
        credentials: &Credentials,
    ) -> Result<(), TransportError> {
        let mime = message
            .to_mime()
            .map_err(|e| TransportError::new(Stage::Body, e))?;

        let stream = self.connect().await?;
        let mut session = SmtpSession::new(stream, self.settings.command_timeout());
        session
            .send_mail(
                &self.settings.helo_name,
                credentials,
                &message.to_address,
                &mime,
            )
            .await
    }
}

#[derive(Debug)]
struct Reply {
    code: u16,
    text: String,
}

/// One SMTP dialogue over an already secured stream.
pub(crate) struct SmtpSession<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    /// Runs greeting, EHLO, AUTH PLAIN, MAIL FROM, RCPT TO, DATA, body and
    /// QUIT for a single recipient.
    pub(crate) async fn send_mail(
        &mut self,
        helo_name: &str,
        credentials: &Credentials,
        to_address: &str,
        mime: &[u8],
    ) -> Result<(), TransportError> {
        match self.transaction(helo_name, credentials, to_address, mime).await {
            Err(e) if matches!(e.cause, TransportCause::Rejected { .. }) => {
                // connection is still usable; say goodbye before dropping it
                let _ = self.quit().await;
                Err(e)
            }
            result => result,
        }
    }

    async fn transaction(
        &mut self,
        helo_name: &str,
        credentials: &Credentials,
        to_address: &str,
        mime: &[u8],
    ) -> Result<(), TransportError> {
        self.expect(Stage::Greeting, &[220]).await?;
        self.command(Stage::Ehlo, &format!("EHLO {helo_name}"), &[250])
            .await?;
        self.command(
            Stage::Auth,
            &format!("AUTH PLAIN {}", auth_plain(credentials)),
            &[235],
        )
        .await?;
        self.command(
            Stage::MailFrom,
            &format!("MAIL FROM:<{}>", credentials.sender_address),
            &[250],
        )
        .await?;
        self.command(Stage::RcptTo, &format!("RCPT TO:<{to_address}>"), &[250, 251])
            .await?;
        self.command(Stage::Data, "DATA", &[354]).await?;
        self.write(Stage::Body, &dot_stuff(mime)).await?;
        self.expect(Stage::Body, &[250]).await?;

        if let Err(e) = self.quit().await {
            log::warn!("Relay accepted the message but QUIT failed: {e}");
        }
        Ok(())
    }

    async fn quit(&mut self) -> Result<(), TransportError> {
        self.command(Stage::Quit, "QUIT", &[221]).await.map(|_| ())
    }

    async fn command(
        &mut self,
        stage: Stage,
        line: &str,
        accepted: &[u16],
    ) -> Result<Reply, TransportError> {
        match stage {
            Stage::Auth => log::debug!("> AUTH PLAIN <redacted>"),
            _ => log::debug!("> {line}"),
        }
        self.write(stage, format!("{line}\r\n").as_bytes()).await?;
        self.expect(stage, accepted).await
    }

    async fn write(&mut self, stage: Stage, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = &mut self.stream;
        let written = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        timeout(self.timeout, written)
            .await
            .map_err(|_| TransportError::new(stage, TransportCause::Timeout(self.timeout)))?
            .map_err(|e| TransportError::new(stage, e))
    }

    async fn expect(&mut self, stage: Stage, accepted: &[u16]) -> Result<Reply, TransportError> {
        let reply = timeout(self.timeout, self.read_reply())
            .await
            .map_err(|_| TransportError::new(stage, TransportCause::Timeout(self.timeout)))?
            .map_err(|cause| TransportError::new(stage, cause))?;
        log::debug!("< {} {}", reply.code, reply.text);

        if accepted.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(TransportError::new(
                stage,
                TransportCause::Rejected {
                    code: reply.code,
                    reply: reply.text,
                },
            ))
        }
    }

    /// Reads a possibly multi-line reply (`250-...` continued, `250 ...` last).
    async fn read_reply(&mut self) -> Result<Reply, TransportCause> {
        let mut text = String::new();
        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line).await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "relay closed the connection",
                )
                .into());
            }
            let line = line.trim_end_matches(['\r', '\n']);

            let code = line
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or_else(|| TransportCause::UnexpectedReply(line.to_owned()))?;

            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(line.get(4..).unwrap_or_default());

            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok(Reply { code, text });
            }
        }
    }
}

/// Keeps only IPv4 addresses when preferred and at least one is available.
fn candidate_addrs(mut addrs: Vec<SocketAddr>, prefer_ipv4: bool) -> Vec<SocketAddr> {
    if prefer_ipv4 && addrs.iter().any(SocketAddr::is_ipv4) {
        addrs.retain(SocketAddr::is_ipv4);
    }
    addrs
}

/// `AUTH PLAIN` payload: base64 of `\0address\0secret`.
fn auth_plain(credentials: &Credentials) -> String {
    general_purpose::STANDARD.encode(format!(
        "\0{}\0{}",
        credentials.sender_address, credentials.sender_secret
    ))
}

/// Normalises line endings to CRLF, doubles leading dots and appends the
/// terminating `.` line.
fn dot_stuff(mime: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(mime.len() + 16);
    let body = mime.strip_suffix(b"\n").unwrap_or(mime);
    if !body.is_empty() {
        for line in body.split(|byte| *byte == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{DuplexStream, duplex};

    fn credentials() -> Credentials {
        Credentials {
            sender_address: "me@example.com".into(),
            sender_secret: "app-password".into(),
        }
    }

    /// Scripted relay: answers each client line with the next reply and
    /// returns everything it received.
    async fn relay(stream: DuplexStream, rcpt_reply: &'static str) -> Vec<String> {
        let mut stream = BufReader::new(stream);
        let mut received = Vec::new();
        stream.write_all(b"220 relay.test ESMTP\r\n").await.unwrap();

        loop {
            let mut line = String::new();
            if stream.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_owned();
            let reply: &[u8] = if line.starts_with("EHLO") {
                b"250-relay.test\r\n250 AUTH PLAIN LOGIN\r\n"
            } else if line.starts_with("AUTH") {
                b"235 2.7.0 Accepted\r\n"
            } else if line.starts_with("MAIL FROM") {
                b"250 2.1.0 OK\r\n"
            } else if line.starts_with("RCPT TO") {
                rcpt_reply.as_bytes()
            } else if line == "DATA" {
                b"354 Go ahead\r\n"
            } else if line == "QUIT" {
                received.push(line);
                stream.write_all(b"221 2.0.0 Bye\r\n").await.unwrap();
                break;
            } else if line == "." {
                b"250 2.0.0 Queued\r\n"
            } else {
                received.push(line);
                continue;
            };
            received.push(line);
            stream.write_all(reply).await.unwrap();
        }
        received
    }

    #[tokio::test]
    async fn runs_commands_in_order() {
        let (client, server) = duplex(64 * 1024);
        let relay = tokio::spawn(relay(server, "250 2.1.5 OK\r\n"));

        let mut session = SmtpSession::new(client, Duration::from_secs(5));
        session
            .send_mail(
                "localhost",
                &credentials(),
                "ann@acme.test",
                b"Subject: Hi\r\n\r\nHello\r\n.hidden\r\n",
            )
            .await
            .unwrap();
        drop(session);

        let received = relay.await.unwrap();
        let auth = general_purpose::STANDARD.encode("\0me@example.com\0app-password");
        assert_eq!(
            received,
            vec![
                "EHLO localhost".to_owned(),
                format!("AUTH PLAIN {auth}"),
                "MAIL FROM:<me@example.com>".to_owned(),
                "RCPT TO:<ann@acme.test>".to_owned(),
                "DATA".to_owned(),
                "Subject: Hi".to_owned(),
                "".to_owned(),
                "Hello".to_owned(),
                "..hidden".to_owned(),
                ".".to_owned(),
                "QUIT".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn reports_recipient_rejection_stage() {
        let (client, server) = duplex(64 * 1024);
        let relay = tokio::spawn(relay(server, "550 5.1.1 No such user\r\n"));

        let mut session = SmtpSession::new(client, Duration::from_secs(5));
        let err = session
            .send_mail("localhost", &credentials(), "ghost@acme.test", b"Hi\r\n")
            .await
            .unwrap_err();
        drop(session);

        assert_eq!(err.stage, Stage::RcptTo);
        assert!(matches!(
            err.cause,
            TransportCause::Rejected { code: 550, .. }
        ));
        let received = relay.await.unwrap();
        assert!(!received.contains(&"DATA".to_owned()));
        assert_eq!(received.last().map(String::as_str), Some("QUIT"));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_relay_times_out() {
        let (client, _server) = duplex(1024);
        let mut session = SmtpSession::new(client, Duration::from_secs(30));

        let err = session
            .send_mail("localhost", &credentials(), "ann@acme.test", b"Hi\r\n")
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Greeting);
        assert!(matches!(err.cause, TransportCause::Timeout(_)));
    }

    fn local_relay(port: u16, connect_timeout_secs: u64) -> RelaySettings {
        RelaySettings {
            host: "127.0.0.1".into(),
            port,
            connect_timeout_secs,
            ..RelaySettings::default()
        }
    }

    fn message() -> ComposedMessage {
        ComposedMessage {
            from_name: "Harriet".into(),
            from_address: "me@example.com".into(),
            to_address: "ann@acme.test".into(),
            subject: "Hi".into(),
            html_body: "Hello".into(),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn refused_connection_fails_at_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = SmtpsTransport::new(local_relay(port, 5)).unwrap();
        let err = transport
            .deliver(&message(), &credentials())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Connect);
        assert!(matches!(err.cause, TransportCause::Io(_)));
    }

    #[tokio::test]
    async fn silent_tls_handshake_is_bounded() {
        // accepts TCP but never answers the ClientHello
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let idle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let transport = SmtpsTransport::new(local_relay(port, 1)).unwrap();
        let started = std::time::Instant::now();
        let err = transport
            .deliver(&message(), &credentials())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Tls);
        assert!(matches!(err.cause, TransportCause::Timeout(t) if t == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
        idle.abort();
    }

    #[test]
    fn prefers_ipv4_when_available() {
        let v4: SocketAddr = "192.0.2.10:465".parse().unwrap();
        let v6: SocketAddr = "[2001:db8::10]:465".parse().unwrap();

        assert_eq!(candidate_addrs(vec![v6, v4], true), vec![v4]);
        assert_eq!(candidate_addrs(vec![v6, v4], false), vec![v6, v4]);
        assert_eq!(candidate_addrs(vec![v6], true), vec![v6]);
    }

    #[test]
    fn stuffs_dots_and_terminates() {
        assert_eq!(dot_stuff(b"a\n.b\r\n"), b"a\r\n..b\r\n.\r\n".to_vec());
        assert_eq!(dot_stuff(b""), b".\r\n".to_vec());
    }
}
