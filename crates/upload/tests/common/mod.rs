//! Shared helpers for the upload integration tests: throwaway HTTP(S)
//! servers that capture one request, stub coders and tracked sources.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boxdrop_upload::{
    ClientIdentity, Coder, CoderResolver, ContentSource, CryptoError, EncryptionContext,
    ProgressCallback, ProgressEvent, SenderKey, SourceFuture, SourceReader, TransportConfig,
    UploadClient,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

/// Fresh self-signed client identity.
pub fn identity() -> ClientIdentity {
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec!["client.boxdrop.test".into()])
        .unwrap()
        .self_signed(&key)
        .unwrap();
    ClientIdentity::from_pem(key.serialize_pem(), cert.pem())
}

pub fn client_for(url: &str, temp_dir: &std::path::Path) -> UploadClient {
    UploadClient::new(TransportConfig::new(url, identity())).with_temp_dir(temp_dir)
}

fn self_signed_server_cert() -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec!["localhost".into()])
        .unwrap()
        .self_signed(&key)
        .unwrap();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()));
    (vec![cert.der().clone()], key_der)
}

// ---------------------------------------------------------------------------
// Mock servers
// ---------------------------------------------------------------------------

/// A request as seen by the mock server.
#[derive(Debug, Default)]
pub struct Captured {
    pub head: String,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// Header value, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }
}

/// What the mock server does after reading the request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Status line (e.g. `"200 OK"`) plus body.
    Status(&'static str, String),
    /// Redirect to another URL.
    Redirect(String),
    /// Keep the connection open without answering.
    Silent,
    /// Answer with this status right after the headers, without reading
    /// the body, then keep the connection open.
    Early(&'static str),
    /// Read the headers only and never answer.
    Stall,
}

pub fn ok(body: &str) -> Reply {
    Reply::Status("200 OK", body.to_string())
}

async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return Captured {
                head: String::from_utf8_lossy(&buf).into_owned(),
                body: Vec::new(),
            };
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    Captured {
        head: String::from_utf8_lossy(&buf[..header_end]).into_owned(),
        body: buf[header_end..].to_vec(),
    }
}

async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Captured {
    let mut captured = read_head(stream).await;
    let mut chunk = [0u8; 8192];
    let len: usize = captured
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while captured.body.len() < len {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        captured.body.extend_from_slice(&chunk[..n]);
    }
    captured
}

async fn respond<S: AsyncRead + AsyncWrite + Unpin>(mut stream: S, reply: Reply) -> Captured {
    match reply {
        Reply::Early(status) => {
            let captured = read_head(&mut stream).await;
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.flush().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
            return captured;
        }
        Reply::Stall => {
            let captured = read_head(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
            return captured;
        }
        _ => {}
    }

    let captured = read_request(&mut stream).await;

    let resp = match reply {
        Reply::Status(status, body) => format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
        Reply::Redirect(location) => format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ),
        Reply::Silent | Reply::Early(_) | Reply::Stall => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return captured;
        }
    };
    let _ = stream.write_all(resp.as_bytes()).await;
    let _ = stream.shutdown().await;
    captured
}

/// Starts a plain HTTP server that answers a single request.
///
/// Returns the endpoint URL (`http://127.0.0.1:<port>/upload`) and a handle
/// resolving to the captured request.
pub async fn serve_once(reply: Reply) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}/upload");

    let handle = tokio::spawn(async move {
        match listener.accept().await {
            Ok((stream, _)) => respond(stream, reply).await,
            Err(_) => Captured::default(),
        }
    });
    (url, handle)
}

/// Starts an HTTPS server with a fresh self-signed certificate.
///
/// The handle resolves to `None` when the TLS handshake fails.
pub async fn serve_tls_once(reply: Reply) -> (String, JoinHandle<Option<Captured>>) {
    let (certs, key) = self_signed_server_cert();
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("https://127.0.0.1:{port}/upload");

    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.ok()?;
        let tls = acceptor.accept(tcp).await.ok()?;
        Some(respond(tls, reply).await)
    });
    (url, handle)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

pub fn recording_progress() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let cb: ProgressCallback = Box::new(move |e| sink.lock().unwrap().push(e));
    (cb, events)
}

// ---------------------------------------------------------------------------
// Coders
// ---------------------------------------------------------------------------

/// XORs every byte with a key and appends a trailer, so ciphertext length
/// differs from plaintext length.
pub struct XorCoder(pub u8);

pub const XOR_TRAILER: &[u8] = b"--sealed--";

impl Coder for XorCoder {
    fn encrypt_stream(
        &self,
        plaintext: &mut dyn Read,
        ciphertext: &mut dyn Write,
    ) -> Result<(), CryptoError> {
        let mut buf = [0u8; 4096];
        loop {
            let n = plaintext.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let sealed: Vec<u8> = buf[..n].iter().map(|b| b ^ self.0).collect();
            ciphertext.write_all(&sealed)?;
        }
        ciphertext.write_all(XOR_TRAILER)?;
        Ok(())
    }
}

impl XorCoder {
    pub fn expected(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut out: Vec<u8> = plaintext.iter().map(|b| b ^ self.0).collect();
        out.extend_from_slice(XOR_TRAILER);
        out
    }
}

pub struct BrokenCoder;

impl Coder for BrokenCoder {
    fn encrypt_stream(
        &self,
        _plaintext: &mut dyn Read,
        _ciphertext: &mut dyn Write,
    ) -> Result<(), CryptoError> {
        Err(CryptoError::Coder("recipient key revoked".into()))
    }
}

pub struct StaticResolver(pub Option<Arc<dyn Coder>>);

impl CoderResolver for StaticResolver {
    fn encrypt_coder(
        &self,
        _server: &str,
        _sender: &SenderKey,
        _recipients: &[String],
    ) -> Option<Arc<dyn Coder>> {
        self.0.clone()
    }
}

pub fn encryption(coder: Option<Arc<dyn Coder>>) -> EncryptionContext {
    EncryptionContext::new(
        "beta.boxdrop.test",
        SenderKey::new("F00DFACE", b"sender-private-key".to_vec()),
        vec!["bob@beta.boxdrop.test".into()],
        Arc::new(StaticResolver(coder)),
    )
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// In-memory source whose readers flag when they are dropped.
pub struct TrackedSource {
    data: Vec<u8>,
    closed: Arc<AtomicBool>,
    opened: Arc<AtomicBool>,
}

impl TrackedSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            closed: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn was_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ContentSource for TrackedSource {
    fn length(&self) -> SourceFuture<'_, u64> {
        let len = self.data.len() as u64;
        Box::pin(async move { Ok(len) })
    }

    fn open(&self) -> SourceFuture<'_, SourceReader> {
        self.opened.store(true, Ordering::SeqCst);
        let reader = TrackedReader {
            inner: std::io::Cursor::new(self.data.clone()),
            closed: Arc::clone(&self.closed),
        };
        Box::pin(async move { Ok(Box::new(reader) as SourceReader) })
    }
}

struct TrackedReader {
    inner: std::io::Cursor<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Counts entries left in a directory.
pub fn dir_entries(path: &std::path::Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}
