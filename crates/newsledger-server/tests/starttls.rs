//! TLS over an in-memory connection with throwaway certificates:
//! STARTTLS, implicit TLS and client certificate login.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rcgen::{
    BasicConstraints, CertificateParams, CertifiedIssuer, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream,
};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use newsledger_core::Spool;
use newsledger_nntp::GroupName;
use newsledger_server::{
    CertFpMap, ConfigHandle, RunConfig, Server, UserPriv, cert_fingerprint,
};

struct Conn<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Conn<S> {
    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.stream.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_owned()
    }

    async fn cmd(&mut self, line: &str) -> String {
        self.stream
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
        self.stream.flush().await.unwrap();
        self.line().await
    }

    async fn body(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            if line == "." {
                return lines;
            }
            lines.push(line);
        }
    }
}

fn certificate() -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let key = KeyPair::generate().unwrap();
    let params = CertificateParams::new(vec!["localhost".to_owned()]).unwrap();
    let cert = params.self_signed(&key).unwrap();
    (cert.der().clone(), key_der(&key))
}

fn key_der(key: &KeyPair) -> PrivateKeyDer<'static> {
    PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()))
}

/// A client certificate for `carol` issued by a fresh authority. Returns
/// the authority's certificate, the client's and the client's key.
fn client_certificate() -> (
    CertificateDer<'static>,
    CertificateDer<'static>,
    PrivateKeyDer<'static>,
) {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    let ca = CertifiedIssuer::self_signed(ca_params, KeyPair::generate().unwrap()).unwrap();

    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["carol.example.org".to_owned()]).unwrap();
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    let cert = params.signed_by(&key, &*ca).unwrap();
    (ca.der().clone(), cert.der().clone(), key_der(&key))
}

fn client_config(server_cert: CertificateDer<'static>) -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(server_cert).unwrap();
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

async fn spool() -> Arc<Spool> {
    let spool = Arc::new(Spool::default());
    let group = GroupName::parse(b"misc.test").unwrap();
    spool.create_group(&group, "Testing", true).await;
    spool
}

/// Serves one connection and returns the server with the client end.
async fn serve(config: RunConfig) -> (Server, DuplexStream) {
    let server = Server::new(spool().await, ConfigHandle::new(config));
    let (client, served) = tokio::io::duplex(64 * 1024);
    let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    server.serve_connection(served, peer);
    (server, client)
}

async fn handshake(
    client: rustls::ClientConfig,
    io: DuplexStream,
) -> Conn<TlsStream<DuplexStream>> {
    let connector = TlsConnector::from(Arc::new(client));
    let name = ServerName::try_from("localhost").unwrap();
    let tls = connector.connect(name, io).await.unwrap();
    Conn {
        stream: BufReader::new(tls),
    }
}

#[tokio::test]
async fn test_starttls_upgrade() {
    let (cert, key) = certificate();
    let server_tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .unwrap();
    let config = RunConfig::builder().tls(Arc::new(server_tls)).build();
    let (_server, client) = serve(config).await;

    let mut plain = Conn {
        stream: BufReader::new(client),
    };
    assert!(plain.line().await.starts_with("200 "));
    assert!(plain.cmd("CAPABILITIES").await.starts_with("101 "));
    assert!(plain.body().await.iter().any(|c| c == "STARTTLS"));
    assert!(plain.cmd("GROUP misc.test").await.starts_with("211 "));
    assert!(plain.cmd("STARTTLS").await.starts_with("382 "));

    let mut secure = handshake(client_config(cert), plain.stream.into_inner()).await;

    assert!(secure.cmd("CAPABILITIES").await.starts_with("101 "));
    assert!(!secure.body().await.iter().any(|c| c == "STARTTLS"));
    assert!(secure.cmd("STARTTLS").await.starts_with("502 "));
    // selection does not survive the upgrade
    assert!(secure.cmd("ARTICLE").await.starts_with("412 "));
    assert!(secure.cmd("QUIT").await.starts_with("205 "));
}

#[tokio::test]
async fn test_implicit_tls() {
    let (cert, key) = certificate();
    let server_tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .unwrap();
    let config = RunConfig::builder()
        .tls(Arc::new(server_tls))
        .implicit_tls(true)
        .build();
    let (_server, client) = serve(config).await;

    // the handshake comes first; the greeting arrives encrypted
    let mut secure = handshake(client_config(cert), client).await;
    assert!(secure.line().await.starts_with("200 "));
    assert!(secure.cmd("CAPABILITIES").await.starts_with("101 "));
    let caps = secure.body().await;
    assert!(caps.iter().any(|c| c.starts_with("READER")));
    assert!(!caps.iter().any(|c| c == "STARTTLS"));
    assert!(secure.cmd("STARTTLS").await.starts_with("502 "));
    assert!(secure.cmd("GROUP misc.test").await.starts_with("211 "));
}

#[tokio::test]
async fn test_client_certificate_login() {
    let (cert, key) = certificate();
    let (authority, client_cert, client_key) = client_certificate();
    let mut roots = rustls::RootCertStore::empty();
    roots.add(authority).unwrap();
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .allow_unauthenticated()
        .build()
        .unwrap();
    let server_tls = Arc::new(
        rustls::ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(vec![cert.clone()], key)
            .unwrap(),
    );

    let mut known = CertFpMap::new();
    known
        .insert(cert_fingerprint(client_cert.as_ref()), "carol", UserPriv::ALL)
        .unwrap();
    let config = RunConfig::builder()
        .default_priv(UserPriv::NONE)
        .tls(server_tls)
        .implicit_tls(true)
        .tls_priv(UserPriv::NONE)
        .cert_fp(Arc::new(known))
        .cert_fp_auto_auth(true)
        .build();

    // without a certificate the session stays anonymous
    let (_server, client) = serve(config.clone()).await;
    let mut anonymous = handshake(client_config(cert.clone()), client).await;
    assert!(anonymous.line().await.starts_with("201 "));
    assert!(anonymous.cmd("GROUP misc.test").await.starts_with("480 "));

    let (_server, client) = serve(config).await;
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert).unwrap();
    let with_cert = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(vec![client_cert], client_key)
        .unwrap();
    let mut carol = handshake(with_cert, client).await;
    assert!(carol.line().await.starts_with("200 "));
    assert!(carol.cmd("GROUP misc.test").await.starts_with("211 "));
    assert!(carol.cmd("AUTHINFO USER carol").await.starts_with("502 "));
}

#[tokio::test]
async fn test_starttls_handshake_failure() {
    let (cert, key) = certificate();
    let server_tls = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    let config = RunConfig::builder().tls(Arc::new(server_tls)).build();
    let (server, client) = serve(config).await;

    let mut plain = Conn {
        stream: BufReader::new(client),
    };
    assert!(plain.line().await.starts_with("200 "));
    assert!(plain.cmd("STARTTLS").await.starts_with("382 "));
    plain
        .stream
        .write_all(b"GROUP misc.test\r\nthis is not a client hello\r\n")
        .await
        .unwrap();
    plain.stream.flush().await.unwrap();

    // the server may send an alert, then closes
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), plain.stream.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(!String::from_utf8_lossy(&rest).contains("211 "));

    tokio::time::timeout(Duration::from_secs(5), server.shutdown())
        .await
        .unwrap();
}
