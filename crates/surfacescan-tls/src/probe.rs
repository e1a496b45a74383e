//! Raw TLS handshake probes
//!
//! The auditor needs to know what the server *accepts*, not what a modern
//! client library would negotiate, so these probes speak the record layer
//! directly: one crafted ClientHello per question, then a look at the
//! ServerHello (or alert) that comes back. All functions here are blocking
//! and are run under `spawn_blocking` by the auditor.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::trace;

/// TLS record and handshake constants
pub mod wire {
    pub const CONTENT_TYPE_ALERT: u8 = 21;
    pub const CONTENT_TYPE_HANDSHAKE: u8 = 22;
    pub const CONTENT_TYPE_HEARTBEAT: u8 = 24;

    pub const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 1;
    pub const HANDSHAKE_TYPE_SERVER_HELLO: u8 = 2;
    pub const HANDSHAKE_TYPE_SERVER_HELLO_DONE: u8 = 14;

    pub const VERSION_SSL30: [u8; 2] = [0x03, 0x00];
    pub const VERSION_TLS10: [u8; 2] = [0x03, 0x01];
    pub const VERSION_TLS11: [u8; 2] = [0x03, 0x02];
    pub const VERSION_TLS12: [u8; 2] = [0x03, 0x03];
    pub const VERSION_TLS13: [u8; 2] = [0x03, 0x04];

    pub const EXT_SERVER_NAME: u16 = 0x0000;
    pub const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
    pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
    pub const EXT_HEARTBEAT: u16 = 0x000f;
    pub const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
    pub const EXT_KEY_SHARE: u16 = 0x0033;
    pub const EXT_RENEGOTIATION_INFO: u16 = 0xff01;

    /// Signals secure-renegotiation awareness without the extension
    pub const SCSV_RENEGOTIATION: u16 = 0x00ff;
}

/// TLS 1.2-and-below suites probed individually, with registry names.
/// Mixed weak and strong candidates; classification is by name pattern.
pub const TLS12_PROBE_SUITES: &[(u16, &str)] = &[
    // Weak families: null, export, DES, RC4, MD5, anonymous
    (0x0001, "TLS_RSA_WITH_NULL_MD5"),
    (0x0002, "TLS_RSA_WITH_NULL_SHA"),
    (0x0003, "TLS_RSA_EXPORT_WITH_RC4_40_MD5"),
    (0x0008, "TLS_RSA_EXPORT_WITH_DES40_CBC_SHA"),
    (0x0009, "TLS_RSA_WITH_DES_CBC_SHA"),
    (0x0004, "TLS_RSA_WITH_RC4_128_MD5"),
    (0x0005, "TLS_RSA_WITH_RC4_128_SHA"),
    (0x000a, "TLS_RSA_WITH_3DES_EDE_CBC_SHA"),
    (0x0018, "TLS_DH_ANON_WITH_RC4_128_MD5"),
    (0x0034, "TLS_DH_ANON_WITH_AES_128_CBC_SHA"),
    // Acceptable suites
    (0x002f, "TLS_RSA_WITH_AES_128_CBC_SHA"),
    (0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA"),
    (0x009e, "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256"),
    (0xc02b, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"),
    (0xc02c, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384"),
    (0xc02f, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"),
    (0xc030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384"),
];

/// TLS 1.3 suite registry names
pub const TLS13_SUITE_NAMES: &[(u16, &str)] = &[
    (0x1301, "TLS_AES_128_GCM_SHA256"),
    (0x1302, "TLS_AES_256_GCM_SHA384"),
    (0x1303, "TLS_CHACHA20_POLY1305_SHA256"),
];

/// Static-RSA key-exchange suites (the ROBOT precondition)
const STATIC_RSA_SUITES: &[u16] = &[0x002f, 0x0035, 0x000a, 0x003c, 0x009c, 0x009d];

/// Weak cipher name patterns: null/export/DES/RC4/MD5/anonymous families
const WEAK_CIPHER_PATTERNS: &[&str] = &["NULL", "EXPORT", "DES", "RC4", "MD5", "ANON", "ADH", "AECDH"];

/// Classify a cipher suite name as weak
pub fn is_weak_cipher(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    WEAK_CIPHER_PATTERNS.iter().any(|p| upper.contains(p))
}

/// Look up a registry name for a TLS 1.3 suite id
pub fn tls13_suite_name(id: u16) -> Option<&'static str> {
    TLS13_SUITE_NAMES
        .iter()
        .find(|(suite, _)| *suite == id)
        .map(|(_, name)| *name)
}

/// Parsed ServerHello, enough for probe decisions
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub version: [u8; 2],
    pub cipher_suite: u16,
    pub compression: u8,
    pub extensions: Vec<(u16, Vec<u8>)>,
}

impl ServerHello {
    pub fn extension(&self, ext_type: u16) -> Option<&[u8]> {
        self.extensions
            .iter()
            .find(|(t, _)| *t == ext_type)
            .map(|(_, data)| data.as_slice())
    }

    /// Effective negotiated version, honoring supported_versions
    pub fn negotiated_version(&self) -> [u8; 2] {
        if let Some(data) = self.extension(wire::EXT_SUPPORTED_VERSIONS) {
            if data.len() == 2 {
                return [data[0], data[1]];
            }
        }
        self.version
    }
}

/// Establish a TCP connection with read/write timeouts applied
pub fn connect_tcp(addr: &SocketAddr, timeout: Duration) -> Result<TcpStream, String> {
    let stream = TcpStream::connect_timeout(addr, timeout)
        .map_err(|e| format!("Connection failed: {}", e))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|e| format!("Failed to set read timeout: {}", e))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|e| format!("Failed to set write timeout: {}", e))?;
    Ok(stream)
}

/// Build a ClientHello record for the given version, suites, and extensions
pub fn build_client_hello(version: [u8; 2], cipher_suites: &[u16], extensions: &[u8]) -> Vec<u8> {
    build_client_hello_with_compression(version, cipher_suites, &[0x00], extensions)
}

/// ClientHello variant with explicit compression methods (CRIME probe)
pub fn build_client_hello_with_compression(
    version: [u8; 2],
    cipher_suites: &[u16],
    compression_methods: &[u8],
    extensions: &[u8],
) -> Vec<u8> {
    let mut hello = Vec::new();

    // Client version
    hello.extend_from_slice(&version);

    // Random (32 bytes); fixed content is fine for detection
    hello.extend_from_slice(&[0x5a; 32]);

    // Session ID length (0)
    hello.push(0);

    // Cipher suites
    let cs_len = (cipher_suites.len() * 2) as u16;
    hello.extend_from_slice(&cs_len.to_be_bytes());
    for cs in cipher_suites {
        hello.extend_from_slice(&cs.to_be_bytes());
    }

    // Compression methods
    hello.push(compression_methods.len() as u8);
    hello.extend_from_slice(compression_methods);

    // Extensions
    if !extensions.is_empty() {
        hello.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        hello.extend_from_slice(extensions);
    }

    // Handshake message
    let mut handshake = Vec::new();
    handshake.push(wire::HANDSHAKE_TYPE_CLIENT_HELLO);
    handshake.push(0);
    handshake.extend_from_slice(&(hello.len() as u16).to_be_bytes());
    handshake.extend_from_slice(&hello);

    // TLS record
    let mut record = Vec::new();
    record.push(wire::CONTENT_TYPE_HANDSHAKE);
    record.extend_from_slice(&version);
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);

    record
}

/// Append one extension (type, payload) to an extension buffer
fn push_extension(buf: &mut Vec<u8>, ext_type: u16, payload: &[u8]) {
    buf.extend_from_slice(&ext_type.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(payload);
}

/// server_name extension for the given hostname
fn sni_extension(host: &str) -> Vec<u8> {
    let name = host.as_bytes();
    let mut payload = Vec::new();
    payload.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
    payload.push(0x00); // host_name
    payload.extend_from_slice(&(name.len() as u16).to_be_bytes());
    payload.extend_from_slice(name);

    let mut ext = Vec::new();
    push_extension(&mut ext, wire::EXT_SERVER_NAME, &payload);
    ext
}

/// supported_groups + signature_algorithms, required by most modern stacks
fn modern_handshake_extensions() -> Vec<u8> {
    let mut ext = Vec::new();

    // x25519, secp256r1, secp384r1
    let groups: &[u16] = &[0x001d, 0x0017, 0x0018];
    let mut payload = Vec::new();
    payload.extend_from_slice(&((groups.len() * 2) as u16).to_be_bytes());
    for g in groups {
        payload.extend_from_slice(&g.to_be_bytes());
    }
    push_extension(&mut ext, wire::EXT_SUPPORTED_GROUPS, &payload);

    // rsa_pss_rsae_sha256, rsa_pkcs1_sha256, ecdsa_secp256r1_sha256, rsa_pkcs1_sha1
    let sigalgs: &[u16] = &[0x0804, 0x0401, 0x0403, 0x0201];
    let mut payload = Vec::new();
    payload.extend_from_slice(&((sigalgs.len() * 2) as u16).to_be_bytes());
    for s in sigalgs {
        payload.extend_from_slice(&s.to_be_bytes());
    }
    push_extension(&mut ext, wire::EXT_SIGNATURE_ALGORITHMS, &payload);

    ext
}

/// Default extension set for version/cipher probes
fn standard_extensions(host: &str) -> Vec<u8> {
    let mut ext = sni_extension(host);
    ext.extend_from_slice(&modern_handshake_extensions());
    ext
}

/// Broad cipher offer so that both legacy and modern stacks find a match
fn broad_cipher_offer() -> Vec<u16> {
    let mut suites: Vec<u16> = TLS12_PROBE_SUITES.iter().map(|(id, _)| *id).collect();
    suites.push(wire::SCSV_RENEGOTIATION);
    suites
}

/// Send a ClientHello and parse the first ServerHello in the response
fn exchange_hello(stream: &mut TcpStream, client_hello: &[u8]) -> Option<ServerHello> {
    stream.write_all(client_hello).ok()?;

    let mut buf = vec![0u8; 8192];
    let mut total = 0;
    // A ServerHello can arrive split across reads
    while total < buf.len() {
        match stream.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if let Some(hello) = parse_server_hello(&buf[..total]) {
                    return Some(hello);
                }
                if buf[0] == wire::CONTENT_TYPE_ALERT {
                    return None;
                }
            }
            Err(_) => break,
        }
    }
    parse_server_hello(&buf[..total])
}

/// Parse a ServerHello out of raw record data
pub fn parse_server_hello(data: &[u8]) -> Option<ServerHello> {
    if data.len() < 5 || data[0] != wire::CONTENT_TYPE_HANDSHAKE {
        return None;
    }
    let record_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    let hs = data.get(5..5 + record_len.min(data.len() - 5))?;
    if hs.len() < 4 || hs[0] != wire::HANDSHAKE_TYPE_SERVER_HELLO {
        return None;
    }
    let body_len = u32::from_be_bytes([0, hs[1], hs[2], hs[3]]) as usize;
    let body = hs.get(4..4 + body_len.min(hs.len() - 4))?;
    if body.len() < 38 {
        return None;
    }

    let version = [body[0], body[1]];
    let sid_len = body[34] as usize;
    let mut idx = 35 + sid_len;
    if body.len() < idx + 3 {
        return None;
    }
    let cipher_suite = u16::from_be_bytes([body[idx], body[idx + 1]]);
    let compression = body[idx + 2];
    idx += 3;

    let mut extensions = Vec::new();
    if body.len() >= idx + 2 {
        let ext_total = u16::from_be_bytes([body[idx], body[idx + 1]]) as usize;
        idx += 2;
        let end = (idx + ext_total).min(body.len());
        while idx + 4 <= end {
            let ext_type = u16::from_be_bytes([body[idx], body[idx + 1]]);
            let ext_len = u16::from_be_bytes([body[idx + 2], body[idx + 3]]) as usize;
            idx += 4;
            if idx + ext_len > end {
                break;
            }
            extensions.push((ext_type, body[idx..idx + ext_len].to_vec()));
            idx += ext_len;
        }
    }

    Some(ServerHello {
        version,
        cipher_suite,
        compression,
        extensions,
    })
}

/// Does the server accept the given legacy protocol version (SSL3-TLS1.2)?
/// Returns the cipher suite chosen by the server when it does.
pub fn probe_protocol_version(
    host: &str,
    addr: &SocketAddr,
    version: [u8; 2],
    timeout: Duration,
) -> Option<u16> {
    let mut stream = match connect_tcp(addr, timeout) {
        Ok(s) => s,
        Err(e) => {
            trace!(%host, ?version, "protocol probe connect failed: {}", e);
            return None;
        }
    };

    let hello = build_client_hello(version, &broad_cipher_offer(), &standard_extensions(host));
    let sh = exchange_hello(&mut stream, &hello)?;
    if sh.negotiated_version() == version {
        Some(sh.cipher_suite)
    } else {
        None
    }
}

/// Look up the registry name of a probed suite id
pub fn suite_name(id: u16) -> Option<&'static str> {
    TLS12_PROBE_SUITES
        .iter()
        .chain(TLS13_SUITE_NAMES.iter())
        .find(|(suite, _)| *suite == id)
        .map(|(_, name)| *name)
}

/// Does the server accept TLS 1.3? Returns the negotiated suite id when it does.
pub fn probe_tls13(host: &str, addr: &SocketAddr, timeout: Duration) -> Option<u16> {
    let mut stream = connect_tcp(addr, timeout).ok()?;

    let mut ext = standard_extensions(host);

    // supported_versions: TLS 1.3 only
    push_extension(&mut ext, wire::EXT_SUPPORTED_VERSIONS, &[0x02, 0x03, 0x04]);

    // key_share: x25519 with the curve base point as public value
    let mut key = [0u8; 32];
    key[0] = 0x09;
    let mut payload = Vec::new();
    payload.extend_from_slice(&36u16.to_be_bytes());
    payload.extend_from_slice(&0x001du16.to_be_bytes());
    payload.extend_from_slice(&32u16.to_be_bytes());
    payload.extend_from_slice(&key);
    push_extension(&mut ext, wire::EXT_KEY_SHARE, &payload);

    let suites: Vec<u16> = TLS13_SUITE_NAMES.iter().map(|(id, _)| *id).collect();
    let hello = build_client_hello(wire::VERSION_TLS12, &suites, &ext);

    // A HelloRetryRequest is still a ServerHello and still proves support
    let sh = exchange_hello(&mut stream, &hello)?;
    if sh.negotiated_version() == wire::VERSION_TLS13 {
        Some(sh.cipher_suite)
    } else {
        None
    }
}

/// Does the server accept SSL 2.0? Uses the SSLv2 record format.
pub fn probe_sslv2(addr: &SocketAddr, timeout: Duration) -> bool {
    let mut stream = match connect_tcp(addr, timeout) {
        Ok(s) => s,
        Err(_) => return false,
    };

    // SSLv2 CLIENT-HELLO: three export-grade cipher specs, 16-byte challenge
    let specs: &[[u8; 3]] = &[[0x01, 0x00, 0x80], [0x02, 0x00, 0x80], [0x07, 0x00, 0xc0]];
    let mut body = vec![
        0x01, // MSG-CLIENT-HELLO
        0x00, 0x02, // version SSL 2.0
        0x00, (specs.len() * 3) as u8, // cipher specs length
        0x00, 0x00, // session id length
        0x00, 0x10, // challenge length
    ];
    for spec in specs {
        body.extend_from_slice(spec);
    }
    body.extend_from_slice(&[0xaa; 16]);

    let mut msg = vec![0x80 | ((body.len() >> 8) as u8 & 0x7f), body.len() as u8];
    msg.extend_from_slice(&body);

    if stream.write_all(&msg).is_err() {
        return false;
    }

    let mut buf = [0u8; 1024];
    match stream.read(&mut buf) {
        // SSLv2 SERVER-HELLO: length header with msb set, type byte 0x04
        Ok(n) if n >= 3 => buf[0] & 0x80 != 0 && buf[2] == 0x04,
        _ => false,
    }
}

/// Is the single TLS 1.2 suite accepted?
pub fn probe_cipher_suite(host: &str, addr: &SocketAddr, suite: u16, timeout: Duration) -> bool {
    let mut stream = match connect_tcp(addr, timeout) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let hello = build_client_hello(wire::VERSION_TLS12, &[suite], &standard_extensions(host));
    match exchange_hello(&mut stream, &hello) {
        Some(sh) => sh.version == wire::VERSION_TLS12 && sh.cipher_suite == suite,
        None => false,
    }
}

/// Does the server select TLS-level compression (CRIME oracle)?
pub fn probe_compression(host: &str, addr: &SocketAddr, timeout: Duration) -> bool {
    let mut stream = match connect_tcp(addr, timeout) {
        Ok(s) => s,
        Err(_) => return false,
    };

    // Offer DEFLATE ahead of null
    let hello = build_client_hello_with_compression(
        wire::VERSION_TLS12,
        &broad_cipher_offer(),
        &[0x01, 0x00],
        &standard_extensions(host),
    );
    match exchange_hello(&mut stream, &hello) {
        Some(sh) => sh.compression == 0x01,
        None => false,
    }
}

/// Does the server advertise secure renegotiation?
/// `None` when no ServerHello could be obtained.
pub fn probe_secure_renegotiation(
    host: &str,
    addr: &SocketAddr,
    timeout: Duration,
) -> Option<bool> {
    let mut stream = connect_tcp(addr, timeout).ok()?;

    let hello = build_client_hello(
        wire::VERSION_TLS12,
        &broad_cipher_offer(),
        &standard_extensions(host),
    );
    let sh = exchange_hello(&mut stream, &hello)?;
    Some(sh.extension(wire::EXT_RENEGOTIATION_INFO).is_some())
}

/// Does the server accept static-RSA key exchange (ROBOT precondition)?
pub fn probe_static_rsa(host: &str, addr: &SocketAddr, timeout: Duration) -> bool {
    let mut stream = match connect_tcp(addr, timeout) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let hello = build_client_hello(
        wire::VERSION_TLS12,
        STATIC_RSA_SUITES,
        &standard_extensions(host),
    );
    match exchange_hello(&mut stream, &hello) {
        Some(sh) => STATIC_RSA_SUITES.contains(&sh.cipher_suite),
        None => false,
    }
}

/// Is the server vulnerable to the heartbeat memory-disclosure bug?
///
/// Sends a heartbeat request declaring a far larger payload than it
/// carries; a response echoing more than was sent proves the leak.
pub fn probe_heartbeat(host: &str, addr: &SocketAddr, timeout: Duration) -> bool {
    let mut stream = match connect_tcp(addr, timeout) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let mut ext = standard_extensions(host);
    // heartbeat extension, peer_allowed_to_send
    push_extension(&mut ext, wire::EXT_HEARTBEAT, &[0x01]);

    let hello = build_client_hello(wire::VERSION_TLS12, &broad_cipher_offer(), &ext);
    if stream.write_all(&hello).is_err() {
        return false;
    }

    // Drain the handshake up to ServerHelloDone
    let mut buf = vec![0u8; 16384];
    let mut total = 0;
    loop {
        match stream.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if contains_server_hello_done(&buf[..total]) || total >= buf.len() - 256 {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    if total == 0 {
        return false;
    }

    // Heartbeat request: declared payload 16384 bytes, carried 0
    let heartbeat = [
        wire::CONTENT_TYPE_HEARTBEAT,
        wire::VERSION_TLS12[0],
        wire::VERSION_TLS12[1],
        0x00,
        0x03, // record length
        0x01, // heartbeat_request
        0x40,
        0x00, // declared payload length 16384
    ];
    if stream.write_all(&heartbeat).is_err() {
        return false;
    }

    let mut response = vec![0u8; 65536];
    match stream.read(&mut response) {
        Ok(n) if n >= 5 => {
            if response[0] != wire::CONTENT_TYPE_HEARTBEAT {
                return false;
            }
            let length = u16::from_be_bytes([response[3], response[4]]) as usize;
            // We sent 3 bytes of heartbeat; anything bigger is leaked memory
            length > 16
        }
        _ => false,
    }
}

fn contains_server_hello_done(data: &[u8]) -> bool {
    let mut pos = 0;
    while pos + 5 < data.len() {
        let content_type = data[pos];
        let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        if content_type == wire::CONTENT_TYPE_HANDSHAKE && pos + 5 + length <= data.len() {
            // Walk handshake messages inside the record
            let mut hpos = pos + 5;
            let hend = pos + 5 + length;
            while hpos + 4 <= hend {
                if data[hpos] == wire::HANDSHAKE_TYPE_SERVER_HELLO_DONE {
                    return true;
                }
                let hlen = u32::from_be_bytes([0, data[hpos + 1], data[hpos + 2], data[hpos + 3]])
                    as usize;
                hpos += 4 + hlen;
            }
        }
        pos += 5 + length;
    }
    false
}
