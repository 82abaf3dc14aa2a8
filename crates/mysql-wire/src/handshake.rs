//! Handshake packets: the server greeting, the SSL request, the handshake
//! response, and the mid-auth server messages.

use crate::prelude::*;

use crate::capability::{Capabilities, StatusFlags};
use crate::error::{ProtocolError, Result};
use crate::io::{PayloadReader, PayloadWriter};
use crate::version::ServerVersion;

/// Authentication plugin assumed when the server does not name one.
pub const DEFAULT_AUTH_PLUGIN: &str = "mysql_native_password";

/// Maximum packet size advertised in the handshake response (1 GiB).
pub const MAX_ALLOWED_PACKET: u32 = 1 << 30;

/// Parsed Initial Handshake Packet (protocol version 10).
#[derive(Debug, Clone, PartialEq)]
pub struct InitialHandshake {
    /// Parsed server version banner.
    pub server_version: ServerVersion,
    /// Server-assigned connection (thread) id, the KILL QUERY target.
    pub connection_id: u32,
    /// Full scramble: 8-byte part one plus the extended part two.
    pub scramble: Vec<u8>,
    /// Capabilities offered by the server.
    pub capabilities: Capabilities,
    /// Server default collation.
    pub charset: u8,
    /// Server status at connect time.
    pub status: StatusFlags,
    /// Authentication plugin the server wants the client to start with.
    pub auth_plugin: String,
}

impl InitialHandshake {
    /// Parse the server greeting payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);

        let protocol_version = reader.read_u8("handshake protocol version")?;
        if protocol_version != 10 {
            return Err(ProtocolError::UnsupportedProtocolVersion(protocol_version));
        }

        let banner = reader.read_nul_str("handshake server version")?;
        let connection_id = reader.read_u32_le("handshake connection id")?;

        let mut scramble = reader.read_bytes(8, "handshake scramble part 1")?.to_vec();
        reader.skip(1, "handshake filler")?;

        let caps_low = reader.read_u16_le("handshake capabilities low")?;

        // Everything past this point is optional for ancient servers.
        let charset = reader.read_u8("handshake charset").unwrap_or(0);
        let status = StatusFlags::from_bits_retain(
            reader.read_u16_le("handshake status").unwrap_or(0),
        );
        let caps_high = reader.read_u16_le("handshake capabilities high").unwrap_or(0);
        let capabilities = Capabilities::from_halves(caps_low, caps_high);

        let scramble_len = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            reader.read_u8("handshake scramble length")? as usize
        } else {
            reader.skip(1, "handshake scramble length filler")?;
            0
        };

        reader.skip(10, "handshake reserved")?;

        if capabilities.contains(Capabilities::SECURE_CONNECTION) {
            // Part two is max(13, scramble_len - 8) bytes, nul-padded.
            let part2_len = core::cmp::max(13, scramble_len.saturating_sub(8));
            let part2 = reader.read_bytes(part2_len, "handshake scramble part 2")?;
            let part2 = match part2.last() {
                Some(0) => &part2[..part2.len() - 1],
                _ => part2,
            };
            scramble.extend_from_slice(part2);
        }

        let auth_plugin = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            // Some servers omit the trailing nul on the plugin name.
            match reader.read_nul_str("handshake auth plugin") {
                Ok(name) => name,
                Err(ProtocolError::UnexpectedEof { .. }) => reader.read_rest_str(),
                Err(e) => return Err(e),
            }
        } else {
            DEFAULT_AUTH_PLUGIN.to_owned()
        };

        Ok(Self {
            server_version: ServerVersion::parse(&banner),
            connection_id,
            scramble,
            capabilities,
            charset,
            status,
            auth_plugin,
        })
    }
}

/// SSL Request Packet: the truncated handshake response sent before the
/// TLS handshake when CLIENT_SSL is negotiated.
#[derive(Debug, Clone, Copy)]
pub struct SslRequest {
    /// Capabilities the client will claim (must include SSL).
    pub capabilities: Capabilities,
    /// Maximum packet size the client accepts.
    pub max_packet_size: u32,
    /// Collation requested by the client.
    pub charset: u8,
}

impl SslRequest {
    /// Encode the SSL request payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PayloadWriter::with_capacity(32);
        w.write_u32_le(self.capabilities.bits());
        w.write_u32_le(self.max_packet_size);
        w.write_u8(self.charset);
        w.write_zeros(23);
        w.freeze().to_vec()
    }
}

/// Handshake Response Packet (protocol 4.1 layout).
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// Capabilities the client claims.
    pub capabilities: Capabilities,
    /// Maximum packet size the client accepts.
    pub max_packet_size: u32,
    /// Collation requested by the client.
    pub charset: u8,
    /// User name.
    pub username: String,
    /// Opaque auth response produced by the active plugin.
    pub auth_response: Vec<u8>,
    /// Initial database, sent when CONNECT_WITH_DB is claimed.
    pub database: Option<String>,
    /// Plugin the auth response was produced by.
    pub auth_plugin: Option<String>,
    /// Connection attributes, sent when CONNECT_ATTRS is claimed.
    pub attributes: Vec<(String, String)>,
}

impl HandshakeResponse {
    /// Encode the handshake response payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let caps = self.capabilities;
        let mut w = PayloadWriter::with_capacity(128);

        w.write_u32_le(caps.bits());
        w.write_u32_le(self.max_packet_size);
        w.write_u8(self.charset);
        w.write_zeros(23);
        w.write_nul_str(&self.username);

        if caps.contains(Capabilities::PLUGIN_AUTH_LENENC_DATA) {
            w.write_lenenc_bytes(&self.auth_response);
        } else if caps.contains(Capabilities::SECURE_CONNECTION) {
            #[allow(clippy::cast_possible_truncation)]
            w.write_u8(self.auth_response.len() as u8);
            w.write_bytes(&self.auth_response);
        } else {
            w.write_bytes(&self.auth_response);
            w.write_u8(0);
        }

        if caps.contains(Capabilities::CONNECT_WITH_DB) {
            w.write_nul_str(self.database.as_deref().unwrap_or(""));
        }

        if caps.contains(Capabilities::PLUGIN_AUTH) {
            w.write_nul_str(self.auth_plugin.as_deref().unwrap_or(""));
        }

        if caps.contains(Capabilities::CONNECT_ATTRS) {
            let mut attrs = PayloadWriter::new();
            for (key, value) in &self.attributes {
                attrs.write_lenenc_str(key);
                attrs.write_lenenc_str(value);
            }
            w.write_lenenc_bytes(attrs.as_bytes());
        }

        w.freeze().to_vec()
    }
}

/// AuthSwitchRequest: the server asks the client to restart authentication
/// with a different plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSwitchRequest {
    /// Plugin to switch to.
    pub plugin_name: String,
    /// Fresh challenge for the new plugin.
    pub plugin_data: Vec<u8>,
}

impl AuthSwitchRequest {
    /// Parse an auth switch payload, including the 0xFE header byte.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        if reader.read_u8("auth switch header")? != 0xFE {
            return Err(ProtocolError::Malformed("auth switch header byte"));
        }
        let plugin_name = reader.read_nul_str("auth switch plugin name")?;
        let mut plugin_data = reader.read_rest().to_vec();
        // Servers append a trailing nul to the challenge.
        if plugin_data.last() == Some(&0) {
            plugin_data.pop();
        }
        Ok(Self {
            plugin_name,
            plugin_data,
        })
    }
}

/// AuthMoreData: continuation bytes fed to the active plugin (0x01 header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMoreData {
    /// Opaque continuation payload for the plugin.
    pub data: Vec<u8>,
}

impl AuthMoreData {
    /// Parse an auth-more-data payload, including the 0x01 header byte.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        if reader.read_u8("auth more data header")? != 0x01 {
            return Err(ProtocolError::Malformed("auth more data header byte"));
        }
        Ok(Self {
            data: reader.read_rest().to_vec(),
        })
    }
}
