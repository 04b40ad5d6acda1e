// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use lapin::tcp::{OwnedIdentity, OwnedTLSConfig};
use serde::Deserialize;

/// Client identity presented during the TLS handshake, as a PKCS#12 archive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsIdentity {
    pub der: Vec<u8>,
    pub password: String,
}

/// TLS settings for an encrypted broker connection.
///
/// An empty configuration still switches the connection to TLS, trusting the
/// platform's root certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TlsConfig {
    /// PEM encoded certificate chain trusted for the broker.
    #[serde(default)]
    pub cert_chain: Option<String>,
    #[serde(default)]
    pub identity: Option<TlsIdentity>,
}

impl From<&TlsConfig> for OwnedTLSConfig {
    fn from(cfg: &TlsConfig) -> Self {
        OwnedTLSConfig {
            identity: cfg.identity.as_ref().map(|identity| OwnedIdentity {
                der: identity.der.clone(),
                password: identity.password.clone(),
            }),
            cert_chain: cfg.cert_chain.clone(),
        }
    }
}
