//! TLS setup: trust policy and connector assembly.

use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode};

use crate::base::neterror::NetError;

/// Certificate-validation strategy, selected per facade instance.
///
/// Load tests routinely target staging hosts with self-signed or otherwise
/// untrusted certificates, so the default accepts every chain and skips
/// hostname verification. That is a deliberate, documented trade-off for
/// controlled test environments; production-facing deployments must opt in
/// to [`TrustPolicy::Strict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustPolicy {
    /// Accept every certificate chain. Never produces a rejection.
    #[default]
    TrustAll,
    /// Verify the peer chain against the default trust store and check the
    /// hostname.
    Strict,
}

impl TrustPolicy {
    pub(crate) fn apply(self, builder: &mut SslConnectorBuilder) {
        match self {
            TrustPolicy::TrustAll => builder.set_verify(SslVerifyMode::NONE),
            TrustPolicy::Strict => builder.set_verify(SslVerifyMode::PEER),
        }
    }

    /// Whether hostname verification should run during the handshake.
    pub(crate) fn verify_hostname(self) -> bool {
        matches!(self, TrustPolicy::Strict)
    }
}

/// Assemble an `SslConnector` with the trust policy and ALPN protocol list.
pub(crate) fn build_connector(
    trust: TrustPolicy,
    alpn: Option<&[u8]>,
) -> Result<SslConnector, NetError> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;

    if let Some(protos) = alpn {
        builder
            .set_alpn_protos(protos)
            .map_err(|e| NetError::TlsHandshakeFailed(e.to_string()))?;
    }

    trust.apply(&mut builder);

    Ok(builder.build())
}
