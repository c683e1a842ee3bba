//! Version/mode dispatcher: resolves protocol version, settlement mode,
//! and canonical network before a request ever reaches the verifier.
//!
//! Adapting a resolved v2 response back into the v1 wire shape is an HTTP
//! boundary concern and lives in the facilitator binary's handlers, not here.

use std::sync::Arc;

use x402x_types::{NetworkRegistry, PaymentInvalidReason, PaymentRequirements};

/// The complete set of `(version, mode)` combinations this facilitator
/// ever routes a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Protocol v1, direct `transferWithAuthorization`, no router.
    V1Standard,
    /// Protocol v1, pull-and-hook through a `SettlementRouter`.
    V1Router,
    /// Protocol v2, pull-and-hook through a `SettlementRouter`.
    V2Router,
}

/// Per-deployment version acceptance policy (`FACILITATOR_ENABLE_V2`).
#[derive(Debug, Clone, Copy)]
pub struct VersionPolicy {
    /// Whether v2 requests are served at all.
    pub v2_enabled: bool,
    /// Whether v1 requests are rejected as deprecated.
    pub v1_deprecated: bool,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self { v2_enabled: true, v1_deprecated: false }
    }
}

/// A request resolved to a canonical network and a concrete `(version, mode)`.
#[derive(Debug, Clone)]
pub struct DispatchedRequest {
    /// The resolved protocol version (`1` or `2`).
    pub version: u32,
    /// Which of the three valid routes this request takes.
    pub kind: RequestKind,
    /// CAIP-2 network id, for logging and pool lookup.
    pub canonical_network: String,
}

/// Resolves version, mode, and canonical network ahead of verification.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<NetworkRegistry>,
    policy: VersionPolicy,
}

impl Dispatcher {
    /// Builds a dispatcher over `registry` with the given version policy.
    #[must_use]
    pub const fn new(registry: Arc<NetworkRegistry>, policy: VersionPolicy) -> Self {
        Self { registry, policy }
    }

    /// Resolves a request.
    ///
    /// `explicit_version` is the request body's optional top-level
    /// `x402Version` override; `payload_version` is `paymentPayload.x402Version`,
    /// used when the override is absent ("explicit field wins; absence
    /// means v1" is handled by the payload itself defaulting to `1`).
    ///
    /// # Errors
    ///
    /// - [`PaymentInvalidReason::UnsupportedVersion`] if the resolved
    ///   version is not `1` or `2`, or is disabled/deprecated by policy.
    /// - [`PaymentInvalidReason::UnsupportedNetwork`] if `requirements.network`
    ///   does not resolve.
    /// - [`PaymentInvalidReason::SchemaInvalid`] if the resolved `(version,
    ///   mode)` pair falls outside the three routes this facilitator
    ///   serves — currently only v2 in standard mode, which has no
    ///   corresponding route (DESIGN.md: v2 requires router-mode `extra`).
    pub fn dispatch(
        &self,
        explicit_version: Option<u32>,
        payload_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<DispatchedRequest, PaymentInvalidReason> {
        let version = explicit_version.unwrap_or(payload_version);
        match version {
            1 if self.policy.v1_deprecated => return Err(PaymentInvalidReason::UnsupportedVersion),
            2 if !self.policy.v2_enabled => return Err(PaymentInvalidReason::UnsupportedVersion),
            1 | 2 => {}
            _ => return Err(PaymentInvalidReason::UnsupportedVersion),
        }

        let network_info = self.registry.resolve(&requirements.network).map_err(|_| PaymentInvalidReason::UnsupportedNetwork)?;
        let canonical_network = network_info.caip2();
        let is_router = requirements.is_router_mode();

        let kind = match (version, is_router) {
            (1, false) => RequestKind::V1Standard,
            (1, true) => RequestKind::V1Router,
            (2, true) => RequestKind::V2Router,
            (2, false) => return Err(PaymentInvalidReason::SchemaInvalid),
            _ => unreachable!("version already validated above"),
        };

        Ok(DispatchedRequest { version, kind, canonical_network })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402x_types::network::{AssetInfo, NetworkInfo};

    fn registry() -> Arc<NetworkRegistry> {
        Arc::new(NetworkRegistry::from_networks(vec![NetworkInfo {
            alias: "base-sepolia".to_owned(),
            chain_id: 84532,
            default_rpc_url: None,
            default_asset: Some(AssetInfo {
                address: "0x000000000000000000000000000000000000aa".parse().unwrap(),
                decimals: 6,
                eip712_name: "USDC".to_owned(),
                eip712_version: "2".to_owned(),
            }),
            default_router: None,
            default_hooks: Vec::new(),
        }]))
    }

    fn requirements(router: bool) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_owned(),
            network: "base-sepolia".to_owned(),
            asset: "0x000000000000000000000000000000000000aa".parse().unwrap(),
            max_amount_required: "1000000".to_owned(),
            pay_to: "0x000000000000000000000000000000000000bb".parse().unwrap(),
            max_timeout_seconds: 300,
            extra: router.then(|| x402x_types::RouterExtra {
                settlement_router: "0x000000000000000000000000000000000000cc".parse().unwrap(),
                salt: "0x0101010101010101010101010101010101010101010101010101010101010a".parse().unwrap(),
                pay_to: "0x000000000000000000000000000000000000bb".parse().unwrap(),
                facilitator_fee: "10000".to_owned(),
                hook: "0x000000000000000000000000000000000000dd".parse().unwrap(),
                hook_data: "0x".to_owned(),
                name: "USDC".to_owned(),
                version: "2".to_owned(),
            }),
        }
    }

    #[test]
    fn v1_standard_routes_correctly() {
        let dispatcher = Dispatcher::new(registry(), VersionPolicy::default());
        let resolved = dispatcher.dispatch(None, 1, &requirements(false)).unwrap();
        assert_eq!(resolved.kind, RequestKind::V1Standard);
        assert_eq!(resolved.canonical_network, "eip155:84532");
    }

    #[test]
    fn v2_standard_mode_has_no_route() {
        let dispatcher = Dispatcher::new(registry(), VersionPolicy::default());
        let resolved = dispatcher.dispatch(None, 2, &requirements(false));
        assert_eq!(resolved.unwrap_err(), PaymentInvalidReason::SchemaInvalid);
    }

    #[test]
    fn disabled_v2_is_rejected() {
        let dispatcher = Dispatcher::new(registry(), VersionPolicy { v2_enabled: false, v1_deprecated: false });
        let resolved = dispatcher.dispatch(None, 2, &requirements(true));
        assert_eq!(resolved.unwrap_err(), PaymentInvalidReason::UnsupportedVersion);
    }

    #[test]
    fn explicit_version_overrides_payload_version() {
        let dispatcher = Dispatcher::new(registry(), VersionPolicy::default());
        let resolved = dispatcher.dispatch(Some(2), 1, &requirements(true)).unwrap();
        assert_eq!(resolved.version, 2);
        assert_eq!(resolved.kind, RequestKind::V2Router);
    }

    #[test]
    fn unsupported_version_rejected() {
        let dispatcher = Dispatcher::new(registry(), VersionPolicy::default());
        let resolved = dispatcher.dispatch(None, 3, &requirements(false));
        assert_eq!(resolved.unwrap_err(), PaymentInvalidReason::UnsupportedVersion);
    }

    #[test]
    fn unknown_network_rejected() {
        let dispatcher = Dispatcher::new(registry(), VersionPolicy::default());
        let mut req = requirements(false);
        req.network = "nowhere".to_owned();
        let resolved = dispatcher.dispatch(None, 1, &req);
        assert_eq!(resolved.unwrap_err(), PaymentInvalidReason::UnsupportedNetwork);
    }
}
