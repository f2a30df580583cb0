//! Endpoint to transport address translation.

use crate::{Endpoint, TransportAddress, TransportError};

/// Pure translation from an [`Endpoint`] to the transport's addressing
/// scheme.
///
/// Injectable so specialized deployments can reroute or rewrite addresses
/// without touching the client service. Resolution failures surface on the
/// submission path of the invocation that triggered them.
pub trait AddressResolver: Send + Sync + 'static {
    /// Resolve `endpoint` into a transport address.
    fn resolve(&self, endpoint: &Endpoint) -> Result<TransportAddress, TransportError>;
}

/// Default resolver: renders `hawser://host:port`, keyed by the endpoint's
/// stable string form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticResolver;

impl AddressResolver for StaticResolver {
    fn resolve(&self, endpoint: &Endpoint) -> Result<TransportAddress, TransportError> {
        let key = endpoint.connection_key();
        Ok(TransportAddress::new(format!("hawser://{key}"), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_resolver_keys_by_endpoint_string() {
        let endpoint = Endpoint::new("127.0.0.1", 9000);
        let address = StaticResolver.resolve(&endpoint).unwrap();
        assert_eq!(address.uri(), "hawser://127.0.0.1:9000");
        assert_eq!(address.key(), endpoint.connection_key());
    }
}
