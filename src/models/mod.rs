//! Data model types for the proxy pool

mod policy;
mod proxy;

pub use policy::{OperationPolicy, OperationType, PolicyTable};
pub use proxy::{
    IngestReport, NewProxy, PoolSnapshot, ProxyHandle, ProxyProtocol, ProxyRecord, ProxyType,
    RawProxyEntry, UpsertOutcome,
};

#[cfg(test)]
pub(crate) use proxy::test_support;
