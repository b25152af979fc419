use thiserror::Error;

/// Problems that stop a routing run before any net is routed.
/// Per-net failures are reported through `NetStatus` instead.
#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("design has no routing layers")]
    NoRoutingLayers,
    #[error("layer range {min}..={max} is outside the {available} routing layers")]
    BadLayerRange {
        min: usize,
        max: usize,
        available: usize,
    },
    #[error("die area is empty")]
    EmptyDie,
    #[error("routing layer {0} has no usable pitch")]
    NoPitch(String),
}
