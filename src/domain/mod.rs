// Domain layer: value types and the storage ports. No I/O here.

pub mod model;
pub mod ports;
