// Domain layer: records, value types and the ports the directory consumes.

pub mod model;
pub mod ports;
