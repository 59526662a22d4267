// Domain layer: models, matching rules and ports. No I/O beyond what the ports describe.

pub mod enrichment;
pub mod hardware;
pub mod model;
pub mod notes;
pub mod ports;
pub mod provider;
pub mod rdap;
pub mod similarity;
pub mod tracking;
