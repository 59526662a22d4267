pub mod meraki;
pub mod postgres;
pub mod rdap;
pub mod storage;
