pub mod build_info;
pub mod quota;

pub use build_info::BuildInfoCollector;
pub use quota::QuotaCollector;
