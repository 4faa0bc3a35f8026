//! Azure Resource Manager API 模块
//!
//! 目前只封装计算资源 (ComputeApi)

pub mod compute;

pub use compute::{ComputeApi, COMPUTE_API_VERSION};
