//! API 处理器模块

pub mod earning_rule;
pub mod transaction;
