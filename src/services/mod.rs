//! 业务逻辑服务模块
//!
//! 封装数据获取和处理逻辑

pub mod analyst;      // 对话式分析服务
pub mod directory;    // 股票目录
pub mod market_data;  // 行情数据
pub mod orchestrator; // 对比报告编排
