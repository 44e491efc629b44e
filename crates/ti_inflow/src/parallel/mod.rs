// crates/ti_inflow/src/parallel/mod.rs

//! 并行基础设施
//!
//! # 模块概览
//!
//! - [`comm`]: `Communicator` trait 与单进程实现
//! - [`local`]: 线程模拟的多 rank 通信（测试与单机多分区）
//! - [`collective`]: bincode 编码的类型化集合操作
//!
//! # 设计原则
//!
//! 1. 通信同步且逐步有界，不跨时间步流水
//! 2. 集合操作失败或不匹配即为致命的并行一致性错误
//! 3. 归约按 rank 顺序累加，结果可复现

pub mod collective;
pub mod comm;
pub mod local;

pub use collective::{
    all_agree, all_gather, all_reduce_count, all_reduce_max, all_reduce_sum, exchange,
};
pub use comm::{Communicator, SerialComm};
pub use local::{LocalWorld, ThreadComm};
