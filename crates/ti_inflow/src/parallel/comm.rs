// crates/ti_inflow/src/parallel/comm.rs

//! 通信器抽象
//!
//! 字节级、同步、逐步有界的进程间通信。所有进程必须以相同顺序调用
//! 相同的集合操作；类型化封装见 [`super::collective`]。

use ti_foundation::TiResult;

/// 进程间通信器
///
/// 对象安全，生成器以 `Arc<dyn Communicator>` 持有。
pub trait Communicator: Send + Sync {
    /// 本进程编号
    fn rank(&self) -> usize;

    /// 进程总数
    fn size(&self) -> usize;

    /// 全收集：返回按进程编号排列的各进程数据
    fn all_gather_bytes(&self, local: Vec<u8>) -> TiResult<Vec<Vec<u8>>>;

    /// 点对点交换：发送 `(目标进程, 数据)`，返回 `(来源进程, 数据)`，
    /// 按来源进程编号排序
    ///
    /// 每个进程都必须参与调用，即使没有数据要发送。
    fn exchange_bytes(&self, outgoing: Vec<(usize, Vec<u8>)>) -> TiResult<Vec<(usize, Vec<u8>)>>;

    /// 是否为单进程
    fn is_serial(&self) -> bool {
        self.size() == 1
    }
}

/// 单进程通信器
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_bytes(&self, local: Vec<u8>) -> TiResult<Vec<Vec<u8>>> {
        Ok(vec![local])
    }

    fn exchange_bytes(&self, outgoing: Vec<(usize, Vec<u8>)>) -> TiResult<Vec<(usize, Vec<u8>)>> {
        // 单进程只可能发给自己
        Ok(outgoing.into_iter().filter(|(dest, _)| *dest == 0).map(|(_, b)| (0, b)).collect())
    }
}
