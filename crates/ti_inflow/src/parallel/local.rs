// crates/ti_inflow/src/parallel/local.rs

//! 进程内多 rank 通信
//!
//! 用线程模拟分区并行：每个线程持有一个 [`ThreadComm`]，共享同一个
//! [`LocalWorld`]。每个集合操作的协议为
//!
//! ```text
//! barrier → 写入槽位/信箱 → barrier → 读取
//! ```
//!
//! 起始的 barrier 保证上一次操作的读取全部完成后才开始新的写入。
//!
//! 任一 rank 离开 [`LocalWorld::run`]（返回或 panic）后世界即被中止，
//! 仍停在 barrier 上的 rank 得到 [`TiError::ParallelConsistency`]，
//! 而不是永远等待一个不会到达的伙伴。

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use ti_foundation::{TiError, TiResult};

use super::comm::Communicator;

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// 可中止的 barrier
#[derive(Debug)]
struct AbortableBarrier {
    size: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl AbortableBarrier {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self, rank: usize) -> TiResult<()> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(aborted_error(rank));
        }
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }
        let generation = state.generation;
        while state.generation == generation && !state.aborted {
            self.cvar.wait(&mut state);
        }
        // 本轮已凑齐时即使随后被中止也算通过
        if state.generation != generation {
            Ok(())
        } else {
            Err(aborted_error(rank))
        }
    }

    fn abort(&self) {
        self.state.lock().aborted = true;
        self.cvar.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}

fn aborted_error(rank: usize) -> TiError {
    TiError::parallel(format!("rank {rank} 等待集合通信时其他 rank 已退出"))
}

/// 离开 `run` 时中止世界（正常返回与 panic 都会触发）
struct Departure<'a>(&'a LocalWorld);

impl Drop for Departure<'_> {
    fn drop(&mut self) {
        self.0.barrier.abort();
    }
}

/// 进程内共享的通信世界
#[derive(Debug)]
pub struct LocalWorld {
    size: usize,
    barrier: AbortableBarrier,
    slots: Vec<Mutex<Vec<u8>>>,
    mailboxes: Vec<Mutex<Vec<(usize, Vec<u8>)>>>,
}

impl LocalWorld {
    /// 创建 `size` 个 rank 的通信器
    pub fn communicators(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let world = Arc::new(Self {
            size,
            barrier: AbortableBarrier::new(size),
            slots: (0..size).map(|_| Mutex::new(Vec::new())).collect(),
            mailboxes: (0..size).map(|_| Mutex::new(Vec::new())).collect(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                world: Arc::clone(&world),
            })
            .collect()
    }

    /// 在 `size` 个线程上运行 `f`，按 rank 顺序返回结果
    ///
    /// 集合操作在所有 rank 上对称出现，因此某个 rank 离开后仍在等待的
    /// rank 必然等不到它：这些 rank 的集合操作返回错误。任一线程 panic
    /// 时向调用者传播。
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(ThreadComm) -> T + Sync,
    {
        let comms = Self::communicators(size);
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    scope.spawn(move || {
                        let world = Arc::clone(&comm.world);
                        let _departure = Departure(&world);
                        f(comm)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(v) => v,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}

/// 线程 rank 的通信器
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    world: Arc<LocalWorld>,
}

impl ThreadComm {
    /// 中止整个世界，其余 rank 的下一次集合操作返回错误
    pub fn abort(&self) {
        log::warn!("rank {} 中止进程内通信世界", self.rank);
        self.world.barrier.abort();
    }

    /// 世界是否已被中止
    pub fn is_aborted(&self) -> bool {
        self.world.barrier.is_aborted()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn all_gather_bytes(&self, local: Vec<u8>) -> TiResult<Vec<Vec<u8>>> {
        self.world.barrier.wait(self.rank)?;
        *self.world.slots[self.rank].lock() = local;
        self.world.barrier.wait(self.rank)?;
        Ok(self.world.slots.iter().map(|s| s.lock().clone()).collect())
    }

    fn exchange_bytes(&self, outgoing: Vec<(usize, Vec<u8>)>) -> TiResult<Vec<(usize, Vec<u8>)>> {
        if let Some((dest, _)) = outgoing.iter().find(|(d, _)| *d >= self.world.size) {
            // 仍需参与两次 barrier，否则其余 rank 报告中止
            self.world.barrier.wait(self.rank)?;
            self.world.barrier.wait(self.rank)?;
            return Err(TiError::parallel(format!(
                "rank {} 向不存在的 rank {dest} 发送数据",
                self.rank
            )));
        }
        self.world.barrier.wait(self.rank)?;
        for (dest, bytes) in outgoing {
            self.world.mailboxes[dest].lock().push((self.rank, bytes));
        }
        self.world.barrier.wait(self.rank)?;
        let mut received = std::mem::take(&mut *self.world.mailboxes[self.rank].lock());
        received.sort_by_key(|(src, _)| *src);
        Ok(received)
    }
}
