// crates/ti_inflow/src/parallel/collective.rs

//! 类型化集合操作
//!
//! 在字节级 [`Communicator`] 之上用 bincode 编码，每条消息携带操作标签。
//! 若各进程调用的集合操作不一致（标签不同），返回并行一致性错误。
//!
//! 归约按进程编号顺序累加，结果在所有进程上逐位一致。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ti_foundation::{TiError, TiResult};

use super::comm::Communicator;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    tag: String,
    payload: T,
}

fn encode<T: Serialize>(tag: &str, payload: &T) -> TiResult<Vec<u8>> {
    bincode::serialize(&Envelope {
        tag: tag.to_string(),
        payload,
    })
    .map_err(|e| TiError::serialization(format!("集合操作 {tag} 编码失败: {e}")))
}

fn decode<T: DeserializeOwned>(tag: &str, src: usize, bytes: &[u8]) -> TiResult<T> {
    let env: Envelope<T> = bincode::deserialize(bytes).map_err(|e| {
        TiError::parallel(format!("集合操作 {tag}: 无法解码来自 rank {src} 的数据: {e}"))
    })?;
    if env.tag != tag {
        return Err(TiError::parallel(format!(
            "集合操作不匹配: 本进程执行 {tag}, rank {src} 执行 {}",
            env.tag
        )));
    }
    Ok(env.payload)
}

/// 全收集
pub fn all_gather<T>(comm: &dyn Communicator, tag: &str, value: &T) -> TiResult<Vec<T>>
where
    T: Serialize + DeserializeOwned,
{
    let gathered = comm.all_gather_bytes(encode(tag, value)?)?;
    if gathered.len() != comm.size() {
        return Err(TiError::parallel(format!(
            "集合操作 {tag}: 收到 {} 份数据, 期望 {}",
            gathered.len(),
            comm.size()
        )));
    }
    gathered
        .iter()
        .enumerate()
        .map(|(src, bytes)| decode(tag, src, bytes))
        .collect()
}

/// 全局求和
pub fn all_reduce_sum(comm: &dyn Communicator, tag: &str, value: f64) -> TiResult<f64> {
    Ok(all_gather(comm, tag, &value)?.into_iter().sum())
}

/// 全局计数求和
pub fn all_reduce_count(comm: &dyn Communicator, tag: &str, value: usize) -> TiResult<usize> {
    let parts: Vec<u64> = all_gather(comm, tag, &(value as u64))?;
    Ok(parts.into_iter().sum::<u64>() as usize)
}

/// 全局最大值
pub fn all_reduce_max(comm: &dyn Communicator, tag: &str, value: f64) -> TiResult<f64> {
    Ok(all_gather(comm, tag, &value)?
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max))
}

/// 对各进程的本地结果取得一致
///
/// 任一进程失败则所有进程都返回错误：失败进程返回自身的错误，
/// 其余进程返回指明失败 rank 的并行一致性错误。
pub fn all_agree<T>(comm: &dyn Communicator, tag: &str, local: TiResult<T>) -> TiResult<T> {
    let flags = all_gather(comm, tag, &local.is_ok())?;
    let local = local?;
    match flags.iter().position(|ok| !ok) {
        Some(rank) => Err(TiError::parallel(format!("{tag}: rank {rank} 本地失败"))),
        None => Ok(local),
    }
}

/// 点对点交换
///
/// 返回 `(来源进程, 数据)`，按来源进程编号排序。
pub fn exchange<T>(
    comm: &dyn Communicator,
    tag: &str,
    outgoing: Vec<(usize, T)>,
) -> TiResult<Vec<(usize, T)>>
where
    T: Serialize + DeserializeOwned,
{
    let encoded = outgoing
        .iter()
        .map(|(dest, v)| Ok((*dest, encode(tag, v)?)))
        .collect::<TiResult<Vec<_>>>()?;
    comm.exchange_bytes(encoded)?
        .into_iter()
        .map(|(src, bytes)| Ok((src, decode(tag, src, &bytes)?)))
        .collect()
}
