// crates/ti_inflow/src/inlet.rs

//! 湍流入口
//!
//! 宿主边界条件的薄适配层调用以下接口：
//!
//! | 宿主钩子 | 接口 |
//! |---------|------|
//! | 每步更新 | [`TurbulentInlet::update`] |
//! | 只取脉动 | [`TurbulentInlet::compute_fluctuation`] |
//! | 写重启 | [`TurbulentInlet::serialize_state`] |
//! | 读重启 | [`TurbulentInlet::restore_state`] |
//!
//! 生成器（虚拟网格或涡盒）在第一次使用时构建，构建涉及集合操作，
//! 所有进程须同步调用。同一时间重复调用直接返回缓存结果，不推进状态。

use std::sync::Arc;

use glam::DVec3;
use ti_config::{ConfigError, InletConfig, InletMethod, RestartMode};
use ti_foundation::{SymmTensor, TiError, TiResult};

use crate::dfm::DfmGenerator;
use crate::dfsem::DfsemGenerator;
use crate::fields::InletFields;
use crate::parallel::{all_agree, Communicator};
use crate::patch::{PatchFaces, PatchGeometry};
use crate::probe::ProbeWriter;
use crate::random::RandomSource;
use crate::source::{FluctuationSource, MeanOnly};
use crate::state::{InletSnapshot, SNAPSHOT_VERSION};
use crate::synthesizer::{Synthesized, VelocitySynthesizer};

/// 查询点扰动使用的独立随机流编号
const PERTURB_STREAM: u64 = u64::MAX;

/// 某一时刻的结果缓存
#[derive(Debug, Clone)]
struct StepCache {
    time: f64,
    fluctuation: Vec<DVec3>,
    velocity: Vec<DVec3>,
}

/// 湍流入口
pub struct TurbulentInlet {
    config: InletConfig,
    comm: Arc<dyn Communicator>,
    geometry: PatchGeometry,
    fields: InletFields,
    synthesizer: VelocitySynthesizer,
    generator: Option<Box<dyn FluctuationSource>>,
    probes: Option<ProbeWriter>,
    time_index: u64,
    cache: Option<StepCache>,
}

impl TurbulentInlet {
    /// 构造（集合操作）
    ///
    /// `fields` 缺省时由配置中的 `inflow` 剖面计算。
    pub fn new(
        config: InletConfig,
        faces: &PatchFaces,
        fields: Option<InletFields>,
        comm: Arc<dyn Communicator>,
    ) -> TiResult<Self> {
        config.validate()?;
        let rank = comm.rank();

        let mut geometry = PatchGeometry::new(
            faces,
            [config.periodic_in_y, config.periodic_in_z],
            config.lateral_axis.map(DVec3::from_array),
            config.beta,
            comm.as_ref(),
        )?;

        let mut perturb_rng = RandomSource::for_index(config.seed, rank, PERTURB_STREAM);
        geometry.perturb(config.perturb, &mut perturb_rng);

        // 应力检查等本地失败须让所有进程一起退出
        let local = Self::prepare_local(&config, &geometry, fields, comm.as_ref());
        let (fields, synthesizer, probes) = all_agree(comm.as_ref(), "inlet.init", local)?;

        log::info!(
            "湍流入口 {}: 方法 {}，种子 {}，周期 ({}, {})",
            config.patch,
            config.method,
            config.seed,
            config.periodic_in_y,
            config.periodic_in_z
        );

        Ok(Self {
            config,
            comm,
            geometry,
            fields,
            synthesizer,
            generator: None,
            probes,
            time_index: 0,
            cache: None,
        })
    }

    /// 本进程的入流场、合成器与探针（无集合操作）
    fn prepare_local(
        config: &InletConfig,
        geometry: &PatchGeometry,
        fields: Option<InletFields>,
        comm: &dyn Communicator,
    ) -> TiResult<(InletFields, VelocitySynthesizer, Option<ProbeWriter>)> {
        let fields = match (fields, &config.inflow) {
            (Some(f), _) => f,
            (None, Some(props)) => InletFields::from_profiles(props, geometry)?,
            (None, None) => return Err(ConfigError::Missing("inflow".into()).into()),
        };
        if fields.len() != geometry.n_faces() {
            return Err(TiError::size_mismatch("inlet fields", geometry.n_faces(), fields.len()));
        }

        let synthesizer = match config.method {
            InletMethod::Mean => VelocitySynthesizer::mean_only(*geometry.frame(), &fields.u_mean),
            _ => VelocitySynthesizer::new(*geometry.frame(), &fields)?,
        };

        let probes = if config.output.probe_faces.is_empty() {
            None
        } else {
            let rank = comm.rank();
            let prefix = if comm.is_serial() {
                config.patch.clone()
            } else {
                format!("{}_rank{rank}", config.patch)
            };
            let metadata = [
                ("patch", config.patch.clone()),
                ("method", config.method.to_string()),
                ("seed", config.seed.to_string()),
                ("rank", format!("{rank}/{}", comm.size())),
                ("faces", geometry.n_faces_global().to_string()),
            ];
            Some(ProbeWriter::create(
                &config.output.directory,
                &prefix,
                &config.output.probe_faces,
                geometry.n_faces(),
                &metadata,
            )?)
        };
        Ok((fields, synthesizer, probes))
    }

    /// 配置
    pub fn config(&self) -> &InletConfig {
        &self.config
    }

    /// 边界几何
    pub fn geometry(&self) -> &PatchGeometry {
        &self.geometry
    }

    /// 入流统计量
    pub fn fields(&self) -> &InletFields {
        &self.fields
    }

    /// 已推进的步数
    pub fn time_index(&self) -> u64 {
        self.time_index
    }

    /// 最近一次推进的时间
    pub fn last_time(&self) -> Option<f64> {
        self.cache.as_ref().map(|c| c.time)
    }

    /// 生成器是否已构建
    pub fn is_initialised(&self) -> bool {
        self.generator.is_some()
    }

    /// 湍动能 `k = ½ tr R`
    pub fn turbulent_kinetic_energy(&self) -> Vec<f64> {
        self.fields.turbulent_kinetic_energy()
    }

    fn build_generator(&self) -> TiResult<Box<dyn FluctuationSource>> {
        let rng = RandomSource::new(self.config.seed, self.comm.rank());
        let comm = Arc::clone(&self.comm);
        Ok(match self.config.method {
            InletMethod::Dfm => Box::new(DfmGenerator::new(
                &self.geometry,
                &self.fields,
                &self.config.dfm,
                rng,
                comm,
            )?),
            InletMethod::Dfsem => Box::new(DfsemGenerator::new(
                &self.geometry,
                &self.fields,
                &self.config.dfsem,
                rng,
                comm,
            )?),
            InletMethod::Mean => Box::new(MeanOnly::new(self.geometry.n_faces())),
        })
    }

    fn generator_mut(&mut self) -> TiResult<&mut Box<dyn FluctuationSource>> {
        if self.generator.is_none() {
            let built = self.build_generator();
            self.generator = Some(all_agree(self.comm.as_ref(), "inlet.generator", built)?);
        }
        self.generator
            .as_mut()
            .ok_or_else(|| TiError::config("method", "生成器构建失败"))
    }

    fn advance(&mut self, time: f64, dt: f64) -> TiResult<&StepCache> {
        let cached = matches!(&self.cache, Some(c) if c.time == time);
        if !cached {
            if !time.is_finite() {
                return Err(TiError::numerical("time", format!("时间 {time} 非有限")));
            }
            let u_star = self.generator_mut()?.advance(dt)?;
            let Synthesized {
                fluctuation,
                velocity,
            } = self.synthesizer.synthesize(&u_star)?;
            self.time_index += 1;
            self.cache = Some(StepCache {
                time,
                fluctuation,
                velocity,
            });
            if let (Some(probes), Some(c)) = (self.probes.as_mut(), self.cache.as_ref()) {
                if let Err(e) = probes.write_values(time, &c.velocity) {
                    log::warn!("探针写出失败: {e}");
                }
            }
        } else {
            log::debug!("时间 {time} 已计算，返回缓存");
        }
        self.cache
            .as_ref()
            .ok_or_else(|| TiError::numerical("time", "缓存缺失"))
    }

    /// 推进到 `time` 并返回各面的全局坐标脉动 `u'`
    pub fn compute_fluctuation(&mut self, time: f64, dt: f64) -> TiResult<&[DVec3]> {
        Ok(&self.advance(time, dt)?.fluctuation)
    }

    /// 推进到 `time` 并返回各面的全局坐标速度 `Ū e_x + u'`
    pub fn update(&mut self, time: f64, dt: f64) -> TiResult<&[DVec3]> {
        Ok(&self.advance(time, dt)?.velocity)
    }

    /// 替换雷诺应力
    ///
    /// 生成器的网格与涡尺度布局在构建后不再改变，新的 R 只影响合成。
    pub fn set_reynolds_stress(&mut self, r: Vec<SymmTensor>) -> TiResult<()> {
        if r.len() != self.geometry.n_faces() {
            return Err(TiError::size_mismatch("R", self.geometry.n_faces(), r.len()));
        }
        if self.config.method != InletMethod::Mean {
            self.synthesizer.set_reynolds_stress(&r)?;
        }
        self.fields.r = r;
        self.cache = None;
        Ok(())
    }

    /// 导出重启快照（生成器未构建时先构建）
    pub fn serialize_state(&mut self) -> TiResult<InletSnapshot> {
        let state = self.generator_mut()?.state();
        Ok(InletSnapshot {
            version: SNAPSHOT_VERSION,
            patch: self.config.patch.clone(),
            rank: self.comm.rank(),
            n_ranks: self.comm.size(),
            n_faces: self.geometry.n_faces(),
            time_index: self.time_index,
            last_time: self.last_time(),
            state,
        })
    }

    fn check_snapshot(&self, snapshot: &InletSnapshot) -> TiResult<()> {
        snapshot.validate()?;
        if snapshot.method() != self.config.method {
            return Err(TiError::config(
                "restart",
                format!("快照方法 {} 与配置方法 {} 不符", snapshot.method(), self.config.method),
            ));
        }
        if snapshot.rank != self.comm.rank() || snapshot.n_ranks != self.comm.size() {
            return Err(TiError::parallel(format!(
                "快照来自进程 {}/{}，当前为 {}/{}",
                snapshot.rank,
                snapshot.n_ranks,
                self.comm.rank(),
                self.comm.size()
            )));
        }
        if snapshot.n_faces != self.geometry.n_faces() {
            return Err(TiError::size_mismatch("snapshot faces", self.geometry.n_faces(), snapshot.n_faces));
        }
        if snapshot.patch != self.config.patch {
            log::warn!("快照边界名 {} 与当前 {} 不同", snapshot.patch, self.config.patch);
        }
        Ok(())
    }

    /// 从快照恢复
    ///
    /// 快照缺失或配置为 `RestartMode::Clean` 时按种子重新播种。
    pub fn restore_state(&mut self, snapshot: Option<InletSnapshot>) -> TiResult<()> {
        let snapshot = match (snapshot, self.config.restart) {
            (Some(s), RestartMode::Resume) => s,
            (s, mode) => {
                if s.is_some() && mode == RestartMode::Clean {
                    log::info!("{}: 清洁重启，忽略已有快照", self.config.patch);
                }
                let built = self.build_generator();
                self.generator = Some(all_agree(self.comm.as_ref(), "inlet.generator", built)?);
                self.time_index = 0;
                self.cache = None;
                return Ok(());
            }
        };

        let checked = self.check_snapshot(&snapshot);
        all_agree(self.comm.as_ref(), "inlet.restore.check", checked)?;

        let built = self.build_generator();
        let mut generator = all_agree(self.comm.as_ref(), "inlet.generator", built)?;
        let restored = generator.restore(snapshot.state);
        all_agree(self.comm.as_ref(), "inlet.restore", restored)?;
        self.generator = Some(generator);
        self.time_index = snapshot.time_index;
        self.cache = None;
        log::info!(
            "{}: 从第 {} 步恢复（t = {:?}）",
            self.config.patch,
            snapshot.time_index,
            snapshot.last_time
        );
        Ok(())
    }
}

impl std::fmt::Debug for TurbulentInlet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurbulentInlet")
            .field("patch", &self.config.patch)
            .field("method", &self.config.method)
            .field("n_faces", &self.geometry.n_faces())
            .field("time_index", &self.time_index)
            .field("initialised", &self.generator.is_some())
            .finish()
    }
}
