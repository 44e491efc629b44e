// crates/ti_inflow/src/probe.rs

//! 单面速度时间序列输出
//!
//! 每个选定的面一个文件：
//!
//! ```text
//! # patch	inlet
//! # method	dfsem
//! # face	12
//! # Time	Ux	Uy	Uz
//! 0.001	10.2	0.13	-0.4
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glam::DVec3;
use ti_foundation::{TiError, TiResult};

/// 单个探针文件
struct Probe {
    face: usize,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// 探针输出器
pub struct ProbeWriter {
    probes: Vec<Probe>,
}

impl ProbeWriter {
    /// 创建目录与文件并写入文件头
    ///
    /// `faces` 为本进程局部面编号，`metadata` 逐行写成 `# key\tvalue`。
    pub fn create(
        directory: &Path,
        prefix: &str,
        faces: &[usize],
        n_faces: usize,
        metadata: &[(&str, String)],
    ) -> TiResult<Self> {
        if let Some(&bad) = faces.iter().find(|&&f| f >= n_faces) {
            return Err(TiError::config(
                "output.probe_faces",
                format!("面编号 {bad} 超出本进程面数 {n_faces}"),
            ));
        }
        std::fs::create_dir_all(directory).map_err(|e| {
            TiError::io_with_source(format!("无法创建目录 {}", directory.display()), e)
        })?;

        let mut probes = Vec::with_capacity(faces.len());
        for &face in faces {
            let path = directory.join(format!("{prefix}_face{face}.dat"));
            let file = File::create(&path)
                .map_err(|e| TiError::io_with_source(format!("无法创建 {}", path.display()), e))?;
            let mut writer = BufWriter::new(file);
            for (key, value) in metadata {
                writeln!(writer, "# {key}\t{value}")?;
            }
            writeln!(writer, "# face\t{face}")?;
            writeln!(writer, "# Time\tUx\tUy\tUz")?;
            writer.flush()?;
            probes.push(Probe { face, path, writer });
        }
        if !probes.is_empty() {
            log::info!("探针输出: {} 个面 → {}", probes.len(), directory.display());
        }
        Ok(Self { probes })
    }

    /// 探针文件路径
    pub fn paths(&self) -> Vec<&Path> {
        self.probes.iter().map(|p| p.path.as_path()).collect()
    }

    /// 追加一行
    pub fn write_values(&mut self, time: f64, values: &[DVec3]) -> TiResult<()> {
        for probe in &mut self.probes {
            let u = values
                .get(probe.face)
                .ok_or_else(|| TiError::size_mismatch("probe values", probe.face + 1, values.len()))?;
            writeln!(probe.writer, "{time}\t{}\t{}\t{}", u.x, u.y, u.z)?;
            probe.writer.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProbeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeWriter")
            .field("faces", &self.probes.iter().map(|p| p.face).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let meta = [("patch", "inlet".to_string()), ("method", "dfm".to_string())];
        let mut w = ProbeWriter::create(dir.path(), "inlet", &[1], 3, &meta).unwrap();
        let values = [DVec3::ZERO, DVec3::new(1.5, -0.25, 0.0), DVec3::ONE];
        w.write_values(0.1, &values).unwrap();
        w.write_values(0.2, &values).unwrap();

        let text = std::fs::read_to_string(w.paths()[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# patch\tinlet");
        assert_eq!(lines[1], "# method\tdfm");
        assert_eq!(lines[2], "# face\t1");
        assert_eq!(lines[3], "# Time\tUx\tUy\tUz");
        assert_eq!(lines[4], "0.1\t1.5\t-0.25\t0");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_face_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProbeWriter::create(dir.path(), "inlet", &[5], 3, &[]).is_err());
    }
}
