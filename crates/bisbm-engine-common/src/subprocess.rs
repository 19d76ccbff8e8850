//! Reference [`EngineAdapter`] backed by an external subprocess (§6).
//!
//! The engine receives a 1-indexed tab-separated edge list and a types file
//! (one `1`/`2` per node, in node-id order), and writes, for sweep index
//! `i`, `biDCSBMcomms<i>.tsv` (one block id per line) and
//! `biDCSBMcomms<i>.score` (a single float) under a run-specific directory.
//! Exit code `0` is success; `-11` (SIGSEGV) or any other non-zero code is
//! an [`EngineError::ProcessFailed`].

use crate::adapter::EngineAdapter;
use crate::error::{EngineError, EngineResult, ExitStatus};
use bisbm_core::{graph::parse_edgelist, Membership};
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Drives a KL- or MCMC-style partition binary over the file contract above.
pub struct SubprocessEngine {
    binary_path: PathBuf,
    work_dir_base: PathBuf,
    degree_corrected: bool,
    kl_steps: u32,
    timeout: Duration,
}

impl SubprocessEngine {
    /// `binary` is either a path to an existing file or a name looked up on
    /// `PATH` (mirroring how `which` resolves a bare binary name).
    pub fn new(binary: impl AsRef<str>, work_dir_base: impl Into<PathBuf>) -> EngineResult<Self> {
        let binary_path = resolve_binary(binary.as_ref())?;
        Ok(Self {
            binary_path,
            work_dir_base: work_dir_base.into(),
            degree_corrected: true,
            kl_steps: 5,
            timeout: Duration::from_secs(3600),
        })
    }

    pub fn with_kl_steps(mut self, steps: u32) -> Self {
        self.kl_steps = steps;
        self
    }

    pub fn with_degree_corrected(mut self, degree_corrected: bool) -> Self {
        self.degree_corrected = degree_corrected;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn prepare_run_dir(&self) -> EngineResult<PathBuf> {
        std::fs::create_dir_all(&self.work_dir_base)?;
        let salt: f64 = rand::thread_rng().gen();
        let digest = format!("{:x}", md5::compute(salt.to_string().as_bytes()));
        let dir = self.work_dir_base.join(digest);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn run_in(
        &self,
        run_dir: &Path,
        edgelist_path: &Path,
        na: usize,
        nb: usize,
        ka: usize,
        kb: usize,
    ) -> EngineResult<Membership> {
        let edgelist_1indexed = run_dir.join("edgelist_1indexed.tsv");
        save_edgelist_as_1_indexed(edgelist_path, &edgelist_1indexed)?;
        let types_path = run_dir.join("types.txt");
        save_types(&types_path, na, nb)?;
        let output_dir = run_dir.join("out");
        std::fs::create_dir_all(&output_dir)?;

        tracing::info!(ka, kb, engine = %self.binary_path.display(), "invoking partition engine");

        let mut child = Command::new(&self.binary_path)
            .arg(&edgelist_1indexed)
            .arg(&types_path)
            .arg(&output_dir)
            .arg(ka.to_string())
            .arg(kb.to_string())
            .arg(if self.degree_corrected { "1" } else { "0" })
            .arg(self.kl_steps.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::ProcessStart)?;

        let status = wait_with_timeout(&mut child, self.timeout)?;
        if !status.is_success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(EngineError::ProcessFailed {
                status,
                message: stderr,
            });
        }

        read_membership(&output_dir, 0)
    }
}

impl EngineAdapter for SubprocessEngine {
    fn call(
        &self,
        edgelist_path: &Path,
        na: usize,
        nb: usize,
        ka: usize,
        kb: usize,
    ) -> EngineResult<Membership> {
        let run_dir = self.prepare_run_dir()?;
        let result = self.run_in(&run_dir, edgelist_path, na, nb, ka, kb);
        let _ = std::fs::remove_dir_all(&run_dir);
        result
    }
}

fn resolve_binary(name: &str) -> EngineResult<PathBuf> {
    let as_path = Path::new(name);
    if as_path.is_file() {
        return Ok(as_path.to_path_buf());
    }
    which::which(name).map_err(|_| EngineError::BinaryNotFound(name.to_string()))
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> EngineResult<ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            let code = raw_exit_code(&status);
            return Ok(ExitStatus::from_raw(code));
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Timeout {
                seconds: timeout.as_secs(),
            });
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(unix)]
fn raw_exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|s| -s)).unwrap_or(-1)
}

#[cfg(not(unix))]
fn raw_exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Rewrite a 0-indexed edge list as 1-indexed, tab-separated (engine input contract).
fn save_edgelist_as_1_indexed(src: &Path, dst: &Path) -> EngineResult<()> {
    let reader = BufReader::new(File::open(src)?);
    let edges = parse_edgelist(reader, '\t')
        .map_err(|e| EngineError::MalformedOutput(format!("reading {}: {e}", src.display())))?;
    let mut writer = BufWriter::new(File::create(dst)?);
    for (src_node, dst_node) in edges {
        writeln!(writer, "{}\t{}", src_node + 1, dst_node + 1)?;
    }
    Ok(())
}

/// Write the types file: `na` lines of `1` followed by `nb` lines of `2`.
fn save_types(path: &Path, na: usize, nb: usize) -> EngineResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for _ in 0..na {
        writeln!(writer, "1")?;
    }
    for _ in 0..nb {
        writeln!(writer, "2")?;
    }
    Ok(())
}

fn read_membership(output_dir: &Path, sweep_index: u32) -> EngineResult<Membership> {
    let path = output_dir.join(format!("biDCSBMcomms{sweep_index}.tsv"));
    let contents = std::fs::read_to_string(&path)?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            l.trim().parse::<usize>().map_err(|_| {
                EngineError::MalformedOutput(format!(
                    "non-integer block id {l:?} in {}",
                    path.display()
                ))
            })
        })
        .collect()
}

/// Read the score file accompanying a sweep's membership output.
pub fn read_score(output_dir: &Path, sweep_index: u32) -> EngineResult<f64> {
    let path = output_dir.join(format!("biDCSBMcomms{sweep_index}.score"));
    let contents = std::fs::read_to_string(&path)?;
    contents.trim().parse::<f64>().map_err(|_| {
        EngineError::MalformedOutput(format!("non-float score in {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn save_edgelist_as_1_indexed_shifts_ids() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("edges.tsv");
        std::fs::write(&src, "0\t2\n1\t3\n").unwrap();
        let dst = dir.path().join("edges_1idx.tsv");
        save_edgelist_as_1_indexed(&src, &dst).unwrap();
        let out = std::fs::read_to_string(&dst).unwrap();
        assert_eq!(out, "1\t3\n2\t4\n");
    }

    #[test]
    fn save_types_writes_markers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.txt");
        save_types(&path, 2, 3).unwrap();
        let out = std::fs::read_to_string(&path).unwrap();
        assert_eq!(out, "1\n1\n2\n2\n2\n");
    }

    #[test]
    fn read_membership_parses_one_id_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join("biDCSBMcomms0.tsv")).unwrap();
        writeln!(f, "0\n0\n1\n1").unwrap();
        let mb = read_membership(dir.path(), 0).unwrap();
        assert_eq!(mb, vec![0, 0, 1, 1]);
    }

    #[test]
    fn read_membership_rejects_non_integer_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join("biDCSBMcomms0.tsv")).unwrap();
        writeln!(f, "x").unwrap();
        assert!(read_membership(dir.path(), 0).is_err());
    }

    #[test]
    fn resolve_binary_rejects_missing_name() {
        assert!(matches!(
            resolve_binary("definitely-not-a-real-binary-xyz"),
            Err(EngineError::BinaryNotFound(_))
        ));
    }
}
