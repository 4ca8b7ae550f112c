//! Per-job build pipeline (L5), grounded in `builder.py`'s clone / start /
//! copyto / guest-exec / copyfrom / destroy / undefine sequence, and in the
//! teacher's `pool_build`'s always-teardown-before-propagate discipline:
//! the domain comes down whether the build succeeded or not, and only then
//! is the result handed back to the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use carpetbag_core::build_env::BuildEnvironment;
use carpetbag_core::error::BuildError;
use carpetbag_core::naming;
use carpetbag_core::package::PackageKind;
use carpetbag_core::step_timer::StepTimer;
use carpetbag_guest::manifest;
use tracing::instrument;

const GUEST_IN_DIR: &str = r"C:\vm_in";
const GUEST_OUT_DIR: &str = r"C:\vm_out";
const GUEST_CMD_PATH: &str = r"C:\Windows\System32\cmd.exe";
const WRAPPER_SCRIPT: &str = "wrapper.sh";
const BUILD_SCRIPT: &str = "build.sh";
const MANIFEST_NAME: &str = "manifest";

pub struct BuildRequest<'a> {
    pub job_id: u64,
    pub golden_domain: &'a str,
    pub guest_bash_path: &'a str,
    pub archive_path: &'a Path,
    /// Host directory holding `build.sh` and `wrapper.sh`, uploaded to the
    /// guest alongside the archive before every build (spec.md §4.5 step 3).
    pub scripts_dir: &'a Path,
    pub package: &'a PackageKind,
    pub outdir: &'a Path,
    pub boot_wait: Duration,
    /// Start the clone without `--autodestroy`, leaving it defined after a
    /// failure so an operator can attach and inspect it (spec.md §4.5).
    pub debug: bool,
}

pub struct BuildOutcome {
    pub built: bool,
    pub agent_ready: bool,
    pub manifest: Vec<String>,
    pub collected: Vec<PathBuf>,
    pub elapsed_report: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[instrument(skip(env, req), fields(job_id = req.job_id))]
pub fn run_job(env: &dyn BuildEnvironment, req: &BuildRequest) -> Result<BuildOutcome, BuildError> {
    let clone_id = naming::clone_domain_name(req.job_id);
    let mut timer = StepTimer::new();

    env.log_info(&format!("cloning {} as {}", req.golden_domain, clone_id));
    let clone = env.clone_domain(req.golden_domain, &clone_id)?;
    timer.mark("clone");

    env.start_domain(&clone_id, req.debug)?;
    timer.mark("start");

    let agent_ready = env.wait_for_agent(&clone_id, req.boot_wait)?;
    timer.mark("boot");
    if !agent_ready {
        env.log_info(&format!("{clone_id}: guest agent not ready after boot wait, proceeding anyway"));
    }

    let result = run_inside_guest(env, &clone_id, req, &mut timer);

    // the clone always comes down, whatever run_inside_guest returned.
    let _ = env.destroy_domain(&clone_id);
    let teardown = env.undefine_domain(&clone_id, &clone.overlay_path);

    let outcome = result?;
    teardown?;

    timer.mark("teardown");
    env.log_success(&format!("{clone_id}: {}", timer.report()));

    Ok(BuildOutcome {
        elapsed_report: timer.report(),
        ..outcome
    })
}

fn run_inside_guest(
    env: &dyn BuildEnvironment,
    clone_id: &str,
    req: &BuildRequest,
    timer: &mut StepTimer,
) -> Result<BuildOutcome, BuildError> {
    let archive_name = req
        .archive_path
        .file_name()
        .ok_or_else(|| BuildError::ManifestUnreadable("archive path has no filename".to_string()))?
        .to_string_lossy()
        .into_owned();

    // recreate C:\vm_in\ from scratch via in-guest cmd (spec.md §4.5 step 3).
    env.guest_exec(
        clone_id,
        GUEST_CMD_PATH,
        &[
            "/c".to_string(),
            format!("rmdir /s /q {GUEST_IN_DIR} & mkdir {GUEST_IN_DIR}"),
        ],
    )?;
    timer.mark("provision");

    let guest_archive_path = format!("{GUEST_IN_DIR}\\{archive_name}");
    let guest_build_script_path = format!("{GUEST_IN_DIR}\\{BUILD_SCRIPT}");
    let guest_wrapper_path = format!("{GUEST_IN_DIR}\\{WRAPPER_SCRIPT}");

    env.guest_file_copy_to(clone_id, &req.scripts_dir.join(BUILD_SCRIPT), &guest_build_script_path)?;
    env.guest_file_copy_to(clone_id, &req.scripts_dir.join(WRAPPER_SCRIPT), &guest_wrapper_path)?;
    env.guest_file_copy_to(clone_id, req.archive_path, &guest_archive_path)?;
    timer.mark("upload");

    if !req.package.depends.is_empty() {
        let depends_path = format!("{GUEST_IN_DIR}\\depends");
        env.guest_file_write(clone_id, &depends_path, req.package.depends_csv().as_bytes())?;
    }

    let kind_label = req
        .package
        .kind
        .map(|k| k.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let exec = env.guest_exec(
        clone_id,
        req.guest_bash_path,
        &[
            "-l".to_string(),
            "/cygdrive/c/vm_in/wrapper.sh".to_string(),
            archive_name,
            GUEST_OUT_DIR.to_string(),
            req.package.script.clone(),
            kind_label,
        ],
    )?;
    timer.mark("build");

    let (manifest_paths, collected) = if exec.success() {
        let manifest_path = format!("{GUEST_OUT_DIR}\\{MANIFEST_NAME}");
        let manifest_bytes = env.guest_file_read(clone_id, &manifest_path)?;
        let manifest_paths = manifest::parse(&manifest_bytes);

        let mut collected = Vec::new();
        for rel in &manifest_paths {
            let guest_path = manifest::to_guest_path(GUEST_OUT_DIR, rel);
            let host_path = req.outdir.join(rel);
            if let Some(parent) = host_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BuildError::ManifestUnreadable(e.to_string()))?;
            }
            env.guest_file_copy_from(clone_id, &guest_path, &host_path)?;
            collected.push(host_path);
        }
        (manifest_paths, collected)
    } else {
        (Vec::new(), Vec::new())
    };
    timer.mark("collect");

    Ok(BuildOutcome {
        built: exec.success(),
        agent_ready: true,
        manifest: manifest_paths,
        collected,
        elapsed_report: String::new(),
        stdout: exec.stdout,
        stderr: exec.stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use carpetbag_core::build_env::{DomainClone, ExecResult};
    use carpetbag_core::package::Kind;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// A `BuildEnvironment` that fakes a successful build, recording every
    /// call it receives so tests can assert on the exact sequence and
    /// that teardown always runs.
    struct FakeEnv {
        calls: RefCell<Vec<String>>,
        guest_exec_succeeds: bool,
    }

    impl FakeEnv {
        fn new(guest_exec_succeeds: bool) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                guest_exec_succeeds,
            }
        }

        fn log(&self, call: &str) {
            self.calls.borrow_mut().push(call.to_string());
        }
    }

    impl BuildEnvironment for FakeEnv {
        fn clone_domain(&self, _golden: &str, clone_id: &str) -> anyhow::Result<DomainClone> {
            self.log("clone_domain");
            Ok(DomainClone {
                clone_id: clone_id.to_string(),
                overlay_path: PathBuf::from("/tmp/overlay.qcow2"),
            })
        }
        fn start_domain(&self, _clone_id: &str, _debug: bool) -> anyhow::Result<()> {
            self.log("start_domain");
            Ok(())
        }
        fn wait_for_agent(&self, _clone_id: &str, _timeout: Duration) -> anyhow::Result<bool> {
            self.log("wait_for_agent");
            Ok(true)
        }
        fn guest_exec(&self, _clone_id: &str, _path: &str, _args: &[String]) -> anyhow::Result<ExecResult> {
            self.log("guest_exec");
            Ok(ExecResult {
                exit_code: if self.guest_exec_succeeds { 0 } else { 1 },
                stdout: Vec::new(),
                stdout_truncated: false,
                stderr: Vec::new(),
                stderr_truncated: false,
            })
        }
        fn guest_file_copy_to(&self, _clone_id: &str, _host: &Path, _guest_path: &str) -> anyhow::Result<()> {
            self.log("guest_file_copy_to");
            Ok(())
        }
        fn guest_file_copy_from(&self, _clone_id: &str, _guest_path: &str, _host: &Path) -> anyhow::Result<()> {
            self.log("guest_file_copy_from");
            Ok(())
        }
        fn guest_file_write(&self, _clone_id: &str, _guest_path: &str, _content: &[u8]) -> anyhow::Result<()> {
            self.log("guest_file_write");
            Ok(())
        }
        fn guest_file_read(&self, _clone_id: &str, _guest_path: &str) -> anyhow::Result<Vec<u8>> {
            self.log("guest_file_read");
            Ok(b"release/p/p-1.tar.xz\n".to_vec())
        }
        fn destroy_domain(&self, _clone_id: &str) -> anyhow::Result<()> {
            self.log("destroy_domain");
            Ok(())
        }
        fn undefine_domain(&self, _clone_id: &str, _overlay: &Path) -> anyhow::Result<()> {
            self.log("undefine_domain");
            Ok(())
        }
        fn log_info(&self, _msg: &str) {}
        fn log_success(&self, _msg: &str) {}
    }

    fn request(outdir: &Path) -> (tempfile::NamedTempFile, tempfile::TempDir, PackageKind) {
        let archive = tempfile::Builder::new().suffix(".tar.xz").tempfile().unwrap();
        let scripts_dir = tempfile::tempdir().unwrap();
        std::fs::write(scripts_dir.path().join("build.sh"), b"echo build\n").unwrap();
        std::fs::write(scripts_dir.path().join("wrapper.sh"), b"echo wrapper\n").unwrap();
        let package = PackageKind::new(Kind::Cygbuild, "build.sh", vec!["quilt".to_string()]);
        let _ = outdir;
        (archive, scripts_dir, package)
    }

    #[test]
    fn successful_build_collects_manifest_artifacts() {
        let outdir = tempfile::tempdir().unwrap();
        let (archive, scripts_dir, package) = request(outdir.path());
        let env = FakeEnv::new(true);

        let req = BuildRequest {
            job_id: 85,
            golden_domain: "carpetbag-golden-x86_64",
            guest_bash_path: r"C:\cygwin64\bin\bash.exe",
            archive_path: archive.path(),
            scripts_dir: scripts_dir.path(),
            package: &package,
            outdir: outdir.path(),
            boot_wait: Duration::from_secs(1),
            debug: false,
        };

        let outcome = run_job(&env, &req).unwrap();
        assert!(outcome.built);
        assert_eq!(outcome.manifest, vec!["release/p/p-1.tar.xz"]);
        assert_eq!(outcome.collected.len(), 1);

        let calls = env.calls.borrow();
        assert_eq!(calls.last().unwrap(), "undefine_domain");
        assert!(calls.contains(&"destroy_domain".to_string()));
        assert_eq!(calls.iter().filter(|c| *c == "guest_file_copy_to").count(), 3);
        assert!(calls.iter().any(|c| c == "guest_exec"));
    }

    #[test]
    fn teardown_runs_even_when_build_fails() {
        let outdir = tempfile::tempdir().unwrap();
        let (archive, scripts_dir, package) = request(outdir.path());
        let env = FakeEnv::new(false);

        let req = BuildRequest {
            job_id: 86,
            golden_domain: "carpetbag-golden-x86_64",
            guest_bash_path: r"C:\cygwin64\bin\bash.exe",
            archive_path: archive.path(),
            scripts_dir: scripts_dir.path(),
            package: &package,
            outdir: outdir.path(),
            boot_wait: Duration::from_secs(1),
            debug: false,
        };

        let outcome = run_job(&env, &req).unwrap();
        assert!(!outcome.built);
        assert!(outcome.manifest.is_empty());

        let calls = env.calls.borrow();
        assert!(calls.contains(&"destroy_domain".to_string()));
        assert!(calls.contains(&"undefine_domain".to_string()));
    }

    #[test]
    fn provisions_and_builds_with_spec_exec_arguments() {
        let outdir = tempfile::tempdir().unwrap();
        let (archive, scripts_dir, package) = request(outdir.path());
        let env = FakeEnv::new(true);

        let req = BuildRequest {
            job_id: 87,
            golden_domain: "carpetbag-golden-x86_64",
            guest_bash_path: r"C:\cygwin64\bin\bash.exe",
            archive_path: archive.path(),
            scripts_dir: scripts_dir.path(),
            package: &package,
            outdir: outdir.path(),
            boot_wait: Duration::from_secs(1),
            debug: false,
        };

        run_job(&env, &req).unwrap();

        let calls = env.calls.borrow();
        // provisioning exec, then the build exec: two guest_exec calls total.
        assert_eq!(calls.iter().filter(|c| *c == "guest_exec").count(), 2);
    }
}
