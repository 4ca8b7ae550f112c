//! Clone / decommission a golden domain (L2), grounded in `clone.py` (the
//! XML edit) and `builder.py` (the virsh-driven lifecycle around it).

use std::fs;
use std::path::{Path, PathBuf};

use carpetbag_core::build_env::DomainClone;
use carpetbag_core::error::VmLifecycleError;
use carpetbag_core::naming;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain_xml;
use crate::shell;

pub struct VmCloner {
    /// Directory the overlay qcow2 files are created in, alongside the
    /// golden disks (spec.md §4.2 step 2).
    pub images_dir: PathBuf,
}

impl VmCloner {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    /// Thin-clone `golden` into a freshly defined domain named after
    /// `job_id`. Refuses to proceed if the backing disk isn't qcow2, or if
    /// the golden disk is writable (clone.py: "more to ensure that people
    /// are informed about the risk than a rigorous check").
    #[instrument(skip(self))]
    pub fn clone_domain(&self, golden: &str, job_id: u64) -> anyhow::Result<DomainClone> {
        let clone_id = naming::clone_domain_name(job_id);
        let xml = shell::run("virsh", &["dumpxml", "--security-info", golden])?.stdout;

        let disk = domain_xml::find_boot_disk(&xml)?;
        self.check_golden_not_writable(&disk.backing_file)?;

        let overlay_path = self.images_dir.join(naming::overlay_file_name(&clone_id));
        shell::run(
            "qemu-img",
            &[
                "create",
                "-f",
                "qcow2",
                "-b",
                disk.backing_file.to_string_lossy().as_ref(),
                "-F",
                "qcow2",
                overlay_path.to_string_lossy().as_ref(),
            ],
        )?;

        let new_uuid = Uuid::new_v4().to_string();
        let new_xml = domain_xml::rewrite_for_clone(
            &xml,
            &clone_id,
            &new_uuid,
            overlay_path.to_string_lossy().as_ref(),
        )?;

        let xml_file = self.images_dir.join(format!("{clone_id}.xml"));
        fs::write(&xml_file, &new_xml)
            .map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))?;
        shell::run("virsh", &["define", xml_file.to_string_lossy().as_ref()])
            .map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))?;
        let _ = fs::remove_file(&xml_file);

        info!(clone_id = %clone_id, golden = %golden, "domain cloned");
        Ok(DomainClone {
            clone_id,
            overlay_path,
        })
    }

    fn check_golden_not_writable(&self, base_file: &Path) -> Result<(), VmLifecycleError> {
        let meta = fs::metadata(base_file)
            .map_err(|e| VmLifecycleError::DefineFailed(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let writable_by_owner = meta.permissions().mode() & 0o200 != 0;
            if writable_by_owner {
                return Err(VmLifecycleError::GoldenDiskWritable(
                    base_file.display().to_string(),
                ));
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn start_domain(&self, clone_id: &str, debug: bool) -> anyhow::Result<()> {
        let mut args = vec!["start", clone_id];
        if !debug {
            args.push("--autodestroy");
        }
        shell::run("virsh", &args)
            .map_err(|e| VmLifecycleError::StartFailed(clone_id.to_string(), e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn destroy_domain(&self, clone_id: &str) -> anyhow::Result<()> {
        // the clone may already be gone (guest-initiated shutdown,
        // --autodestroy already fired); a missing domain is not an error
        // here, only a genuine virsh failure is.
        let result = shell::run("virsh", &["destroy", clone_id]);
        if let Err(e) = &result {
            if !e.to_string().contains("domain is not running")
                && !e.to_string().contains("failed to get domain")
            {
                return result.map(|_| ());
            }
        }
        Ok(())
    }

    /// Undefine the domain and remove its overlay, per `clone.py`'s
    /// decommission flags (managed-save, snapshot metadata, nvram).
    #[instrument(skip(self))]
    pub fn undefine_domain(&self, clone_id: &str, overlay: &Path) -> anyhow::Result<()> {
        shell::run(
            "virsh",
            &[
                "undefine",
                clone_id,
                "--managed-save",
                "--snapshots-metadata",
                "--nvram",
            ],
        )?;
        if overlay.exists() {
            fs::remove_file(overlay)?;
        }
        Ok(())
    }
}
