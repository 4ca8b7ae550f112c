//! Ephemeral domain naming, grounded in `builder.py`'s `vmid = 'buildvm_%d' % jobid`.

/// Derive a fresh, unique domain name from a job id (spec.md §9: "each job
/// derives a fresh domain name from its id").
pub fn clone_domain_name(job_id: u64) -> String {
    format!("buildvm_{job_id}")
}

/// Derive the overlay qcow2 filename for a clone, placed alongside the
/// golden disk (spec.md §4.2 step 2).
pub fn overlay_file_name(clone_id: &str) -> String {
    format!("{clone_id}.qcow2")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_domain_name_is_stable_and_unique_per_job() {
        assert_eq!(clone_domain_name(85), "buildvm_85");
        assert_ne!(clone_domain_name(1), clone_domain_name(2));
    }

    #[test]
    fn overlay_file_name_has_qcow2_extension() {
        assert_eq!(overlay_file_name("buildvm_85"), "buildvm_85.qcow2");
    }
}
