use std::path::{Path, PathBuf};

pub fn out_gds(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.gds"))
}

pub fn out_json(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.json"))
}

/// The directory outputs go to when none is given: `<stem>_out` next to the job file.
pub fn default_work_dir(jobs: impl AsRef<Path>) -> PathBuf {
    let jobs = jobs.as_ref();
    let stem = jobs
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "routes".to_string());
    jobs.parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}_out"))
}
