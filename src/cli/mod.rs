use std::borrow::Cow;
use std::fs::canonicalize;
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;

use crate::cli::args::Args;
use crate::cli::jobs::{execute_jobs, JobFile};
use crate::paths::default_work_dir;
use crate::tech::{builtin, TechMap};

pub mod args;
pub mod jobs;
pub mod progress;

pub const BANNER: &str = r"
   __ _ _ __   __ _ _ __ ___  _   _| |_ ___
  / _` | '_ \ / _` | '__/ _ \| | | | __/ _ \
 | (_| | | | | (_| | | | (_) | |_| | ||  __/
  \__,_|_| |_|\__,_|_|  \___/ \__,_|\__\___|

ANAROUTE v0.1
";

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let jobs_path = canonicalize(&args.jobs)
        .with_context(|| format!("job file {:?} not found", &args.jobs))?;

    println!("{BANNER}");

    println!("Reading job file...\n");
    let jobs = JobFile::load(&jobs_path)
        .with_context(|| format!("failed to read job file {:?}", &jobs_path))?;
    let tech = select_tech(&args, &jobs, &jobs_path)?;
    let post_process = jobs.post_process && !args.no_post_process;

    println!("Job file: {:?}", &jobs_path);
    println!("Technology: {}", tech.name());
    println!("\tManufacturing grid: {} um", tech.to_um(tech.grid_dbu()));
    println!("\tGrid snapping: {}", jobs.grid_snap);
    println!(
        "\tPost-processing: {}",
        post_process && tech.halo_rule().is_some()
    );
    println!("Routes: {}\n", jobs.routes.len());

    let work_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_work_dir(&jobs_path));
    std::fs::create_dir_all(&work_dir)?;
    let work_dir = canonicalize(work_dir)?;

    execute_jobs(&tech, &jobs, &work_dir, post_process)?;
    println!("Artifacts saved to: {:?}\n", &work_dir);

    Ok(())
}

/// Command-line choices win over the job file; a technology file wins over a
/// built-in process name.
fn select_tech(args: &Args, jobs: &JobFile, jobs_path: &Path) -> anyhow::Result<Cow<'static, TechMap>> {
    if let Some(path) = args.tech.as_ref() {
        let tech = TechMap::load(path)
            .with_context(|| format!("failed to load technology file {path:?}"))?;
        return Ok(Cow::Owned(tech));
    }
    if let Some(pdk) = args.pdk.as_ref() {
        return Ok(Cow::Borrowed(builtin(pdk)?));
    }
    if let Some(path) = jobs.tech.as_ref() {
        let path = match jobs_path.parent() {
            Some(dir) => dir.join(path),
            None => path.clone(),
        };
        let tech = TechMap::load(&path)
            .with_context(|| format!("failed to load technology file {path:?}"))?;
        return Ok(Cow::Owned(tech));
    }
    if let Some(pdk) = jobs.pdk.as_ref() {
        return Ok(Cow::Borrowed(builtin(pdk)?));
    }
    bail!("no technology given; set `pdk` or `tech` in the job file, or pass --pdk or --tech")
}
