use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    /// Path to TOML routing job file.
    #[arg(short, long, default_value = "routes.toml")]
    pub jobs: PathBuf,

    /// Directory to which output files should be saved.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Built-in process to route in (sky130, gf180 or ihp130). Overrides the job file.
    #[arg(long, conflicts_with = "tech")]
    pub pdk: Option<String>,

    /// Path to a technology TOML file. Overrides the job file.
    #[arg(long)]
    pub tech: Option<PathBuf>,

    /// Skip the process's post-processing pass (for example, sky130 NPC halos).
    #[arg(long)]
    pub no_post_process: bool,
}
