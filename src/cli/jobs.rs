//! Routing job files.
//!
//! A job file names a process and lists routes to build. Lengths are in
//! microns; orientations are in degrees.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::progress::Progress;
use crate::error::{Error, Result};
use crate::geometry::{Dims, Int, Point};
use crate::layout::flat::{flatten, quantize, FlatCell};
use crate::layout::{CellId, Library, Orientation, Port};
use crate::paths::{out_gds, out_json};
use crate::route::{
    c_route, l_route, straight_route, CRouteOpts, LRouteOpts, StraightRouteOpts, ViaOffset,
};
use crate::tech::TechMap;
use crate::via::{synthesize_via, ViaParams};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    /// Built-in process name.
    pub pdk: Option<String>,
    /// Technology file, relative to the job file.
    pub tech: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub grid_snap: bool,
    #[serde(default = "default_true")]
    pub post_process: bool,
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteJob>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Straight,
    L,
    C,
    Via,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortSpec {
    pub name: Option<String>,
    pub x: Decimal,
    pub y: Decimal,
    pub orientation: i64,
    pub width: Decimal,
    pub layer: String,
}

impl PortSpec {
    pub fn to_port(&self, tech: &TechMap, default_name: &str) -> Result<Port> {
        Ok(Port::new(
            self.name.as_deref().unwrap_or(default_name),
            Point::new(tech.to_dbu(self.x)?, tech.to_dbu(self.y)?),
            tech.to_dbu(self.width)?,
            Orientation::from_degrees(self.orientation)?,
            self.layer.as_str(),
        ))
    }
}

/// One route to build. Only the overrides that apply to `kind` are read.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteJob {
    pub kind: RouteKind,
    pub name: String,
    pub edge1: Option<PortSpec>,
    pub edge2: Option<PortSpec>,
    pub width: Option<Decimal>,
    pub width1: Option<Decimal>,
    pub width2: Option<Decimal>,
    pub cwidth: Option<Decimal>,
    pub hwidth: Option<Decimal>,
    pub vwidth: Option<Decimal>,
    pub extension: Option<Decimal>,
    pub layer1: Option<String>,
    pub layer2: Option<String>,
    pub clayer: Option<String>,
    pub hlayer: Option<String>,
    pub vlayer: Option<String>,
    pub offset_x: Option<bool>,
    pub offset_y: Option<bool>,
    pub full_bottom: Option<bool>,
    pub full_top: Option<bool>,
    /// Via footprint as `[width, height]`.
    pub footprint: Option<(Decimal, Decimal)>,
}

/// The JSON written for each route.
#[derive(Debug, Serialize)]
pub struct RouteOutput<'a> {
    pub tech: &'a str,
    pub dbu_per_um: Int,
    pub kind: RouteKind,
    pub cell: FlatCell,
}

impl JobFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_toml(&txt)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let jobs: Self = toml::from_str(s)?;
        {
            let mut seen = HashSet::new();
            for job in jobs.routes.iter() {
                if !seen.insert(job.name.as_str()) {
                    return Err(Error::precondition(format!(
                        "route name `{}` is used more than once",
                        job.name
                    )));
                }
            }
        }
        Ok(jobs)
    }
}

impl RouteJob {
    fn edges(&self, tech: &TechMap) -> Result<(Port, Port)> {
        match (self.edge1.as_ref(), self.edge2.as_ref()) {
            (Some(e1), Some(e2)) => Ok((e1.to_port(tech, "edge1")?, e2.to_port(tech, "edge2")?)),
            _ => Err(Error::precondition(format!(
                "route `{}` needs both `edge1` and `edge2`",
                self.name
            ))),
        }
    }

    fn via_offset(&self) -> ViaOffset {
        ViaOffset {
            offset_x: self.offset_x.unwrap_or(true),
            offset_y: self.offset_y.unwrap_or(true),
        }
    }

    /// Builds the route into `lib` and returns the new cell.
    pub fn build(&self, lib: &mut Library, tech: &TechMap) -> Result<CellId> {
        let dbu = |v: Option<Decimal>| v.map(|v| tech.to_dbu(v)).transpose();
        let name = |v: &Option<String>| -> Option<ArcStr> { v.as_deref().map(ArcStr::from) };

        match self.kind {
            RouteKind::Straight => {
                let (e1, e2) = self.edges(tech)?;
                let opts = StraightRouteOpts {
                    width: dbu(self.width)?,
                    layer1: name(&self.layer1),
                    layer2: name(&self.layer2),
                    full_bottom: self.full_bottom.unwrap_or(true),
                };
                straight_route(lib, tech, &e1, &e2, &opts)
            }
            RouteKind::L => {
                let (e1, e2) = self.edges(tech)?;
                let opts = LRouteOpts {
                    hwidth: dbu(self.hwidth)?,
                    vwidth: dbu(self.vwidth)?,
                    hlayer: name(&self.hlayer),
                    vlayer: name(&self.vlayer),
                    via_offset: self.via_offset(),
                    full_bottom: self.full_bottom.unwrap_or(true),
                };
                l_route(lib, tech, &e1, &e2, &opts)
            }
            RouteKind::C => {
                let (e1, e2) = self.edges(tech)?;
                let opts = CRouteOpts {
                    extension: dbu(self.extension)?,
                    width1: dbu(self.width1)?,
                    width2: dbu(self.width2)?,
                    cwidth: dbu(self.cwidth)?,
                    layer1: name(&self.layer1),
                    layer2: name(&self.layer2),
                    clayer: name(&self.clayer),
                    via_offset: self.via_offset(),
                    full_bottom: self.full_bottom.unwrap_or(true),
                };
                c_route(lib, tech, &e1, &e2, &opts)
            }
            RouteKind::Via => {
                let (Some(bottom), Some(top)) = (name(&self.layer1), name(&self.layer2)) else {
                    return Err(Error::precondition(format!(
                        "via `{}` needs both `layer1` and `layer2`",
                        self.name
                    )));
                };
                let footprint = match self.footprint {
                    Some((w, h)) => Some(Dims::new(tech.to_dbu(w)?, tech.to_dbu(h)?)),
                    None => None,
                };
                let params = ViaParams {
                    bottom,
                    top,
                    footprint,
                    full_bottom: self.full_bottom.unwrap_or(false),
                    full_top: self.full_top.unwrap_or(false),
                };
                Ok(synthesize_via(lib, tech, &params)?.cell)
            }
        }
    }
}

/// Builds every route in `jobs` and writes one GDS file per route to
/// `work_dir`, with a JSON dump of the same cell and its ports beside it.
///
/// Returns the GDS paths. Stops at the first route that fails.
pub fn execute_jobs(
    tech: &TechMap,
    jobs: &JobFile,
    work_dir: &Path,
    post_process: bool,
) -> Result<Vec<PathBuf>> {
    let mut lib = Library::new("routes");
    let progress = Progress::new(jobs.routes.len());
    let mut written = Vec::with_capacity(jobs.routes.len());

    for job in jobs.routes.iter() {
        progress.start(&job.name);
        match execute_job(&mut lib, tech, job, jobs.grid_snap, post_process, work_dir) {
            Ok(path) => {
                progress.done(&job.name, &path);
                written.push(path);
            }
            Err(e) => {
                progress.failed(&job.name, &e);
                return Err(e);
            }
        }
    }
    progress.finish();
    Ok(written)
}

fn execute_job(
    lib: &mut Library,
    tech: &TechMap,
    job: &RouteJob,
    grid_snap: bool,
    post_process: bool,
    work_dir: &Path,
) -> Result<PathBuf> {
    let id = job.build(lib, tech)?;
    if post_process {
        tech.post_process(lib, id)?;
    }
    let mut flat = flatten(lib, id)?;
    if grid_snap {
        flat = quantize(flat, tech.grid_dbu());
    }
    flat.name = job.name.as_str().into();

    let gds = out_gds(work_dir, &job.name);
    flat.save_gds(tech.dbu_per_um(), &gds)?;

    let json = out_json(work_dir, &job.name);
    let output = RouteOutput {
        tech: tech.name(),
        dbu_per_um: tech.dbu_per_um(),
        kind: job.kind,
        cell: flat,
    };
    serde_json::to_writer_pretty(File::create(&json)?, &output)?;
    log::info!("wrote route `{}` to {:?}", job.name, gds);
    log::debug!("wrote route `{}` ports and shapes to {:?}", job.name, json);
    Ok(gds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOBS: &str = r#"
pdk = "sky130"

[[route]]
kind = "l"
name = "gate_to_drain"
edge1 = { x = 0.0, y = 0.0, orientation = 0, width = 0.18, layer = "poly" }
edge2 = { x = 2.0, y = 3.0, orientation = 90, width = 0.18, layer = "met1" }

[[route]]
kind = "via"
name = "m1_m3"
layer1 = "met3"
layer2 = "met1"
"#;

    #[test]
    fn test_parse_jobs() -> Result<()> {
        let jobs = JobFile::from_toml(JOBS)?;
        assert_eq!(jobs.pdk.as_deref(), Some("sky130"));
        assert!(jobs.grid_snap);
        assert!(jobs.post_process);
        assert_eq!(jobs.routes.len(), 2);
        assert_eq!(jobs.routes[0].kind, RouteKind::L);
        assert_eq!(jobs.routes[1].kind, RouteKind::Via);
        assert_eq!(jobs.routes[0].edge2.as_ref().unwrap().orientation, 90);
        Ok(())
    }

    #[test]
    fn test_duplicate_route_names() {
        let dup = format!("{JOBS}\n[[route]]\nkind = \"via\"\nname = \"m1_m3\"\n");
        assert!(matches!(
            JobFile::from_toml(&dup),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn test_route_job_needs_edges() -> Result<()> {
        let jobs = JobFile::from_toml(
            "[[route]]\nkind = \"straight\"\nname = \"lonely\"\nedge1 = { x = 0, y = 0, orientation = 0, width = 0.2, layer = \"met1\" }\n",
        )?;
        let tech = crate::tech::builtin("sky130")?;
        let mut lib = Library::new("test_route_job_needs_edges");
        assert!(matches!(
            jobs.routes[0].build(&mut lib, tech),
            Err(Error::Precondition(_))
        ));
        Ok(())
    }
}
