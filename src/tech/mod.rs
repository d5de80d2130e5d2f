//! # Technology layer map
//!
//! A [`TechMap`] describes one fabrication process: how abstract layer names
//! map onto physical GDS layers, how routing layers stack, which cut joins
//! each pair of adjacent levels, and the handful of scalar rules the router
//! needs. Maps are immutable once loaded and are always passed explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use arcstr::ArcStr;
use lazy_static::lazy_static;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::Int;
use crate::halo::HaloRule;
use crate::layout::{CellId, GdsLayer, Library};

pub const BUILTINS: [&str; 3] = ["sky130", "gf180", "ihp130"];

lazy_static! {
    pub static ref SKY130: TechMap = load_builtin(include_str!("../../tech/sky130/tech.toml"));
    pub static ref GF180: TechMap = load_builtin(include_str!("../../tech/gf180/tech.toml"));
    pub static ref IHP130: TechMap = load_builtin(include_str!("../../tech/ihp130/tech.toml"));
}

fn load_builtin(src: &str) -> TechMap {
    // Built-in tables are embedded at compile time and covered by tests.
    TechMap::from_toml(src).unwrap_or_else(|e| panic!("invalid built-in technology table: {e}"))
}

/// Looks up one of the embedded process tables by name.
pub fn builtin(name: &str) -> Result<&'static TechMap> {
    match name {
        "sky130" => Ok(&*SKY130),
        "gf180" => Ok(&*GF180),
        "ihp130" => Ok(&*IHP130),
        _ => Err(Error::Tech(format!(
            "unknown process `{name}`; built-in processes are {}",
            BUILTINS.join(", ")
        ))),
    }
}

/// The cut joining routing level `level` to level `level + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutRule {
    pub layer: ArcStr,
    pub level: usize,
    pub size: Int,
    pub spacing: Int,
    pub enclosure_below: Int,
    pub enclosure_above: Int,
}

impl CutRule {
    #[inline]
    pub fn pitch(&self) -> Int {
        self.size + self.spacing
    }

    /// Side length of the smallest pad on the lower level that encloses one cut.
    #[inline]
    pub fn pad_below(&self) -> Int {
        self.size + 2 * self.enclosure_below
    }

    #[inline]
    pub fn pad_above(&self) -> Int {
        self.size + 2 * self.enclosure_above
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct LayerRule {
    pub min_width: Int,
    pub min_separation: Int,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechMap {
    name: ArcStr,
    dbu_per_um: Int,
    grid: Int,
    layers: BTreeMap<String, GdsLayer>,
    levels: BTreeMap<String, usize>,
    cuts: Vec<CutRule>,
    rules: BTreeMap<String, LayerRule>,
    models: BTreeMap<String, String>,
    valid_bjt_sizes: BTreeMap<String, Vec<(Decimal, Decimal)>>,
    halo: Option<HaloRule>,
}

#[derive(Debug, Deserialize)]
struct TechFile {
    name: String,
    dbu_per_um: Int,
    grid: Decimal,
    layers: BTreeMap<String, (i16, i16)>,
    levels: BTreeMap<String, usize>,
    #[serde(default)]
    cuts: Vec<CutFile>,
    #[serde(default)]
    rules: BTreeMap<String, RuleFile>,
    #[serde(default)]
    models: BTreeMap<String, String>,
    #[serde(default)]
    valid_bjt_sizes: BTreeMap<String, Vec<(Decimal, Decimal)>>,
    halo: Option<HaloFile>,
}

#[derive(Debug, Deserialize)]
struct CutFile {
    layer: String,
    level: usize,
    size: Decimal,
    spacing: Decimal,
    enclosure_below: Decimal,
    enclosure_above: Decimal,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    min_width: Decimal,
    min_separation: Decimal,
}

#[derive(Debug, Deserialize)]
struct HaloFile {
    contact: String,
    poly: String,
    layer: String,
    #[serde(default = "default_halo_pad")]
    pad: Decimal,
    #[serde(default = "default_halo_threshold")]
    threshold: Decimal,
}

fn default_halo_pad() -> Decimal {
    dec!(0.1)
}

fn default_halo_threshold() -> Decimal {
    dec!(0.64)
}

fn um_to_dbu(um: Decimal, dbu_per_um: Int) -> Result<Int> {
    (um * Decimal::from(dbu_per_um))
        .round()
        .to_isize()
        .ok_or_else(|| Error::Tech(format!("length {um} um is out of range")))
}

impl TechMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let txt = std::fs::read_to_string(path)?;
        Self::from_toml(&txt)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let file: TechFile = toml::from_str(s)?;
        Self::from_file(file)
    }

    fn from_file(file: TechFile) -> Result<Self> {
        if file.dbu_per_um <= 0 {
            return Err(Error::Tech(format!(
                "dbu_per_um must be positive, got {}",
                file.dbu_per_um
            )));
        }
        let dbu = |um: Decimal| um_to_dbu(um, file.dbu_per_um);

        let mut cuts = file
            .cuts
            .iter()
            .map(|c| {
                Ok(CutRule {
                    layer: c.layer.as_str().into(),
                    level: c.level,
                    size: dbu(c.size)?,
                    spacing: dbu(c.spacing)?,
                    enclosure_below: dbu(c.enclosure_below)?,
                    enclosure_above: dbu(c.enclosure_above)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        cuts.sort_by_key(|c| c.level);

        let rules = file
            .rules
            .iter()
            .map(|(name, r)| {
                Ok((
                    name.clone(),
                    LayerRule {
                        min_width: dbu(r.min_width)?,
                        min_separation: dbu(r.min_separation)?,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let halo = match file.halo.as_ref() {
            Some(h) => Some(HaloRule {
                contact: h.contact.as_str().into(),
                poly: h.poly.as_str().into(),
                layer: h.layer.as_str().into(),
                pad: dbu(h.pad)?,
                threshold: dbu(h.threshold)?,
            }),
            None => None,
        };

        let map = Self {
            name: file.name.into(),
            dbu_per_um: file.dbu_per_um,
            grid: dbu(file.grid)?,
            layers: file
                .layers
                .into_iter()
                .map(|(name, (number, datatype))| (name, GdsLayer::new(number, datatype)))
                .collect(),
            levels: file.levels,
            cuts,
            rules,
            models: file.models,
            valid_bjt_sizes: file.valid_bjt_sizes,
            halo,
        };
        map.validate()?;
        log::debug!(
            "loaded technology `{}`: {} layers, {} routing levels",
            map.name,
            map.layers.len(),
            map.top_level() + 1
        );
        Ok(map)
    }

    fn validate(&self) -> Result<()> {
        let err = |msg: String| Err(Error::Tech(format!("{}: {}", self.name, msg)));

        if self.grid <= 0 {
            return err("manufacturing grid must be positive".into());
        }
        for name in self.levels.keys() {
            if !self.layers.contains_key(name) {
                return err(format!("routing layer `{name}` has no physical layer"));
            }
        }
        if self.levels.is_empty() {
            return err("no routing levels defined".into());
        }
        for level in 0..=self.top_level() {
            let n = self.levels.values().filter(|&&l| l == level).count();
            if n == 0 {
                return err(format!("routing level {level} has no layer"));
            }
            if level > 0 && n > 1 {
                return err(format!("routing level {level} has more than one layer"));
            }
        }
        if self.cuts.len() != self.top_level() {
            return err(format!(
                "expected {} cut rules, found {}",
                self.top_level(),
                self.cuts.len()
            ));
        }
        for (expected, cut) in self.cuts.iter().enumerate() {
            if cut.level != expected {
                return err(format!(
                    "cut `{}` joins level {} but level {expected} has no cut",
                    cut.layer, cut.level
                ));
            }
            if !self.layers.contains_key(cut.layer.as_str()) {
                return err(format!("cut `{}` has no physical layer", cut.layer));
            }
            if cut.size <= 0 {
                return err(format!("cut `{}` must have a positive size", cut.layer));
            }
            if cut.spacing < 0 {
                return err(format!("cut `{}` has negative spacing", cut.layer));
            }
            if cut.enclosure_below < 0 || cut.enclosure_above < 0 {
                return err(format!("cut `{}` has a negative enclosure", cut.layer));
            }
        }
        if let Some(halo) = self.halo.as_ref() {
            for name in [&halo.contact, &halo.poly, &halo.layer] {
                if !self.layers.contains_key(name.as_str()) {
                    return err(format!("halo layer `{name}` has no physical layer"));
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn dbu_per_um(&self) -> Int {
        self.dbu_per_um
    }

    /// The manufacturing grid in database units.
    #[inline]
    pub fn grid_dbu(&self) -> Int {
        self.grid
    }

    pub fn to_dbu(&self, um: Decimal) -> Result<Int> {
        um_to_dbu(um, self.dbu_per_um)
    }

    pub fn to_um(&self, dbu: Int) -> Decimal {
        Decimal::from(dbu) / Decimal::from(self.dbu_per_um)
    }

    /// Resolves an abstract layer name to its physical layer.
    pub fn layer_of(&self, name: &str) -> Result<GdsLayer> {
        self.layers
            .get(name)
            .copied()
            .ok_or_else(|| self.unknown_layer(name))
    }

    /// The stack level of a routing layer.
    pub fn level_of(&self, name: &str) -> Result<usize> {
        self.levels
            .get(name)
            .copied()
            .ok_or_else(|| self.unknown_layer(name))
    }

    pub fn top_level(&self) -> usize {
        self.levels.values().copied().max().unwrap_or_default()
    }

    /// The routing layer on `level`. Level 0 may carry several layers; the
    /// first one in name order is returned.
    pub fn routing_layer(&self, level: usize) -> Result<&str> {
        self.levels
            .iter()
            .find(|(_, &l)| l == level)
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| Error::Tech(format!("{}: no routing layer on level {level}", self.name)))
    }

    /// The cut between `level` and `level + 1`.
    pub fn cut_between(&self, level: usize) -> Result<&CutRule> {
        self.cuts.get(level).ok_or_else(|| {
            Error::Tech(format!(
                "{}: no cut above level {level}; the top level is {}",
                self.name,
                self.top_level()
            ))
        })
    }

    pub fn rule(&self, name: &str) -> Result<LayerRule> {
        self.rules
            .get(name)
            .copied()
            .ok_or_else(|| self.unknown_layer(name))
    }

    pub fn model_name(&self, kind: &str) -> Result<&str> {
        self.models
            .get(kind)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownModel {
                tech: self.name.clone(),
                kind: kind.to_string(),
            })
    }

    /// Allowed (width, length) pairs in microns; empty when the process
    /// offers no fixed-size devices of this kind.
    pub fn valid_bjt_sizes(&self, kind: &str) -> &[(Decimal, Decimal)] {
        self.valid_bjt_sizes
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[inline]
    pub fn halo_rule(&self) -> Option<&HaloRule> {
        self.halo.as_ref()
    }

    /// Runs the process's default post-processing on a finished cell.
    pub fn post_process(&self, lib: &mut Library, cell: CellId) -> Result<()> {
        match self.halo.as_ref() {
            Some(rule) => rule.apply(lib, cell, self).map(|_| ()),
            None => Ok(()),
        }
    }

    fn unknown_layer(&self, name: &str) -> Error {
        Error::UnknownLayer {
            tech: self.name.clone(),
            layer: name.to_string(),
        }
    }
}
