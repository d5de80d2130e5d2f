use crate::tech::TechMap;

mod routes;

/// A small process with round numbers: the minimal poly/met1 tower is 0.6um
/// square, the met1/met2 tower 0.4um.
const TEST_TECH: &str = r#"
name = "test"
dbu_per_um = 1000
grid = 0.005

[layers]
diff = [1, 0]
poly = [2, 0]
cont = [3, 0]
met1 = [4, 0]
via1 = [5, 0]
met2 = [6, 0]
npc = [7, 0]

[levels]
diff = 0
poly = 0
met1 = 1
met2 = 2

[[cuts]]
layer = "cont"
level = 0
size = 0.2
spacing = 0.1
enclosure_below = 0.2
enclosure_above = 0.2

[[cuts]]
layer = "via1"
level = 1
size = 0.2
spacing = 0.1
enclosure_below = 0.1
enclosure_above = 0.1

[rules]
poly = { min_width = 0.2, min_separation = 0.2 }
met1 = { min_width = 0.3, min_separation = 0.3 }
met2 = { min_width = 0.3, min_separation = 0.3 }

[models]
nfet = "nch"
pfet = "pch"

[halo]
contact = "cont"
poly = "poly"
layer = "npc"
"#;

pub(crate) fn test_tech() -> TechMap {
    TechMap::from_toml(TEST_TECH).expect("failed to load test technology")
}
