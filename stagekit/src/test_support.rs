//! Test-only helpers for laying out a research project on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::io::config::CONFIG_FILE;

pub const SNAKEFILE: &str = r#"from project_setup import create_paths_and_files
paths, files = create_paths_and_files()

include: "rules/dgp.smk"

rule all:
    input:
        files.final_tables,
        files.stata_results,

rule estimate:
    input:
        sim_data_shocked = files.sim_data_shocked,
    output:
        estimates = files.estimates,
    params:
        robust = True,
    log: paths.estimate_model_logs / "estimate.log"
    script:
        "analysis/estimate_model/code/estimate.py"

rule tables:
    input: estimates = files.estimates
    output: final_tables = files.final_tables
    script: "analysis/make_tables/code/tables.py"
"#;

pub const DGP_RULES: &str = r#"rule simulate:
    input: files.config
    output:
        sim_data = files.sim_data,
    params:
        seed = 42,
        n_obs = 1_000,
    script: str(files.simulate)

rule add_shocks:
    input:
        sim_data = files.sim_data,
    output:
        sim_data_shocked = files.sim_data_shocked,
    params:
        shock_scale = 0.5,
    shell:
        "echo {input} > {output}"
    script: "../dgp/add_shocks/code/add_shocks.py"
"#;

pub const CONFIG: &str = r#"[log]
retention = 3

[[files]]
kind = "folder"
key = "config"
folder = "root"
file = "config.yaml"

[[files]]
kind = "folder"
key = "dgp_smk"
folder = "rules"
file = "dgp.smk"

[[files]]
kind = "folder"
key = "analysis_smk"
folder = "rules"
file = "analysis.smk"

[[files]]
kind = "output"
key = "sim_data"
folder = "simulate_baseline"
file = "sim_data.csv"

[[files]]
kind = "script"
name = "simulate"
folder = "simulate_baseline"

[[files]]
kind = "output"
key = "sim_data_shocked"
folder = "add_shocks"
file = "sim_data_shocked.csv"

[[files]]
kind = "script"
name = "add_shocks"
folder = "add_shocks"

[[files]]
kind = "script"
name = "shocks_funcs"
folder = "add_shocks"

[[files]]
kind = "output"
key = "estimates"
folder = "estimate_model"
file = "estimates.txt"

[[files]]
kind = "script"
name = "estimate"
folder = "estimate_model"

[[files]]
kind = "output"
key = "final_tables"
folder = "make_tables"
file = "final_tables.txt"

[[files]]
kind = "script"
name = "tables"
folder = "make_tables"

[[files]]
kind = "code"
key = "stata_analysis"
folder = "stata_analysis"
file = "stata_analysis.do"

[[files]]
kind = "output"
key = "stata_results"
folder = "stata_analysis"
file = "stata_results.tex"

[[files]]
kind = "document"
name = "stata_results_md"
folder = "stata_analysis"

[[files]]
kind = "typeset"
name = "stata_results_tex"
folder = "stata_analysis"
"#;

const STAGES: [&str; 5] = [
    "dgp/simulate_baseline",
    "dgp/add_shocks",
    "analysis/estimate_model",
    "analysis/make_tables",
    "analysis/stata_analysis",
];

const SCRIPTS: [&str; 6] = [
    "dgp/simulate_baseline/code/simulate.py",
    "dgp/add_shocks/code/add_shocks.py",
    "dgp/add_shocks/code/shocks_funcs.py",
    "analysis/estimate_model/code/estimate.py",
    "analysis/make_tables/code/tables.py",
    "analysis/stata_analysis/code/stata_analysis.do",
];

/// A complete project in a temporary directory: two themes with five stages,
/// `rules/` and `utils/`, a `.project_root` marker, a Snakefile including
/// `rules/dgp.smk`, and a `stagekit.toml` declaring the project files.
pub struct ProjectFixture {
    _temp: TempDir,
    root: PathBuf,
}

impl ProjectFixture {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().canonicalize().expect("canonical tempdir");
        let fixture = Self { _temp: temp, root };

        for stage in STAGES {
            fs::create_dir_all(fixture.path(stage).join("code")).expect("stage code dir");
            fs::create_dir_all(fixture.path(stage).join("output")).expect("stage output dir");
        }
        fs::create_dir_all(fixture.path("utils/plotting")).expect("utils");
        for script in SCRIPTS {
            fixture.write(script, "");
        }
        fixture.write(".project_root", "");
        fixture.write("config.yaml", "seed: 42\n");
        fixture.write("Snakefile", SNAKEFILE);
        fixture.write("rules/dgp.smk", DGP_RULES);
        fixture.write(CONFIG_FILE, CONFIG);
        fixture
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `contents` to `relative`, creating parent folders.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write fixture file");
    }

    /// Replace `stagekit.toml`.
    pub fn write_config(&self, contents: &str) {
        self.write(CONFIG_FILE, contents);
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
