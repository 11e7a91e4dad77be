//! Stage entry point: resolve the project and rule context, then route logs
//! to the stage's log folder.
//!
//! Typical use at the top of a stage binary:
//!
//! ```no_run
//! use stagekit::rule::RuleRequest;
//! use stagekit::stage::{StageOptions, setup_stage};
//!
//! let stage = setup_stage(StageOptions::for_rule(RuleRequest::named("estimate")))?;
//! let estimates = stage.context.context.output.path("estimates");
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use tracing::info;

use crate::core::context::{ResolvedContext, RuleContext};
use crate::io::stage_log::open_stage_log;
use crate::logging;
use crate::project::Project;
use crate::rule::{RuleRequest, resolve_rule_context};

#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    /// Where the root search starts; defaults to the caller path, then the
    /// working directory.
    pub start: Option<PathBuf>,
    /// Root markers; `None` uses the defaults.
    pub markers: Option<Vec<String>>,
    pub request: RuleRequest,
    /// Context handed over by the orchestration engine.
    pub injected: Option<RuleContext>,
    /// Attach a stage log file. Ignored when `log.enabled = false` in config.
    pub log: bool,
}

impl StageOptions {
    pub fn for_rule(request: RuleRequest) -> Self {
        Self {
            request,
            log: true,
            ..Self::default()
        }
    }

    pub fn injected(context: RuleContext) -> Self {
        Self {
            injected: Some(context),
            log: true,
            ..Self::default()
        }
    }

    fn start_path(&self) -> Result<PathBuf> {
        if let Some(start) = &self.start {
            return Ok(start.clone());
        }
        if let Some(caller) = &self.request.caller {
            return Ok(caller.clone());
        }
        if let Some(scriptdir) = self.injected.as_ref().and_then(|ctx| ctx.scriptdir.clone()) {
            return Ok(scriptdir);
        }
        std::env::current_dir().context("read working directory")
    }
}

#[derive(Debug)]
pub struct Stage {
    pub project: Project,
    pub context: ResolvedContext,
    /// Attached log file, if any.
    pub log_path: Option<PathBuf>,
}

impl Stage {
    pub fn rule(&self) -> &str {
        &self.context.context.rule
    }
}

pub fn setup_stage(options: StageOptions) -> Result<Stage> {
    setup_stage_at(options, &Local::now())
}

/// [`setup_stage`] with an explicit clock for the log file name.
pub fn setup_stage_at<Tz: TimeZone>(options: StageOptions, now: &DateTime<Tz>) -> Result<Stage>
where
    Tz::Offset: std::fmt::Display,
{
    let start = options.start_path()?;
    let project = Project::discover(&start, options.markers.as_deref())?;
    logging::init(&project.config.log.level);

    let context = resolve_rule_context(options.injected, &options.request, &project)?;
    let rule = context.context.rule.clone();

    let log_path = if options.log && project.config.log.enabled {
        let location = context.log_location()?;
        let (file, path) =
            open_stage_log(&location.dir, &location.name, now, project.config.log.retention)?;
        logging::attach_stage_file(Some(file));
        Some(path)
    } else {
        // Detach a file left by an earlier stage in this process.
        logging::attach_stage_file(None);
        None
    };

    info!("rule context loaded for rule: {rule}");
    Ok(Stage {
        project,
        context,
        log_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ContextOrigin;
    use crate::test_support::{CONFIG, ProjectFixture};

    #[test]
    fn static_stage_without_log_file() {
        let fixture = ProjectFixture::new();
        let options = StageOptions {
            log: false,
            ..StageOptions::for_rule(RuleRequest::from_caller(
                fixture.path("analysis/estimate_model/code/estimate.py"),
            ))
        };

        let stage = setup_stage(options).expect("stage");
        assert_eq!(stage.rule(), "estimate");
        assert_eq!(stage.context.origin, ContextOrigin::StaticLoad);
        assert_eq!(stage.project.root, fixture.root());
        assert_eq!(stage.log_path, None);
        assert!(!fixture.path("analysis/estimate_model/logs").exists());
    }

    #[test]
    fn injected_stage_finds_root_from_scriptdir() {
        let fixture = ProjectFixture::new();
        let mut context = RuleContext::new("simulate");
        context.scriptdir = Some(fixture.path("dgp/simulate_baseline/code"));
        let options = StageOptions {
            log: false,
            ..StageOptions::injected(context.clone())
        };

        let stage = setup_stage(options).expect("stage");
        assert_eq!(stage.context.origin, ContextOrigin::Injected);
        assert_eq!(stage.context.context, context);
        assert_eq!(stage.project.root, fixture.root());
    }

    #[test]
    fn disabled_logging_in_config_skips_log_file() {
        let fixture = ProjectFixture::new();
        fixture.write_config(&CONFIG.replace("retention = 3", "enabled = false"));
        let options = StageOptions {
            start: Some(fixture.root().to_path_buf()),
            ..StageOptions::for_rule(RuleRequest::named("tables"))
        };

        let stage = setup_stage(options).expect("stage");
        assert_eq!(stage.log_path, None);
    }
}
