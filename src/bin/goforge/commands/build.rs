//! `goforge build` command

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};

use crate::cli::{BuildArgs, GlobalOpts, MessageFormat};
use goforge::builder::{BuildEvent, BuildStatus};
use goforge::ops::goforge_build::{plan, run, BuildOptions, ShellReporter};
use goforge::util::config::{BuildConfig, Config, ToolchainConfig};
use goforge::util::shell::{format_duration, Status};

pub fn execute(global: &GlobalOpts, args: BuildArgs) -> Result<()> {
    let shell = Arc::new(global.shell(args.message_format == MessageFormat::Json));
    let ctx = global.context()?;

    // --fail-fast / --keep-going override the configured policy
    let fail_fast = if args.fail_fast {
        Some(true)
    } else if args.keep_going {
        Some(false)
    } else {
        None
    };

    let opts = BuildOptions {
        variants: args.selection.variants,
        targets: args.selection.targets,
        config: Config {
            build: BuildConfig {
                jobs: args.jobs,
                timeout: args.timeout,
                fail_fast,
            },
            toolchain: ToolchainConfig {
                go: args.toolchain.go,
                ndk: args.toolchain.ndk,
            },
        },
    };

    let session = plan(&ctx, &opts)?;
    let start = Instant::now();

    let reporter = Arc::new(ShellReporter::new(Arc::clone(&shell), &session.units));
    let report = run(&session, reporter.clone())?;
    reporter.finish();

    let built = report.count(BuildStatus::Succeeded);
    let fresh = report.count(BuildStatus::Skipped);
    let failed = report.count(BuildStatus::Failed);
    let elapsed = start.elapsed();

    shell.event(&BuildEvent::finished(
        report.is_success(),
        elapsed.as_millis() as u64,
        built,
        fresh,
        failed,
    ));

    if report.is_success() {
        shell.status(
            Status::Finished,
            format!(
                "{} variant(s) ({} built, {} fresh) in {}",
                report.results.len(),
                built,
                fresh,
                format_duration(elapsed)
            ),
        );
        return Ok(());
    }

    let mut failures: Vec<String> = report.failed().map(|r| r.name.clone()).collect();
    failures.extend(report.not_run.iter().map(|name| format!("{} (not run)", name)));
    bail!(
        "{} of {} variant(s) failed: {}",
        failed + report.not_run.len(),
        session.units.len(),
        failures.join(", ")
    )
}
