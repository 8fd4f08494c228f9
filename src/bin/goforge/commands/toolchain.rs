//! `goforge toolchain` command

use anyhow::{bail, Result};

use crate::cli::{GlobalOpts, ToolchainArgs};
use goforge::builder::ToolchainResolver;
use goforge::ops::goforge_build::{plan, BuildOptions};
use goforge::util::config::{Config, ToolchainConfig};

pub fn execute(global: &GlobalOpts, args: ToolchainArgs) -> Result<()> {
    let shell = global.shell(false);
    let ctx = global.context()?;
    let opts = BuildOptions {
        variants: args.selection.variants,
        targets: args.selection.targets,
        config: Config {
            toolchain: ToolchainConfig {
                go: args.toolchain.go,
                ndk: args.toolchain.ndk,
            },
            ..Config::default()
        },
    };

    let session = plan(&ctx, &opts)?;
    let resolver = ToolchainResolver::new(session.config.toolchain_overrides());

    let mut failed = 0;
    for unit in &session.units {
        println!("{} ({}):", unit.name, unit.target);
        match resolver.resolve(unit.os(), unit.arch(), &unit.cgo.compiler) {
            Ok(spec) => {
                println!("  go:     {} (go{})", spec.go.display(), spec.go_version);
                if let Some(cc) = &spec.cc {
                    println!("  cc:     {}", cc.display());
                }
                for (key, value) in &spec.env {
                    println!("  {}={}", key, value);
                }
            }
            Err(e) => {
                failed += 1;
                shell.error(format!("{}: {}", unit.name, e));
            }
        }
    }

    if failed > 0 {
        bail!("could not resolve a toolchain for {} variant(s)", failed);
    }
    Ok(())
}
