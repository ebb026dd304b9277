// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::env;
use std::path::PathBuf;

use anyhow::{Result, bail};
use sprite_atlas::pack::{self, PackOptions};

fn main() -> Result<()> {
    env_logger::init();

    let mut job = None;
    let mut options = PackOptions::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--gpu" => options.use_gpu = true,
            "--outline" => options.outline = true,
            _ => job = Some(PathBuf::from(arg)),
        }
    }
    let Some(job) = job else {
        bail!("usage: sprite-atlas <job.yaml|job.json> [--gpu] [--outline]");
    };

    let manifest = pack::run(&job, options)?;
    log::info!("Wrote {}", manifest.display());
    Ok(())
}
