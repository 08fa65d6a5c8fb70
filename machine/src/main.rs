// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let cli: machine::Cli = argh::from_env();
    let config = machine::MachineConfig::load(&cli)?;

    let env = env_logger::Env::default().default_filter_or(
        config.log_level.clone().unwrap_or_else(|| "info".to_string()),
    );
    env_logger::Builder::from_env(env).init();

    let mut machine = machine::Machine::new(&config)
        .with_context(|| "failed to assemble machine from configuration")?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    log::info!("starting dispatch loop at pc={:#010x}", machine.state.pc);
    machine.run_until(&stop);
    log::info!("dispatch loop stopped");
    Ok(())
}

/// Installs `on_stop` as the process's interrupt handler. Kept as a tiny indirection so
/// `main` reads linearly; there is exactly one call site.
fn ctrlc_handler(on_stop: impl Fn() + Send + 'static) -> anyhow::Result<()> {
    ctrlc::set_handler(on_stop).context("failed to install Ctrl-C handler")
}
