//! The hook protocol: lifecycle notifications into the service's own image.
//!
//! Each lifecycle operation brackets its work with `<event>_start` /
//! `<event>_end` invocations of the `servicerunner` script delivered in the
//! image payload. The script runs inside a one-shot container of the
//! service's image, with the service directory (and any path arguments)
//! bind-mounted at identical paths so host paths remain valid inside.

use crate::service::Service;
use crate::settings::Context;
use crate::CoreError;
use drunner_runtime::Mount;
use std::path::Path;
use tracing::debug;

/// One lifecycle event, invoked as a start/end pair around the host-side
/// work. A service image that ships no `servicerunner` script simply does
/// not observe lifecycle events.
pub struct ServiceHook<'a> {
    ctx: &'a Context,
    service: &'a Service,
    event: &'a str,
    args: Vec<String>,
}

impl<'a> ServiceHook<'a> {
    pub fn new(ctx: &'a Context, service: &'a Service, event: &'a str, args: &[&str]) -> Self {
        Self {
            ctx,
            service,
            event,
            args: args.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    pub fn start(&self) -> Result<(), CoreError> {
        self.invoke("start")
    }

    pub fn end(&self) -> Result<(), CoreError> {
        self.invoke("end")
    }

    fn invoke(&self, phase: &str) -> Result<(), CoreError> {
        let command = format!("{}_{phase}", self.event);
        run_hook_script(self.ctx, self.service, &command, &self.args, true)
    }
}

/// Forward a user command line to the service's `servicerunner` script.
/// Unlike lifecycle hooks, a missing script is an error here — the user
/// explicitly asked the service to do something.
pub fn service_cmd(ctx: &Context, name: &str, args: &[String]) -> Result<(), CoreError> {
    let service = Service::from_installed(&ctx.settings, name)?;
    let (command, rest) = match args.split_first() {
        Some((c, r)) => (c.clone(), r.to_vec()),
        None => ("help".to_owned(), Vec::new()),
    };
    run_hook_script(ctx, &service, &command, &rest, false)
}

fn run_hook_script(
    ctx: &Context,
    service: &Service,
    command: &str,
    args: &[String],
    optional: bool,
) -> Result<(), CoreError> {
    let script = service.hook_script(&ctx.settings);
    if !script.exists() {
        if optional {
            debug!(
                service = service.name(),
                command, "no servicerunner script; skipping hook"
            );
            return Ok(());
        }
        return Err(CoreError::ValidationFailed(format!(
            "service '{}' has no servicerunner script",
            service.name()
        )));
    }

    let mut mounts: Vec<Mount> = Vec::new();
    let root = service.root_dir(&ctx.settings).display().to_string();
    mounts.push((root.clone(), root));
    // Path arguments (e.g. the in-backup scratch folder) are mounted at
    // their own host path so the script can read and write them directly.
    for arg in args {
        if Path::new(arg).is_dir() {
            mounts.push((arg.clone(), arg.clone()));
        }
    }

    let mut cmd = vec![script.display().to_string(), command.to_owned()];
    cmd.extend(args.iter().cloned());

    ctx.runtime.run_streaming(service.image(), &mounts, &cmd)?;
    Ok(())
}
