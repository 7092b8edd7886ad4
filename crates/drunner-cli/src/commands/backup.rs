use super::exit_code;
use drunner_core::Context;
use std::path::Path;

pub fn run(ctx: &Context, name: &str, dest: &Path) -> Result<u8, String> {
    let result = drunner_core::backup(ctx, name, dest).map_err(|e| e.to_string())?;
    println!("backed up '{name}' to {}", dest.display());
    Ok(exit_code(result))
}
