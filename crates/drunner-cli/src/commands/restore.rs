use super::exit_code;
use drunner_core::Context;
use std::path::Path;

pub fn run(ctx: &Context, name: &str, backup_file: &Path) -> Result<u8, String> {
    let result = drunner_core::restore(ctx, name, backup_file).map_err(|e| e.to_string())?;
    println!("restored '{name}' from {}", backup_file.display());
    Ok(exit_code(result))
}
