use super::exit_code;
use drunner_core::Context;

pub fn run(ctx: &Context, name: &str) -> Result<u8, String> {
    let result = drunner_core::uninstall(ctx, name).map_err(|e| e.to_string())?;
    println!("uninstalled '{name}' (data volumes kept; obliterate removes them)");
    Ok(exit_code(result))
}
