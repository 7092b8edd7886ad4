use super::exit_code;
use drunner_core::Context;

pub fn run(ctx: &Context, name: &str, image: Option<&str>) -> Result<u8, String> {
    let result = drunner_core::recover(ctx, name, image).map_err(|e| e.to_string())?;
    println!("recovered '{name}'");
    Ok(exit_code(result))
}
