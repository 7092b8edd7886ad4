use super::exit_code;
use drunner_core::Context;

pub fn run(ctx: &Context, name: &str, image: &str) -> Result<u8, String> {
    let result = drunner_core::install(ctx, name, image).map_err(|e| e.to_string())?;
    println!("installed '{name}' from {image}");
    Ok(exit_code(result))
}
