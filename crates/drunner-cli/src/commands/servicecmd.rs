use super::EXIT_SUCCESS;
use drunner_core::Context;

pub fn run(ctx: &Context, name: &str, args: &[String]) -> Result<u8, String> {
    drunner_core::service_cmd(ctx, name, args).map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
