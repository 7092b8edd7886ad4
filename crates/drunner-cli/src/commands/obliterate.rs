use super::exit_code;
use drunner_core::{Context, OpResult};

pub fn run(ctx: &Context, name: &str) -> Result<u8, String> {
    let result = drunner_core::obliterate(ctx, name).map_err(|e| e.to_string())?;
    match result {
        OpResult::Success => println!("obliterated '{name}'"),
        OpResult::NoChange => println!("nothing to remove for '{name}'"),
    }
    Ok(exit_code(result))
}
