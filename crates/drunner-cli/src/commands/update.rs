use super::exit_code;
use drunner_core::{Context, OpResult};

pub fn run(ctx: &Context, name: &str) -> Result<u8, String> {
    let result = drunner_core::update(ctx, name).map_err(|e| e.to_string())?;
    match result {
        OpResult::Success => println!("updated '{name}'"),
        OpResult::NoChange => println!("'{name}' is already up to date"),
    }
    Ok(exit_code(result))
}
