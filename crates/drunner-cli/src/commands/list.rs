use super::EXIT_SUCCESS;
use drunner_core::{installed_services, Context, Service};

pub fn run(ctx: &Context) -> Result<u8, String> {
    let names = installed_services(&ctx.settings).map_err(|e| e.to_string())?;
    if names.is_empty() {
        println!("no services installed");
        return Ok(EXIT_SUCCESS);
    }
    println!("{:<20} IMAGE", "SERVICE");
    for name in &names {
        let image = Service::from_installed(&ctx.settings, name)
            .map(|s| s.image().to_owned())
            .unwrap_or_else(|_| "(broken)".to_owned());
        println!("{name:<20} {image}");
    }
    Ok(EXIT_SUCCESS)
}
