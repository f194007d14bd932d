use anyhow::Result;

use super::ServiceArgs;

/// Probe the indexing service's liveness endpoint.
pub fn run(service: &ServiceArgs) -> Result<()> {
    let file_config = service.load_config()?;
    let client = service.connect(&file_config)?;

    let status = client.health()?;

    #[cfg(feature = "colorized_output")]
    {
        use console::style;
        let styled = if status == "ok" {
            style(status.as_str()).green().bold()
        } else {
            style(status.as_str()).yellow().bold()
        };
        println!("collection {}: {}", client.collection(), styled);
    }

    #[cfg(not(feature = "colorized_output"))]
    println!("collection {}: {}", client.collection(), status);

    Ok(())
}
