//! Model listing command.

use console::style;

use crate::config::{resolve_llm, Config, LlmOverrides};
use crate::llm::LlmClient;

/// List available models and exit. Never touches any document directory.
pub async fn cmd_models(config: &Config, overrides: &LlmOverrides) -> anyhow::Result<()> {
    let llm = resolve_llm(config, overrides);
    let client = LlmClient::new(llm.clone())?;

    println!("\n{}", style("LLM Configuration").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Provider:", llm.provider_name());
    println!("{:<20} {}", "Endpoint:", llm.endpoint());
    println!("{:<20} {}", "Current Model:", llm.model);

    println!("\n{}", style("Available models").bold());
    println!("{}", "-".repeat(40));

    match client.list_models().await {
        Ok(models) if models.is_empty() => println!("  No models available"),
        Ok(models) => {
            for model in models {
                let marker = if model == llm.model {
                    style("*").green().to_string()
                } else {
                    "-".to_string()
                };
                println!("{} {}", marker, model);
            }
        }
        Err(e) => {
            println!("{} Failed to list models: {}", style("✗").red(), e);
            println!("  {}", llm.availability_hint());
            return Err(e.into());
        }
    }

    Ok(())
}
