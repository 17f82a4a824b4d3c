//! Built-in bot modules, selected with `--modules`.

use botkit_core::error::{BotError, Result};
use botkit_core::traits::BotContext;
use botkit_core::types::Message;
use botkit_engine::EngineBuilder;

pub const AVAILABLE: &[&str] = &["hello", "echo"];

/// Install every named module. An unknown name is a startup error.
pub fn install_all(builder: &mut EngineBuilder, names: &[String]) -> Result<()> {
    for name in names {
        install(builder, name.trim())?;
    }
    Ok(())
}

pub fn install(builder: &mut EngineBuilder, name: &str) -> Result<()> {
    match name {
        "hello" => {
            builder.hear("hello", vec![], false, hello)?;
        }
        "echo" => {
            builder.hear("^echo (.+)", vec![], false, echo)?;
        }
        other => {
            return Err(BotError::config(format!(
                "Unknown module '{other}' (available: {})",
                AVAILABLE.join(", ")
            )));
        }
    }
    tracing::info!("📦 Module loaded: {name}");
    Ok(())
}

async fn hello(ctx: BotContext, message: Message, _captures: Vec<Option<String>>) -> anyhow::Result<()> {
    ctx.reply(&message, "Hello!").await?;
    Ok(())
}

async fn echo(ctx: BotContext, message: Message, captures: Vec<Option<String>>) -> anyhow::Result<()> {
    let said = captures.into_iter().next().flatten().unwrap_or_default();
    ctx.reply(&message, &said).await?;
    Ok(())
}
