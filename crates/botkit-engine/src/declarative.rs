//! Rules and tasks declared in the config file.
//!
//! `[[hears]]` entries reply with a template, `[[tasks]]` entries post a
//! fixed text. Both are plain handler objects registered through the same
//! builder API as code-defined handlers.

use std::sync::Arc;

use async_trait::async_trait;
use botkit_core::config::{HearConfig, TaskConfig};
use botkit_core::error::Result;
use botkit_core::traits::{BotContext, HearHandler, TaskHandler};
use botkit_core::types::Message;
use botkit_scheduler::Trigger;

use crate::builder::EngineBuilder;

/// Replies to the sender with a `$1`..`$n` template.
#[derive(Debug, Clone)]
pub struct TemplateReply {
    template: String,
}

impl TemplateReply {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl HearHandler for TemplateReply {
    async fn hear(
        &self,
        ctx: BotContext,
        message: Message,
        captures: Vec<Option<String>>,
    ) -> anyhow::Result<()> {
        let text = expand_template(&self.template, &captures);
        ctx.reply(&message, &text).await?;
        Ok(())
    }
}

/// Posts fixed text to a channel.
#[derive(Debug, Clone)]
pub struct Announce {
    channel: String,
    text: String,
}

impl Announce {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl TaskHandler for Announce {
    async fn run(&self, ctx: BotContext) -> anyhow::Result<()> {
        ctx.post(&self.channel, &self.text).await?;
        Ok(())
    }
}

/// Substitute `$n` with capture group `n`. Groups that did not take part
/// become empty; out-of-range references are left as written.
pub fn expand_template(template: &str, captures: &[Option<String>]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let group = after[..digits].parse::<usize>().ok();
        match group {
            Some(n) if n >= 1 && n <= captures.len() => {
                out.push_str(captures[n - 1].as_deref().unwrap_or(""));
            }
            _ => out.push_str(&rest[pos..pos + 1 + digits]),
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}

/// Register the config's `[[hears]]` and `[[tasks]]`. Any malformed entry
/// fails the whole startup.
pub fn install_declarative(
    builder: &mut EngineBuilder,
    hears: &[HearConfig],
    tasks: &[TaskConfig],
) -> Result<()> {
    for hear in hears {
        builder.hear_with(
            &hear.pattern,
            hear.channels.clone(),
            hear.ambient,
            Arc::new(TemplateReply::new(&hear.reply)),
        )?;
    }
    for task in tasks {
        let trigger = Trigger::from_config(task)?;
        let name = task
            .name
            .clone()
            .unwrap_or_else(|| format!("post to {}", task.channel));
        builder.task_with(name, trigger, Arc::new(Announce::new(&task.channel, &task.text)));
    }
    Ok(())
}
