use std::fmt::Write;

use async_trait::async_trait;

use crate::router::{CommandContext, CommandSpec, KeywordCommand};

const SPEC: CommandSpec = CommandSpec {
    name: "help",
    aliases: &["menu"],
    description: "Show this list of commands",
};

/// Lists the registered commands. Build it after everything else is registered.
pub struct HelpCommand {
    text: String,
}

impl HelpCommand {
    pub fn new(prefix: &str, mut commands: Vec<CommandSpec>) -> Self {
        commands.push(SPEC);
        let mut text = String::from("📋 *Commands*\n");
        for spec in &commands {
            let _ = write!(text, "\n• *{prefix}{}*", spec.name);
            if !spec.aliases.is_empty() {
                let _ = write!(text, " ({})", spec.aliases.join(", "));
            }
            let _ = write!(text, "\n   {}", spec.description);
        }
        Self { text }
    }
}

#[async_trait]
impl KeywordCommand for HelpCommand {
    fn spec(&self) -> CommandSpec {
        SPEC
    }

    async fn run(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.reply(&self.text).await
    }
}
