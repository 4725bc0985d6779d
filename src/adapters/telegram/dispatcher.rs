//! Long-polling dispatcher. Feeds inbound text messages to the CommandPort.

use crate::adapters::telegram::mapper;
use crate::ports::CommandPort;
use std::sync::Arc;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

/// Run until the process stops. Each message yields at most one reply in the same chat.
pub async fn run_dispatcher(bot: Bot, commands: Arc<dyn CommandPort>) {
    if let Ok(me) = bot.get_me().await {
        info!(username = %me.username(), "bot connected");
    }

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![commands])
        .build()
        .dispatch()
        .await;
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    commands: Arc<dyn CommandPort>,
) -> ResponseResult<()> {
    let Some(inbound) = mapper::to_inbound(&msg) else {
        return Ok(());
    };
    if let Some(reply) = commands.handle(inbound).await {
        if let Err(e) = bot.send_message(msg.chat.id, reply).await {
            warn!(chat_id = msg.chat.id.0, error = %e, "failed to send reply");
        }
    }
    Ok(())
}
