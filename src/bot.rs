//! The companion Telegram bot. It has one job: answer any message with a greeting and a button
//! that opens the portal as a Telegram web app.
//!
//! The bot runs on its own thread with its own tokio runtime, next to the actix system that
//! serves the API.
use crate::config::BotConfig;
use crate::metrics;
use std::thread;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    requests::JsonRequest,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo},
    update_listeners::Polling,
};
use tracing::{debug, error, info, warn};
use url::Url;

pub const WELCOME_TEXT: &str = "Привет! Я бот для платформы ФСП Линк 👋\n\nЧтобы начать работу, откройте приложение, нажав на кнопку ниже 👇";
pub const OPEN_APP_BUTTON: &str = "Открыть приложение";

/// Start the bot on a dedicated thread. It polls until the process exits.
pub fn spawn(config: BotConfig) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("telegram-bot".to_owned())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("couldn't start the bot runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(run(config));
        })
}

/// Long-poll Telegram and greet every message. Failed polls are logged and retried by the
/// listener.
pub async fn run(config: BotConfig) {
    info!(web_app = config.web_app_url.as_str(), "starting telegram bot");
    let bot = Bot::new(&config.token).set_api_url(config.api_base.clone());
    let listener = Polling::builder(bot.clone())
        .timeout(config.poll_timeout())
        .build();
    let handler = Update::filter_message().endpoint(reply);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![config.web_app_url.clone()])
        .default_handler(|_update| async {
            debug!("skipping update without a message");
            metrics::BOT_UPDATES.with_label_values(&["skipped"]).inc();
        })
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("telegram poll failed"),
        )
        .await;
}

async fn reply(bot: Bot, msg: Message, web_app_url: Url) -> ResponseResult<()> {
    // One chat failing (e.g. it blocked the bot) mustn't stop the others from being answered.
    greet(&bot, msg.chat.id, &web_app_url).await;
    Ok(())
}

/// Send the welcome message to `chat_id`. Returns whether Telegram accepted it.
async fn greet(bot: &Bot, chat_id: ChatId, web_app_url: &Url) -> bool {
    match welcome(bot, chat_id, web_app_url).await {
        Ok(_) => {
            metrics::BOT_UPDATES.with_label_values(&["replied"]).inc();
            true
        }
        Err(e) => {
            metrics::BOT_UPDATES.with_label_values(&["failed"]).inc();
            warn!(chat_id = chat_id.0, "couldn't reply: {}", e);
            false
        }
    }
}

/// The reply every message gets.
pub fn welcome(
    bot: &Bot,
    chat_id: ChatId,
    web_app_url: &Url,
) -> JsonRequest<teloxide::payloads::SendMessage> {
    let open_app = InlineKeyboardButton::web_app(
        OPEN_APP_BUTTON,
        WebAppInfo {
            url: web_app_url.clone(),
        },
    );
    bot.send_message(chat_id, WELCOME_TEXT)
        .reply_markup(InlineKeyboardMarkup::new(vec![vec![open_app]]))
}
