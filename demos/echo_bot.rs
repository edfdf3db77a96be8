use std::error::Error;

use secrecy::SecretString;
use slack_sdk::format::escape;
use slack_sdk::rtm::FrameKind;
use slack_sdk::WebApiClient;

fn main() -> Result<(), Box<dyn Error>> {
    let token = std::env::var("SLACK_BOT_TOKEN")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = WebApiClient::with_token(SecretString::new(token))?;
        let mut session = client.rtm_connect(true).await?;
        if !session.await_hello().await {
            return Err("server did not greet with hello".into());
        }
        println!("connected as {}", session.bot_mention());

        let mention = session.bot_mention();
        while let Some(frame) = session.next_event().await {
            if frame.kind != FrameKind::Message {
                continue;
            }
            let (Some(channel), Some(text), Some(ts)) = (frame.channel(), frame.text(), frame.ts())
            else {
                continue;
            };
            if !text.contains(&mention) {
                continue;
            }

            session.send_typing_indicator(channel).await?;
            let reply = format!("you said: {}", escape(&text.replace(&mention, "")));
            session.reply_in_thread(channel, ts, reply.trim()).await?;
        }

        session.close().await;
        Ok::<(), Box<dyn Error>>(())
    })
}
