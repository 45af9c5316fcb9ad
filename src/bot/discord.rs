use crate::conversation::{Command, Conversation, Progress, Reply, CALLBACK_PREFIX};
use crate::db::UserProfile;
use crate::media::is_video_url;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt};
use twilight_http::Client as HttpClient;
use twilight_model::{
    application::{
        command::CommandType,
        interaction::{Interaction, InteractionData, InteractionType},
    },
    channel::message::{
        component::{ActionRow, Button, ButtonStyle},
        Component, MessageFlags,
    },
    gateway::payload::incoming::MessageCreate,
    http::interaction::{InteractionResponse, InteractionResponseType},
    id::{
        marker::{ApplicationMarker, ChannelMarker, MessageMarker},
        Id,
    },
    user::User,
};
use twilight_util::builder::{command::CommandBuilder, InteractionResponseDataBuilder};
use url::Url;

/// Discord allows at most five buttons per action row.
const BUTTONS_PER_ROW: usize = 5;

const TRACKED_CARDS: usize = 1024;

/// Which user each quality card was posted for. The oldest cards are forgotten first.
#[derive(Default)]
struct CardOwners {
    owners: HashMap<Id<MessageMarker>, u64>,
    order: VecDeque<Id<MessageMarker>>,
}

impl CardOwners {
    fn record(&mut self, card: Id<MessageMarker>, owner: u64) {
        if self.owners.insert(card, owner).is_none() {
            self.order.push_back(card);
        }
        while self.order.len() > TRACKED_CARDS {
            if let Some(oldest) = self.order.pop_front() {
                self.owners.remove(&oldest);
            }
        }
    }

    fn is_owner(&self, card: Id<MessageMarker>, user_id: u64) -> bool {
        self.owners.get(&card) == Some(&user_id)
    }

    fn forget(&mut self, card: Id<MessageMarker>) {
        if self.owners.remove(&card).is_some() {
            self.order.retain(|tracked| *tracked != card);
        }
    }
}

/// A click on one's own card edits the card in place. Anyone else gets a private reply
/// and the card is left alone.
fn acknowledgement(own_card: bool) -> InteractionResponse {
    if own_card {
        InteractionResponse {
            kind: InteractionResponseType::DeferredUpdateMessage,
            data: None,
        }
    } else {
        InteractionResponse {
            kind: InteractionResponseType::DeferredChannelMessageWithSource,
            data: Some(
                InteractionResponseDataBuilder::new()
                    .flags(MessageFlags::EPHEMERAL)
                    .build(),
            ),
        }
    }
}

pub struct DiscordBot {
    http: Arc<HttpClient>,
    conversation: Arc<Conversation>,
    application_id: Id<ApplicationMarker>,
    cards: std::sync::Mutex<CardOwners>,
}

impl DiscordBot {
    pub async fn new(token: &str, conversation: Arc<Conversation>) -> Result<Self> {
        let http = Arc::new(HttpClient::new(token.to_string()));

        let application_id = {
            let response = http.current_user_application().await?;
            response.model().await?.id
        };

        let bot = Self {
            http,
            conversation,
            application_id,
            cards: std::sync::Mutex::new(CardOwners::default()),
        };
        bot.register_commands().await?;

        Ok(bot)
    }

    async fn register_commands(&self) -> Result<()> {
        info!("Registering Discord slash commands...");

        let commands = [
            ("start", "Start using the bot"),
            ("help", "Show how to use the bot"),
            ("stats", "Bot statistics (admin only)"),
        ]
        .into_iter()
        .map(|(name, description)| {
            CommandBuilder::new(name, description, CommandType::ChatInput).build()
        })
        .collect::<Vec<_>>();

        self.http
            .interaction(self.application_id)
            .set_global_commands(&commands)
            .await?;

        info!(count = commands.len(), "Registered slash commands");
        Ok(())
    }

    /// Reads gateway events until the shard closes or `shutdown` fires.
    /// Each event is handled on its own task so long downloads never stall the gateway.
    pub async fn run(self, token: &str, shutdown: CancellationToken) -> Result<()> {
        let intents =
            Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT;
        let mut shard = Shard::new(ShardId::ONE, token.to_string(), intents);
        let wanted = EventTypeFlags::READY
            | EventTypeFlags::MESSAGE_CREATE
            | EventTypeFlags::INTERACTION_CREATE;
        let bot = Arc::new(self);

        info!("Discord bot starting...");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Discord bot stopping");
                    return Ok(());
                }
                event = shard.next_event(wanted) => event,
            };

            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(source)) => {
                    error!(?source, "Error receiving event");
                    continue;
                }
                None => {
                    info!("Shard stream ended");
                    return Ok(());
                }
            };

            match event {
                Event::Ready(_) => info!("Discord bot is ready!"),
                Event::MessageCreate(msg) => {
                    let bot = bot.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bot.handle_message(&msg).await {
                            error!(
                                channel_id = %msg.channel_id,
                                error = ?e,
                                "Failed to handle message"
                            );
                        }
                    });
                }
                Event::InteractionCreate(interaction) => {
                    let bot = bot.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bot.handle_interaction(&interaction).await {
                            error!(
                                interaction_id = %interaction.id,
                                error = ?e,
                                "Failed to handle interaction"
                            );
                        }
                    });
                }
                _ => {}
            }
        }
    }

    async fn handle_message(&self, msg: &MessageCreate) -> Result<()> {
        if msg.author.bot {
            return Ok(());
        }

        let user = profile(&msg.author);

        if let Some(command) = Command::parse(&msg.content) {
            let reply = self.conversation.handle_command(&user, command);
            send_reply(&self.http, msg.channel_id, None, &reply).await?;
            return Ok(());
        }

        // Direct messages are always a conversation turn. In guilds only video links are.
        let text = if msg.guild_id.is_none() {
            msg.content.clone()
        } else {
            match extract_urls(&msg.content)
                .into_iter()
                .find(|url| is_video_url(url))
            {
                Some(url) => url,
                None => return Ok(()),
            }
        };

        let progress = MessageProgress::new(self.http.clone(), msg.channel_id);
        let reply = self.conversation.handle_text(&user, &text, &progress).await;
        let card = progress.finish(&reply).await?;
        if !reply.options.is_empty() {
            self.card_owners().record(card, user.id);
        }
        Ok(())
    }

    fn card_owners(&self) -> std::sync::MutexGuard<'_, CardOwners> {
        self.cards.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn handle_interaction(&self, interaction: &Interaction) -> Result<()> {
        let Some(author) = interaction.author() else {
            return Ok(());
        };
        let user = profile(author);

        match (&interaction.kind, &interaction.data) {
            (
                InteractionType::ApplicationCommand,
                Some(InteractionData::ApplicationCommand(data)),
            ) => {
                let command = match data.name.as_str() {
                    "start" => Command::Start,
                    "help" => Command::Help,
                    "stats" => Command::Stats,
                    other => {
                        info!("Unknown command: {}", other);
                        return Ok(());
                    }
                };
                let reply = self.conversation.handle_command(&user, command);
                self.respond(interaction, &reply, command == Command::Stats)
                    .await
            }
            (InteractionType::MessageComponent, Some(InteractionData::MessageComponent(data)))
                if data.custom_id.starts_with(CALLBACK_PREFIX) =>
            {
                self.handle_quality_choice(interaction, &user, &data.custom_id)
                    .await
            }
            _ => Ok(()),
        }
    }

    async fn handle_quality_choice(
        &self,
        interaction: &Interaction,
        user: &UserProfile,
        custom_id: &str,
    ) -> Result<()> {
        let card = interaction.message.as_ref().map(|message| message.id);
        let own_card = card.is_some_and(|card| self.card_owners().is_owner(card, user.id));

        // Acknowledge now, the download outlives the three second response window
        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &acknowledgement(own_card))
            .await?;

        let progress = InteractionProgress {
            http: self.http.clone(),
            application_id: self.application_id,
            token: interaction.token.clone(),
        };
        let reply = self.conversation.select(user, custom_id, &progress).await;
        if own_card && reply.options.is_empty() {
            if let Some(card) = card {
                self.card_owners().forget(card);
            }
        }
        progress.edit(&reply.text, &render_options(&reply)).await
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        reply: &Reply,
        ephemeral: bool,
    ) -> Result<()> {
        let mut data = InteractionResponseDataBuilder::new()
            .content(reply.text.clone())
            .components(render_options(reply));
        if ephemeral {
            data = data.flags(MessageFlags::EPHEMERAL);
        }

        let response = InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(data.build()),
        };
        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;

        Ok(())
    }
}

fn profile(user: &User) -> UserProfile {
    UserProfile {
        id: user.id.get(),
        display_name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
        username: Some(user.name.clone()),
    }
}

fn extract_urls(content: &str) -> Vec<String> {
    content
        .split_whitespace()
        .filter_map(|word| Url::parse(word.trim_matches(|c| c == '<' || c == '>')).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
        .collect()
}

fn render_options(reply: &Reply) -> Vec<Component> {
    reply
        .options
        .chunks(BUTTONS_PER_ROW)
        .map(|row| {
            Component::ActionRow(ActionRow {
                id: None,
                components: row
                    .iter()
                    .map(|option| {
                        Component::Button(Button {
                            custom_id: Some(option.callback_data.clone()),
                            disabled: false,
                            emoji: None,
                            id: None,
                            label: Some(option.label.clone()),
                            sku_id: None,
                            style: ButtonStyle::Primary,
                            url: None,
                        })
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Posts `reply`, or edits `status` into it when a status message is already showing.
/// Returns the id of the message now carrying the reply.
async fn send_reply(
    http: &HttpClient,
    channel_id: Id<ChannelMarker>,
    status: Option<Id<MessageMarker>>,
    reply: &Reply,
) -> Result<Id<MessageMarker>> {
    let components = render_options(reply);
    match status {
        Some(message_id) => {
            http.update_message(channel_id, message_id)
                .content(Some(reply.text.as_str()))
                .components(Some(components.as_slice()))
                .await?;
            Ok(message_id)
        }
        None => {
            let message = http
                .create_message(channel_id)
                .content(&reply.text)
                .components(&components)
                .await?
                .model()
                .await?;
            Ok(message.id)
        }
    }
}

/// Progress for plain messages: the first update posts a status message, later ones edit it.
struct MessageProgress {
    http: Arc<HttpClient>,
    channel_id: Id<ChannelMarker>,
    status: Mutex<Option<Id<MessageMarker>>>,
}

impl MessageProgress {
    fn new(http: Arc<HttpClient>, channel_id: Id<ChannelMarker>) -> Self {
        Self {
            http,
            channel_id,
            status: Mutex::new(None),
        }
    }

    async fn finish(&self, reply: &Reply) -> Result<Id<MessageMarker>> {
        let status = *self.status.lock().await;
        send_reply(&self.http, self.channel_id, status, reply).await
    }
}

#[async_trait]
impl Progress for MessageProgress {
    async fn update(&self, text: &str) {
        if let Err(e) = self.post(text).await {
            warn!(channel_id = %self.channel_id, error = ?e, "Failed to post progress");
        }
    }
}

impl MessageProgress {
    async fn post(&self, text: &str) -> Result<()> {
        let mut status = self.status.lock().await;
        match *status {
            Some(message_id) => {
                self.http
                    .update_message(self.channel_id, message_id)
                    .content(Some(text))
                    .await?;
            }
            None => {
                let message = self
                    .http
                    .create_message(self.channel_id)
                    .content(text)
                    .await?
                    .model()
                    .await?;
                *status = Some(message.id);
            }
        }
        Ok(())
    }
}

/// Progress for button clicks: edits the interaction response, which is either the
/// clicked card or a private reply.
struct InteractionProgress {
    http: Arc<HttpClient>,
    application_id: Id<ApplicationMarker>,
    token: String,
}

impl InteractionProgress {
    async fn edit(&self, text: &str, components: &[Component]) -> Result<()> {
        self.http
            .interaction(self.application_id)
            .update_response(&self.token)
            .content(Some(text))
            .components(Some(components))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Progress for InteractionProgress {
    async fn update(&self, text: &str) {
        // Clearing the buttons keeps a second click from racing the first
        if let Err(e) = self.edit(text, &[]).await {
            warn!(error = ?e, "Failed to post progress");
        }
    }
}
