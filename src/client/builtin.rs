//! Bookkeeping handlers that every session runs before registered ones.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{Channel, Client, Emote};
use crate::codec::WireValue;
use crate::error::Result;
use crate::schema::{Message, NO_FIELDS};
use crate::symbol::fold;

impl Client {
    pub(super) fn is_self(&self, name: Option<&str>) -> bool {
        match (name, self.username.as_deref()) {
            (Some(name), Some(username)) => fold(name) == fold(username),
            _ => false,
        }
    }

    pub(super) fn run_builtin(&mut self, message: &Message) {
        let tag = message.tag();
        let result = if tag == &self.tags.connect {
            self.on_connect(message)
        } else if tag == self.tags.disconnect.tag() {
            self.on_disconnect()
        } else if tag == &self.tags.ping {
            self.queue("pong", NO_FIELDS).map(|_| ())
        } else if tag == &self.tags.join {
            self.on_join(message)
        } else if tag == &self.tags.leave {
            self.on_leave(message)
        } else if tag == &self.tags.emote {
            self.on_emote(message)
        } else if tag == &self.tags.set_channel_info {
            self.on_set_channel_info(message)
        } else if tag == &self.tags.users {
            self.on_users(message)
        } else {
            Ok(())
        };

        if let Err(err) = result {
            tracing::warn!("Bookkeeping for {} failed: {}", tag.name(), err);
        }
    }

    fn on_connect(&mut self, message: &Message) -> Result<()> {
        self.connected = true;
        if let Some(from) = message.from() {
            self.username = Some(from.to_string());
        }
        let offered = self.registry.extensions();
        self.extensions = message
            .get("extensions")
            .map(WireValue::string_items)
            .unwrap_or_default()
            .into_iter()
            .map(fold)
            .filter(|extension| offered.contains(extension))
            .collect();
        tracing::debug!(
            "Connected as {:?} with extensions {:?}",
            self.username,
            self.extensions
        );
        Ok(())
    }

    fn on_disconnect(&mut self) -> Result<()> {
        self.connected = false;
        self.channels.clear();
        self.active_channel = None;
        self.extensions.clear();
        self.outbox.clear();
        self.handlers.clear_callbacks();
        self.close();
        tracing::debug!("Session ended");
        Ok(())
    }

    fn on_join(&mut self, message: &Message) -> Result<()> {
        let Some(channel) = message.channel() else {
            return Ok(());
        };

        if self.servername.is_none() {
            self.servername = Some(channel.to_string());
            if self.is_supported("shirakumo-emotes") {
                let names: Vec<String> = self.emotes.keys().map(str::to_string).collect();
                self.queue("emotes", [("names", WireValue::strings(names))])?;
            }
        }

        if self.is_self(message.from()) {
            let record = Channel::new(channel);
            let private = record.is_private();
            self.channels.insert(channel, record);
            self.active_channel = Some(channel.to_string());
            self.queue("users", [("channel", channel)])?;
            // Private channels deny these requests anyway.
            if !private {
                if self.is_supported("shirakumo-channel-info") {
                    self.queue("channel-info", [("channel", channel)])?;
                }
                if self.is_supported("shirakumo-backfill") {
                    self.queue("backfill", [("channel", channel)])?;
                }
            }
        }

        if let (Some(record), Some(from)) = (self.channels.get_mut(channel), message.from()) {
            record.join(from);
        }
        Ok(())
    }

    fn on_leave(&mut self, message: &Message) -> Result<()> {
        let (Some(channel), Some(from)) = (message.channel(), message.from()) else {
            return Ok(());
        };

        if self.is_self(Some(from)) {
            self.channels.remove(channel);
            let was_active = self
                .active_channel
                .as_deref()
                .map_or(true, |active| fold(active) == fold(channel));
            if was_active {
                self.active_channel = self.channels.keys().next().map(str::to_string);
            }
        } else if let Some(record) = self.channels.get_mut(channel) {
            record.leave(from);
        }
        Ok(())
    }

    fn on_emote(&mut self, message: &Message) -> Result<()> {
        let (Some(name), Some(payload)) = (message.get_str("name"), message.get_str("payload")) else {
            return Ok(());
        };
        let content_type = message.get_str("content-type").unwrap_or("application/octet-stream");
        let payload = STANDARD.decode(payload)?;
        self.emotes.insert(name, Emote::new(name, content_type, payload));
        Ok(())
    }

    fn on_set_channel_info(&mut self, message: &Message) -> Result<()> {
        let Some(channel) = message.channel() else {
            return Ok(());
        };
        let key = match message.get("key") {
            Some(WireValue::Symbol(symbol)) => symbol.name().to_string(),
            Some(WireValue::String(key)) => key.clone(),
            _ => return Ok(()),
        };
        if let Some(record) = self.channels.get_mut(channel) {
            record.set_info(&key, message.text().unwrap_or_default());
        }
        Ok(())
    }

    fn on_users(&mut self, message: &Message) -> Result<()> {
        let Some(channel) = message.channel() else {
            return Ok(());
        };
        if let Some(record) = self.channels.get_mut(channel) {
            for user in message.get("users").map(WireValue::string_items).unwrap_or_default() {
                record.join(user);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::client::tests::{connected, written};
    use crate::error::LichatError;

    async fn deliver(client: &mut Client, text: &str) {
        let message = client.registry().decode_message(text).unwrap();
        client.handle(message).await;
    }

    #[tokio::test]
    async fn test_connect_negotiates_intersection() {
        let (client, _remote, _) =
            connected(&["shirakumo-backfill", "made-up-extension", "Shirakumo-Emotes"]).await;

        assert_eq!(client.extensions(), ["shirakumo-backfill", "shirakumo-emotes"]);
        assert!(client.is_supported("SHIRAKUMO-BACKFILL"));
        assert!(!client.is_supported("made-up-extension"));
    }

    #[tokio::test]
    async fn test_ping_replies_with_pong() {
        let (mut client, mut remote, _) = connected(&[]).await;

        deliver(&mut client, "(ping :from \"srv\" :id 12 :clock 1000)").await;

        let sent = written(&mut remote).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("(pong :id "));
    }

    #[tokio::test]
    async fn test_first_join_names_server_and_announces_emotes() {
        let (mut client, mut remote, _) = connected(&["shirakumo-emotes"]).await;
        client.insert_emote(Emote::new("smile", "image/png", vec![1, 2, 3]));

        deliver(&mut client, "(join :from \"TestServer\" :channel \"TestServer\" :id 1 :clock 1000)").await;
        deliver(&mut client, "(join :from \"bob\" :channel \"other\" :id 2 :clock 1000)").await;

        assert_eq!(client.servername(), Some("TestServer"));
        let sent = written(&mut remote).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("(emotes "));
        assert!(sent[0].ends_with(":names (\"smile\"))"));
    }

    #[tokio::test]
    async fn test_self_join_requests_channel_state() {
        let (mut client, mut remote, _) =
            connected(&["shirakumo-channel-info", "shirakumo-backfill"]).await;
        deliver(&mut client, "(join :from \"srv\" :channel \"srv\" :id 1 :clock 1000)").await;
        written(&mut remote).await;

        deliver(&mut client, "(join :from \"alice\" :channel \"lounge\" :id 7 :clock 1000)").await;

        let sent = written(&mut remote).await;
        let kinds: Vec<_> = sent
            .iter()
            .map(|s| s[1..].split(' ').next().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["users", "channel-info", "backfill"]);
        assert!(sent.iter().all(|s| s.contains(":channel \"lounge\"")));

        let channel = client.channel("LOUNGE").unwrap();
        assert!(channel.has_user("alice"));
        assert_eq!(client.active_channel().unwrap().name(), "lounge");
    }

    #[tokio::test]
    async fn test_private_join_skips_info_and_backfill() {
        let (mut client, mut remote, _) =
            connected(&["shirakumo-channel-info", "shirakumo-backfill"]).await;
        deliver(&mut client, "(join :from \"srv\" :channel \"srv\" :id 1 :clock 1000)").await;
        written(&mut remote).await;

        deliver(&mut client, "(join :from \"alice\" :channel \"@private\" :id 8 :clock 1000)").await;

        let sent = written(&mut remote).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("(users "));
    }

    #[tokio::test]
    async fn test_users_and_leave() {
        let (mut client, _remote, _) = connected(&[]).await;
        deliver(&mut client, "(join :from \"alice\" :channel \"lounge\" :id 1 :clock 1000)").await;

        deliver(&mut client, "(users :from \"srv\" :channel \"lounge\" :users (\"bob\" \"carol\") :clock 1000)").await;
        assert_eq!(client.channel("lounge").unwrap().users().len(), 3);

        deliver(&mut client, "(leave :from \"bob\" :channel \"lounge\" :clock 1000)").await;
        let channel = client.channel("lounge").unwrap();
        assert!(!channel.has_user("bob"));
        assert!(channel.has_user("carol"));
    }

    #[tokio::test]
    async fn test_self_leave_switches_active_channel() {
        let (mut client, _remote, _) = connected(&[]).await;
        deliver(&mut client, "(join :from \"alice\" :channel \"beta\" :id 1 :clock 1000)").await;
        deliver(&mut client, "(join :from \"alice\" :channel \"alpha\" :id 2 :clock 1000)").await;
        assert_eq!(client.active_channel().unwrap().name(), "alpha");

        deliver(&mut client, "(leave :from \"alice\" :channel \"alpha\" :clock 1000)").await;

        assert!(client.channel("alpha").is_none());
        assert_eq!(client.active_channel().unwrap().name(), "beta");
    }

    #[tokio::test]
    async fn test_emote_is_cached() {
        let (mut client, _remote, _) = connected(&[]).await;

        deliver(
            &mut client,
            "(emote :from \"srv\" :name \"Wave\" :content-type \"image/gif\" :payload \"AQID\")",
        )
        .await;

        let emote = client.emote("wave").unwrap();
        assert_eq!(emote.content_type, "image/gif");
        assert_eq!(emote.payload, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_bad_emote_payload_is_ignored() {
        let (mut client, _remote, _) = connected(&[]).await;

        deliver(&mut client, "(emote :from \"srv\" :name \"x\" :content-type \"image/png\" :payload \"!!\")").await;

        assert!(client.emote("x").is_none());
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_channel_info_stored_for_known_channels() {
        let (mut client, _remote, _) = connected(&[]).await;
        deliver(&mut client, "(join :from \"alice\" :channel \"lounge\" :id 1 :clock 1000)").await;

        deliver(&mut client, "(set-channel-info :from \"srv\" :channel \"lounge\" :key :topic :text \"Tea\")").await;
        deliver(&mut client, "(set-channel-info :from \"srv\" :channel \"elsewhere\" :key :topic :text \"x\")").await;

        assert_eq!(client.channel("lounge").unwrap().info("topic"), Some("Tea"));
        assert!(client.channel("elsewhere").is_none());
    }

    #[tokio::test]
    async fn test_server_disconnect_clears_state() {
        let (mut client, mut remote, _) = connected(&["shirakumo-backfill"]).await;
        deliver(&mut client, "(join :from \"alice\" :channel \"lounge\" :id 1 :clock 1000)").await;
        remote.write_all(b"(disconnect :from \"srv\" :id 0)\0").await.unwrap();

        for message in client.recv(None).await.unwrap() {
            client.handle(message).await;
        }

        assert!(!client.is_connected());
        assert!(client.channels().is_empty());
        assert!(client.active_channel().is_none());
        assert!(client.extensions().is_empty());
        assert!(matches!(client.recv(None).await, Err(LichatError::NotConnected)));
    }

    #[tokio::test]
    async fn test_builtins_run_before_registered_handlers() {
        let (mut client, _remote, _) = connected(&[]).await;
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        client
            .on("join", move |client, message| {
                let known = client.channel(message.channel().unwrap()).is_some();
                *s.lock().unwrap() = Some(known);
            })
            .unwrap();

        deliver(&mut client, "(join :from \"alice\" :channel \"lounge\" :id 1 :clock 1000)").await;

        assert_eq!(*seen.lock().unwrap(), Some(true));
    }
}
