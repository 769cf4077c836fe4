use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

impl WebhookPayload {
    pub fn new(embeds: Vec<Embed>) -> Self {
        Self { embeds }
    }
}

impl From<Embed> for WebhookPayload {
    fn from(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<EmbedImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<EmbedProvider>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

impl EmbedImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            height: None,
            width: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedProvider {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl EmbedAuthor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            icon_url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_icon(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl EmbedFooter {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon_url: None,
        }
    }

    pub fn with_icon(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
}

/// Assembles an [`Embed`] through a chain of by-value steps.
///
/// Nothing is shared between builders, so a half-built card can be cloned
/// and finished two different ways.
#[derive(Debug, Clone, Default)]
pub struct EmbedBuilder {
    embed: Embed,
}

impl EmbedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.embed.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.embed.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.embed.url = Some(url.into());
        self
    }

    /// Stamps the card with the current time.
    pub fn with_timestamp(mut self) -> Self {
        self.embed.timestamp = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.embed.color = Some(color);
        self
    }

    pub fn with_author(mut self, author: EmbedAuthor) -> Self {
        self.embed.author = Some(author);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: EmbedImage) -> Self {
        self.embed.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_image(mut self, image: EmbedImage) -> Self {
        self.embed.image = Some(image);
        self
    }

    pub fn with_video(mut self, video: EmbedImage) -> Self {
        self.embed.video = Some(video);
        self
    }

    pub fn with_provider(mut self, provider: EmbedProvider) -> Self {
        self.embed.provider = Some(provider);
        self
    }

    pub fn with_footer(mut self, footer: EmbedFooter) -> Self {
        self.embed.footer = Some(footer);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.embed.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    pub fn with_inline_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.embed.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: true,
        });
        self
    }

    pub fn build(self) -> Embed {
        self.embed
    }
}
