//! Post node to [`Post`] conversion.
//!
//! Every field is looked up through an ordered list of JSON pointers and the
//! first usable value wins.

use crate::post::{canonicalize_url, normalize_whitespace, synthesize_post_url, MediaType, Post, Source};
use serde_json::Value;
use url::Url;

const ID_FIELDS: &[&str] = &["/post_id", "/legacy_story_hideable_id", "/id"];

const TEXT_PATHS: &[&str] = &[
    "/message/text",
    "/comet_sections/content/story/message/text",
];

const AUTHOR_PATHS: &[&str] = &[
    "/actors/0",
    "/author",
    "/comet_sections/context_layout/story/comet_sections/actor_photo/story/actors/0",
    "/comet_sections/content/story/actors/0",
];

const TIMESTAMP_FIELDS: &[&str] = &["/creation_time", "/created_time"];

const URL_FIELDS: &[&str] = &["/permalink_url", "/url"];

const ATTACHMENT_PATHS: &[&str] = &[
    "/attachments",
    "/comet_sections/content/story/attachments",
];

const MEDIA_TYPENAME_PATHS: &[&str] = &["/media/__typename", "/styles/attachment/media/__typename"];

/// String or number scalar as a string
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_scalar(node: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| node.pointer(p).and_then(scalar))
}

pub fn post_id(node: &Value) -> Option<String> {
    first_scalar(node, ID_FIELDS)
}

/// Whitespace-normalized message text
pub fn message_text(node: &Value) -> Option<String> {
    TEXT_PATHS
        .iter()
        .filter_map(|p| node.pointer(p).and_then(Value::as_str))
        .map(normalize_whitespace)
        .find(|t| !t.is_empty())
}

/// Author name and profile URL from the first actor object with a name
pub fn author(node: &Value) -> Option<(String, Option<String>)> {
    AUTHOR_PATHS.iter().find_map(|p| {
        let actor = node.pointer(p)?;
        let name = actor.get("name").and_then(Value::as_str)?.trim();
        if name.is_empty() {
            return None;
        }
        let profile = ["url", "profile_url"]
            .iter()
            .find_map(|k| actor.get(*k).and_then(Value::as_str))
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        Some((name.to_string(), profile))
    })
}

pub fn media_type(node: &Value) -> MediaType {
    let typenames = ATTACHMENT_PATHS
        .iter()
        .filter_map(|p| node.pointer(p).and_then(Value::as_array))
        .flatten()
        .filter_map(|att| {
            MEDIA_TYPENAME_PATHS
                .iter()
                .find_map(|p| att.pointer(p).and_then(Value::as_str))
        });

    let mut found = MediaType::None;
    for typename in typenames {
        match typename {
            "Video" => return MediaType::Video,
            "Photo" | "Image" => found = MediaType::Image,
            _ => {}
        }
    }
    found
}

/// Convert a candidate node. Nodes without an identifier or with text
/// shorter than `min_text_len` characters are rejected.
pub fn node_to_post(node: &Value, source: Source, location: &str, min_text_len: usize) -> Option<Post> {
    let id = post_id(node)?;
    let text = message_text(node)?;
    if text.chars().count() < min_text_len {
        return None;
    }

    let base = Url::parse(location).ok();
    let post_url = first_scalar(node, URL_FIELDS)
        .map(|u| canonicalize_url(&u, base.as_ref()))
        .or_else(|| synthesize_post_url(location, &id));
    let (name, profile) = match author(node) {
        Some((name, profile)) => (Some(name), profile),
        None => (None, None),
    };

    Some(
        Post::new(source, &id, &text)
            .with_author(name, profile)
            .with_timestamp(first_scalar(node, TIMESTAMP_FIELDS))
            .with_post_url(post_url)
            .with_media(media_type(node)),
    )
}
