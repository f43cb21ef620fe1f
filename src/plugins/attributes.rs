//! Built-in plugin adding fixed attributes to created tags

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use super::{ChunkLoadingHooks, Plugin};
use crate::chunk::Chunk;
use crate::config::PluginConfig;
use crate::runtime::{TagSpec, Template};

/// Sets literal attribute values on every created tag of one kind
///
/// ```toml
/// [[plugins]]
/// name = "attributes"
/// options = { tag = "script", attributes = { "dataset.app" = "shop" } }
/// ```
///
/// Keys are property paths on the element, values are emitted as string literals.
#[derive(Debug, Clone)]
pub struct AttributesPlugin {
    tag_name: String,
    attributes: BTreeMap<String, String>,
}

impl AttributesPlugin {
    pub fn new(tag_name: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes,
        }
    }

    pub fn from_config(config: &PluginConfig) -> Result<Self> {
        let options = config.options.clone().unwrap_or_default();

        let tag_name = match options.get("tag") {
            Some(value) => value
                .as_str()
                .context("attributes plugin: `tag` must be a string")?
                .to_string(),
            None => "script".to_string(),
        };

        let mut attributes = BTreeMap::new();
        if let Some(table) = options.get("attributes") {
            let table = table
                .as_table()
                .context("attributes plugin: `attributes` must be a table")?;
            for (name, value) in table {
                let value = value
                    .as_str()
                    .with_context(|| format!("attributes plugin: `{}` must be a string", name))?;
                attributes.insert(name.clone(), value.to_string());
            }
        }

        Ok(Self::new(tag_name, attributes))
    }
}

impl Plugin for AttributesPlugin {
    fn name(&self) -> &str {
        "attributes"
    }

    fn apply(&self, hooks: &ChunkLoadingHooks) {
        let plugin = self.clone();
        hooks
            .mutate_tag
            .tap(self.name(), move |mut tag: TagSpec, _: &Chunk, _: &str| {
                if tag.tag_name == plugin.tag_name {
                    for (name, value) in &plugin.attributes {
                        tag.attributes.set(name.clone(), Template::string_literal(value));
                    }
                }
                tag
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_matching_tags_change() {
        let hooks = ChunkLoadingHooks::new();
        let mut attributes = BTreeMap::new();
        attributes.insert("dataset.app".to_string(), "shop".to_string());
        AttributesPlugin::new("script", attributes).apply(&hooks);

        let chunk = Chunk::new(1, vec![]);
        let script = hooks.mutate_tag.call(TagSpec::element("script"), &chunk, "");
        let link = hooks.mutate_tag.call(TagSpec::element("link"), &chunk, "");

        assert_eq!(script.attributes.get("dataset.app").unwrap().value, "\"shop\"");
        assert!(link.attributes.is_empty());
    }

    #[test]
    fn test_from_config() {
        let options: toml::Table =
            toml::from_str("tag = \"link\"\n[attributes]\n\"dataset.kind\" = \"lazy\"\n").unwrap();
        let plugin = AttributesPlugin::from_config(&PluginConfig {
            name: "attributes".to_string(),
            options: Some(options),
        })
        .unwrap();

        assert_eq!(plugin.tag_name, "link");
        assert_eq!(plugin.attributes.get("dataset.kind").map(String::as_str), Some("lazy"));
    }
}
