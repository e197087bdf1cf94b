//! Projects remote MCP objects into scannable content items.
//!
//! Each collected object becomes one `ContentItem` with a
//! `mcp://<host>/<kind>/<name>` virtual path, so the matcher and the
//! heuristics treat remote servers exactly like local files.

use crate::content::ContentItem;
use crate::filetype::FileType;
use crate::mcp::client::{McpClient, McpError, DEFAULT_TIMEOUT_SECS};
use crate::mcp::types::{PromptInfo, ResourceInfo, ToolInfo};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-resource read ceiling.
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 1024 * 1024;

pub const DEFAULT_ALLOWED_MIME: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/html",
    "application/json",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpCategory {
    Tools,
    Prompts,
    Resources,
    Instructions,
}

#[derive(Debug, Clone)]
pub struct McpOptions {
    /// Which object categories to collect. Default: tools, instructions,
    /// prompts.
    pub categories: Vec<McpCategory>,
    /// Fetch resource bodies via resources/read.
    pub read_resources: bool,
    pub allowed_mime: Vec<String>,
    pub max_resource_bytes: usize,
    pub timeout: Duration,
    pub bearer_token: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Default for McpOptions {
    fn default() -> Self {
        Self {
            categories: vec![
                McpCategory::Tools,
                McpCategory::Instructions,
                McpCategory::Prompts,
            ],
            read_resources: false,
            allowed_mime: DEFAULT_ALLOWED_MIME.iter().map(|s| s.to_string()).collect(),
            max_resource_bytes: DEFAULT_MAX_RESOURCE_BYTES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bearer_token: None,
            headers: BTreeMap::new(),
        }
    }
}

/// What one server yielded: the scannable items plus object counts for
/// reporting.
#[derive(Debug, Default)]
pub struct McpCollection {
    pub items: Vec<ContentItem>,
    pub tools: usize,
    pub prompts: usize,
    pub resources: usize,
    pub instructions: usize,
}

/// Collect from one server, blocking. Spins a runtime for the async
/// client; the scan pipeline itself stays synchronous.
pub fn collect(url: &str, options: &McpOptions) -> Result<McpCollection, McpError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| McpError::InvalidResponse(format!("Failed to create async runtime: {}", e)))?;
    runtime.block_on(collect_async(url, options))
}

pub async fn collect_async(url: &str, options: &McpOptions) -> Result<McpCollection, McpError> {
    let client = McpClient::new(
        url,
        options.bearer_token.as_deref(),
        &options.headers,
        options.timeout,
    )?;
    let host = client.host();

    let init = client.initialize().await?;
    let mut collection = McpCollection::default();

    if options.categories.contains(&McpCategory::Instructions) {
        if let Some(instructions) = init.instructions.filter(|i| !i.is_empty()) {
            collection.items.push(instructions_item(&host, &instructions));
            collection.instructions = 1;
        }
    }

    if options.categories.contains(&McpCategory::Tools) {
        let tools = client.list_tools().await?.tools;
        collection.tools = tools.len();
        for tool in &tools {
            collection.items.push(tool_item(&host, tool));
        }
    }

    if options.categories.contains(&McpCategory::Prompts) {
        let prompts = client.list_prompts().await?.prompts;
        collection.prompts = prompts.len();
        for prompt in &prompts {
            collection.items.push(prompt_item(&host, prompt));
        }
    }

    if options.categories.contains(&McpCategory::Resources) {
        let resources = client.list_resources().await?.resources;
        collection.resources = resources.len();
        for resource in &resources {
            let item = resource_item(&client, &host, resource, options).await;
            collection.items.push(item);
        }
    }

    debug!(
        host,
        tools = collection.tools,
        prompts = collection.prompts,
        resources = collection.resources,
        "MCP collection complete"
    );
    Ok(collection)
}

fn virtual_path(host: &str, kind: &str, name: &str) -> String {
    format!("mcp://{}/{}/{}", host, kind, name)
}

fn instructions_item(host: &str, instructions: &str) -> ContentItem {
    ContentItem::new(
        format!("mcp://{}/instructions.md", host),
        FileType::Markdown,
        instructions,
    )
}

fn tool_item(host: &str, tool: &ToolInfo) -> ContentItem {
    let mut content = format!("# Tool: {}\n", tool.name);
    if let Some(description) = &tool.description {
        content.push_str(&format!("\n{}\n", description));
    }
    if let Some(schema) = &tool.input_schema {
        let rendered = serde_json::to_string_pretty(schema).unwrap_or_default();
        content.push_str(&format!("\n## Input schema\n\n{}\n", rendered));
    }
    ContentItem::new(
        virtual_path(host, "tools", &tool.name),
        FileType::Markdown,
        content,
    )
}

fn prompt_item(host: &str, prompt: &PromptInfo) -> ContentItem {
    let mut content = format!("# Prompt: {}\n", prompt.name);
    if let Some(description) = &prompt.description {
        content.push_str(&format!("\n{}\n", description));
    }
    if !prompt.arguments.is_empty() {
        content.push_str("\n## Arguments\n\n");
        for arg in &prompt.arguments {
            let required = if arg.required { " (required)" } else { "" };
            let description = arg.description.as_deref().unwrap_or("");
            content.push_str(&format!("- {}{}: {}\n", arg.name, required, description));
        }
    }
    ContentItem::new(
        virtual_path(host, "prompts", &prompt.name),
        FileType::Markdown,
        content,
    )
}

async fn resource_item(
    client: &McpClient,
    host: &str,
    resource: &ResourceInfo,
    options: &McpOptions,
) -> ContentItem {
    let mime = resource.mime_type.as_deref().unwrap_or("");
    let file_type = if mime == "application/json" {
        FileType::Json
    } else {
        FileType::Markdown
    };
    let path = virtual_path(host, "resources", &resource.name);

    if options.read_resources && options.allowed_mime.iter().any(|m| m == mime) {
        match client.read_resource(&resource.uri).await {
            Ok(read) => {
                let text: String = read
                    .contents
                    .iter()
                    .filter_map(|c| c.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n");
                if !text.is_empty() && text.len() <= options.max_resource_bytes {
                    return ContentItem::new(path, file_type, text);
                }
                if text.len() > options.max_resource_bytes {
                    warn!(uri = %resource.uri, "Resource exceeds byte cap; using metadata only");
                }
            }
            Err(e) => {
                warn!(uri = %resource.uri, error = %e, "Failed to read resource");
            }
        }
    }

    ContentItem::new(path, file_type, resource_metadata(resource))
}

fn resource_metadata(resource: &ResourceInfo) -> String {
    let mut content = format!("# Resource: {}\n\nuri: {}\n", resource.name, resource.uri);
    if let Some(description) = &resource.description {
        content.push_str(&format!("description: {}\n", description));
    }
    if let Some(mime) = &resource.mime_type {
        content.push_str(&format!("mimeType: {}\n", mime));
    }
    content
}
