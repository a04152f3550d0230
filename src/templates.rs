use crate::types::{
    Artifact, ContentItem, OrchestratorError, Result, Template, TemplateKind, Workflow,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Input for creating a template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub kind: TemplateKind,
    pub body: String,
    pub is_default: bool,
}

/// Named template definitions keyed by workflow type. At most one template
/// per kind carries the default flag; `set_default` swaps it atomically.
pub struct TemplateStore {
    templates: RwLock<HashMap<Uuid, Template>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Store seeded with one built-in default template per kind.
    pub async fn with_defaults() -> Self {
        let store = Self::new();
        for (name, kind, body) in [
            ("Standard article", TemplateKind::Article, ARTICLE_TEMPLATE),
            ("Benchmark board", TemplateKind::AiBench, AIBENCH_TEMPLATE),
            ("Project roundup", TemplateKind::HelloGithub, HELLOGITHUB_TEMPLATE),
        ] {
            let _ = store
                .create(NewTemplate {
                    name: name.to_string(),
                    kind,
                    body: body.to_string(),
                    is_default: true,
                })
                .await;
        }
        store
    }

    pub async fn load(&self, templates: Vec<Template>) {
        let mut map = self.templates.write().await;
        for template in templates {
            map.insert(template.id, template);
        }
    }

    pub async fn create(&self, new: NewTemplate) -> Result<Template> {
        let mut templates = self.templates.write().await;

        if new.is_default {
            for existing in templates.values_mut() {
                if existing.kind == new.kind {
                    existing.is_default = false;
                }
            }
        }

        let template = Template {
            id: Uuid::new_v4(),
            name: new.name,
            kind: new.kind,
            body: new.body,
            is_default: new.is_default,
            updated_at: Utc::now(),
        };
        templates.insert(template.id, template.clone());
        info!("Created template: {} ({:?})", template.name, template.kind);
        Ok(template)
    }

    pub async fn update_body(&self, id: Uuid, name: Option<String>, body: Option<String>) -> Result<Template> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get_mut(&id)
            .ok_or(OrchestratorError::TemplateNotFound { id })?;

        if let Some(name) = name {
            template.name = name;
        }
        if let Some(body) = body {
            template.body = body;
        }
        template.updated_at = Utc::now();
        Ok(template.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<Template> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::TemplateNotFound { id })?;

        if template.is_default {
            return Err(OrchestratorError::Conflict(
                "cannot delete the default template; set another default first".to_string(),
            ));
        }
        templates.remove(&id);
        Ok(template)
    }

    /// Make `id` the default for its kind. Clears the previous default of
    /// that kind in the same critical section, so readers never observe zero
    /// or two defaults.
    pub async fn set_default(&self, id: Uuid) -> Result<Template> {
        let mut templates = self.templates.write().await;
        let kind = templates
            .get(&id)
            .map(|t| t.kind)
            .ok_or(OrchestratorError::TemplateNotFound { id })?;

        for template in templates.values_mut() {
            if template.kind == kind {
                let becomes_default = template.id == id;
                if template.is_default != becomes_default {
                    template.is_default = becomes_default;
                    template.updated_at = Utc::now();
                }
            }
        }

        templates
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::TemplateNotFound { id })
    }

    pub async fn default_for(&self, kind: TemplateKind) -> Option<Template> {
        let templates = self.templates.read().await;
        templates
            .values()
            .find(|t| t.kind == kind && t.is_default)
            .cloned()
    }

    pub async fn get(&self, id: Uuid) -> Result<Template> {
        let templates = self.templates.read().await;
        templates
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::TemplateNotFound { id })
    }

    pub async fn list(&self) -> Vec<Template> {
        let templates = self.templates.read().await;
        let mut list: Vec<Template> = templates.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds summarized items into a template to produce a renderable artifact.
pub struct TemplateRenderer {
    store: Arc<TemplateStore>,
}

impl TemplateRenderer {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    pub async fn render(
        &self,
        workflow: &Workflow,
        items: &[ContentItem],
        author: &str,
    ) -> Result<Artifact> {
        let template = match workflow.template_id {
            Some(id) => self.store.get(id).await?,
            None => self
                .store
                .default_for(workflow.kind.template_kind())
                .await
                .ok_or(OrchestratorError::NoTemplateForKind {
                    kind: workflow.kind.template_kind(),
                })?,
        };

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let title = artifact_title(workflow, items, &date);
        let body = render_body(&template.body, &title, author, &date, items);

        let media = items
            .iter()
            .flat_map(|item| item.media.iter().cloned())
            .collect();

        Ok(Artifact {
            title,
            body,
            item_count: items.len() as u32,
            platform: workflow.kind.platform(),
            media,
        })
    }
}

fn artifact_title(workflow: &Workflow, items: &[ContentItem], date: &str) -> String {
    match workflow.kind {
        crate::types::WorkflowKind::WeixinArticle => match items.first() {
            Some(lead) => format!("{} AI Briefing | {}", date, lead.title),
            None => format!("{} AI Briefing", date),
        },
        crate::types::WorkflowKind::WeixinAiBench => {
            format!("AI Model Benchmark Update | {date}")
        }
        crate::types::WorkflowKind::WeixinHelloGithub => {
            format!("Trending GitHub AI Projects | {date}")
        }
    }
}

/// Substitute `{{title}}`, `{{author}}`, `{{date}}` and expand the
/// `{{#each items}} ... {{/each}}` block once per item.
fn render_body(
    template_body: &str,
    title: &str,
    author: &str,
    date: &str,
    items: &[ContentItem],
) -> String {
    const BLOCK_OPEN: &str = "{{#each items}}";
    const BLOCK_CLOSE: &str = "{{/each}}";

    let mut body = template_body.to_string();
    if let (Some(start), Some(end)) = (body.find(BLOCK_OPEN), body.find(BLOCK_CLOSE)) {
        if start < end {
            let block = body[start + BLOCK_OPEN.len()..end].to_string();
            let mut rendered = String::new();
            for (index, item) in items.iter().enumerate() {
                rendered.push_str(
                    &block
                        .replace("{{item.index}}", &(index + 1).to_string())
                        .replace("{{item.title}}", &item.title)
                        .replace(
                            "{{item.summary}}",
                            item.summary.as_deref().unwrap_or(&item.content),
                        )
                        .replace("{{item.url}}", &item.url)
                        .replace("{{item.keywords}}", &item.keywords.join(", ")),
                );
            }
            body.replace_range(start..end + BLOCK_CLOSE.len(), &rendered);
        }
    }

    body.replace("{{title}}", title)
        .replace("{{author}}", author)
        .replace("{{date}}", date)
}

const ARTICLE_TEMPLATE: &str = "\
# {{title}}

{{#each items}}
## {{item.index}}. {{item.title}}

{{item.summary}}

[Read more]({{item.url}})

{{/each}}
---
{{author}} · {{date}}
";

const AIBENCH_TEMPLATE: &str = "\
# {{title}}

This week's model standings:

{{#each items}}
{{item.index}}. **{{item.title}}** — {{item.summary}}
{{/each}}

---
{{author}} · {{date}}
";

const HELLOGITHUB_TEMPLATE: &str = "\
# {{title}}

{{#each items}}
- [{{item.title}}]({{item.url}}): {{item.summary}}
{{/each}}

---
{{author}} · {{date}}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentStatus, WorkflowKind, WorkflowStatus};

    fn workflow(kind: WorkflowKind) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            kind,
            schedule: "0 0 3 * * * *".to_string(),
            enabled: true,
            status: WorkflowStatus::Stopped,
            article_num: 10,
            template_id: None,
            last_run: None,
            next_run: None,
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(title: &str) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            title: title.to_string(),
            content: "body".to_string(),
            url: format!("https://example.com/{title}"),
            keywords: vec!["ai".to_string()],
            score: 80.0,
            media: Vec::new(),
            status: ContentStatus::Selected,
            published_at: None,
            summary: Some(format!("{title} in one line")),
        }
    }

    #[tokio::test]
    async fn default_swap_clears_exactly_one() {
        let store = TemplateStore::with_defaults().await;
        let second = store
            .create(NewTemplate {
                name: "alternate".to_string(),
                kind: TemplateKind::Article,
                body: "{{title}}".to_string(),
                is_default: false,
            })
            .await
            .unwrap();

        store.set_default(second.id).await.unwrap();

        let article_templates: Vec<Template> = store
            .list()
            .await
            .into_iter()
            .filter(|t| t.kind == TemplateKind::Article)
            .collect();
        let defaults: Vec<&Template> =
            article_templates.iter().filter(|t| t.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);

        // Other kinds keep their own single default.
        assert!(store.default_for(TemplateKind::AiBench).await.is_some());
    }

    #[tokio::test]
    async fn deleting_the_default_is_a_conflict() {
        let store = TemplateStore::with_defaults().await;
        let default = store.default_for(TemplateKind::Article).await.unwrap();
        assert!(matches!(
            store.remove(default.id).await,
            Err(OrchestratorError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn render_expands_the_item_block() {
        let store = Arc::new(TemplateStore::with_defaults().await);
        let renderer = TemplateRenderer::new(store);
        let items = vec![item("First"), item("Second")];

        let artifact = renderer
            .render(&workflow(WorkflowKind::WeixinArticle), &items, "AI Assistant")
            .await
            .unwrap();

        assert_eq!(artifact.item_count, 2);
        assert!(artifact.body.contains("1. First"));
        assert!(artifact.body.contains("2. Second"));
        assert!(artifact.body.contains("AI Assistant"));
        assert!(artifact.title.contains("First"));
    }

    #[tokio::test]
    async fn missing_template_kind_errors() {
        let store = Arc::new(TemplateStore::new());
        let renderer = TemplateRenderer::new(store);
        let result = renderer
            .render(&workflow(WorkflowKind::WeixinArticle), &[item("x")], "a")
            .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::NoTemplateForKind { .. })
        ));
    }
}
