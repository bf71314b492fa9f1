// ABOUTME: the interactive command loop tying chat, workspace, and integrations together.
// ABOUTME: every destructive command runs through the consent engine and lands in the audit log.

use std::collections::BTreeMap;
use std::sync::Arc;

use haven_consent::{ConsentEngine, Language};

use crate::audit;
use crate::config::Settings;
use crate::error::HavenError;
use crate::integrations::{AzureClient, GitHubClient};
use crate::llm::{
    detect_language, provider_from_settings, ChatMessage, ChatRole, CompletionRequest,
    LlmProvider, DEFAULT_SYSTEM_PROMPT,
};
use crate::memory::{MemoryStore, TaskPriority};
use crate::ui::TerminalUi;
use crate::workspace::Workspace;

const CHAT_HISTORY_WINDOW: usize = 10;
const CHAT_MAX_TOKENS: u32 = 1024;

pub struct HavenApp {
    username: String,
    store: MemoryStore,
    engine: Arc<ConsentEngine>,
    provider: Option<Box<dyn LlmProvider>>,
    github: Option<GitHubClient>,
    azure: Option<AzureClient>,
    ui: TerminalUi,
    audit_path: String,
}

impl HavenApp {
    pub fn new(
        settings: &Settings,
        username: &str,
        engine: Arc<ConsentEngine>,
    ) -> Result<Self, HavenError> {
        let store = MemoryStore::open(&settings.db_path)?;

        // A saved language preference wins over the configured default.
        let mut language = settings.default_language;
        if let Some(saved) = store.get_preference(username, "language")? {
            if let Ok(parsed) = Language::parse(&saved) {
                language = parsed;
            }
        }

        let provider = provider_from_settings(settings);
        let github = settings
            .github_token
            .clone()
            .map(|token| GitHubClient::new(token, Arc::clone(&engine)));
        let azure = settings
            .azure
            .clone()
            .map(|creds| AzureClient::new(creds, Arc::clone(&engine)));

        Ok(Self {
            username: username.to_string(),
            store,
            engine,
            provider,
            github,
            azure,
            ui: TerminalUi::new(language),
            audit_path: settings.audit_path.clone(),
        })
    }

    pub async fn run(&mut self) -> Result<(), HavenError> {
        self.ui.welcome();
        match &self.provider {
            Some(provider) => self.ui.info(&format!("AI provider: {}", provider.name())),
            None => self
                .ui
                .warning("no AI provider configured; chat is unavailable"),
        }

        loop {
            let Some(input) = self.read_line("\nhaven") else {
                break;
            };
            let input = input.trim().to_string();
            if input.is_empty() {
                continue;
            }

            let mut parts = input.split_whitespace();
            let command = parts.next().unwrap_or_default().to_lowercase();
            let args: Vec<&str> = parts.collect();

            let result = match command.as_str() {
                "exit" | "quit" | "خروج" => {
                    let bye = match self.ui.language() {
                        Language::Ar => "وداعاً!",
                        Language::En => "Goodbye!",
                    };
                    self.ui.success(bye);
                    break;
                }
                "help" | "مساعدة" => {
                    self.ui.help();
                    Ok(())
                }
                "clear" | "مسح" => {
                    self.ui.clear_screen();
                    self.ui.welcome();
                    Ok(())
                }
                "language" => self.change_language(args.first().copied()),
                "chat" | "محادثة" => self.chat().await,
                "history" | "سجل" => {
                    if args.first() == Some(&"clear") {
                        self.clear_history().await
                    } else {
                        self.show_history()
                    }
                }
                "notes" | "ملاحظات" => self.notes_menu().await,
                "tasks" | "مهام" => self.tasks_menu().await,
                "workspace" | "مساحة" => {
                    if args.first() == Some(&"export") {
                        self.export_workspace(args.get(1).copied())
                    } else {
                        self.show_workspace_stats()
                    }
                }
                "preferences" | "تفضيلات" => self.show_preferences(),
                "github" => self.github_menu().await,
                "azure" => self.azure_menu().await,
                _ => self.one_shot_chat(&input).await,
            };

            if let Err(err) = result {
                self.ui.error(&err.to_string());
            }
        }
        Ok(())
    }

    fn read_line(&mut self, label: &str) -> Option<String> {
        self.ui.prompt(label).ok().flatten()
    }

    fn read_id(&mut self, label: &str) -> Option<i64> {
        let raw = self.read_line(label)?;
        match raw.trim().parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                self.ui.error("expected a numeric id");
                None
            }
        }
    }

    /// Classify-then-consent for an app-local action, auditing the decision.
    /// Returns whether the caller may proceed.
    async fn gate(
        &mut self,
        action_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<bool, HavenError> {
        let language = self.ui.language();
        let engine = Arc::clone(&self.engine);
        let decision = engine.request_consent(action_id, params, language, &mut self.ui);
        self.audit(&decision, params).await;
        if !decision.granted {
            if let Some(reason) = &decision.reason {
                self.ui.warning(&reason.describe(language));
            }
        }
        Ok(decision.granted)
    }

    async fn audit(
        &self,
        decision: &haven_consent::ConsentDecision,
        params: &BTreeMap<String, String>,
    ) {
        if let Err(err) = audit::append_decision(&self.audit_path, decision, params).await {
            tracing::warn!(error = %err, "failed to append audit record");
        }
    }

    fn change_language(&mut self, code: Option<&str>) -> Result<(), HavenError> {
        let Some(code) = code else {
            self.ui.error("usage: language <ar|en>");
            return Ok(());
        };
        match Language::parse(code) {
            Ok(language) => {
                self.ui.set_language(language);
                self.store
                    .set_preference(&self.username, "language", language.as_str())?;
                self.ui
                    .success(&format!("language changed to {language}"));
            }
            Err(err) => self.ui.error(&err.to_string()),
        }
        Ok(())
    }

    // -- chat --

    async fn chat(&mut self) -> Result<(), HavenError> {
        if self.provider.is_none() {
            self.ui
                .error("AI engine not configured; set an API key in .env");
            return Ok(());
        }

        let start = match self.ui.language() {
            Language::Ar => "بدء المحادثة. اكتب 'exit' للخروج.",
            Language::En => "Starting chat. Type 'exit' to quit.",
        };
        self.ui.info(start);

        let mut messages: Vec<ChatMessage> = self
            .store
            .recent_history(&self.username, CHAT_HISTORY_WINDOW)?
            .into_iter()
            .map(|m| ChatMessage {
                role: if m.role == "assistant" {
                    ChatRole::Assistant
                } else {
                    ChatRole::User
                },
                content: m.content,
            })
            .collect();

        loop {
            let label = match self.ui.language() {
                Language::Ar => "أنت",
                Language::En => "you",
            };
            let Some(input) = self.read_line(label) else {
                break;
            };
            let input = input.trim().to_string();
            if input.is_empty() {
                continue;
            }
            if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "خروج") {
                break;
            }

            let language = detect_language(&input);
            messages.push(ChatMessage {
                role: ChatRole::User,
                content: input.clone(),
            });
            self.store
                .add_message(&self.username, "user", &input, language.as_str())?;

            match self.complete(&messages).await {
                Ok(reply) => {
                    messages.push(ChatMessage {
                        role: ChatRole::Assistant,
                        content: reply.clone(),
                    });
                    self.store.add_message(
                        &self.username,
                        "assistant",
                        &reply,
                        language.as_str(),
                    )?;
                    self.ui.chat_message("assistant", &reply);
                }
                Err(err) => self.ui.error(&err.to_string()),
            }
        }
        Ok(())
    }

    async fn one_shot_chat(&mut self, input: &str) -> Result<(), HavenError> {
        let Some(provider) = self.provider.as_ref() else {
            let unknown = match self.ui.language() {
                Language::Ar => "أمر غير معروف. اكتب 'help' للمساعدة.",
                Language::En => "unknown command; type 'help' for help",
            };
            self.ui.error(unknown);
            return Ok(());
        };

        let request = CompletionRequest {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: input.to_string(),
            }],
            model: String::new(),
            max_tokens: CHAT_MAX_TOKENS,
            temperature: Some(0.7),
        };
        let response = provider.complete(request).await?;
        self.ui.chat_message("assistant", &response.content);
        Ok(())
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, HavenError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| HavenError::LlmProvider("no provider configured".to_string()))?;
        let request = CompletionRequest {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            messages: messages.to_vec(),
            model: String::new(),
            max_tokens: CHAT_MAX_TOKENS,
            temperature: Some(0.7),
        };
        let response = provider.complete(request).await?;
        tracing::debug!(model = %response.model, "chat completion");
        Ok(response.content)
    }

    // -- history --

    fn show_history(&mut self) -> Result<(), HavenError> {
        let history = self.store.recent_history(&self.username, 20)?;
        if history.is_empty() {
            let empty = match self.ui.language() {
                Language::Ar => "لا يوجد سجل محادثات.",
                Language::En => "no conversation history",
            };
            self.ui.info(empty);
            return Ok(());
        }
        for message in &history {
            self.ui.chat_message(&message.role, &message.content);
        }
        Ok(())
    }

    async fn clear_history(&mut self) -> Result<(), HavenError> {
        if !self.gate("history.clear", &BTreeMap::new()).await? {
            return Ok(());
        }
        let deleted = self.store.clear_history(&self.username)?;
        self.ui.success(&format!("cleared {deleted} messages"));
        Ok(())
    }

    // -- notes --

    async fn notes_menu(&mut self) -> Result<(), HavenError> {
        loop {
            self.ui.line(
                "\nnotes: 1) list  2) create  3) edit  4) search  5) delete  6) back",
            );
            let Some(choice) = self.read_line("choice") else {
                return Ok(());
            };
            match choice.trim() {
                "1" => {
                    let notes = Workspace::new(&self.store, &self.username).list_notes()?;
                    if notes.is_empty() {
                        self.ui.info("no notes found");
                    }
                    for note in &notes {
                        self.ui.line(&format!(
                            "#{} [{}] {} ({})",
                            note.id,
                            TerminalUi::format_timestamp(note.updated_at_ms),
                            note.title,
                            note.tags
                        ));
                    }
                }
                "2" => {
                    let Some(title) = self.read_line("title") else {
                        continue;
                    };
                    let Some(content) = self.read_line("content") else {
                        continue;
                    };
                    let tags = self.read_line("tags (comma-separated)").unwrap_or_default();
                    let id = Workspace::new(&self.store, &self.username)
                        .create_note(&title, &content, &tags)?;
                    self.ui.success(&format!("note created with id {id}"));
                }
                "3" => self.edit_note()?,
                "4" => {
                    let Some(query) = self.read_line("search") else {
                        continue;
                    };
                    let notes =
                        Workspace::new(&self.store, &self.username).search_notes(&query)?;
                    if notes.is_empty() {
                        self.ui.info("no matching notes");
                    }
                    for note in &notes {
                        self.ui.line(&format!("#{} {}", note.id, note.title));
                    }
                }
                "5" => self.delete_note().await?,
                _ => return Ok(()),
            }
        }
    }

    fn edit_note(&mut self) -> Result<(), HavenError> {
        let Some(id) = self.read_id("note id to edit") else {
            return Ok(());
        };
        let Some(note) = Workspace::new(&self.store, &self.username).get_note(id)? else {
            self.ui.error("no such note");
            return Ok(());
        };

        // Empty input keeps the current value.
        let title = self
            .read_line(&format!("title [{}]", note.title))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| note.title.clone());
        let content = self
            .read_line("content (empty keeps current)")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| note.content.clone());
        let tags = self
            .read_line(&format!("tags [{}]", note.tags))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| note.tags.clone());

        if Workspace::new(&self.store, &self.username).update_note(id, &title, &content, &tags)? {
            self.ui.success("note updated");
        } else {
            self.ui.error("failed to update note");
        }
        Ok(())
    }

    async fn delete_note(&mut self) -> Result<(), HavenError> {
        let Some(id) = self.read_id("note id to delete") else {
            return Ok(());
        };
        let Some(note) = Workspace::new(&self.store, &self.username).get_note(id)? else {
            self.ui.error("no such note");
            return Ok(());
        };

        let mut params = BTreeMap::new();
        params.insert("note".to_string(), note.title.clone());
        if !self.gate("notes.delete", &params).await? {
            return Ok(());
        }
        if Workspace::new(&self.store, &self.username).delete_note(id)? {
            self.ui.success("note deleted");
        } else {
            self.ui.error("failed to delete note");
        }
        Ok(())
    }

    // -- tasks --

    async fn tasks_menu(&mut self) -> Result<(), HavenError> {
        loop {
            self.ui.line(
                "\ntasks: 1) all  2) pending  3) completed  4) by priority  5) create  \
                 6) toggle  7) delete  8) clear completed  9) back",
            );
            let Some(choice) = self.read_line("choice") else {
                return Ok(());
            };
            match choice.trim() {
                "1" => {
                    let tasks = Workspace::new(&self.store, &self.username).list_tasks(true)?;
                    self.print_tasks(&tasks);
                }
                "2" => {
                    let tasks = Workspace::new(&self.store, &self.username).pending_tasks()?;
                    self.print_tasks(&tasks);
                }
                "3" => {
                    let tasks = Workspace::new(&self.store, &self.username).completed_tasks()?;
                    self.print_tasks(&tasks);
                }
                "4" => {
                    let Some(priority) = self
                        .read_line("priority (low/medium/high)")
                        .and_then(|p| TaskPriority::parse(&p))
                    else {
                        self.ui.error("unknown priority");
                        continue;
                    };
                    let tasks =
                        Workspace::new(&self.store, &self.username).tasks_by_priority(priority)?;
                    self.print_tasks(&tasks);
                }
                "5" => {
                    let Some(title) = self.read_line("title") else {
                        continue;
                    };
                    let description = self.read_line("description").unwrap_or_default();
                    let priority = self
                        .read_line("priority (low/medium/high)")
                        .and_then(|p| TaskPriority::parse(&p))
                        .unwrap_or(TaskPriority::Medium);
                    let id = Workspace::new(&self.store, &self.username)
                        .create_task(&title, &description, priority, None)?;
                    self.ui.success(&format!("task created with id {id}"));
                }
                "6" => {
                    let Some(id) = self.read_id("task id to toggle") else {
                        continue;
                    };
                    if Workspace::new(&self.store, &self.username).toggle_task(id)? {
                        self.ui.success("task toggled");
                    } else {
                        self.ui.error("no such task");
                    }
                }
                "7" => self.delete_task().await?,
                "8" => self.clear_completed_tasks().await?,
                _ => return Ok(()),
            }
        }
    }

    fn print_tasks(&self, tasks: &[crate::memory::Task]) {
        if tasks.is_empty() {
            self.ui.info("no tasks found");
        }
        for task in tasks {
            let mark = if task.completed { "[x]" } else { "[ ]" };
            self.ui.line(&format!(
                "{mark} #{} {} ({})",
                task.id,
                task.title,
                task.priority.as_str()
            ));
        }
    }

    async fn delete_task(&mut self) -> Result<(), HavenError> {
        let Some(id) = self.read_id("task id to delete") else {
            return Ok(());
        };
        let Some(task) = Workspace::new(&self.store, &self.username).get_task(id)? else {
            self.ui.error("no such task");
            return Ok(());
        };

        let mut params = BTreeMap::new();
        params.insert("task".to_string(), task.title.clone());
        if !self.gate("tasks.delete", &params).await? {
            return Ok(());
        }
        if Workspace::new(&self.store, &self.username).delete_task(id)? {
            self.ui.success("task deleted");
        } else {
            self.ui.error("failed to delete task");
        }
        Ok(())
    }

    async fn clear_completed_tasks(&mut self) -> Result<(), HavenError> {
        if !self.gate("tasks.clear_completed", &BTreeMap::new()).await? {
            return Ok(());
        }
        let deleted = Workspace::new(&self.store, &self.username).clear_completed_tasks()?;
        self.ui.success(&format!("deleted {deleted} completed tasks"));
        Ok(())
    }

    // -- workspace --

    fn show_workspace_stats(&mut self) -> Result<(), HavenError> {
        let stats = Workspace::new(&self.store, &self.username).stats()?;
        let rows = vec![
            vec!["notes".to_string(), stats.total_notes.to_string()],
            vec!["tasks".to_string(), stats.total_tasks.to_string()],
            vec!["pending".to_string(), stats.pending_tasks.to_string()],
            vec!["completed".to_string(), stats.completed_tasks.to_string()],
            vec![
                "completion".to_string(),
                format!("{:.0}%", stats.completion_rate),
            ],
        ];
        self.ui.table(&["item", "count"], &rows);
        Ok(())
    }

    fn export_workspace(&mut self, path: Option<&str>) -> Result<(), HavenError> {
        let export = Workspace::new(&self.store, &self.username).export()?;
        let path = path.unwrap_or("haven-export.json");
        std::fs::write(path, serde_json::to_string_pretty(&export)?)?;
        self.ui.success(&format!("workspace exported to {path}"));
        Ok(())
    }

    // -- preferences --

    fn show_preferences(&mut self) -> Result<(), HavenError> {
        let prefs = self.store.all_preferences(&self.username)?;
        if prefs.is_empty() {
            self.ui.info("no preferences set");
            return Ok(());
        }
        let rows: Vec<Vec<String>> = prefs.into_iter().map(|(k, v)| vec![k, v]).collect();
        self.ui.table(&["key", "value"], &rows);
        Ok(())
    }

    // -- github --

    async fn github_menu(&mut self) -> Result<(), HavenError> {
        if self.github.is_none() {
            self.ui
                .error("GitHub not configured; set GITHUB_TOKEN in .env");
            return Ok(());
        }

        self.ui.line(
            "\ngithub: 1) list repos  2) user info  3) repo info  4) create repo  \
             5) list issues  6) create issue  7) delete repo  8) back",
        );
        let Some(choice) = self.read_line("choice") else {
            return Ok(());
        };
        match choice.trim() {
            "1" => {
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let repos = github.list_repositories(10).await?;
                for repo in &repos {
                    self.ui.line(&format!(
                        "{} ({} stars) {}",
                        repo.full_name,
                        repo.stargazers_count,
                        repo.description.as_deref().unwrap_or("")
                    ));
                }
            }
            "2" => {
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let info = github.user_info().await?;
                self.ui.line(&format!(
                    "{} ({}), {} public repos",
                    info.name.as_deref().unwrap_or(&info.login),
                    info.login,
                    info.public_repos
                ));
            }
            "3" => {
                let Some(full_name) = self.read_line("repository (owner/name)") else {
                    return Ok(());
                };
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let repo = github.get_repository(&full_name).await?;
                self.ui.line(&format!(
                    "{}: {} stars, {} forks, {}{}",
                    repo.full_name,
                    repo.stargazers_count,
                    repo.forks_count,
                    repo.language.as_deref().unwrap_or("no language"),
                    if repo.private { " (private)" } else { "" }
                ));
            }
            "4" => {
                let Some(name) = self.read_line("repository name") else {
                    return Ok(());
                };
                let description = self.read_line("description").unwrap_or_default();
                let private = self.ui.confirm("private repository?");
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let repo = github.create_repository(&name, &description, private).await?;
                self.ui.success(&format!("created {}", repo.html_url));
            }
            "5" => {
                let Some(full_name) = self.read_line("repository (owner/name)") else {
                    return Ok(());
                };
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let issues = github.list_issues(&full_name, "open").await?;
                if issues.is_empty() {
                    self.ui.info("no open issues");
                }
                for issue in &issues {
                    self.ui
                        .line(&format!("#{} [{}] {}", issue.number, issue.state, issue.title));
                }
            }
            "6" => {
                let Some(full_name) = self.read_line("repository (owner/name)") else {
                    return Ok(());
                };
                let Some(title) = self.read_line("issue title") else {
                    return Ok(());
                };
                let body = self.read_line("issue body").unwrap_or_default();
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let issue = github.create_issue(&full_name, &title, &body).await?;
                self.ui
                    .success(&format!("opened issue #{}: {}", issue.number, issue.html_url));
            }
            "7" => {
                let Some(full_name) = self.read_line("repository (owner/name) to delete") else {
                    return Ok(());
                };
                let language = self.ui.language();
                let Some(github) = self.github.as_ref() else {
                    return Ok(());
                };
                let outcome = github
                    .delete_repository(&full_name, language, &mut self.ui)
                    .await?;
                let mut params = BTreeMap::new();
                params.insert("repository".to_string(), full_name);
                self.audit(outcome.decision(), &params).await;
                if outcome.executed() {
                    self.ui.success("repository deleted");
                } else if let Some(reason) = &outcome.decision().reason {
                    self.ui.warning(&reason.describe(language));
                }
            }
            _ => {}
        }
        Ok(())
    }

    // -- azure --

    async fn azure_menu(&mut self) -> Result<(), HavenError> {
        if self.azure.is_none() {
            self.ui
                .error("Azure not configured; set Azure credentials in .env");
            return Ok(());
        }

        self.ui.line(
            "\nazure: 1) resource groups  2) resources  3) create group  4) subscription  5) delete group  6) back",
        );
        let Some(choice) = self.read_line("choice") else {
            return Ok(());
        };
        match choice.trim() {
            "1" => {
                let Some(azure) = self.azure.as_ref() else {
                    return Ok(());
                };
                let groups = azure.list_resource_groups().await?;
                for group in &groups {
                    self.ui
                        .line(&format!("{} ({})", group.name, group.location));
                }
            }
            "2" => {
                let group = self.read_line("resource group (empty for all)");
                let group = group.as_deref().filter(|g| !g.trim().is_empty());
                let Some(azure) = self.azure.as_ref() else {
                    return Ok(());
                };
                let resources = azure.list_resources(group).await?;
                for resource in &resources {
                    self.ui.line(&format!(
                        "{} [{}] ({})",
                        resource.name, resource.resource_type, resource.location
                    ));
                }
            }
            "3" => {
                let Some(name) = self.read_line("resource group name") else {
                    return Ok(());
                };
                let location = self
                    .read_line("location")
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| "eastus".to_string());
                let Some(azure) = self.azure.as_ref() else {
                    return Ok(());
                };
                let group = azure.create_resource_group(&name, &location).await?;
                self.ui
                    .success(&format!("created {} in {}", group.name, group.location));
            }
            "4" => {
                let Some(azure) = self.azure.as_ref() else {
                    return Ok(());
                };
                let info = azure.subscription_info().await?;
                self.ui.line(&format!(
                    "{} ({}): {}",
                    info.display_name, info.subscription_id, info.state
                ));
            }
            "5" => {
                let Some(name) = self.read_line("resource group to delete") else {
                    return Ok(());
                };
                let language = self.ui.language();
                let Some(azure) = self.azure.as_ref() else {
                    return Ok(());
                };
                let outcome = azure
                    .delete_resource_group(&name, language, &mut self.ui)
                    .await?;
                let mut params = BTreeMap::new();
                params.insert("resource".to_string(), name);
                self.audit(outcome.decision(), &params).await;
                if outcome.executed() {
                    self.ui.success("resource group deletion started");
                } else if let Some(reason) = &outcome.decision().reason {
                    self.ui.warning(&reason.describe(language));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
