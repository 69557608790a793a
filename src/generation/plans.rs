//! Which Backlog tools each theme reads, and how their results are combined.
//!
//! Every plan has required calls (failure fails the theme) and optional ones
//! (failure leaves `null` in the payload).

use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::models::{ProjectId, SlideTheme};
use crate::mcp::{ToolCall, ToolError, ToolInvoker};

/// Tool calls for one project on behalf of one caller.
pub struct ProjectData<'a> {
    tools: &'a dyn ToolInvoker,
    project: &'a ProjectId,
    access_token: Option<&'a str>,
}

impl<'a> ProjectData<'a> {
    pub fn new(
        tools: &'a dyn ToolInvoker,
        project: &'a ProjectId,
        access_token: Option<&'a str>,
    ) -> Self {
        Self {
            tools,
            project,
            access_token,
        }
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        debug!(tool = name, project = %self.project, "Fetching project data");
        let call = ToolCall::new(name, arguments).with_token(self.access_token.map(str::to_string));
        self.tools.call_tool(call).await
    }

    async fn optional(&self, name: &str, arguments: Value) -> Value {
        match self.call(name, arguments).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = name, project = %self.project, error = %e, "Optional data unavailable");
                Value::Null
            }
        }
    }

    fn id_filter(&self) -> Value {
        json!([self.project.to_json()])
    }

    pub async fn overview(&self) -> Result<Value, ToolError> {
        let project = self
            .call(
                "get_project",
                json!({"projectIdOrKey": self.project.as_str()}),
            )
            .await?;
        let space = self.optional("get_space", json!({})).await;
        let users = self.optional("get_users", json!({})).await;
        Ok(json!({"project": project, "space": space, "users": users}))
    }

    pub async fn progress(&self) -> Result<Value, ToolError> {
        let issues = self
            .call(
                "get_issues",
                json!({"projectId": self.id_filter(), "count": 100}),
            )
            .await?;
        let count = self
            .optional("count_issues", json!({"projectId": self.id_filter()}))
            .await;
        Ok(json!({"issues": issues, "issueCount": count}))
    }

    pub async fn issues(&self) -> Result<Value, ToolError> {
        let issues = self
            .call(
                "get_issues",
                json!({
                    "projectId": self.id_filter(),
                    "count": 50,
                    "sort": "updated",
                    "order": "desc"
                }),
            )
            .await?;
        let issue_types = self
            .optional(
                "get_issue_types",
                json!({"projectIdOrKey": self.project.as_str()}),
            )
            .await;
        let priorities = self.optional("get_priorities", json!({})).await;
        Ok(json!({"issues": issues, "issueTypes": issue_types, "priorities": priorities}))
    }

    /// Team members, or a placeholder marked `fallback` when they cannot be read.
    pub async fn team(&self) -> Value {
        match self.call("get_users", json!({})).await {
            Ok(users) => {
                let recent = self
                    .optional(
                        "get_issues",
                        json!({"projectId": self.id_filter(), "count": 20, "sort": "updated", "order": "desc"}),
                    )
                    .await;
                json!({"users": users, "recentActivity": recent})
            }
            Err(e) => {
                warn!(project = %self.project, error = %e, "Team data unavailable, using placeholder");
                json!({
                    "users": [{"name": "プロジェクトメンバー", "role": "開発者"}],
                    "fallback": true,
                    "error": "API access limited - using sample data"
                })
            }
        }
    }

    pub async fn risks(&self) -> Result<Value, ToolError> {
        let high_priority = self
            .call(
                "get_issues",
                json!({
                    "projectId": self.id_filter(),
                    "statusId": [1, 2, 3],
                    "priorityId": [2, 3],
                    "count": 30
                }),
            )
            .await?;
        Ok(json!({"highPriorityIssues": high_priority}))
    }

    async fn with_focus(&self, focus: &str, tool: &str, key: &str) -> Result<Value, ToolError> {
        let overview = self.overview().await?;
        let extra = self
            .optional(tool, json!({"projectIdOrKey": self.project.as_str()}))
            .await;
        Ok(json!({"overview": overview, "focus": focus, key: extra}))
    }

    /// Data plan for one slide theme.
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn for_theme(&self, theme: &SlideTheme) -> Result<Value, ToolError> {
        match theme {
            SlideTheme::ProjectOverview | SlideTheme::Custom(_) => {
                Ok(json!({"overview": self.overview().await?}))
            }
            SlideTheme::ProjectProgress => Ok(json!({"progress": self.progress().await?})),
            SlideTheme::IssueManagement => Ok(json!({"issues": self.issues().await?})),
            SlideTheme::RiskAnalysis => Ok(json!({"risks": self.risks().await?})),
            SlideTheme::TeamCollaboration => Ok(json!({"team": self.team().await})),
            SlideTheme::DocumentManagement => {
                self.with_focus("documents", "get_wiki_pages", "wiki").await
            }
            SlideTheme::CodebaseActivity => {
                self.with_focus("codebase", "get_git_repositories", "repositories")
                    .await
            }
            SlideTheme::Notifications => {
                let overview = self.overview().await?;
                let notifications = self
                    .optional("get_notifications", json!({"count": 50}))
                    .await;
                Ok(json!({
                    "overview": overview,
                    "focus": "notifications",
                    "notifications": notifications
                }))
            }
            SlideTheme::PredictiveAnalysis => Ok(json!({
                "progress": self.progress().await?,
                "issues": self.issues().await?,
                "focus": "prediction"
            })),
            SlideTheme::SummaryPlan => {
                let overview = self.overview().await?;
                let progress = match self.progress().await {
                    Ok(progress) => progress,
                    Err(e) => {
                        warn!(error = %e, "Progress data unavailable for summary");
                        Value::Null
                    }
                };
                Ok(json!({"overview": overview, "progress": progress, "focus": "summary"}))
            }
        }
    }
}
