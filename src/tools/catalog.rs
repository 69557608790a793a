//! The Backlog tool table.
//!
//! Every tool is one REST call: a method, a route built from path arguments,
//! and the remaining arguments sent as query string (GET) or form body.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::backlog::{BacklogConnector, HttpMethod};
use crate::mcp::{
    InputSchema, Property, PropertyType, ToolArguments, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

const PROJECT_KEYS: &[&str] = &["projectIdOrKey", "projectKey", "projectId"];
const ISSUE_KEYS: &[&str] = &["issueIdOrKey"];
const WIKI_KEYS: &[&str] = &["wikiId"];
const REPO_KEYS: &[&str] = &["projectIdOrKey", "projectKey", "projectId", "repoIdOrName"];
const PULL_KEYS: &[&str] = &[
    "projectIdOrKey",
    "projectKey",
    "projectId",
    "repoIdOrName",
    "number",
];

#[derive(Debug, Clone, Copy)]
enum Route {
    Fixed(&'static str),
    /// `/projects/{project}{suffix}`
    Project(&'static str),
    /// `/issues/{issue}{suffix}`
    Issue(&'static str),
    Wiki,
    /// `/projects/{project}/git/repositories/{repo}/pullRequests{suffix}`
    PullRequests(&'static str),
    PullRequest,
}

impl Route {
    fn consumed(self) -> &'static [&'static str] {
        match self {
            Route::Fixed(_) => &[],
            Route::Project(_) => PROJECT_KEYS,
            Route::Issue(_) => ISSUE_KEYS,
            Route::Wiki => WIKI_KEYS,
            Route::PullRequests(_) => REPO_KEYS,
            Route::PullRequest => PULL_KEYS,
        }
    }

    fn resolve(self, args: &ToolArguments) -> Result<String, ToolError> {
        Ok(match self {
            Route::Fixed(path) => path.to_string(),
            Route::Project(suffix) => format!("/projects/{}{suffix}", project_ref(args)?),
            Route::Issue(suffix) => format!("/issues/{}{suffix}", segment(args, "issueIdOrKey")?),
            Route::Wiki => format!("/wikis/{}", segment(args, "wikiId")?),
            Route::PullRequests(suffix) => format!(
                "/projects/{}/git/repositories/{}/pullRequests{suffix}",
                project_ref(args)?,
                segment(args, "repoIdOrName")?
            ),
            Route::PullRequest => format!(
                "/projects/{}/git/repositories/{}/pullRequests/{}",
                project_ref(args)?,
                segment(args, "repoIdOrName")?,
                segment(args, "number")?
            ),
        })
    }
}

fn project_ref(args: &ToolArguments) -> Result<String, ToolError> {
    args.first_of(PROJECT_KEYS).ok_or_else(|| {
        ToolError::invalid("either projectId, projectKey, or projectIdOrKey is required")
    })
}

fn segment(args: &ToolArguments, key: &str) -> Result<String, ToolError> {
    args.first_of(&[key])
        .ok_or_else(|| ToolError::invalid(format!("{key} is required")))
}

/// Handler shared by every Backlog tool.
struct Endpoint {
    connector: Arc<BacklogConnector>,
    method: HttpMethod,
    route: Route,
}

#[async_trait]
impl ToolHandler for Endpoint {
    async fn call(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let path = self.route.resolve(&args)?;
        let client = self.connector.client_for(ctx)?;
        let params = args.without(self.route.consumed());
        client.request(self.method, &path, &params).await
    }
}

struct Entry {
    name: &'static str,
    description: &'static str,
    method: HttpMethod,
    route: Route,
    schema: InputSchema,
}

fn get(name: &'static str, description: &'static str, route: Route, schema: InputSchema) -> Entry {
    Entry {
        name,
        description,
        method: HttpMethod::Get,
        route,
        schema,
    }
}

fn write(
    name: &'static str,
    description: &'static str,
    method: HttpMethod,
    route: Route,
    schema: InputSchema,
) -> Entry {
    Entry {
        name,
        description,
        method,
        route,
        schema,
    }
}

fn ids(description: &str) -> Property {
    Property::new(PropertyType::Array, description)
}

fn project_schema() -> InputSchema {
    InputSchema::new()
        .optional("projectIdOrKey", Property::string("Project ID or key"))
        .optional("projectId", Property::number("Project ID"))
        .optional("projectKey", Property::string("Project key"))
}

fn order() -> Property {
    Property::string("Sort order").one_of(&["asc", "desc"])
}

fn issue_filters() -> InputSchema {
    InputSchema::new()
        .optional("projectId", ids("Project IDs"))
        .optional("issueTypeId", ids("Issue type IDs"))
        .optional("categoryId", ids("Category IDs"))
        .optional("statusId", ids("Status IDs"))
        .optional("priorityId", ids("Priority IDs"))
        .optional("assigneeId", ids("Assignee user IDs"))
        .optional("createdUserId", ids("Creator user IDs"))
        .optional("resolutionId", ids("Resolution IDs"))
        .optional("keyword", Property::string("Search keyword"))
        .optional("createdSince", Property::string("Created since (yyyy-MM-dd)"))
        .optional("createdUntil", Property::string("Created until (yyyy-MM-dd)"))
        .optional("updatedSince", Property::string("Updated since (yyyy-MM-dd)"))
        .optional("updatedUntil", Property::string("Updated until (yyyy-MM-dd)"))
        .optional("dueDateSince", Property::string("Due since (yyyy-MM-dd)"))
        .optional("dueDateUntil", Property::string("Due until (yyyy-MM-dd)"))
}

fn paging(schema: InputSchema) -> InputSchema {
    schema
        .optional("offset", Property::number("Offset for pagination"))
        .optional("count", Property::number("Number of items to return"))
}

fn entries() -> Vec<Entry> {
    use HttpMethod::{Patch, Post};

    vec![
        // Space
        get(
            "get_space",
            "Get information about the Backlog space",
            Route::Fixed("/space"),
            InputSchema::new(),
        ),
        get(
            "get_users",
            "Get list of users in the space",
            Route::Fixed("/users"),
            InputSchema::new(),
        ),
        get(
            "get_myself",
            "Get information about the current user",
            Route::Fixed("/users/myself"),
            InputSchema::new(),
        ),
        // Projects
        get(
            "get_project_list",
            "Get list of projects",
            Route::Fixed("/projects"),
            InputSchema::new()
                .optional("archived", Property::boolean("Filter by archived status"))
                .optional("all", Property::boolean("Get all projects (admin only)")),
        ),
        get(
            "get_project",
            "Get project details",
            Route::Project(""),
            project_schema(),
        ),
        get(
            "get_issue_types",
            "Get issue types of a project",
            Route::Project("/issueTypes"),
            project_schema(),
        ),
        get(
            "get_categories",
            "Get categories of a project",
            Route::Project("/categories"),
            project_schema(),
        ),
        get(
            "get_custom_fields",
            "Get custom fields of a project",
            Route::Project("/customFields"),
            project_schema(),
        ),
        get(
            "get_priorities",
            "Get issue priorities",
            Route::Fixed("/priorities"),
            InputSchema::new(),
        ),
        get(
            "get_resolutions",
            "Get issue resolutions",
            Route::Fixed("/resolutions"),
            InputSchema::new(),
        ),
        // Issues
        get(
            "get_issues",
            "Get list of issues",
            Route::Fixed("/issues"),
            paging(issue_filters())
                .optional("sort", Property::string("Sort field"))
                .optional("order", order()),
        ),
        get(
            "count_issues",
            "Count issues matching the filters",
            Route::Fixed("/issues/count"),
            issue_filters(),
        ),
        get(
            "get_issue",
            "Get specific issue details",
            Route::Issue(""),
            InputSchema::new().required("issueIdOrKey", Property::string("Issue ID or key")),
        ),
        write(
            "add_issue",
            "Create a new issue",
            Post,
            Route::Fixed("/issues"),
            InputSchema::new()
                .required("projectId", Property::number("Project ID"))
                .required("summary", Property::string("Issue summary"))
                .required("issueTypeId", Property::number("Issue type ID"))
                .required("priorityId", Property::number("Priority ID"))
                .optional("description", Property::string("Issue description"))
                .optional("startDate", Property::string("Start date (yyyy-MM-dd)"))
                .optional("dueDate", Property::string("Due date (yyyy-MM-dd)"))
                .optional("assigneeId", Property::number("Assignee user ID"))
                .optional("categoryId", ids("Category IDs")),
        ),
        write(
            "update_issue",
            "Update an issue",
            Patch,
            Route::Issue(""),
            InputSchema::new()
                .required("issueIdOrKey", Property::string("Issue ID or key"))
                .optional("summary", Property::string("Issue summary"))
                .optional("description", Property::string("Issue description"))
                .optional("statusId", Property::number("Status ID"))
                .optional("priorityId", Property::number("Priority ID"))
                .optional("assigneeId", Property::number("Assignee user ID"))
                .optional("resolutionId", Property::number("Resolution ID"))
                .optional("dueDate", Property::string("Due date (yyyy-MM-dd)"))
                .optional("comment", Property::string("Comment added with the change")),
        ),
        get(
            "get_issue_comments",
            "Get comments of an issue",
            Route::Issue("/comments"),
            InputSchema::new()
                .required("issueIdOrKey", Property::string("Issue ID or key"))
                .optional("minId", Property::number("Minimum comment ID"))
                .optional("maxId", Property::number("Maximum comment ID"))
                .optional("count", Property::number("Number of comments"))
                .optional("order", order()),
        ),
        write(
            "add_issue_comment",
            "Add a comment to an issue",
            Post,
            Route::Issue("/comments"),
            InputSchema::new()
                .required("issueIdOrKey", Property::string("Issue ID or key"))
                .required("content", Property::string("Comment body"))
                .optional("notifiedUserId", ids("User IDs to notify")),
        ),
        // Wiki
        get(
            "get_wiki_pages",
            "Get wiki pages of a project",
            Route::Fixed("/wikis"),
            InputSchema::new()
                .required("projectIdOrKey", Property::string("Project ID or key"))
                .optional("keyword", Property::string("Search keyword")),
        ),
        get(
            "get_wikis_count",
            "Count wiki pages of a project",
            Route::Fixed("/wikis/count"),
            InputSchema::new().required("projectIdOrKey", Property::string("Project ID or key")),
        ),
        get(
            "get_wiki",
            "Get a wiki page",
            Route::Wiki,
            InputSchema::new().required("wikiId", Property::number("Wiki page ID")),
        ),
        // Git
        get(
            "get_git_repositories",
            "Get Git repositories of a project",
            Route::Project("/git/repositories"),
            project_schema(),
        ),
        get(
            "get_pull_requests",
            "Get pull requests of a repository",
            Route::PullRequests(""),
            paging(
                project_schema()
                    .required("repoIdOrName", Property::string("Repository ID or name"))
                    .optional("statusId", ids("Status IDs"))
                    .optional("assigneeId", ids("Assignee user IDs")),
            ),
        ),
        get(
            "get_pull_requests_count",
            "Count pull requests of a repository",
            Route::PullRequests("/count"),
            project_schema()
                .required("repoIdOrName", Property::string("Repository ID or name"))
                .optional("statusId", ids("Status IDs")),
        ),
        get(
            "get_pull_request",
            "Get a pull request",
            Route::PullRequest,
            project_schema()
                .required("repoIdOrName", Property::string("Repository ID or name"))
                .required("number", Property::number("Pull request number")),
        ),
        // Notifications
        get(
            "get_notifications",
            "Get notifications of the current user",
            Route::Fixed("/notifications"),
            InputSchema::new()
                .optional("minId", Property::number("Minimum notification ID"))
                .optional("maxId", Property::number("Maximum notification ID"))
                .optional("count", Property::number("Number of notifications"))
                .optional("order", order()),
        ),
        get(
            "get_notifications_count",
            "Count notifications of the current user",
            Route::Fixed("/notifications/count"),
            InputSchema::new()
                .optional("alreadyRead", Property::boolean("Count read notifications"))
                .optional(
                    "resourceAlreadyRead",
                    Property::boolean("Count notifications on read resources"),
                ),
        ),
    ]
}

/// All Backlog tools, in catalogue order, sharing one connector.
pub fn backlog_tools(connector: Arc<BacklogConnector>) -> Vec<ToolDefinition> {
    entries()
        .into_iter()
        .map(|entry| {
            let handler = Endpoint {
                connector: Arc::clone(&connector),
                method: entry.method,
                route: entry.route,
            };
            ToolDefinition::new(entry.name, entry.description, entry.schema, Arc::new(handler))
        })
        .collect()
}
