//! Prompt text for the content and narration stages.
//!
//! Japanese presentations get Japanese prompts; every other language is
//! prompted in English.

use serde_json::Value;

use super::models::SlideTheme;

/// Upper bound on the project data embedded in a content prompt, in bytes.
pub const MAX_DATA_BYTES: usize = 8000;

fn is_japanese(language: &str) -> bool {
    language == "ja"
}

fn instruction(theme: &SlideTheme, language: &str) -> &'static str {
    if is_japanese(language) {
        match theme {
            SlideTheme::ProjectOverview => {
                "プロジェクトの概要スライドを作成してください。名称、目的、期間、体制を含めてください。"
            }
            SlideTheme::ProjectProgress => {
                "プロジェクトの進捗スライドを作成してください。完了率、マイルストーン、現状を含めてください。"
            }
            SlideTheme::IssueManagement => {
                "課題管理の状況スライドを作成してください。未解決の課題、優先度の分布、進行中の作業を含めてください。"
            }
            SlideTheme::RiskAnalysis => {
                "リスク分析のスライドを作成してください。潜在リスク、遅延要因、対策を含めてください。"
            }
            SlideTheme::TeamCollaboration => {
                "チームの協働状況のスライドを作成してください。メンバー構成、役割、コミュニケーションを含めてください。"
            }
            SlideTheme::DocumentManagement => {
                "文書管理の状況スライドを作成してください。文書数、更新頻度、知識共有を含めてください。"
            }
            SlideTheme::CodebaseActivity => {
                "開発活動のスライドを作成してください。リポジトリ、開発者の活動量、リリース頻度を含めてください。"
            }
            SlideTheme::Notifications => {
                "コミュニケーション状況のスライドを作成してください。通知数、応答状況、重要通知の処理を含めてください。"
            }
            SlideTheme::PredictiveAnalysis => {
                "予測分析のスライドを作成してください。完了予測、リスクの発生見込み、必要リソースを含めてください。"
            }
            SlideTheme::SummaryPlan => {
                "総括と今後の計画のスライドを作成してください。主な成果、残課題、次の計画を含めてください。"
            }
            SlideTheme::Custom(_) => "プロジェクトに関するスライドを作成してください。",
        }
    } else {
        match theme {
            SlideTheme::ProjectOverview => {
                "Create a project overview slide covering name, purpose, timeline and team."
            }
            SlideTheme::ProjectProgress => {
                "Create a project progress slide covering completion rate, milestones and current status."
            }
            SlideTheme::IssueManagement => {
                "Create an issue management slide covering open issues, priority distribution and work in progress."
            }
            SlideTheme::RiskAnalysis => {
                "Create a risk analysis slide covering potential risks, sources of delay and countermeasures."
            }
            SlideTheme::TeamCollaboration => {
                "Create a team collaboration slide covering members, roles and communication."
            }
            SlideTheme::DocumentManagement => {
                "Create a document management slide covering document count, update frequency and knowledge sharing."
            }
            SlideTheme::CodebaseActivity => {
                "Create a development activity slide covering repositories, developer activity and release cadence."
            }
            SlideTheme::Notifications => {
                "Create a communication slide covering notification volume, response status and handling of important notices."
            }
            SlideTheme::PredictiveAnalysis => {
                "Create a predictive analysis slide covering expected completion, risk likelihood and resource needs."
            }
            SlideTheme::SummaryPlan => {
                "Create a summary and planning slide covering key achievements, remaining issues and next steps."
            }
            SlideTheme::Custom(_) => "Create a slide about the project.",
        }
    }
}

/// Serialize `data`, cutting it to [`MAX_DATA_BYTES`] on a char boundary.
pub fn truncate_data(data: &Value) -> String {
    let json = data.to_string();
    if json.len() <= MAX_DATA_BYTES {
        return json;
    }
    let mut end = MAX_DATA_BYTES;
    while !json.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...}}", &json[..end])
}

pub fn content_prompt(theme: &SlideTheme, language: &str, data: &Value) -> String {
    let task = instruction(theme, language);
    let data = truncate_data(data);
    if is_japanese(language) {
        format!(
            "以下のBacklogプロジェクトデータをもとに、{task}\n\n\
             データ:\n{data}\n\n\
             要件:\n\
             1. 必ず # で始まるタイトル行から書き始める\n\
             2. 報告用に簡潔にまとめ、要点は3〜5個\n\
             3. データを示すMermaid図を1つ含める（```mermaid で開始）\n\
             4. 箇条書きを中心に構成し、数値を強調する\n\n\
             スライド内容:"
        )
    } else {
        format!(
            "{task}\n\nUse the following Backlog project data.\n\n\
             Data:\n{data}\n\n\
             Requirements:\n\
             1. Start with a title line beginning with #\n\
             2. Keep it brief for a status report, 3-5 key points\n\
             3. Include one Mermaid diagram visualizing the data (start with ```mermaid)\n\
             4. Prefer bullet points and highlight numbers\n\n\
             Slide content:"
        )
    }
}

pub fn narration_prompt(markdown: &str, language: &str) -> String {
    if is_japanese(language) {
        format!(
            "次のMarkdownスライドを口頭で発表するためのナレーションを日本語で作成してください。\n\n\
             スライド内容:\n{markdown}\n\n\
             要件:\n\
             1. 聞き手に分かりやすい自然な話し言葉\n\
             2. プレゼンテーションにふさわしい丁寧な調子\n\
             3. 2〜3分で読める長さ\n\n\
             ナレーション:"
        )
    } else {
        format!(
            "Write spoken narration in English for the following slide.\n\n\
             Slide content:\n{markdown}\n\n\
             Requirements:\n\
             1. Natural, professional presentation tone\n\
             2. About 2-3 minutes when read aloud\n\
             3. Explain the slide's points clearly\n\n\
             Narration:"
        )
    }
}

pub fn default_title(theme: &SlideTheme, language: &str) -> &'static str {
    if is_japanese(language) {
        match theme {
            SlideTheme::ProjectOverview => "プロジェクト概要",
            SlideTheme::ProjectProgress => "プロジェクト進捗",
            SlideTheme::IssueManagement => "課題管理",
            SlideTheme::RiskAnalysis => "リスク分析",
            SlideTheme::TeamCollaboration => "チーム協力",
            SlideTheme::DocumentManagement => "ドキュメント管理",
            SlideTheme::CodebaseActivity => "コードベース活動",
            SlideTheme::Notifications => "通知管理",
            SlideTheme::PredictiveAnalysis => "予測分析",
            SlideTheme::SummaryPlan => "総括と計画",
            SlideTheme::Custom(_) => "プロジェクトスライド",
        }
    } else {
        match theme {
            SlideTheme::ProjectOverview => "Project Overview",
            SlideTheme::ProjectProgress => "Project Progress",
            SlideTheme::IssueManagement => "Issue Management",
            SlideTheme::RiskAnalysis => "Risk Analysis",
            SlideTheme::TeamCollaboration => "Team Collaboration",
            SlideTheme::DocumentManagement => "Document Management",
            SlideTheme::CodebaseActivity => "Codebase Activity",
            SlideTheme::Notifications => "Notifications",
            SlideTheme::PredictiveAnalysis => "Predictive Analysis",
            SlideTheme::SummaryPlan => "Summary & Plan",
            SlideTheme::Custom(_) => "Project Slide",
        }
    }
}

/// Title of a generated slide: its first `#` heading, or the theme default.
pub fn extract_title(markdown: &str, theme: &SlideTheme, language: &str) -> String {
    markdown
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim())
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_title(theme, language).to_string())
}
