//! 动作菜单：每步推理恰好选择一个动作
//!
//! `Action` 是以 `tool` 字面量为标签的封闭和类型；分发器只依赖 `tool()` 与 `payload()`，
//! 不需要了解完整菜单。

pub mod dispatcher;
pub mod requests;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use dispatcher::{strip_nulls, ActionDispatcher};
pub use requests::{
    AgentLink, CurrentUserQuestion, EntityId, EntityKind, LoadWiki, LogTimeEntry, Page,
    ProvideAgentResponse, SearchCustomers, SearchEmployees, SearchProjects, SearchTimeEntries,
    SearchWiki, SkillLevel, TimeSummary, UpdateEmployeeInfo, UpdateProjectStatus,
    UpdateProjectTeam, UpdateTimeEntry, Workload,
};

macro_rules! action_menu {
    ($( $(#[$doc:meta])* $variant:ident($req:ty) => $tag:literal, )+) => {
        /// 动作菜单（封闭集合）
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
        #[serde(tag = "tool")]
        pub enum Action {
            $(
                $(#[$doc])*
                #[serde(rename = $tag)]
                $variant($req),
            )+
        }

        impl Action {
            /// 菜单中全部标签
            pub const TOOLS: &'static [&'static str] = &[$($tag),+];

            /// 动作名（日志与错误上下文用）
            pub fn name(&self) -> &'static str {
                match self {
                    $(Action::$variant(_) => stringify!($variant),)+
                }
            }

            /// 标签字面量，同时是后端路径
            pub fn tool(&self) -> &'static str {
                match self {
                    $(Action::$variant(_) => $tag,)+
                }
            }
        }
    };
}

action_menu! {
    /// Ask a question about the current user (identity, role, projects)
    AskAboutCurrentUser(CurrentUserQuestion) => "question_about_current_user",
    /// Report the final answer when the task is done or cannot be done
    ProvideAgentResponse(ProvideAgentResponse) => "/respond",
    ListProjects(Page) => "/projects/list",
    ListEmployees(Page) => "/employees/list",
    ListCustomers(Page) => "/customers/list",
    GetCustomer(EntityId) => "/customers/get",
    GetEmployee(EntityId) => "/employees/get",
    GetProject(EntityId) => "/projects/get",
    GetTimeEntry(EntityId) => "/time/get",
    SearchProjects(SearchProjects) => "/projects/search",
    SearchEmployees(SearchEmployees) => "/employees/search",
    LogTimeEntry(LogTimeEntry) => "/time/log",
    SearchTimeEntries(SearchTimeEntries) => "/time/search",
    SearchCustomers(SearchCustomers) => "/customers/search",
    UpdateTimeEntry(UpdateTimeEntry) => "/time/update",
    UpdateProjectTeam(UpdateProjectTeam) => "/projects/team/update",
    UpdateProjectStatus(UpdateProjectStatus) => "/projects/status/update",
    UpdateEmployeeInfo(UpdateEmployeeInfo) => "/employees/update",
    TimeSummaryByProject(TimeSummary) => "/time/summary/by-project",
    TimeSummaryByEmployee(TimeSummary) => "/time/summary/by-employee",
    SearchWiki(SearchWiki) => "/wiki/search",
    LoadWiki(LoadWiki) => "/wiki/load",
}

impl Action {
    /// 带标签的参数 JSON（写入 assistant 日志条目）
    pub fn to_arguments(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// 去掉标签后的字段（发往后端的请求体）
    pub fn payload(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("tool");
        }
        value
    }

    /// 非 ok 结果的最终回复清空链接；其它动作原样返回
    pub fn sanitized(self) -> Self {
        match self {
            Action::ProvideAgentResponse(mut resp) if !resp.outcome.is_ok() => {
                if !resp.links.is_empty() {
                    tracing::debug!(
                        outcome = %resp.outcome,
                        dropped = resp.links.len(),
                        "dropping links from non-ok response"
                    );
                    resp.links.clear();
                }
                Action::ProvideAgentResponse(resp)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Outcome;

    #[test]
    fn test_tag_identifies_variant() {
        let action: Action =
            serde_json::from_str(r#"{"tool": "/projects/get", "id": "proj_1"}"#).unwrap();
        assert_eq!(action.name(), "GetProject");
        assert_eq!(action.tool(), "/projects/get");
        assert_eq!(action.payload(), serde_json::json!({"id": "proj_1"}));
    }

    #[test]
    fn test_fields_of_other_variant_rejected() {
        let mixed = r#"{"tool": "/projects/get", "id": "p", "question": "who am i"}"#;
        assert!(serde_json::from_str::<Action>(mixed).is_err());
        assert!(serde_json::from_str::<Action>(r#"{"tool": "/nope"}"#).is_err());
        assert!(serde_json::from_str::<Action>(r#"{"id": "p"}"#).is_err());
    }

    #[test]
    fn test_logged_arguments_round_trip() {
        let action = Action::SearchTimeEntries(SearchTimeEntries {
            employee: Some("felix_baum".into()),
            customer: None,
            project: Some("proj_acme".into()),
            date_from: Some("2025-01-01".into()),
            date_to: None,
            work_category: None,
            billable: Some(true),
            status: None,
            offset: 0,
            limit: 10,
        });
        let logged = action.to_arguments();
        assert!(!logged.contains("null"));
        let back: Action = serde_json::from_str(&logged).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_negative_paging_is_not_prevalidated() {
        let action: Action =
            serde_json::from_str(r#"{"tool": "/employees/list", "offset": -1, "limit": 5}"#)
                .unwrap();
        assert_eq!(action.payload()["offset"], -1);
    }

    #[test]
    fn test_sanitized_drops_links_for_denied() {
        let action = Action::ProvideAgentResponse(ProvideAgentResponse {
            message: "no".into(),
            outcome: Outcome::DeniedSecurity,
            links: vec![AgentLink {
                kind: EntityKind::Employee,
                id: "ceo".into(),
            }],
        });
        match action.sanitized() {
            Action::ProvideAgentResponse(resp) => assert!(resp.links.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_menu_has_twenty_domain_operations() {
        assert_eq!(Action::TOOLS.len(), 22);
        assert!(Action::TOOLS.contains(&"/respond"));
        assert!(Action::TOOLS.contains(&"question_about_current_user"));
    }
}
