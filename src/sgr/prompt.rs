//! System prompt 拼装：访问级别策略 + rulebook + who-am-i + 用户档案 / 公开访问声明
//!
//! 每个任务只拼一次。

use crate::backend::{Backend, EmployeeResponse, WhoAmI};
use crate::core::ApiError;

/// 无认证用户时注入的声明
pub const PUBLIC_ACCESS_NOTICE: &str =
    "User specified in the task not found! Operating with public access only.";

const POLICY_TEMPLATE: &str = "
You are a business assistant helping customers of {company}.

When interacting with {company}'s internal systems, always operate strictly within the user's access level
(Executives have broad access, project leads can write with the projects they lead, team members can read).
For guests (public access, no user account) respond exclusively with public-safe data,
refuse sensitive queries politely, and never reveal internal details or identities.
Successful responses must always include a clear outcome status and explicit entity links.

To confirm project access - get or find project (and get after finding)
When updating entry - fill all fields to keep with old values from being erased
When task is done or can't be done - ProvideAgentResponse.

# Pitfalls:
- \"limit\" and \"offset\" DO NOT set negative values, this is an error.
- If a request returns an error, that resource cannot be found, DO NOT retry it again.
- If you fail with a non \"ok\" outcome, DO NOT provide any links.
- When asked to perform a certain action, DO first check if the action is available and allowed for the user.
";

/// 纯拼装：profile 为 None 时注入公开访问声明
pub fn build_system_prompt(
    company: &str,
    rulebook_path: &str,
    rulebook: &str,
    about: &WhoAmI,
    profile: Option<&EmployeeResponse>,
) -> String {
    let about_json = serde_json::to_string(about).unwrap_or_default();
    let mut prompt = format!(
        "{}\n<file \"{}\">\n{}\n</file>\n\n# Current user info:\n{}\n",
        POLICY_TEMPLATE.replace("{company}", company),
        rulebook_path,
        rulebook,
        about_json
    );
    match profile {
        Some(p) => {
            prompt.push('\n');
            prompt.push_str(&serde_json::to_string(p).unwrap_or_default());
        }
        None => {
            prompt.push('\n');
            prompt.push_str(PUBLIC_ACCESS_NOTICE);
        }
    }
    prompt
}

/// 从后端读取 rulebook 与身份后拼装
pub async fn assemble_system_prompt(
    backend: &dyn Backend,
    company: &str,
    rulebook_path: &str,
) -> Result<String, ApiError> {
    let about = backend.who_am_i().await?;
    let rulebook = backend.load_wiki(rulebook_path).await?;
    let profile = match about.current_user.as_deref() {
        Some(user) => Some(backend.get_employee(user).await?),
        None => None,
    };
    let prompt = build_system_prompt(
        company,
        rulebook_path,
        &rulebook.content,
        &about,
        profile.as_ref(),
    );
    tracing::debug!(chars = prompt.len(), public = profile.is_none(), "system prompt assembled");
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use serde_json::json;

    fn backend(current_user: serde_json::Value) -> ScriptedBackend {
        ScriptedBackend::new()
            .respond("/whoami", json!({"current_user": current_user, "is_public": current_user.is_null()}))
            .respond("/wiki/load", json!({"file": "rulebook.md", "content": "Rule 1: be nice"}))
            .respond(
                "/employees/get",
                json!({"employee": {"id": "elena_vogel", "name": "Elena Vogel", "salary": 99000}}),
            )
    }

    #[tokio::test]
    async fn test_public_prompt_has_notice_and_no_profile() {
        let b = backend(serde_json::Value::Null);
        let prompt = assemble_system_prompt(&b, "Aetherion", "rulebook.md").await.unwrap();
        assert!(prompt.contains(PUBLIC_ACCESS_NOTICE));
        assert!(prompt.contains("Rule 1: be nice"));
        assert!(!prompt.contains("salary"));
        assert!(!prompt.contains("Elena Vogel"));
        assert_eq!(b.calls_to("/employees/get"), 0);
    }

    #[tokio::test]
    async fn test_authenticated_prompt_embeds_profile() {
        let b = backend(json!("elena_vogel"));
        let prompt = assemble_system_prompt(&b, "Aetherion", "rulebook.md").await.unwrap();
        assert!(!prompt.contains(PUBLIC_ACCESS_NOTICE));
        assert!(prompt.contains("\"salary\":99000"));
        assert!(prompt.contains("customers of Aetherion"));
        assert_eq!(b.calls()[2].1, json!({"id": "elena_vogel"}));
    }

    #[test]
    fn test_policy_has_four_pitfalls() {
        let pitfalls = POLICY_TEMPLATE
            .split("# Pitfalls:")
            .nth(1)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with("- "))
            .count();
        assert_eq!(pitfalls, 4);
    }
}
